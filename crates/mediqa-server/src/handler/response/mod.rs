//! Response payloads shared by handlers.

mod errors;

pub use errors::{ErrorResponse, GENERIC_MESSAGE};
