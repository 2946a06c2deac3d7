//! Handler error types and conversions.

mod http_error;
mod rig_error;

pub use http_error::{Error, ErrorKind, Result};
