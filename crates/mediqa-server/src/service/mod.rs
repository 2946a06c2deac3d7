//! Application services and shared state.

mod qa;
mod state;

pub use qa::QaService;
pub use state::ServiceState;
