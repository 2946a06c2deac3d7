//! HTTP server startup and graceful shutdown.

mod http_server;
mod shutdown;

pub use http_server::serve;
use shutdown::shutdown_signal;
