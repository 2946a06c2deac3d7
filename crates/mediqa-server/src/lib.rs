#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod handler;
pub mod middleware;
pub mod service;

pub use crate::handler::{Error, ErrorKind, Result, routes};
pub use crate::service::{QaService, ServiceState};

/// Tracing target for the HTTP layer.
pub const TRACING_TARGET: &str = "mediqa_server";
