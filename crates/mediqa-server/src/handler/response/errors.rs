use std::borrow::Cow;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Message returned with every error; internal detail stays in the logs.
pub const GENERIC_MESSAGE: &str = "There was an issue. Please try again later";

/// HTTP error body.
///
/// Only `name` and `message` reach the client.
#[must_use = "error responses do nothing unless serialized"]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse<'a> {
    /// The error name/type identifier
    pub name: Cow<'a, str>,
    /// Client-safe message
    pub message: Cow<'a, str>,

    /// Internal context for debugging, never serialized
    #[serde(skip)]
    pub context: Option<Cow<'a, str>>,
    /// HTTP status code
    #[serde(skip)]
    pub status: StatusCode,
}

impl<'a> ErrorResponse<'a> {
    // 4xx Client Errors
    pub const BAD_REQUEST: Self = Self::new("bad_request", StatusCode::BAD_REQUEST);
    pub const NOT_FOUND: Self = Self::new("not_found", StatusCode::NOT_FOUND);

    // 5xx Server Errors
    pub const INTERNAL_SERVER_ERROR: Self =
        Self::new("internal_server_error", StatusCode::INTERNAL_SERVER_ERROR);
    pub const SERVICE_UNAVAILABLE: Self =
        Self::new("service_unavailable", StatusCode::SERVICE_UNAVAILABLE);
    pub const GATEWAY_TIMEOUT: Self = Self::new("gateway_timeout", StatusCode::GATEWAY_TIMEOUT);

    /// Creates a new error response with the generic message.
    #[inline]
    pub const fn new(name: &'a str, status: StatusCode) -> Self {
        Self {
            name: Cow::Borrowed(name),
            message: Cow::Borrowed(GENERIC_MESSAGE),
            context: None,
            status,
        }
    }

    /// Attaches internal context.
    #[inline]
    pub fn with_context(mut self, context: impl Into<Cow<'a, str>>) -> Self {
        self.context = Some(context.into());
        self
    }
}

impl IntoResponse for ErrorResponse<'_> {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}
