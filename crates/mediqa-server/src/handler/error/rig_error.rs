//! Conversion of retrieval and generation failures into HTTP errors.

use mediqa_rig::Error as RigError;

use super::{Error, ErrorKind};
use crate::TRACING_TARGET;

impl From<RigError> for Error {
    fn from(error: RigError) -> Self {
        let kind = match &error {
            RigError::StorageUnavailable(_) => ErrorKind::ServiceUnavailable,
            RigError::GenerationTimeout(_) => ErrorKind::GatewayTimeout,
            _ => ErrorKind::InternalServerError,
        };

        tracing::error!(
            target: TRACING_TARGET,
            error = %error,
            status = kind.status_code().as_u16(),
            "Question answering failed"
        );

        kind.with_context(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn storage_unavailable_is_503() {
        let error = Error::from(RigError::StorageUnavailable("refused".into()));
        assert_eq!(error.kind(), ErrorKind::ServiceUnavailable);
    }

    #[test]
    fn generation_timeout_is_504() {
        let error = Error::from(RigError::GenerationTimeout(Duration::from_secs(1)));
        assert_eq!(error.kind(), ErrorKind::GatewayTimeout);
    }

    #[test]
    fn anything_else_is_500() {
        let errors = [
            RigError::config("bad"),
            RigError::Storage("corrupt".into()),
            RigError::embedding("down"),
            RigError::generation("ollama", "boom"),
        ];

        for error in errors {
            assert_eq!(Error::from(error).kind(), ErrorKind::InternalServerError);
        }
    }
}
