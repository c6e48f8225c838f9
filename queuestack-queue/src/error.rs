//! Queue engine errors

use queuestack_core::{ErrorCode, ServiceError};
use thiserror::Error;

use crate::message::MessageId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),
    #[error("Pop token does not match an active lease on message {message_id}")]
    LeaseMismatch { message_id: MessageId },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl QueueError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::QueueNotFound(_) => ErrorCode::NotFound,
            Self::LeaseMismatch { .. } => ErrorCode::LeaseMismatch,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<QueueError> for ServiceError {
    fn from(err: QueueError) -> Self {
        let resource = match &err {
            QueueError::QueueNotFound(name) => Some(name.clone()),
            QueueError::LeaseMismatch { message_id } => Some(message_id.to_string()),
            QueueError::InvalidArgument(_) => None,
        };
        let service_error = ServiceError::new(err.code(), err.to_string());
        match resource {
            Some(resource) => service_error.with_resource(resource),
            None => service_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            QueueError::QueueNotFound("q".into()).code(),
            ErrorCode::NotFound
        );
        assert_eq!(
            QueueError::LeaseMismatch {
                message_id: MessageId::new()
            }
            .code(),
            ErrorCode::LeaseMismatch
        );
        assert_eq!(
            QueueError::invalid("bad").code(),
            ErrorCode::InvalidArgument
        );
    }

    #[test]
    fn test_into_service_error_carries_resource() {
        let err: ServiceError = QueueError::QueueNotFound("orders".into()).into();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.resource.as_deref(), Some("orders"));
        assert!(err.message.contains("orders"));
    }
}
