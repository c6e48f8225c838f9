//! Service error codes and formatting

use serde::Serialize;
use thiserror::Error;

use crate::request_id::RequestId;

/// Error codes returned to callers of the queue service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Queue absent
    NotFound,
    /// Pop token stale, absent or wrong
    LeaseMismatch,
    /// Count, timeout, size or name outside its bounds
    InvalidArgument,
    UnknownOperation,
    MalformedRequest,
    /// Failure on the service side, not the caller's
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NotFound",
            Self::LeaseMismatch => "LeaseMismatch",
            Self::InvalidArgument => "InvalidArgument",
            Self::UnknownOperation => "UnknownOperation",
            Self::MalformedRequest => "MalformedRequest",
            Self::InternalError => "InternalError",
        }
    }

    /// Status a transport should use when carrying this error over HTTP
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::LeaseMismatch => 409,
            Self::InvalidArgument | Self::UnknownOperation | Self::MalformedRequest => 400,
            Self::InternalError => 500,
        }
    }
}

/// Error as seen by a remote caller
#[derive(Debug, Error)]
#[error("{}: {}", .code.as_str(), .message)]
pub struct ServiceError {
    pub code: ErrorCode,
    pub message: String,
    pub resource: Option<String>,
    pub request_id: RequestId,
}

impl ServiceError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            resource: None,
            request_id: RequestId::new(),
        }
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn to_json(&self) -> String {
        #[derive(Serialize)]
        struct JsonError<'a> {
            #[serde(rename = "__type")]
            error_type: &'static str,
            message: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            resource: Option<&'a str>,
            #[serde(rename = "requestId")]
            request_id: &'a str,
        }

        let error = JsonError {
            error_type: self.code.as_str(),
            message: &self.message,
            resource: self.resource.as_deref(),
            request_id: self.request_id.as_str(),
        };

        serde_json::to_string(&error).unwrap_or_else(|_| {
            format!(
                r#"{{"__type":"{}","message":"{}"}}"#,
                self.code.as_str(),
                self.message
            )
        })
    }
}
