//! Git 控制层统一错误类型
//!
//! Both backends and the correlator report failures through [`GitError`].
//! The facade is the only layer that turns these into user-facing results.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GitError {
    /// Correlator pending window expired before the native side answered.
    #[error("Native git request '{command}' timed out after {}s", .timeout.as_secs())]
    TransportTimeout { command: String, timeout: Duration },

    /// Native bridge missing or closed.
    #[error("Native bridge unavailable: {0}")]
    TransportUnavailable(String),

    #[error("'{operation}' is only available in the native-hosted environment")]
    CapabilityMismatch { operation: String },

    /// Underlying engine reported a failure, wrapped with an operation prefix.
    #[error("{context}: {message}")]
    Operation { context: String, message: String },

    #[error("{0}")]
    Validation(String),

    /// Envelope or payload could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl GitError {
    pub fn operation(context: impl Into<String>, message: impl Into<String>) -> Self {
        GitError::Operation {
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(operation: impl Into<String>) -> Self {
        GitError::CapabilityMismatch {
            operation: operation.into(),
        }
    }

    /// 转换为协议 error code
    pub fn code(&self) -> &'static str {
        match self {
            GitError::TransportTimeout { .. } => "transport_timeout",
            GitError::TransportUnavailable(_) => "transport_unavailable",
            GitError::CapabilityMismatch { .. } => "capability_mismatch",
            GitError::Operation { .. } => "git_error",
            GitError::Validation(_) => "validation_error",
            GitError::Protocol(_) => "protocol_error",
        }
    }

    pub fn is_capability_mismatch(&self) -> bool {
        matches!(self, GitError::CapabilityMismatch { .. })
    }
}

impl From<serde_json::Error> for GitError {
    fn from(e: serde_json::Error) -> Self {
        GitError::Protocol(e.to_string())
    }
}

pub type GitResult<T> = Result<T, GitError>;
