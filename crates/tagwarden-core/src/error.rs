//! Error types for tagwarden
//!
//! Absence ("not found") is not an error here: gateway reads return `Option`.
//! What remains:
//! - Gateway failures (transport, HTTP status, undecodable responses)
//! - Reconciliation and monitoring failures, tagged with the object they hit

use crate::types::{ProjectId, RetentionId};

/// Failure reported by a registry gateway
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// Request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// Registry answered with a non-success status
    #[error("registry returned {status}: {message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Registry error message
        message: String,
    },

    /// Response body or headers did not have the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Client configuration rejected before any request
    #[error("configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Create status error
    #[inline]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status, if the registry answered
    #[inline]
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Main tagwarden error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum SweepError {
    /// Listing projects or their rules failed
    #[error("catalog load failed: {0}")]
    Catalog(#[source] GatewayError),

    /// Reading, creating or updating immutable rules failed
    #[error("immutable rule reconciliation failed for project {project_id}: {source}")]
    ImmutableRule {
        /// Project being reconciled
        project_id: ProjectId,
        /// Underlying failure
        #[source]
        source: GatewayError,
    },

    /// Reading or creating the retention policy failed
    #[error("retention policy reconciliation failed for project {project_id}: {source}")]
    RetentionPolicy {
        /// Project being reconciled
        project_id: ProjectId,
        /// Underlying failure
        #[source]
        source: GatewayError,
    },

    /// Starting a retention execution failed
    #[error("failed to trigger execution of retention {policy_id}: {source}")]
    Trigger {
        /// Policy being run
        policy_id: RetentionId,
        /// Underlying failure
        #[source]
        source: GatewayError,
    },

    /// Listing executions failed while waiting
    #[error("failed to poll executions of retention {policy_id}: {source}")]
    Poll {
        /// Policy being watched
        policy_id: RetentionId,
        /// Underlying failure
        #[source]
        source: GatewayError,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl SweepError {
    /// Gateway failure behind this error, if any
    #[must_use]
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            Self::Catalog(source)
            | Self::ImmutableRule { source, .. }
            | Self::RetentionPolicy { source, .. }
            | Self::Trigger { source, .. }
            | Self::Poll { source, .. } => Some(source),
            Self::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_error_display() {
        let err = GatewayError::status(409, "conflict");
        assert_eq!(err.to_string(), "registry returned 409: conflict");
        assert_eq!(err.http_status(), Some(409));
        assert_eq!(GatewayError::Transport("reset".into()).http_status(), None);
    }

    #[test]
    fn sweep_error_names_the_object() {
        let err = SweepError::RetentionPolicy {
            project_id: ProjectId(7),
            source: GatewayError::status(500, "boom"),
        };
        assert!(err.to_string().contains("project 7"));
        assert_eq!(err.gateway_error().and_then(GatewayError::http_status), Some(500));
        assert!(SweepError::Config("x".into()).gateway_error().is_none());
    }
}
