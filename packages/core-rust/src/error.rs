//! Error taxonomy shared by both sides of the correlation layer.
//!
//! Handlers fail with [`HandlerError`]; callers see [`CorrelationError`].
//! Every variant maps to an HTTP status through [`STATUS_TABLE`], the one
//! place that mapping lives.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ErrorKind + status table
// ---------------------------------------------------------------------------

/// Business-level failure categories a handler can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Missing or invalid required field.
    Validation,
    /// A referenced record does not exist.
    NotFound,
    /// Uniqueness violation.
    Conflict,
    /// Unexpected persistence or handler failure.
    Internal,
    /// The worker cannot take the request (overloaded or past its deadline).
    Unavailable,
}

impl ErrorKind {
    /// Wire name, as serialized in error envelopes.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "notFound",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
            Self::Unavailable => "unavailable",
        }
    }
}

/// Outcome classes that reach the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    Handler(ErrorKind),
    Timeout,
    TransportFailure,
    Decode,
}

/// Failure class -> HTTP status code.
pub const STATUS_TABLE: &[(FailureClass, u16)] = &[
    (FailureClass::Handler(ErrorKind::Validation), 400),
    (FailureClass::Handler(ErrorKind::NotFound), 404),
    (FailureClass::Handler(ErrorKind::Conflict), 409),
    (FailureClass::Handler(ErrorKind::Internal), 500),
    (FailureClass::Handler(ErrorKind::Unavailable), 503),
    (FailureClass::Timeout, 503),
    (FailureClass::TransportFailure, 503),
    (FailureClass::Decode, 500),
];

/// Looks up the status code for a failure class. Unlisted classes are 500.
#[must_use]
pub fn status_for(class: FailureClass) -> u16 {
    STATUS_TABLE
        .iter()
        .find(|(c, _)| *c == class)
        .map_or(500, |(_, code)| *code)
}

/// Reverse lookup used when an error envelope only carries a status code.
#[must_use]
pub fn kind_for_status(status_code: u16) -> ErrorKind {
    STATUS_TABLE
        .iter()
        .find_map(|(c, code)| match c {
            FailureClass::Handler(kind) if *code == status_code => Some(*kind),
            _ => None,
        })
        .unwrap_or(ErrorKind::Internal)
}

// ---------------------------------------------------------------------------
// HandlerError
// ---------------------------------------------------------------------------

/// A business failure returned (not thrown) by a topic handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?}: {message}")]
pub struct HandlerError {
    pub kind: ErrorKind,
    pub message: String,
}

impl HandlerError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    /// HTTP status for this failure, from the status table.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        status_for(FailureClass::Handler(self.kind))
    }
}

// ---------------------------------------------------------------------------
// CorrelationError
// ---------------------------------------------------------------------------

/// Why a correlated request did not produce a usable reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelationError {
    #[error("no reply on '{topic}' within {elapsed_ms}ms")]
    Timeout { topic: String, elapsed_ms: u64 },
    #[error("transport failure: {cause}")]
    TransportFailure { cause: String },
    #[error("handler failed with {status_code}: {message}")]
    Handler { status_code: u16, message: String },
    #[error("reply could not be decoded: {cause}")]
    Decode { cause: String },
}

impl CorrelationError {
    #[must_use]
    pub fn class(&self) -> FailureClass {
        match self {
            Self::Timeout { .. } => FailureClass::Timeout,
            Self::TransportFailure { .. } => FailureClass::TransportFailure,
            Self::Handler { status_code, .. } => {
                FailureClass::Handler(kind_for_status(*status_code))
            }
            Self::Decode { .. } => FailureClass::Decode,
        }
    }

    /// HTTP status the gateway answers with.
    ///
    /// Handler errors keep the status the handler chose; everything else goes
    /// through the status table.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Handler { status_code, .. } => *status_code,
            other => status_for(other.class()),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<HandlerError> for CorrelationError {
    fn from(err: HandlerError) -> Self {
        Self::Handler {
            status_code: err.status_code(),
            message: err.message,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_kinds_map_through_table() {
        assert_eq!(HandlerError::validation("x").status_code(), 400);
        assert_eq!(HandlerError::not_found("x").status_code(), 404);
        assert_eq!(HandlerError::conflict("x").status_code(), 409);
        assert_eq!(HandlerError::internal("x").status_code(), 500);
        assert_eq!(HandlerError::unavailable("x").status_code(), 503);
    }

    #[test]
    fn transport_level_failures_are_service_unavailable() {
        let timeout = CorrelationError::Timeout {
            topic: "echo.test".to_string(),
            elapsed_ms: 200,
        };
        let transport = CorrelationError::TransportFailure {
            cause: "broker unreachable".to_string(),
        };
        assert_eq!(timeout.status_code(), 503);
        assert_eq!(transport.status_code(), 503);
        assert!(timeout.is_timeout());
        assert!(!transport.is_timeout());
    }

    #[test]
    fn handler_error_converts_with_its_status() {
        let err: CorrelationError = HandlerError::not_found("Entity with ID 999 not found").into();
        assert_eq!(
            err,
            CorrelationError::Handler {
                status_code: 404,
                message: "Entity with ID 999 not found".to_string(),
            }
        );
        assert_eq!(err.class(), FailureClass::Handler(ErrorKind::NotFound));
    }

    #[test]
    fn every_class_has_exactly_one_row() {
        for (class, _) in STATUS_TABLE {
            let rows = STATUS_TABLE.iter().filter(|(c, _)| c == class).count();
            assert_eq!(rows, 1, "{class:?} listed more than once");
        }
    }

    #[test]
    fn unknown_status_falls_back_to_internal() {
        assert_eq!(kind_for_status(418), ErrorKind::Internal);
        assert_eq!(kind_for_status(409), ErrorKind::Conflict);
    }

    #[test]
    fn kind_names_match_serialized_form() {
        for kind in [
            ErrorKind::Validation,
            ErrorKind::NotFound,
            ErrorKind::Conflict,
            ErrorKind::Internal,
            ErrorKind::Unavailable,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }
}
