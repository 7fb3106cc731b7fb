//! Failure classification for user-facing error banners.

use thiserror::Error;

use crate::repository::{FetchFailure, TransportCode};

pub const NOT_FOUND_MESSAGE: &str =
    "The loans endpoint was not found; check the API base URL configuration.";
pub const SERVER_ERROR_MESSAGE: &str = "The server failed to process the request; please retry.";
pub const TIMEOUT_MESSAGE: &str =
    "The server could not be reached in time; check the network connection and retry.";
pub const UNKNOWN_MESSAGE: &str = "Failed to load loans.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    ServerError,
    Timeout,
    Domain,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    kind: ErrorKind,
    message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a plain retry of the same request can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind, ErrorKind::ServerError | ErrorKind::Timeout)
    }
}

/// First matching rule wins.
pub fn classify(failure: &FetchFailure) -> ClassifiedError {
    match failure {
        FetchFailure::Status { status: 404, .. } => {
            ClassifiedError::new(ErrorKind::NotFound, NOT_FOUND_MESSAGE)
        }
        FetchFailure::Status { status, .. } if (500..=599).contains(status) => {
            ClassifiedError::new(ErrorKind::ServerError, SERVER_ERROR_MESSAGE)
        }
        FetchFailure::Transport {
            code: TransportCode::TimedOut | TransportCode::ConnectionAborted | TransportCode::Connect,
            ..
        } => ClassifiedError::new(ErrorKind::Timeout, TIMEOUT_MESSAGE),
        FetchFailure::Status {
            message: Some(message),
            ..
        } => ClassifiedError::new(ErrorKind::Domain, message.clone()),
        _ => ClassifiedError::new(ErrorKind::Unknown, UNKNOWN_MESSAGE),
    }
}
