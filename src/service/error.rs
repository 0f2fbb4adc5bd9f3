//! Service error types
//!
//! The façade classifies every failure into one of these; the HTTP layer
//! only maps kinds to status codes.

use crate::registry::BufferError;

use super::persistence::PersistenceError;

/// Error type for matching service operations
#[derive(Debug, Clone)]
pub enum ServiceError {
    /// Malformed or unsatisfiable request
    InvalidRequest(String),
    /// A stream buffer outcome other than ok
    Stream(BufferError),
    /// Persistence adapter failure or absence
    Persistence(PersistenceError),
}

impl ServiceError {
    /// Stable kind label, surfaced in error response bodies
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidRequest(_) => "invalid-request",
            ServiceError::Stream(BufferError::ZeroCapacityCircular) => "invalid-request",
            ServiceError::Stream(BufferError::WriteTimeout) => "waiting-timeout",
            ServiceError::Stream(BufferError::ReceiveTimeout) => "receive-timeout",
            ServiceError::Stream(BufferError::Stopped) => "stopped",
            ServiceError::Stream(BufferError::OverflowExhausted) => "circular-overflow-exhausted",
            ServiceError::Persistence(_) => "persistence-error",
        }
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::InvalidRequest(detail) => write!(f, "invalid request: {}", detail),
            ServiceError::Stream(err) => write!(f, "{}", err),
            ServiceError::Persistence(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServiceError::InvalidRequest(_) => None,
            ServiceError::Stream(err) => Some(err),
            ServiceError::Persistence(err) => Some(err),
        }
    }
}

impl From<BufferError> for ServiceError {
    fn from(err: BufferError) -> Self {
        ServiceError::Stream(err)
    }
}

impl From<PersistenceError> for ServiceError {
    fn from(err: PersistenceError) -> Self {
        ServiceError::Persistence(err)
    }
}
