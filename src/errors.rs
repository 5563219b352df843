// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for allocation engine operations

use thiserror::Error;
use uuid::Uuid;

use crate::domain::invariants::ValidationError;
use crate::projection::executor::ExecutorError;

/// Kind of entity a lookup failed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Equipment unit
    Unit,
    /// Attachable extension
    Extension,
    /// Recorded event
    Event,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EntityKind::Unit => "unit",
            EntityKind::Extension => "extension",
            EntityKind::Event => "event",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in allocation engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Expected business-rule violation, safe to show to users
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Referenced unit, extension or event is missing
    #[error("{entity} not found: {id}")]
    NotFound { entity: EntityKind, id: Uuid },

    /// Underlying event store unreachable or returned malformed data
    #[error("Event store error: {0}")]
    Store(String),

    /// Optimistic version check failed
    #[error("Concurrency conflict: {0}")]
    Concurrency(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// NATS transport error
    #[error("NATS error: {0}")]
    Nats(String),
}

impl EngineError {
    /// Shorthand for a missing entity
    pub fn not_found(entity: EntityKind, id: Uuid) -> Self {
        EngineError::NotFound { entity, id }
    }

    /// Whether this is a user-facing business-rule violation
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }
}

/// Result type for allocation engine operations
pub type EngineResult<T> = Result<T, EngineError>;

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<async_nats::Error> for EngineError {
    fn from(err: async_nats::Error) -> Self {
        EngineError::Nats(err.to_string())
    }
}

impl From<ExecutorError> for EngineError {
    fn from(err: ExecutorError) -> Self {
        EngineError::Store(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let id = Uuid::nil();
        let err = EngineError::not_found(EntityKind::Extension, id);
        assert_eq!(err.to_string(), format!("extension not found: {}", id));
        assert!(!err.is_validation());
    }

    #[test]
    fn test_validation_conversion() {
        let err: EngineError = ValidationError::NotInDowntime.into();
        assert!(err.is_validation());
        assert!(err.to_string().contains("not in downtime"));
    }
}
