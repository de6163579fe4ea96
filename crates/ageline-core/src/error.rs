//! Error types for the Ageline pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A shared error type for the entire Ageline workspace.
///
/// Variants follow the failure taxonomy of the pipeline:
/// - collaborator failures (image/video/classifier services, downloads)
/// - resource/state errors (missing session, missing frames, job conflicts)
/// - assembly failures (the external transcoder exited non-zero)
///
/// The type is `Clone + Serialize` so a failed job can keep its error
/// inside the snapshot returned to pollers.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AgelineError {
    /// Entity not found error with type information
    #[error("Entity not found: {entity_type} '{id}'")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(String),

    /// A remote collaborator (image, video or classifier service) failed
    #[error("{service} failed: {message}")]
    Collaborator { service: String, message: String },

    /// The session is not in a state that allows the requested operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Another job for the same session is already active
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The external transcoding process failed
    #[error("Assembly failed: {message}")]
    Assembly { message: String, stderr: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AgelineError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a NotFound error
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates a Collaborator error for the named service
    pub fn collaborator(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Collaborator {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Creates an InvalidState error
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState(message.into())
    }

    /// Creates a Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates an Assembly error carrying the process stderr
    pub fn assembly(message: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::Assembly {
            message: message.into(),
            stderr: stderr.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a Migration error
    pub fn migration(message: impl Into<String>) -> Self {
        Self::Migration(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if this is a NotFound error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an IO error
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Check if this is a collaborator error
    pub fn is_collaborator(&self) -> bool {
        matches!(self, Self::Collaborator { .. })
    }

    /// Check if this is a job conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Check if this is an invalid-state rejection
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Self::InvalidState(_))
    }

    /// Check if this is an assembly failure
    pub fn is_assembly(&self) -> bool {
        matches!(self, Self::Assembly { .. })
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for AgelineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for AgelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for AgelineError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<version_migrate::MigrationError> for AgelineError {
    fn from(err: version_migrate::MigrationError) -> Self {
        use version_migrate::MigrationError;

        match err {
            MigrationError::EntityNotFound(id) => Self::not_found("entity", id),
            MigrationError::DeserializationError(_) => Self::Serialization {
                format: "migration".to_string(),
                message: err.to_string(),
            },
            MigrationError::SerializationError(_) => Self::Serialization {
                format: "migration".to_string(),
                message: err.to_string(),
            },
            MigrationError::IoError { .. } => Self::Io {
                message: err.to_string(),
            },
            _ => Self::Migration(err.to_string()),
        }
    }
}

/// A type alias for `Result<T, AgelineError>`.
pub type Result<T> = std::result::Result<T, AgelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_conversion_keeps_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "manifest.json");
        let err: AgelineError = io.into();
        assert!(err.is_io());
        assert!(err.to_string().contains("NotFound"));
    }

    #[test]
    fn test_predicates() {
        assert!(AgelineError::conflict("busy").is_conflict());
        assert!(AgelineError::not_found("session", "abc").is_not_found());
        assert!(AgelineError::invalid_state("frames missing").is_invalid_state());
        assert!(AgelineError::collaborator("image", "502").is_collaborator());
        assert!(AgelineError::assembly("exit 1", "bad filter").is_assembly());
    }

    #[test]
    fn test_assembly_error_serializes_stderr() {
        let err = AgelineError::assembly("ffmpeg exited with status 1", "Invalid argument");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["Assembly"]["stderr"], "Invalid argument");
    }
}
