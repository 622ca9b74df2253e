//! Core error types for Attache
//!
//! Configuration mistakes (an unregistered backend, duplicate names) are
//! fatal for the render that hits them. Advisory conditions such as a
//! presign request against a backend without that capability never reach
//! this type.

use thiserror::Error;

/// Core error type for all Attache operations
#[derive(Error, Debug)]
pub enum AttacheError {
    #[error("Backend is not registered: {kind} backend has no name in the registry")]
    UnregisteredBackend { kind: String },

    #[error("Backend name already registered: {name}")]
    DuplicateBackend { name: String },

    #[error("Unknown backend: {name}")]
    UnknownBackend { name: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Presign failed: {0}")]
    Presign(String),
}

impl AttacheError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether the error points at broken wiring rather than a failed operation
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AttacheError::UnregisteredBackend { .. }
                | AttacheError::DuplicateBackend { .. }
                | AttacheError::UnknownBackend { .. }
                | AttacheError::Config(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            AttacheError::UnregisteredBackend { .. } => "unregistered_backend",
            AttacheError::DuplicateBackend { .. } => "duplicate_backend",
            AttacheError::UnknownBackend { .. } => "unknown_backend",
            AttacheError::Config(_) => "configuration_error",
            AttacheError::Storage(_) => "storage_error",
            AttacheError::Presign(_) => "presign_error",
        }
    }
}
