//! Result type aliases

use crate::error::AttacheError;

/// Standard Result type for Attache operations
pub type AttacheResult<T> = Result<T, AttacheError>;
