//! # attache-core
//!
//! Core types shared by every Attache crate:
//! - The `AttacheError` type surfaced by URL and field helpers
//! - Result type alias
//! - Startup configuration (`AttacheConfig`)

pub mod config;
pub mod error;
pub mod result;

pub use config::*;
pub use error::*;
pub use result::*;
