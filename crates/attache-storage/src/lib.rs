//! # attache-storage
//!
//! Storage side of Attache.
//!
//! ## Features
//!
//! - Backend abstraction (in-memory, local filesystem)
//! - Optional presign capability for direct-to-backend uploads
//! - Backend registry mapping symbolic names to backend instances
//! - File references and per-column attachers read by the helpers
//!
//! ## Example
//!
//! ```rust,ignore
//! use attache_storage::{BackendRegistry, MemoryBackend};
//! use std::sync::Arc;
//!
//! let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
//! let registry = BackendRegistry::new().with("store", store.clone())?;
//!
//! assert_eq!(registry.name_of(store.as_ref())?, "store");
//! ```

pub mod backend;
pub mod model;
pub mod presign;
pub mod registry;

pub use backend::{
    generate_id, Backend, LocalBackend, MemoryBackend, StorageError, StorageResult, StoredFile,
};
pub use model::{Accept, Attachable, Attacher, FileReference};
pub use presign::{Presign, PresignPayload, UploadGrant, UploadSigner};
pub use registry::BackendRegistry;
