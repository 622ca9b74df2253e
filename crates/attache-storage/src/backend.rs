//! Storage Abstraction
//!
//! Provides a unified interface for file storage backends. Backends are
//! addressed by instance: the registry maps each instance to the name that
//! appears in URLs.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use attache_core::AttacheError;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::presign::{Presign, UploadSigner};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid file id: {0}")]
    InvalidId(String),
    #[error("Presign error: {0}")]
    Presign(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AttacheError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Presign(message) => AttacheError::Presign(message),
            other => AttacheError::Storage(other.to_string()),
        }
    }
}

/// Result of an upload: the backend-assigned id plus what was learned
/// about the bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub size: u64,
    /// SHA256 digest
    pub digest: String,
}

/// Backend trait - unified interface for storage backends
#[async_trait]
pub trait Backend: fmt::Debug + Send + Sync {
    /// Store data under a freshly generated id
    async fn upload(&self, data: Bytes) -> StorageResult<StoredFile>;

    /// Retrieve data by id
    async fn get(&self, id: &str) -> StorageResult<Bytes>;

    /// Delete data by id
    async fn delete(&self, id: &str) -> StorageResult<()>;

    /// Check if id exists
    async fn exists(&self, id: &str) -> StorageResult<bool>;

    /// Implementation kind, for logging. Not the registered name.
    fn kind(&self) -> &str;

    /// Presign capability, for backends that accept direct uploads
    fn as_presign(&self) -> Option<&dyn Presign> {
        None
    }
}

/// Generate a fresh file id
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn calculate_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn validate_id(id: &str) -> StorageResult<()> {
    if id.is_empty()
        || id.contains("..")
        || id.contains('/')
        || id.contains('\\')
    {
        return Err(StorageError::InvalidId(id.to_string()));
    }
    Ok(())
}

/// In-memory storage, used for caches and tests
pub struct MemoryBackend {
    files: RwLock<HashMap<String, Bytes>>,
    signer: Option<UploadSigner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("presign", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            signer: None,
        }
    }

    /// Accept presigned direct uploads signed by `signer`
    pub fn with_presign(mut self, signer: UploadSigner) -> Self {
        self.signer = Some(signer);
        self
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn upload(&self, data: Bytes) -> StorageResult<StoredFile> {
        let stored = StoredFile {
            id: generate_id(),
            size: data.len() as u64,
            digest: calculate_digest(&data),
        };

        let mut files = self.files.write().await;
        files.insert(stored.id.clone(), data);

        Ok(stored)
    }

    async fn get(&self, id: &str) -> StorageResult<Bytes> {
        let files = self.files.read().await;
        files
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let mut files = self.files.write().await;
        files.remove(id);
        Ok(())
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let files = self.files.read().await;
        Ok(files.contains_key(id))
    }

    fn kind(&self) -> &str {
        "memory"
    }

    fn as_presign(&self) -> Option<&dyn Presign> {
        self.signer.as_ref().map(|s| s as &dyn Presign)
    }
}

/// Local filesystem storage
pub struct LocalBackend {
    /// Root directory for storage
    root: PathBuf,
    signer: Option<UploadSigner>,
}

impl fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalBackend")
            .field("root", &self.root)
            .field("presign", &self.signer.is_some())
            .finish()
    }
}

impl LocalBackend {
    /// Create a new local backend. The directory is created on first upload.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            signer: None,
        }
    }

    pub fn with_presign(mut self, signer: UploadSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an id to a full path
    fn resolve_path(&self, id: &str) -> StorageResult<PathBuf> {
        validate_id(id)?;
        Ok(self.root.join(id))
    }

    /// Guess content type from a filename
    pub fn guess_content_type(filename: &str) -> String {
        mime_guess::from_path(filename)
            .first_or_octet_stream()
            .to_string()
    }
}

#[async_trait]
impl Backend for LocalBackend {
    #[instrument(skip(self, data), fields(backend = "local"))]
    async fn upload(&self, data: Bytes) -> StorageResult<StoredFile> {
        let id = generate_id();
        let path = self.resolve_path(&id)?;
        fs::create_dir_all(&self.root).await?;

        let digest = calculate_digest(&data);
        let size = data.len() as u64;

        let mut file = fs::File::create(&path).await?;
        file.write_all(&data).await?;
        file.sync_all().await?;

        debug!(path = ?path, size = size, "File stored");

        Ok(StoredFile { id, size, digest })
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn get(&self, id: &str) -> StorageResult<Bytes> {
        let path = self.resolve_path(id)?;

        if !path.exists() {
            return Err(StorageError::NotFound(id.to_string()));
        }

        let mut file = fs::File::open(&path).await?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).await?;

        Ok(Bytes::from(buffer))
    }

    #[instrument(skip(self), fields(backend = "local"))]
    async fn delete(&self, id: &str) -> StorageResult<()> {
        let path = self.resolve_path(id)?;

        if path.exists() {
            fs::remove_file(&path).await?;
            debug!(path = ?path, "File deleted");
        }

        Ok(())
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let path = self.resolve_path(id)?;
        Ok(path.exists())
    }

    fn kind(&self) -> &str {
        "local"
    }

    fn as_presign(&self) -> Option<&dyn Presign> {
        self.signer.as_ref().map(|s| s as &dyn Presign)
    }
}
