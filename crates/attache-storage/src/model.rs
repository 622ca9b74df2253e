//! Attachment Model
//!
//! What a record exposes per attachment column: the file currently attached
//! and, for editable columns, the attacher that knows where uploads go.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::backend::{Backend, LocalBackend, StorageResult};

/// A previously stored file
#[derive(Debug, Clone)]
pub struct FileReference {
    /// Backend-assigned id
    pub id: String,
    /// Backend holding the bytes
    pub backend: Arc<dyn Backend>,
    /// Original filename
    pub filename: Option<String>,
    /// File size in bytes
    pub size: Option<u64>,
    /// MIME content type
    pub content_type: Option<String>,
}

impl FileReference {
    pub fn new(id: impl Into<String>, backend: Arc<dyn Backend>) -> Self {
        Self {
            id: id.into(),
            backend,
            filename: None,
            size: None,
            content_type: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Get file extension of the original filename
    pub fn extension(&self) -> Option<&str> {
        let filename = self.filename.as_deref()?;
        if !filename.contains('.') {
            return None;
        }
        filename
            .rsplit('.')
            .next()
            .filter(|ext| !ext.is_empty())
    }

    /// Read the file's bytes from its backend
    pub async fn read(&self) -> StorageResult<Bytes> {
        self.backend.get(&self.id).await
    }

    /// Whether the bytes are still present
    pub async fn exists(&self) -> StorageResult<bool> {
        self.backend.exists(&self.id).await
    }
}

/// Whitelist of acceptable content types and extensions for an upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Accept {
    entries: Vec<String>,
}

impl Accept {
    /// Accept anything
    pub fn any() -> Self {
        Self::default()
    }

    pub fn content_types<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::any().with_content_types(types)
    }

    pub fn extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::any().with_extensions(extensions)
    }

    pub fn with_content_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.extend(types.into_iter().map(Into::into));
        self
    }

    /// Extensions are listed with a leading dot, as the `accept` attribute expects
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries.extend(extensions.into_iter().map(|ext| {
            let ext = ext.into();
            format!(".{}", ext.trim_start_matches('.'))
        }));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Value for the file input's `accept` attribute, if anything is restricted
    pub fn to_attribute(&self) -> Option<String> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.join(","))
        }
    }
}

/// Per-record, per-column upload configuration
#[derive(Debug, Clone)]
pub struct Attacher {
    /// Backend for pending uploads
    pub cache: Arc<dyn Backend>,
    /// Backend for final storage
    pub store: Arc<dyn Backend>,
    pub accept: Accept,
    /// Id of a pending upload in `cache`, if one exists
    pub cache_id: Option<String>,
}

impl Attacher {
    pub fn new(cache: Arc<dyn Backend>, store: Arc<dyn Backend>) -> Self {
        Self {
            cache,
            store,
            accept: Accept::any(),
            cache_id: None,
        }
    }

    pub fn with_accept(mut self, accept: Accept) -> Self {
        self.accept = accept;
        self
    }

    pub fn with_cache_id(mut self, cache_id: impl Into<String>) -> Self {
        self.cache_id = Some(cache_id.into());
        self
    }

    /// Upload into the cache backend and remember the pending id
    pub async fn cache(&mut self, data: Bytes, filename: &str) -> StorageResult<FileReference> {
        let stored = self.cache.upload(data).await?;
        debug!(id = %stored.id, backend = self.cache.kind(), "Cached pending upload");

        self.cache_id = Some(stored.id.clone());

        Ok(FileReference::new(stored.id, self.cache.clone())
            .with_filename(filename)
            .with_size(stored.size)
            .with_content_type(LocalBackend::guess_content_type(filename)))
    }
}

/// A record with attachment columns
pub trait Attachable {
    /// Singular model name, used for CSS classes
    fn model_name(&self) -> &'static str;

    /// File currently attached to `attribute`, if any
    fn attachment(&self, attribute: &str) -> Option<FileReference>;

    /// Attacher for `attribute`, if the column is editable
    fn attacher(&self, attribute: &str) -> Option<Attacher>;
}
