//! Backend Registry
//!
//! Associates symbolic backend names with backend instances. Populated once
//! at startup and shared read-only afterwards, usually behind an `Arc`.
//! Lookup by instance is identity-based: two backends of the same kind are
//! distinct entries.

use std::sync::Arc;

use attache_core::{AttacheConfig, AttacheError, AttacheResult, BackendConfig, BackendKind};
use tracing::{info, instrument};

use crate::backend::{Backend, LocalBackend, MemoryBackend};
use crate::presign::UploadSigner;

/// Name → backend mapping
#[derive(Debug, Default)]
pub struct BackendRegistry {
    entries: Vec<(String, Arc<dyn Backend>)>,
}

fn same_instance(a: &dyn Backend, b: &dyn Backend) -> bool {
    std::ptr::eq(
        a as *const dyn Backend as *const (),
        b as *const dyn Backend as *const (),
    )
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under `name`. Names and instances must both be unique.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        backend: Arc<dyn Backend>,
    ) -> AttacheResult<()> {
        let name = name.into();

        if self.get(&name).is_some() {
            return Err(AttacheError::DuplicateBackend { name });
        }
        if let Some((existing, _)) = self
            .entries
            .iter()
            .find(|(_, b)| same_instance(b.as_ref(), backend.as_ref()))
        {
            return Err(AttacheError::DuplicateBackend {
                name: existing.clone(),
            });
        }

        self.entries.push((name, backend));
        Ok(())
    }

    /// Builder pattern: register a backend
    pub fn with(mut self, name: impl Into<String>, backend: Arc<dyn Backend>) -> AttacheResult<Self> {
        self.register(name, backend)?;
        Ok(self)
    }

    /// Reverse lookup: the registered name of a backend instance
    pub fn name_of(&self, backend: &dyn Backend) -> AttacheResult<&str> {
        self.entries
            .iter()
            .find(|(_, b)| same_instance(b.as_ref(), backend))
            .map(|(name, _)| name.as_str())
            .ok_or_else(|| AttacheError::UnregisteredBackend {
                kind: backend.kind().to_string(),
            })
    }

    /// Forward lookup by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Backend>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, b)| b)
    }

    /// Forward lookup, failing on unknown names
    pub fn fetch(&self, name: &str) -> AttacheResult<&Arc<dyn Backend>> {
        self.get(name).ok_or_else(|| AttacheError::UnknownBackend {
            name: name.to_string(),
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the cache and store backends described by `config`
    #[instrument(skip(config), fields(cache = %config.cache.name, store = %config.store.name))]
    pub fn from_config(config: &AttacheConfig) -> AttacheResult<Self> {
        config.validate()?;

        let registry = Self::new()
            .with(config.cache.name.clone(), build_backend(&config.cache))?
            .with(config.store.name.clone(), build_backend(&config.store))?;

        info!(backends = registry.len(), "Backend registry initialized");
        Ok(registry)
    }
}

fn build_backend(config: &BackendConfig) -> Arc<dyn Backend> {
    let signer = config.presign.as_ref().map(UploadSigner::from_config);

    match &config.kind {
        BackendKind::Memory => {
            let backend = MemoryBackend::new();
            match signer {
                Some(signer) => Arc::new(backend.with_presign(signer)),
                None => Arc::new(backend),
            }
        }
        BackendKind::Local { root } => {
            let backend = LocalBackend::new(root);
            match signer {
                Some(signer) => Arc::new(backend.with_presign(signer)),
                None => Arc::new(backend),
            }
        }
    }
}
