//! Helper entry point
//!
//! `AttachmentHelper` carries the startup-time state every helper needs: the
//! backend registry, the mount path of the file-serving app and the default
//! host. Per-request state travels separately in a `RenderContext`.

use std::sync::Arc;

use attache_core::AttacheConfig;
use attache_storage::BackendRegistry;

/// Per-request rendering state
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    base_url: Option<String>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Origin of the current request, e.g. "https://app.example.com"
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct AttachmentHelper {
    pub(crate) registry: Arc<BackendRegistry>,
    pub(crate) mount_path: String,
    pub(crate) default_host: Option<String>,
}

impl AttachmentHelper {
    pub fn new(registry: Arc<BackendRegistry>, mount_path: impl Into<String>) -> Self {
        Self {
            registry,
            mount_path: mount_path.into(),
            default_host: None,
        }
    }

    /// Process-wide default host, e.g. a CDN
    pub fn with_default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = Some(host.into());
        self
    }

    pub fn from_config(config: &AttacheConfig, registry: Arc<BackendRegistry>) -> Self {
        Self {
            registry,
            mount_path: config.mount_path.clone(),
            default_host: config.host.clone(),
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn mount_path(&self) -> &str {
        &self.mount_path
    }

    /// Explicit host, then the configured default, then the request origin
    pub(crate) fn resolve_host<'a>(
        &'a self,
        ctx: &'a RenderContext,
        explicit: Option<&'a str>,
    ) -> Option<&'a str> {
        explicit
            .or(self.default_host.as_deref())
            .or(ctx.base_url())
    }
}
