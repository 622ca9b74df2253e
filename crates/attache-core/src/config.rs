//! Configuration types and loading
//!
//! Built once at startup; the backend registry and the helpers read it and
//! never write back.

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::error::AttacheError;
use crate::result::AttacheResult;

/// Longest lifetime accepted for a presigned upload grant (7 days)
pub const MAX_PRESIGN_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Main configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttacheConfig {
    /// Path the file-serving application is mounted at (e.g. "attachments")
    pub mount_path: String,

    /// Process-wide default host, typically a CDN. Falls back to the
    /// request origin when unset.
    pub host: Option<String>,

    /// Backend for pending (pre-save) uploads
    pub cache: BackendConfig,

    /// Backend for final storage
    pub store: BackendConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Registered name, used as a URL segment
    pub name: String,
    pub kind: BackendKind,
    /// Presigned direct uploads, if enabled for this backend
    pub presign: Option<PresignConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendKind {
    Memory,
    Local { root: String },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresignConfig {
    /// HMAC secret for signing upload grants
    pub secret: String,
    /// Endpoint the client sends presigned uploads to
    pub upload_url: String,
    pub expires_in_seconds: u64,
}

impl Default for AttacheConfig {
    fn default() -> Self {
        Self {
            mount_path: "attachments".to_string(),
            host: None,
            cache: BackendConfig {
                name: "cache".to_string(),
                kind: BackendKind::Memory,
                presign: None,
            },
            store: BackendConfig {
                name: "store".to_string(),
                kind: BackendKind::Memory,
                presign: None,
            },
        }
    }
}

impl AttacheConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AttacheResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> AttacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("ATTACHE_MOUNT_PATH") {
            config.mount_path = path;
        }
        if let Some(host) = lookup("ATTACHE_HOST").filter(|h| !h.is_empty()) {
            config.host = Some(host);
        }

        // Backends
        if let Some(name) = lookup("ATTACHE_CACHE_NAME") {
            config.cache.name = name;
        }
        if let Some(name) = lookup("ATTACHE_STORE_NAME") {
            config.store.name = name;
        }
        if let Some(root) = lookup("ATTACHE_CACHE_PATH") {
            config.cache.kind = BackendKind::Local { root };
        }
        if let Some(root) = lookup("ATTACHE_STORE_PATH") {
            config.store.kind = BackendKind::Local { root };
        }

        // Presigned uploads go to the cache backend
        if let Some(secret) = lookup("ATTACHE_PRESIGN_SECRET") {
            let upload_url = lookup("ATTACHE_PRESIGN_URL").ok_or_else(|| {
                AttacheError::config("ATTACHE_PRESIGN_URL must be set when ATTACHE_PRESIGN_SECRET is")
            })?;
            let expires_in_seconds = match lookup("ATTACHE_PRESIGN_TTL_SECONDS") {
                Some(raw) => raw.parse().map_err(|_| {
                    AttacheError::config(format!(
                        "ATTACHE_PRESIGN_TTL_SECONDS is not a number: {}",
                        raw
                    ))
                })?,
                None => 3600,
            };
            config.cache.presign = Some(PresignConfig {
                secret,
                upload_url,
                expires_in_seconds,
            });
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration once, before any registry is built from it
    pub fn validate(&self) -> AttacheResult<()> {
        if self.mount_path.trim_matches('/').is_empty() {
            return Err(AttacheError::config("mount path must not be empty"));
        }

        if let Some(ref host) = self.host {
            let parsed = Url::parse(host)
                .map_err(|e| AttacheError::config(format!("invalid host {}: {}", host, e)))?;
            if parsed.cannot_be_a_base() {
                return Err(AttacheError::config(format!(
                    "host must be an absolute URL: {}",
                    host
                )));
            }
        }

        for backend in [&self.cache, &self.store] {
            if backend.name.is_empty() || backend.name.contains('/') {
                return Err(AttacheError::config(format!(
                    "invalid backend name: {:?}",
                    backend.name
                )));
            }
            if let Some(ref presign) = backend.presign {
                if presign.secret.is_empty() {
                    warn!(backend = %backend.name, "Rejecting empty presign secret");
                    return Err(AttacheError::config(format!(
                        "presign secret for {} must not be empty",
                        backend.name
                    )));
                }
                if presign.expires_in_seconds == 0 {
                    return Err(AttacheError::config(format!(
                        "presign lifetime for {} must be positive",
                        backend.name
                    )));
                }
                if presign.expires_in_seconds > MAX_PRESIGN_TTL_SECONDS {
                    return Err(AttacheError::config(format!(
                        "presign lifetime for {} exceeds {}s",
                        backend.name, MAX_PRESIGN_TTL_SECONDS
                    )));
                }
            }
        }

        if self.cache.name == self.store.name {
            return Err(AttacheError::DuplicateBackend {
                name: self.cache.name.clone(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AttacheConfig::default();
        assert_eq!(config.mount_path, "attachments");
        assert_eq!(config.cache.name, "cache");
        assert_eq!(config.store.name, "store");
        assert!(config.host.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = AttacheConfig::from_lookup(lookup_from(&[
            ("ATTACHE_MOUNT_PATH", "files"),
            ("ATTACHE_HOST", "https://cdn.example.com"),
            ("ATTACHE_STORE_PATH", "/var/attache/store"),
            ("ATTACHE_PRESIGN_SECRET", "s3cret"),
            ("ATTACHE_PRESIGN_URL", "https://uploads.example.com"),
            ("ATTACHE_PRESIGN_TTL_SECONDS", "600"),
        ]))
        .unwrap();

        assert_eq!(config.mount_path, "files");
        assert_eq!(config.host.as_deref(), Some("https://cdn.example.com"));
        assert_eq!(config.cache.kind, BackendKind::Memory);
        assert_eq!(
            config.store.kind,
            BackendKind::Local {
                root: "/var/attache/store".into()
            }
        );
        let presign = config.cache.presign.unwrap();
        assert_eq!(presign.expires_in_seconds, 600);
        assert!(config.store.presign.is_none());
    }

    #[test]
    fn test_presign_requires_url() {
        let result = AttacheConfig::from_lookup(lookup_from(&[("ATTACHE_PRESIGN_SECRET", "s")]));
        assert!(matches!(result, Err(AttacheError::Config(_))));
    }

    #[test]
    fn test_invalid_ttl() {
        let result = AttacheConfig::from_lookup(lookup_from(&[
            ("ATTACHE_PRESIGN_SECRET", "s"),
            ("ATTACHE_PRESIGN_URL", "https://uploads.example.com"),
            ("ATTACHE_PRESIGN_TTL_SECONDS", "soon"),
        ]));
        assert!(matches!(result, Err(AttacheError::Config(_))));
    }

    #[test]
    fn test_ttl_upper_bound() {
        let lookup = |ttl: &str| {
            AttacheConfig::from_lookup(lookup_from(&[
                ("ATTACHE_PRESIGN_SECRET", "s"),
                ("ATTACHE_PRESIGN_URL", "https://uploads.example.com"),
                ("ATTACHE_PRESIGN_TTL_SECONDS", ttl),
            ]))
        };

        assert!(lookup(&MAX_PRESIGN_TTL_SECONDS.to_string()).is_ok());
        assert!(matches!(
            lookup(&(MAX_PRESIGN_TTL_SECONDS + 1).to_string()),
            Err(AttacheError::Config(_))
        ));
        assert!(matches!(
            lookup("18446744073709551615"),
            Err(AttacheError::Config(_))
        ));
    }

    #[test]
    fn test_validate_rejects_relative_host() {
        let mut config = AttacheConfig::default();
        config.host = Some("cdn.example.com".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_mount_path() {
        let mut config = AttacheConfig::default();
        config.mount_path = "/".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut config = AttacheConfig::default();
        config.store.name = "cache".into();
        assert!(matches!(
            config.validate(),
            Err(AttacheError::DuplicateBackend { .. })
        ));
    }

    #[test]
    fn test_deserialize_backend_kind() {
        let kind: BackendKind =
            serde_json::from_str(r#"{"type":"local","root":"/tmp/files"}"#).unwrap();
        assert_eq!(
            kind,
            BackendKind::Local {
                root: "/tmp/files".into()
            }
        );
    }
}
