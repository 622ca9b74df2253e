//! Presigned uploads
//!
//! A backend that can hand out server-issued upload grants exposes them
//! through `Backend::as_presign`. The payload is opaque to the helpers and
//! is merged verbatim into the upload field's data attributes.

use std::fmt;
use std::time::Duration;

use attache_core::PresignConfig;
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::backend::{generate_id, StorageError, StorageResult};

/// Optional backend capability: issue a presigned upload payload
pub trait Presign: Send + Sync {
    fn presign(&self) -> StorageResult<PresignPayload>;
}

/// Server-issued fields handed verbatim to the client uploader
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresignPayload {
    pub fields: Map<String, Value>,
}

impl PresignPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: add a field
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }
}

/// Claims carried by an upload grant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadGrant {
    /// Subject (file id the client may upload)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Signs and verifies direct-upload grants
pub struct UploadSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    upload_url: String,
    expires_in: Duration,
}

impl fmt::Debug for UploadSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadSigner")
            .field("upload_url", &self.upload_url)
            .field("expires_in", &self.expires_in)
            .finish_non_exhaustive()
    }
}

impl UploadSigner {
    /// Create a new signer with the given secret
    pub fn new(secret: &[u8], upload_url: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            upload_url: upload_url.into(),
            expires_in,
        }
    }

    pub fn from_config(config: &PresignConfig) -> Self {
        Self::new(
            config.secret.as_bytes(),
            config.upload_url.clone(),
            Duration::from_secs(config.expires_in_seconds),
        )
    }

    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    /// Sign a grant allowing upload of `id`
    pub fn sign(&self, id: &str) -> StorageResult<String> {
        let now = Utc::now().timestamp().max(0) as usize;
        let exp = usize::try_from(self.expires_in.as_secs())
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| {
                StorageError::Presign(format!(
                    "grant lifetime of {}s is out of range",
                    self.expires_in.as_secs()
                ))
            })?;

        let claims = UploadGrant {
            sub: id.to_string(),
            exp,
            iat: now,
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| StorageError::Presign(e.to_string()))
    }

    /// Validate and decode a grant
    pub fn verify(&self, token: &str) -> StorageResult<UploadGrant> {
        let token_data = decode::<UploadGrant>(token, &self.decoding_key, &Validation::default())
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(token_data.claims)
    }
}

impl Presign for UploadSigner {
    fn presign(&self) -> StorageResult<PresignPayload> {
        let id = generate_id();
        let token = self.sign(&id)?;

        Ok(PresignPayload::new()
            .with("url", self.upload_url.clone())
            .with("id", id)
            .with("token", token))
    }
}
