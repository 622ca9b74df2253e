//! Upload field composition
//!
//! An upload field is a hidden input carrying the id of a pending cached
//! upload plus a file input. With a record supplied, the file input gains
//! the attacher's `accept` whitelist and, on request, data decorations that
//! tell the client uploader to go direct or presigned.

use std::collections::BTreeMap;

use attache_core::{AttacheError, AttacheResult};
use attache_storage::{Attachable, PresignPayload};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::helper::{AttachmentHelper, RenderContext};
use crate::markup::Tag;

/// Form field name the client uploader posts the file under
pub const UPLOAD_FIELD_NAME: &str = "file";

/// Options for `AttachmentHelper::attachment_field`
#[derive(Default)]
pub struct FieldOptions<'a> {
    /// Record owning the column; direct and presigned modes need it
    pub object: Option<&'a dyn Attachable>,
    pub direct: bool,
    pub presigned: bool,
    pub host: Option<String>,
    /// Passed through onto the file input
    pub attributes: BTreeMap<String, String>,
    /// Passed through as `data-*`, underneath upload decorations
    pub data: Map<String, Value>,
}

impl<'a> FieldOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(mut self, object: &'a dyn Attachable) -> Self {
        self.object = Some(object);
        self
    }

    pub fn direct(mut self, direct: bool) -> Self {
        self.direct = direct;
        self
    }

    pub fn presigned(mut self, presigned: bool) -> Self {
        self.presigned = presigned;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

/// The hidden cache-id field and the file input, in render order
#[derive(Debug, Clone, PartialEq)]
pub struct UploadField {
    pub hidden: Tag,
    pub file: Tag,
}

impl UploadField {
    pub fn is_direct(&self) -> bool {
        self.file.data_value("direct") == Some(&Value::Bool(true))
    }

    pub fn render(&self) -> String {
        format!("{}{}", self.hidden.render(), self.file.render())
    }
}

/// Everything the attacher contributes, resolved before any tag is built
#[derive(Debug, Default)]
struct UploadPlan {
    accept: Option<String>,
    cache_id: Option<String>,
    direct_url: Option<String>,
    presign: Option<PresignPayload>,
}

fn field_name(object_name: &str, attribute: &str) -> String {
    if object_name.is_empty() {
        attribute.to_string()
    } else {
        format!("{}[{}]", object_name, attribute)
    }
}

fn field_id(object_name: &str, attribute: &str) -> String {
    let raw = if object_name.is_empty() {
        attribute.to_string()
    } else {
        format!("{}_{}", object_name, attribute)
    };
    raw.replace(['[', ']'], "_")
        .trim_end_matches('_')
        .to_string()
}

impl AttachmentHelper {
    /// Build the upload field pair for `attribute`
    #[instrument(skip_all, fields(object = object_name, attribute = attribute, direct = options.direct, presigned = options.presigned))]
    pub fn attachment_field(
        &self,
        ctx: &RenderContext,
        object_name: &str,
        attribute: &str,
        options: FieldOptions<'_>,
    ) -> AttacheResult<UploadField> {
        let plan = self.plan_upload(ctx, attribute, &options)?;

        let cache_attribute = format!("{}_cache_id", attribute);
        let mut hidden = Tag::input("hidden")
            .with_attr("name", field_name(object_name, &cache_attribute))
            .with_attr("id", field_id(object_name, &cache_attribute));
        if let Some(cache_id) = plan.cache_id {
            hidden.set_attr("value", cache_id);
        }

        let mut file = Tag::input("file");
        for (key, value) in &options.attributes {
            file.set_attr(key.clone(), value.clone());
        }
        file.set_attr("type", "file");
        file.set_attr("name", field_name(object_name, attribute));
        if file.attr("id").is_none() {
            file.set_attr("id", field_id(object_name, attribute));
        }
        if let Some(accept) = plan.accept {
            file.set_attr("accept", accept);
        }

        file.merge_data(&options.data);
        if let Some(url) = plan.direct_url {
            file.set_data("direct", true);
            file.set_data("as", UPLOAD_FIELD_NAME);
            file.set_data("url", url);
        }
        if let Some(payload) = plan.presign {
            file.merge_data(payload.iter());
        }

        Ok(UploadField { hidden, file })
    }

    fn plan_upload(
        &self,
        ctx: &RenderContext,
        attribute: &str,
        options: &FieldOptions<'_>,
    ) -> AttacheResult<UploadPlan> {
        let Some(record) = options.object else {
            debug!("No record given, rendering bare upload field");
            return Ok(UploadPlan::default());
        };

        let attacher = record.attacher(attribute).ok_or_else(|| {
            AttacheError::config(format!(
                "{} has no attacher for {}",
                record.model_name(),
                attribute
            ))
        })?;

        let mut plan = UploadPlan {
            accept: attacher.accept.to_attribute(),
            cache_id: attacher.cache_id.clone(),
            ..UploadPlan::default()
        };

        if options.presigned {
            match attacher.cache.as_presign() {
                Some(presigner) => plan.presign = Some(presigner.presign()?),
                None => debug!(
                    backend = attacher.cache.kind(),
                    "Presign requested but cache backend cannot presign; ignoring"
                ),
            }
        }

        // Presigned fields carry the full direct decoration under the payload
        if options.direct || plan.presign.is_some() {
            plan.direct_url =
                Some(self.upload_url(ctx, attacher.cache.as_ref(), options.host.as_deref())?);
        }

        Ok(plan)
    }
}
