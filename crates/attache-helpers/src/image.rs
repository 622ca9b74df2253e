//! `<img>` tags for attachments

use std::collections::BTreeMap;

use attache_core::AttacheResult;
use attache_storage::Attachable;
use tracing::debug;

use crate::helper::{AttachmentHelper, RenderContext};
use crate::markup::Tag;
use crate::url::{Processor, UrlOptions};

/// Options for `AttachmentHelper::attachment_image_tag`
#[derive(Debug, Clone, Default)]
pub struct ImageTagOptions {
    pub url: UrlOptions,
    /// Image source used when nothing is attached
    pub fallback: Option<String>,
    /// Extra CSS classes, appended after the generated ones
    pub classes: Vec<String>,
    pub attributes: BTreeMap<String, String>,
}

impl ImageTagOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn url(mut self, url: UrlOptions) -> Self {
        self.url = url;
        self
    }

    pub fn fallback(mut self, src: impl Into<String>) -> Self {
        self.fallback = Some(src.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl AttachmentHelper {
    /// Image tag for the attachment, or for the fallback source when nothing
    /// is attached. `Ok(None)` when there is neither.
    pub fn attachment_image_tag(
        &self,
        ctx: &RenderContext,
        record: Option<&dyn Attachable>,
        attribute: &str,
        processor: Option<&Processor>,
        options: &ImageTagOptions,
    ) -> AttacheResult<Option<Tag>> {
        let url = match record {
            Some(record) => self.attachment_url(ctx, record, attribute, processor, &options.url)?,
            None => None,
        };

        let (src, is_fallback) = match (url, &options.fallback) {
            (Some(url), _) => (url, false),
            (None, Some(fallback)) => (fallback.clone(), true),
            (None, None) => {
                debug!(attribute, "No attachment and no fallback, skipping image");
                return Ok(None);
            }
        };

        let mut classes = vec!["attachment".to_string()];
        if let Some(record) = record {
            classes.push(record.model_name().to_string());
        }
        classes.push(attribute.to_string());
        classes.extend(options.classes.iter().cloned());
        if is_fallback {
            classes.push("fallback".to_string());
        }

        let mut tag = Tag::new("img");
        for (key, value) in &options.attributes {
            tag.set_attr(key.clone(), value.clone());
        }
        tag.set_attr("src", src);
        tag.set_attr("class", classes.join(" "));

        Ok(Some(tag))
    }
}
