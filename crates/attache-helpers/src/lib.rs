//! # attache-helpers
//!
//! View-side helpers for attachments:
//! - Canonical attachment URLs (`AttachmentHelper::attachment_url`)
//! - Upload fields with cache, direct and presigned modes
//!   (`AttachmentHelper::attachment_field`)
//! - Image tags with fallback (`AttachmentHelper::attachment_image_tag`)
//!
//! ## Example
//!
//! ```rust,ignore
//! let helper = AttachmentHelper::from_config(&config, registry);
//! let ctx = RenderContext::new().with_base_url("https://app.example.com");
//!
//! let url = helper.attachment_url(
//!     &ctx,
//!     &post,
//!     "document",
//!     Some(&Processor::new("fill").arg(300).arg(300)),
//!     &UrlOptions::new().format("jpg"),
//! )?;
//! ```

pub mod field;
pub mod helper;
pub mod image;
pub mod markup;
pub mod sanitize;
pub mod url;

pub use field::{FieldOptions, UploadField};
pub use helper::{AttachmentHelper, RenderContext};
pub use image::ImageTagOptions;
pub use markup::Tag;
pub use sanitize::{sanitize_filename, PLACEHOLDER_FILENAME};
pub use url::{join_path, Processor, UrlOptions};
