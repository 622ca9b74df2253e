//! Attachment URL composition
//!
//! Canonical shape:
//!
//! ```text
//! {host}/{mount}/{backend}/{processor}/{arg1}/.../{id}/{filename}[.{format}]
//! ```
//!
//! The processor segments are left out entirely when no processor is given.

use std::fmt::Display;

use attache_core::AttacheResult;
use attache_storage::{Attachable, Backend, FileReference};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use tracing::{debug, instrument};

use crate::helper::{AttachmentHelper, RenderContext};
use crate::sanitize::sanitize_filename;

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

/// Named processing directive with positional arguments, e.g. `fill/300/300`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Processor {
    name: String,
    args: Vec<String>,
}

impl Processor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }

    /// Append a positional argument; numbers and other values are stringified
    pub fn arg(mut self, arg: impl Display) -> Self {
        self.args.push(arg.to_string());
        self
    }

    pub fn args<I, T>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Display,
    {
        self.args.extend(args.into_iter().map(|a| a.to_string()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    fn segments(&self) -> impl Iterator<Item = String> + '_ {
        std::iter::once(&self.name)
            .chain(self.args.iter())
            .map(|s| encode_segment(s))
    }
}

/// Optional URL inputs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlOptions {
    pub filename: Option<String>,
    pub format: Option<String>,
    pub host: Option<String>,
}

impl UrlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }
}

/// Join a host and path prefixes, collapsing duplicate separators.
///
/// Without a host the result is an absolute path ("/a/b"). Only used for
/// configured prefixes; data segments are appended verbatim by the caller.
pub fn join_path<I, S>(host: Option<&str>, segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut url = host
        .map(|h| h.trim_end_matches('/').to_string())
        .unwrap_or_default();

    for segment in segments {
        for part in segment.as_ref().split('/').filter(|p| !p.is_empty()) {
            url.push('/');
            url.push_str(part);
        }
    }

    if url.is_empty() {
        url.push('/');
    }
    url
}

impl AttachmentHelper {
    /// URL of the file attached to `attribute` on `record`.
    ///
    /// Returns `Ok(None)` when nothing is attached. The filename defaults to
    /// the attribute name, not the uploaded file's name, so the URL is known
    /// before any upload happens.
    #[instrument(skip_all, fields(model = record.model_name(), attribute = attribute))]
    pub fn attachment_url(
        &self,
        ctx: &RenderContext,
        record: &dyn Attachable,
        attribute: &str,
        processor: Option<&Processor>,
        options: &UrlOptions,
    ) -> AttacheResult<Option<String>> {
        let Some(file) = record.attachment(attribute) else {
            debug!("No file attached");
            return Ok(None);
        };

        let filename = options.filename.as_deref().unwrap_or(attribute);
        self.compose(ctx, &file, processor, filename, options).map(Some)
    }

    /// URL of a file reference held directly.
    ///
    /// The filename defaults to the file's original name, then to the
    /// placeholder token.
    pub fn file_url(
        &self,
        ctx: &RenderContext,
        file: &FileReference,
        processor: Option<&Processor>,
        options: &UrlOptions,
    ) -> AttacheResult<String> {
        let filename = options
            .filename
            .as_deref()
            .or(file.filename.as_deref())
            .unwrap_or_default();
        self.compose(ctx, file, processor, filename, options)
    }

    /// Endpoint for direct uploads into `backend`: no id, no filename
    pub fn upload_url(
        &self,
        ctx: &RenderContext,
        backend: &dyn Backend,
        host: Option<&str>,
    ) -> AttacheResult<String> {
        let backend_name = self.registry.name_of(backend)?;
        let host = self.resolve_host(ctx, host);

        Ok(join_path(host, [self.mount_path.as_str(), backend_name]))
    }

    fn compose(
        &self,
        ctx: &RenderContext,
        file: &FileReference,
        processor: Option<&Processor>,
        filename: &str,
        options: &UrlOptions,
    ) -> AttacheResult<String> {
        let backend_name = self.registry.name_of(file.backend.as_ref())?;
        let host = self.resolve_host(ctx, options.host.as_deref());

        let mut filename = sanitize_filename(filename);
        if let Some(format) = options.format.as_deref().filter(|f| !f.is_empty()) {
            filename.push('.');
            filename.push_str(format);
        }

        let mut data = Vec::new();
        if let Some(processor) = processor {
            data.extend(processor.segments());
        }
        data.push(encode_segment(&file.id));
        data.push(encode_segment(&filename));

        let mut url = join_path(host, [self.mount_path.as_str(), backend_name]);
        if url == "/" {
            url.clear();
        }
        for segment in &data {
            // Encoded segments hold no '/', and empty ones keep their position
            url.push('/');
            url.push_str(segment);
        }
        debug!(url = %url, backend = backend_name, "Composed attachment URL");

        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attache_core::AttacheError;
    use attache_storage::{Attacher, BackendRegistry, MemoryBackend};
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Record with plain attachment columns and no attachers
    struct Document {
        files: HashMap<&'static str, FileReference>,
    }

    impl Attachable for Document {
        fn model_name(&self) -> &'static str {
            "document"
        }

        fn attachment(&self, attribute: &str) -> Option<FileReference> {
            self.files.get(attribute).cloned()
        }

        fn attacher(&self, _attribute: &str) -> Option<Attacher> {
            None
        }
    }

    struct Fixture {
        helper: AttachmentHelper,
        store: Arc<dyn Backend>,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let registry = BackendRegistry::new()
            .with("store", store.clone())
            .unwrap();

        Fixture {
            helper: AttachmentHelper::new(Arc::new(registry), "files")
                .with_default_host("https://cdn.example.com"),
            store,
        }
    }

    fn document_with(attribute: &'static str, file: FileReference) -> Document {
        Document {
            files: HashMap::from([(attribute, file)]),
        }
    }

    fn segment_count(url: &str) -> usize {
        url.trim_start_matches("https://")
            .split('/')
            .skip(1)
            .count()
    }

    #[test]
    fn test_basic_url() {
        let f = fixture();
        let doc = document_with("document", FileReference::new("abc123", f.store.clone()));

        let url = f
            .helper
            .attachment_url(&RenderContext::new(), &doc, "document", None, &UrlOptions::new())
            .unwrap();

        assert_eq!(
            url.as_deref(),
            Some("https://cdn.example.com/files/store/abc123/document")
        );
    }

    #[test]
    fn test_processor_and_format() {
        let f = fixture();
        let doc = document_with("document", FileReference::new("abc123", f.store.clone()));
        let fill = Processor::new("fill").arg(300).arg(300);

        let url = f
            .helper
            .attachment_url(
                &RenderContext::new(),
                &doc,
                "document",
                Some(&fill),
                &UrlOptions::new().format("jpg"),
            )
            .unwrap();

        assert_eq!(
            url.as_deref(),
            Some("https://cdn.example.com/files/store/fill/300/300/abc123/document.jpg")
        );
    }

    #[test]
    fn test_processor_adds_segments_before_id() {
        let f = fixture();
        let doc = document_with("document", FileReference::new("abc123", f.store.clone()));
        let ctx = RenderContext::new();

        let base = f
            .helper
            .attachment_url(&ctx, &doc, "document", None, &UrlOptions::new())
            .unwrap()
            .unwrap();
        let processed = f
            .helper
            .attachment_url(
                &ctx,
                &doc,
                "document",
                Some(&Processor::new("fill").args([300, 300])),
                &UrlOptions::new(),
            )
            .unwrap()
            .unwrap();

        assert_eq!(segment_count(&processed), segment_count(&base) + 3);
        assert!(processed.ends_with("/fill/300/300/abc123/document"));
    }

    #[test]
    fn test_processor_without_args() {
        let f = fixture();
        let doc = document_with("image", FileReference::new("abc123", f.store.clone()));

        let url = f
            .helper
            .attachment_url(
                &RenderContext::new(),
                &doc,
                "image",
                Some(&Processor::new("convert")),
                &UrlOptions::new(),
            )
            .unwrap();

        assert_eq!(
            url.as_deref(),
            Some("https://cdn.example.com/files/store/convert/abc123/image")
        );
    }

    #[test]
    fn test_no_file_attached() {
        let f = fixture();
        let doc = Document {
            files: HashMap::new(),
        };

        let url = f
            .helper
            .attachment_url(&RenderContext::new(), &doc, "document", None, &UrlOptions::new())
            .unwrap();
        assert!(url.is_none());
    }

    #[test]
    fn test_unregistered_backend_is_an_error() {
        let f = fixture();
        let stray: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let doc = document_with("document", FileReference::new("abc123", stray));

        let result = f.helper.attachment_url(
            &RenderContext::new(),
            &doc,
            "document",
            None,
            &UrlOptions::new(),
        );
        assert!(matches!(result, Err(AttacheError::UnregisteredBackend { .. })));
    }

    #[test]
    fn test_explicit_filename_is_sanitized() {
        let f = fixture();
        let doc = document_with(
            "document",
            FileReference::new("abc123", f.store.clone()).with_filename("ignored.pdf"),
        );

        let url = f
            .helper
            .attachment_url(
                &RenderContext::new(),
                &doc,
                "document",
                None,
                &UrlOptions::new().filename("Annual Report 2024").format("pdf"),
            )
            .unwrap();

        assert_eq!(
            url.as_deref(),
            Some("https://cdn.example.com/files/store/abc123/annual_report_2024.pdf")
        );
    }

    #[test]
    fn test_host_resolution_order() {
        let store: Arc<dyn Backend> = Arc::new(MemoryBackend::new());
        let registry = Arc::new(BackendRegistry::new().with("store", store.clone()).unwrap());
        let doc = document_with("document", FileReference::new("abc123", store));
        let ctx = RenderContext::new().with_base_url("https://app.example.com");

        let plain = AttachmentHelper::new(registry.clone(), "attachments");
        let url = plain
            .attachment_url(&ctx, &doc, "document", None, &UrlOptions::new())
            .unwrap();
        assert_eq!(
            url.as_deref(),
            Some("https://app.example.com/attachments/store/abc123/document")
        );

        let url = plain
            .attachment_url(&RenderContext::new(), &doc, "document", None, &UrlOptions::new())
            .unwrap();
        assert_eq!(url.as_deref(), Some("/attachments/store/abc123/document"));

        let cdn = plain.clone().with_default_host("https://cdn.example.com");
        let url = cdn
            .attachment_url(
                &ctx,
                &doc,
                "document",
                None,
                &UrlOptions::new().host("https://assets.example.com/"),
            )
            .unwrap();
        assert_eq!(
            url.as_deref(),
            Some("https://assets.example.com/attachments/store/abc123/document")
        );
    }

    #[test]
    fn test_join_path_normalizes_separators() {
        assert_eq!(
            join_path(Some("https://cdn.example.com/"), ["/files/", "store", "abc"]),
            "https://cdn.example.com/files/store/abc"
        );
        assert_eq!(join_path(None, ["a//b", "", "c"]), "/a/b/c");
        assert_eq!(join_path(None, Vec::<String>::new()), "/");
    }

    #[test]
    fn test_segments_are_encoded() {
        let f = fixture();
        let file = FileReference::new("a b/c", f.store.clone());

        let url = f
            .helper
            .file_url(
                &RenderContext::new(),
                &file,
                Some(&Processor::new("text").arg("hello world")),
                &UrlOptions::new().filename("x"),
            )
            .unwrap();

        assert_eq!(
            url,
            "https://cdn.example.com/files/store/text/hello%20world/a%20b%2Fc/x"
        );
    }

    #[test]
    fn test_empty_processor_argument_keeps_its_position() {
        let f = fixture();
        let file = FileReference::new("abc", f.store.clone());
        let ctx = RenderContext::new();
        let options = UrlOptions::new().filename("x");

        let with_empty = f
            .helper
            .file_url(&ctx, &file, Some(&Processor::new("crop").arg("").arg(10)), &options)
            .unwrap();
        let without = f
            .helper
            .file_url(&ctx, &file, Some(&Processor::new("crop").arg(10)), &options)
            .unwrap();

        assert_ne!(with_empty, without);
        assert_eq!(with_empty, "https://cdn.example.com/files/store/crop//10/abc/x");
        assert_eq!(without, "https://cdn.example.com/files/store/crop/10/abc/x");
    }

    #[test]
    fn test_empty_id_keeps_its_segment() {
        let f = fixture();
        let file = FileReference::new("", f.store.clone());

        let url = f
            .helper
            .file_url(&RenderContext::new(), &file, None, &UrlOptions::new().filename("x"))
            .unwrap();

        assert_eq!(url, "https://cdn.example.com/files/store//x");
    }

    #[test]
    fn test_empty_format_is_ignored() {
        let f = fixture();
        let doc = document_with("document", FileReference::new("abc123", f.store.clone()));

        let url = f
            .helper
            .attachment_url(
                &RenderContext::new(),
                &doc,
                "document",
                None,
                &UrlOptions::new().format(""),
            )
            .unwrap();

        assert_eq!(
            url.as_deref(),
            Some("https://cdn.example.com/files/store/abc123/document")
        );
    }

    #[test]
    fn test_file_url_defaults_to_original_filename() {
        let f = fixture();
        let named = FileReference::new("abc", f.store.clone()).with_filename("Logo.PNG");
        let unnamed = FileReference::new("def", f.store.clone());
        let ctx = RenderContext::new();

        assert_eq!(
            f.helper.file_url(&ctx, &named, None, &UrlOptions::new()).unwrap(),
            "https://cdn.example.com/files/store/abc/logo_png"
        );
        assert_eq!(
            f.helper.file_url(&ctx, &unnamed, None, &UrlOptions::new()).unwrap(),
            "https://cdn.example.com/files/store/def/file"
        );
    }

    #[test]
    fn test_upload_url() {
        let f = fixture();
        let url = f
            .helper
            .upload_url(&RenderContext::new(), f.store.as_ref(), None)
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/files/store");

        let stray = MemoryBackend::new();
        assert!(f
            .helper
            .upload_url(&RenderContext::new(), &stray, None)
            .is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_url_is_deterministic(
            id in "[a-z0-9]{1,16}",
            filename in any::<Option<String>>(),
            args in proptest::collection::vec(0u32..2000, 0..3),
        ) {
            let f = fixture();
            let doc = document_with("document", FileReference::new(id, f.store.clone()));
            let processor = Processor::new("fill").args(args);
            let mut options = UrlOptions::new();
            options.filename = filename;
            let ctx = RenderContext::new();

            let first = f.helper.attachment_url(&ctx, &doc, "document", Some(&processor), &options).unwrap();
            let second = f.helper.attachment_url(&ctx, &doc, "document", Some(&processor), &options).unwrap();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_no_extension_without_format(filename in any::<String>()) {
            let f = fixture();
            let doc = document_with("document", FileReference::new("abc", f.store.clone()));

            let url = f
                .helper
                .attachment_url(&RenderContext::new(), &doc, "document", None, &UrlOptions::new().filename(filename))
                .unwrap()
                .unwrap();
            let last = url.rsplit('/').next().unwrap();
            prop_assert!(!last.contains('.'));
        }
    }
}
