//! Attache CLI
//!
//! Compose attachment URLs and upload fields from the environment
//! configuration, and push files into the configured backends.
//!
//! # Usage
//!
//! ```bash
//! # URL of a stored file, resized and converted
//! attache url store abc123 --filename document --processor fill --arg 300 --arg 300 --format jpg
//!
//! # Upload field markup with direct upload enabled
//! attache field post image --direct --accept image/png
//!
//! # Cache a local file and print its URL
//! attache upload ./photo.jpg
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use attache_core::AttacheConfig;
use attache_helpers::{AttachmentHelper, FieldOptions, Processor, RenderContext, UrlOptions};
use attache_storage::{Accept, Attachable, Attacher, Backend, BackendRegistry, FileReference};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "attache")]
#[command(about = "Attachment URL and upload field composer", long_about = None)]
struct Cli {
    /// Origin of the current request, used when no host is configured
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the URL of a stored file
    Url {
        /// Registered backend name
        backend: String,
        /// File id within the backend
        id: String,
        #[command(flatten)]
        url: UrlArgs,
    },
    /// Print the direct upload endpoint of a backend
    UploadUrl {
        /// Registered backend name
        backend: String,
        #[arg(long)]
        host: Option<String>,
    },
    /// Render the upload field pair for a form
    Field {
        /// Form object name, e.g. "post"
        object: String,
        /// Attachment column, e.g. "image"
        attribute: String,
        #[arg(long)]
        direct: bool,
        #[arg(long)]
        presigned: bool,
        #[arg(long)]
        host: Option<String>,
        /// Content types ("image/png") or extensions ("png"), repeatable
        #[arg(long)]
        accept: Vec<String>,
        /// Id of a pending cached upload
        #[arg(long)]
        cache_id: Option<String>,
    },
    /// Upload a local file and print its id and URL
    Upload {
        path: PathBuf,
        /// Upload into the store backend instead of the cache
        #[arg(long)]
        store: bool,
        #[command(flatten)]
        url: UrlArgs,
    },
    /// List registered backends
    Backends,
}

#[derive(Args)]
struct UrlArgs {
    #[arg(long)]
    filename: Option<String>,
    /// Processor name, e.g. "fill"
    #[arg(long)]
    processor: Option<String>,
    /// Processor argument, repeatable
    #[arg(long = "arg", requires = "processor")]
    args: Vec<String>,
    #[arg(long)]
    format: Option<String>,
    #[arg(long)]
    host: Option<String>,
}

impl UrlArgs {
    fn processor(&self) -> Option<Processor> {
        self.processor
            .as_ref()
            .map(|name| Processor::new(name.as_str()).args(&self.args))
    }

    fn options(&self) -> UrlOptions {
        UrlOptions {
            filename: self.filename.clone(),
            format: self.format.clone(),
            host: self.host.clone(),
        }
    }
}

/// Form object backed by the configured cache and store
struct FormRecord {
    attribute: String,
    attacher: Attacher,
}

impl Attachable for FormRecord {
    fn model_name(&self) -> &'static str {
        "record"
    }

    fn attachment(&self, _attribute: &str) -> Option<FileReference> {
        None
    }

    fn attacher(&self, attribute: &str) -> Option<Attacher> {
        (attribute == self.attribute).then(|| self.attacher.clone())
    }
}

fn accept_from(entries: &[String]) -> Accept {
    let (types, extensions): (Vec<&String>, Vec<&String>) =
        entries.iter().partition(|entry| entry.contains('/'));

    Accept::any()
        .with_content_types(types)
        .with_extensions(extensions)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = AttacheConfig::from_env().context("invalid attache configuration")?;
    let registry = Arc::new(BackendRegistry::from_config(&config)?);
    let helper = AttachmentHelper::from_config(&config, registry.clone());

    let ctx = match cli.base_url {
        Some(base_url) => RenderContext::new().with_base_url(base_url),
        None => RenderContext::new(),
    };

    match cli.command {
        Commands::Url { backend, id, url } => {
            let file = FileReference::new(id, registry.fetch(&backend)?.clone());
            let processor = url.processor();
            println!(
                "{}",
                helper.file_url(&ctx, &file, processor.as_ref(), &url.options())?
            );
        }
        Commands::UploadUrl { backend, host } => {
            let backend = registry.fetch(&backend)?;
            println!(
                "{}",
                helper.upload_url(&ctx, backend.as_ref(), host.as_deref())?
            );
        }
        Commands::Field {
            object,
            attribute,
            direct,
            presigned,
            host,
            accept,
            cache_id,
        } => {
            let mut attacher = Attacher::new(
                registry.fetch(&config.cache.name)?.clone(),
                registry.fetch(&config.store.name)?.clone(),
            )
            .with_accept(accept_from(&accept));
            attacher.cache_id = cache_id;

            let record = FormRecord {
                attribute: attribute.clone(),
                attacher,
            };

            let mut options = FieldOptions::new()
                .object(&record)
                .direct(direct)
                .presigned(presigned);
            options.host = host;

            let field = helper.attachment_field(&ctx, &object, &attribute, options)?;
            println!("{}", field.render());
        }
        Commands::Upload { path, store, url } => {
            let data = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;

            let name = if store {
                &config.store.name
            } else {
                &config.cache.name
            };
            let backend = registry.fetch(name)?.clone();
            let stored = backend.upload(bytes::Bytes::from(data)).await?;
            info!(id = %stored.id, size = stored.size, backend = %name, "Uploaded file");

            let filename = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned());
            let mut file = FileReference::new(stored.id.clone(), backend).with_size(stored.size);
            if let Some(filename) = filename {
                file = file.with_filename(filename);
            }

            let processor = url.processor();
            println!("{}", stored.id);
            println!(
                "{}",
                helper.file_url(&ctx, &file, processor.as_ref(), &url.options())?
            );
        }
        Commands::Backends => {
            for name in registry.names() {
                let backend = registry.fetch(name)?;
                let presign = if backend.as_presign().is_some() {
                    " (presign)"
                } else {
                    ""
                };
                println!("{}\t{}{}", name, backend.kind(), presign);
            }
        }
    }

    Ok(())
}

/// Log to stderr; `ATTACHE_LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,attache=info".into());

    let json = std::env::var("ATTACHE_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
