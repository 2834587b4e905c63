use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_lexicon_core::{
    BlobStore, DocumentService, InMemoryBlobStore, InMemoryRecordStore, IngestionOptions,
    PdftoppmRasterizer, PipelineError, RecordStore, RenderOptions, S3BlobStore, S3Credentials,
    SegmentationPolicy, SqliteRecordStore,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-lexicon", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite database holding document and sentence rows
    #[arg(long, env = "LEXICON_DATABASE_URL", default_value = "sqlite://lexicon.db")]
    database_url: String,

    /// S3-compatible endpoint (MinIO, AWS S3)
    #[arg(long, env = "LEXICON_S3_ENDPOINT", default_value = "http://localhost:9000")]
    s3_endpoint: String,

    /// S3 signing region
    #[arg(long, env = "LEXICON_S3_REGION", default_value = "us-east-1")]
    s3_region: String,

    /// Bucket that stores the uploaded PDFs
    #[arg(long, env = "LEXICON_BUCKET", default_value = pdf_lexicon_core::DEFAULT_BUCKET)]
    bucket: String,

    /// S3 access key id
    #[arg(long, env = "LEXICON_S3_ACCESS_KEY", default_value = "minioadmin")]
    s3_access_key: String,

    /// S3 secret access key
    #[arg(long, env = "LEXICON_S3_SECRET_KEY", default_value = "minioadmin", hide_env_values = true)]
    s3_secret_key: String,

    /// Resolution of rendered page images
    #[arg(long, env = "LEXICON_RENDER_DPI", default_value = "150")]
    render_dpi: u32,

    /// Keep everything in process memory; nothing outlives the command.
    #[arg(long, default_value_t = false)]
    in_memory: bool,

    /// How extracted text is split into sentences.
    #[arg(long, value_enum, default_value_t = Segmentation::Unicode)]
    segmentation: Segmentation,
}

#[derive(Clone, Copy, ValueEnum)]
enum Segmentation {
    Unicode,
    Period,
}

impl From<Segmentation> for SegmentationPolicy {
    fn from(value: Segmentation) -> Self {
        match value {
            Segmentation::Unicode => SegmentationPolicy::Unicode,
            Segmentation::Period => SegmentationPolicy::Period,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Upload PDF files and store their sentences.
    Upload {
        /// PDF files to upload.
        files: Vec<PathBuf>,
        /// Also upload every PDF under this folder, skipping failures.
        #[arg(long)]
        folder: Option<PathBuf>,
    },
    /// List stored documents ordered by name.
    List,
    /// Search every stored sentence for a whole word.
    Search {
        #[arg(long)]
        keyword: String,
    },
    /// Show one document's metadata.
    Show { id: i64 },
    /// Write the stored PDF to disk.
    Download {
        id: i64,
        /// Destination; defaults to the uploaded file name.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Render one page as a JPEG.
    Page {
        id: i64,
        /// 1-based page number.
        #[arg(long)]
        page: i64,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List a document's sentences.
    Sentences { id: i64 },
    /// Count a keyword's occurrences within one document.
    Occurrences {
        id: i64,
        #[arg(long)]
        keyword: String,
    },
    /// Five most frequent non-stopword words of a document.
    TopWords { id: i64 },
    /// Delete a document, its sentences and its stored PDF.
    Delete { id: i64 },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "pdf-lexicon boot"
    );

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!("{error:#}");
            eprintln!("error: {error:#}");
            let client_error = error
                .downcast_ref::<PipelineError>()
                .is_some_and(PipelineError::is_client_error);
            if client_error {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let options = IngestionOptions {
        bucket: cli.bucket.clone(),
        segmentation: cli.segmentation.into(),
    };
    let rasterizer = Arc::new(PdftoppmRasterizer::new(RenderOptions {
        dpi: cli.render_dpi,
        ..RenderOptions::default()
    }));

    if cli.in_memory {
        let service = DocumentService::new(InMemoryBlobStore::new(), InMemoryRecordStore::new())
            .with_rasterizer(rasterizer)
            .with_options(options);
        return execute(&service, cli.command).await;
    }

    let records = SqliteRecordStore::connect(&cli.database_url)
        .await
        .with_context(|| format!("failed to open {}", cli.database_url))?;
    records.ensure_schema().await?;
    let blobs = S3BlobStore::new(
        &cli.s3_endpoint,
        cli.s3_region.as_str(),
        S3Credentials::new(cli.s3_access_key.as_str(), cli.s3_secret_key.as_str()),
    )?;

    let service = DocumentService::new(blobs, records)
        .with_rasterizer(rasterizer)
        .with_options(options);
    execute(&service, cli.command).await
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn execute<B, R>(service: &DocumentService<B, R>, command: Command) -> anyhow::Result<()>
where
    B: BlobStore,
    R: RecordStore,
{
    match command {
        Command::Upload { files, folder } => {
            if files.is_empty() && folder.is_none() {
                return Err(PipelineError::Validation(
                    "give at least one file or --folder".to_string(),
                )
                .into());
            }

            let mut uploaded = Vec::new();
            for path in &files {
                uploaded.push(service.upload_path(path).await?);
            }

            if let Some(folder) = folder {
                let report = service.ingest_folder(&folder).await;
                for skipped in &report.skipped {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
                info!(
                    folder = %folder.display(),
                    ingested = report.ingested.len(),
                    skipped = report.skipped.len(),
                    "folder ingested"
                );
                uploaded.extend(report.ingested);
            }

            print_json(&uploaded)?;
        }
        Command::List => print_json(&service.list_documents().await?)?,
        Command::Search { keyword } => print_json(&service.search_keyword(&keyword).await?)?,
        Command::Show { id } => print_json(&service.get_document(id).await?)?,
        Command::Download { id, output } => {
            let (name, bytes) = service.download(id).await?;
            let output = output.unwrap_or_else(|| PathBuf::from(&name));
            tokio::fs::write(&output, &bytes)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("{} bytes written to {}", bytes.len(), output.display());
        }
        Command::Page { id, page, output } => {
            let image = service.render_page(id, page).await?;
            let output = output.unwrap_or_else(|| PathBuf::from(format!("document-{id}-page-{page}.jpg")));
            tokio::fs::write(&output, &image)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("page {page} written to {}", output.display());
        }
        Command::Sentences { id } => print_json(&service.list_sentences(id).await?)?,
        Command::Occurrences { id, keyword } => {
            print_json(&service.occurrences(id, &keyword).await?)?
        }
        Command::TopWords { id } => {
            let ranking = service.top_words(id).await?;
            print_json(&ranking.numbered())?;
        }
        Command::Delete { id } => {
            service.delete(id).await?;
            println!("document {id} deleted");
        }
    }

    Ok(())
}
