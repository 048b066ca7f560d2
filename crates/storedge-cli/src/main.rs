//! StorEdge CLI: run the upload pipeline and catalog operations against the
//! configured backends.
//!
//! Configuration comes from the environment (and `.env`): DATABASE_URL,
//! STORAGE_BACKEND, LOCAL_STORAGE_PATH, WEBHOOK_URL and the upload limits.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use storedge_cli::{build_services, content_type_for, parse_range, Services};
use storedge_core::{AppError, Config, UploadSpec};
use storedge_infra::error::{log_error, ErrorResponse};
use storedge_infra::init_telemetry;
use storedge_services::{ListRequest, RequestContext};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "storedge", about = "StorEdge upload pipeline CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a local file
    Upload {
        /// Path to the file to upload
        file: PathBuf,
        /// Owner of the file
        #[arg(long)]
        owner: String,
        /// Display name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        /// Content type (guessed from the extension when omitted)
        #[arg(long)]
        content_type: Option<String>,
        /// Tag to attach; repeat for several
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Idempotency key; retrying with the same key returns the first upload
        #[arg(long)]
        key: Option<String>,
    },
    /// Show metadata for a file
    Get {
        /// File ID
        id: String,
    },
    /// Write a file's content to stdout
    Cat {
        /// File ID
        id: String,
        /// Inclusive byte range, START-END
        #[arg(long)]
        range: Option<String>,
    },
    /// List files, oldest first
    List {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Case-insensitive substring of the name
        #[arg(long)]
        query: Option<String>,
        /// Page size (0 selects the default)
        #[arg(long, default_value = "0")]
        limit: u32,
        /// Cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,
    },
    /// Delete a file
    Delete {
        /// File ID
        id: String,
    },
    /// Remove unreferenced and abandoned objects once
    Sweep,
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_env().and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_telemetry(config.log_json()) {
        eprintln!("Failed to initialize tracing: {:#}", e);
    }

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<AppError>() {
                Some(app_error) => {
                    log_error(app_error);
                    let response = ErrorResponse::from_app_error(app_error, config.is_production());
                    match serde_json::to_string_pretty(&response) {
                        Ok(body) => eprintln!("{}", body),
                        Err(_) => eprintln!("{}", app_error),
                    }
                }
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: &Config) -> anyhow::Result<()> {
    let services = build_services(config).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling request");
            on_interrupt.cancel();
        }
    });
    let ctx = RequestContext::with_cancellation(Some(config.upload_timeout()), cancel);

    execute(command, &services, &ctx).await
}

async fn execute(command: Commands, services: &Services, ctx: &RequestContext) -> anyhow::Result<()> {
    match command {
        Commands::Upload {
            file,
            owner,
            name,
            content_type,
            tags,
            key,
        } => {
            let metadata = tokio::fs::metadata(&file)
                .await
                .with_context(|| format!("Cannot read {}", file.display()))?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("Path has no file name; pass --name")?,
            };
            let spec = UploadSpec {
                name,
                size: i64::try_from(metadata.len()).context("File too large")?,
                content_type: content_type
                    .unwrap_or_else(|| content_type_for(&file).to_string()),
                idempotency_key: key,
                owner_id: owner,
                tags,
            };

            let body = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Cannot open {}", file.display()))?;
            let outcome = services.uploads.upload(ctx, spec, body).await?;
            print_json(&serde_json::json!({
                "file": outcome.file,
                "replayed": outcome.replayed,
            }))?;
        }
        Commands::Get { id } => {
            let file = services.retrieval.get(ctx, &id).await?;
            print_json(&file)?;
        }
        Commands::Cat { id, range } => {
            let range = range.as_deref().map(parse_range).transpose()?;
            let (_, mut object) = services.retrieval.open_file(ctx, &id, range).await?;
            let mut stdout = tokio::io::stdout();
            tokio::io::copy(&mut object.reader, &mut stdout)
                .await
                .context("Failed to write to stdout")?;
        }
        Commands::List {
            owner,
            tag,
            query,
            limit,
            cursor,
        } => {
            let request = ListRequest {
                owner_id: owner,
                tag,
                query,
                limit,
                cursor,
            };
            let page = services.listing.list(ctx, &request).await?;
            print_json(&serde_json::json!({
                "items": page.items,
                "next_cursor": page.next_cursor,
            }))?;
        }
        Commands::Delete { id } => {
            services.deletion.delete(ctx, &id).await?;
            print_json(&serde_json::json!({ "deleted": id }))?;
        }
        Commands::Sweep => {
            let report = services.sweeper.sweep_once().await?;
            print_json(&report)?;
        }
    }

    Ok(())
}
