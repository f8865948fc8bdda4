//! Transcript export binary.
//!
//! One-shot `quick`, `tracks` and `export` commands, or a long-running
//! `worker` that reads newline-delimited JSON requests from stdin.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ytx_captions::{CaptionServiceClient, CaptionSource, MemoryCaptionSource, RetryPolicy, TranscriptFetcher};
use ytx_export::ArtifactExporter;
use ytx_jobs::{JobManager, JobStore, RetentionConfig, RetentionSweeper, ServiceConfig, WorkerPool};
use ytx_models::{ExportFormat, QuickTranscriptRequest, TranscriptRequest};
use ytx_storage::LocalArtifactStorage;

#[derive(Parser)]
#[command(name = "ytx", about = "Export video caption tracks as text, PDF or JSON")]
struct Cli {
    /// Read caption tracks from a JSON fixture instead of the caption service
    #[arg(long, global = true)]
    fixture: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a transcript's plain text without creating a job
    Quick {
        /// Video URL or id
        video: String,
        /// Preferred language codes, most preferred first
        #[arg(short, long)]
        lang: Vec<String>,
    },
    /// List the caption tracks available for a video
    Tracks {
        /// Video URL or id
        video: String,
    },
    /// Run one export job to completion and print the job record
    Export {
        /// Video URL or id
        video: String,
        /// Preferred language codes, most preferred first
        #[arg(short, long)]
        lang: Vec<String>,
        /// Formats to produce (txt, pdf, json)
        #[arg(short, long, required = true)]
        format: Vec<ExportFormat>,
        /// Base file name for the artifacts
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Process requests from stdin on a worker pool until interrupted
    Worker,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ytx=info,warn"));

    // Logs go to stderr so stdout stays machine-readable.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn caption_source(fixture: Option<&PathBuf>) -> anyhow::Result<Arc<dyn CaptionSource>> {
    match fixture {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading fixture {}", path.display()))?;
            Ok(Arc::new(MemoryCaptionSource::from_json(&json)?))
        }
        None => Ok(Arc::new(CaptionServiceClient::from_env()?)),
    }
}

async fn build_manager(cli: &Cli, config: &ServiceConfig) -> anyhow::Result<Arc<JobManager>> {
    let storage = Arc::new(LocalArtifactStorage::new(config.output_dir.clone()).await?);
    let store = match &config.job_store_dir {
        Some(dir) => JobStore::open(dir.clone(), storage).await?,
        None => JobStore::in_memory(storage),
    };
    let fetcher = TranscriptFetcher::new(caption_source(cli.fixture.as_ref())?, RetryPolicy::from_env());

    Ok(Arc::new(JobManager::new(
        Arc::new(store),
        fetcher,
        ArtifactExporter::from_env(),
        config,
    )))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let config = ServiceConfig::from_env();
    let manager = build_manager(&cli, &config).await?;

    match cli.command {
        Command::Quick { video, lang } => {
            let quick = manager
                .quick(&QuickTranscriptRequest {
                    url_or_id: video,
                    languages: lang,
                })
                .await?;
            println!("{}", quick.text);
        }
        Command::Tracks { video } => {
            let tracks = manager.available_tracks(&video).await?;
            println!("{}", serde_json::to_string_pretty(&tracks)?);
        }
        Command::Export {
            video,
            lang,
            format,
            name,
        } => {
            let mut request = format
                .into_iter()
                .fold(TranscriptRequest::new(video).with_languages(lang), |r, f| r.with_format(f));
            request.custom_name = name;

            let job = manager.submit_sync(&request).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
            if job.error.is_some() {
                std::process::exit(1);
            }
        }
        Command::Worker => run_worker(manager, &config).await?,
    }

    Ok(())
}

async fn run_worker(manager: Arc<JobManager>, config: &ServiceConfig) -> anyhow::Result<()> {
    info!("Starting ytx worker");
    info!("Worker config: {:?}", config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = RetentionSweeper::new(manager.store().clone(), RetentionConfig::from_env());
    let sweeper_handle = tokio::spawn(async move { sweeper.run(shutdown_rx).await });

    let reporter = tokio::spawn(report_finished(manager.clone(), manager.subscribe()));

    let pool = WorkerPool::start(manager, config);
    pool.resume_queued().await?;

    let mut lines = Some(BufReader::new(tokio::io::stdin()).lines());
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
            line = next_line(&mut lines) => match line {
                Some(line) if !line.trim().is_empty() => submit_line(&pool, &line).await,
                Some(_) => {}
                None => {
                    info!("Input closed; running until interrupted");
                    lines = None;
                }
            }
        }
    }

    pool.shutdown().await;
    let _ = shutdown_tx.send(true);
    sweeper_handle.await.ok();
    reporter.abort();

    info!("Worker shutdown complete");
    Ok(())
}

/// Next stdin line; pends forever once input is exhausted.
async fn next_line(
    lines: &mut Option<tokio::io::Lines<BufReader<tokio::io::Stdin>>>,
) -> Option<String> {
    match lines {
        Some(reader) => match reader.next_line().await {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read request: {}", e);
                None
            }
        },
        None => std::future::pending().await,
    }
}

async fn submit_line(pool: &WorkerPool, line: &str) {
    let request: TranscriptRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(e) => {
            warn!("Ignoring malformed request: {}", e);
            return;
        }
    };
    match pool.submit(&request).await {
        Ok(job_id) => println!("{}", serde_json::json!({ "job_id": job_id, "state": "queued" })),
        Err(e) => {
            warn!("Request rejected: {}", e);
            println!(
                "{}",
                serde_json::json!({ "error_kind": e.kind(), "error_message": e.to_string() })
            );
        }
    }
}

/// Print the status of every job that reaches a terminal state.
async fn report_finished(manager: Arc<JobManager>, mut events: broadcast::Receiver<ytx_jobs::JobEvent>) {
    loop {
        match events.recv().await {
            Ok(event) if event.state.is_terminal() => match manager.status(&event.job_id).await {
                Ok(status) => match serde_json::to_string(&status) {
                    Ok(json) => println!("{}", json),
                    Err(e) => error!("Failed to encode status: {}", e),
                },
                Err(e) => warn!(job_id = %event.job_id, "Status unavailable: {}", e),
            },
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!("Status reporter missed {} events", missed);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
