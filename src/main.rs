//! `bulk-uploader`: upload a directory tree of videos into playlists.

use anyhow::{Context, Result};
use bridge_desktop::ReqwestHttpClient;
use bridge_traits::{CredentialProvider, HttpClient, SystemClock, VideoHostingService};
use clap::{Args, Parser, Subcommand};
use core_auth::{StaticTokenCredentials, TokenFileCredentials};
use core_ledger::open_ledger;
use core_runtime::config::{FailurePolicy, LedgerBackend, LedgerConfig, UploaderConfig};
use core_runtime::events::{EventBus, EventStream};
use core_runtime::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use core_upload::{RunControl, RunSummary, UploadError, UploadOrchestrator};
use provider_youtube::YouTubeConnector;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

mod progress;

/// Overrides the token file with a ready-made access token
const ACCESS_TOKEN_ENV: &str = "UPLOADER_ACCESS_TOKEN";

const BYTES_PER_MB: usize = 1024 * 1024;

fn parse_dir(s: &str) -> std::result::Result<PathBuf, String> {
    let path = PathBuf::from(s);
    if !path.exists() {
        return Err(format!("Directory does not exist: {}", s));
    }
    if !path.is_dir() {
        return Err(format!("Path is not a directory: {}", s));
    }
    path.canonicalize()
        .map_err(|e| format!("Error resolving path '{}': {}", s, e))
}

#[derive(Parser, Debug)]
#[command(name = "bulk-uploader")]
#[command(about = "Upload a directory tree of videos, one playlist per directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: LogLevel,

    /// Log output format (pretty, json, compact)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload every video below DIRECTORY
    Upload(UploadArgs),

    /// Print the playlists and videos recorded in the ledger
    Ledger(LedgerArgs),
}

#[derive(Args, Debug)]
struct LedgerArgs {
    /// Ledger backend (sqlite or csv)
    #[arg(long, default_value = "sqlite")]
    storage: LedgerBackend,

    /// Ledger file; defaults to the backend's file name in the working directory
    #[arg(long)]
    ledger: Option<PathBuf>,
}

impl LedgerArgs {
    fn config(&self) -> LedgerConfig {
        LedgerConfig {
            backend: self.storage,
            path: self
                .ledger
                .clone()
                .unwrap_or_else(|| PathBuf::from(self.storage.default_file_name())),
        }
    }
}

#[derive(Args, Debug)]
struct UploadArgs {
    /// Root directory; each subdirectory becomes a playlist
    #[arg(value_parser = parse_dir)]
    directory: PathBuf,

    /// Walk the tree and fill the ledger without contacting the service
    #[arg(long)]
    dry_run: bool,

    #[command(flatten)]
    ledger: LedgerArgs,

    /// Authorized-user token file
    #[arg(long, default_value = "token.json")]
    token_file: PathBuf,

    /// Chunk size in MiB
    #[arg(long, default_value_t = 8)]
    chunk_size_mb: usize,

    /// Stop after the first file that fails
    #[arg(long)]
    stop_on_error: bool,

    /// Do not draw progress bars
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::default()
        .with_level(cli.log_level)
        .with_spans(false);
    if let Some(format) = cli.log_format {
        logging = logging.with_format(format);
    }
    if let Err(e) = init_logging(logging) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Upload(args) => cmd_upload(args).await,
        Command::Ledger(args) => cmd_ledger(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn cmd_upload(args: UploadArgs) -> Result<ExitCode> {
    let ledger_config = args.ledger.config();
    let config = UploaderConfig::builder()
        .root_dir(&args.directory)
        .ledger_backend(ledger_config.backend)
        .ledger_path(ledger_config.path)
        .preview(args.dry_run)
        .chunk_size_bytes(args.chunk_size_mb.saturating_mul(BYTES_PER_MB))
        .failure_policy(if args.stop_on_error {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        })
        .build()?;

    let ledger = open_ledger(&config.ledger).await.with_context(|| {
        format!("Failed to open {} ledger at {}", config.ledger.backend, config.ledger.path.display())
    })?;

    let service = if args.dry_run {
        None
    } else {
        Some(connect(&args.token_file).await?)
    };

    let events = EventBus::new(config.event_buffer);
    let renderer = if args.quiet {
        tokio::spawn(progress::report_problems(EventStream::new(events.subscribe())))
    } else {
        tokio::spawn(progress::render(events.subscribe()))
    };

    let control = Arc::new(RunControl::new());
    let orchestrator = UploadOrchestrator::new(
        config,
        ledger,
        service,
        events,
        control.clone(),
        Arc::new(SystemClock),
    )?;

    let interrupts = tokio::spawn(watch_interrupts(control));
    let result = orchestrator.spawn().await.context("Upload task panicked")?;
    interrupts.abort();

    renderer.await.ok();

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(if summary.is_clean() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Err(e @ UploadError::QuotaExceeded(_)) => {
            eprintln!("Upload process stopped due to exceeded quota: {}", e);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

async fn cmd_ledger(args: LedgerArgs) -> Result<ExitCode> {
    let config = args.config();
    let ledger = open_ledger(&config)
        .await
        .with_context(|| format!("Failed to open ledger at {}", config.path.display()))?;

    let playlists = ledger.list_playlists().await?;
    let videos = ledger.list_videos().await?;

    println!("Playlists ({}):", playlists.len());
    for playlist in &playlists {
        println!("  {:<40} {}", playlist.name, playlist.id);
    }

    println!("Videos ({}):", videos.len());
    for video in &videos {
        println!("  {:<14} {:<34} {}", video.id, video.playlist_id, video.file_path);
    }

    Ok(ExitCode::SUCCESS)
}

/// Build the YouTube connector, preferring an access token from the environment
async fn connect(token_file: &Path) -> Result<Arc<dyn VideoHostingService>> {
    let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new()?);

    let credentials: Arc<dyn CredentialProvider> = match std::env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => {
            info!("Using access token from {}", ACCESS_TOKEN_ENV);
            Arc::new(StaticTokenCredentials::new(token.trim()))
        }
        _ => Arc::new(
            TokenFileCredentials::load(token_file, http_client.clone())
                .await
                .with_context(|| format!("Failed to load credentials from {}", token_file.display()))?,
        ),
    };

    Ok(Arc::new(YouTubeConnector::new(http_client, credentials)))
}

/// First Ctrl-C stops after the current file, the second exits at once.
async fn watch_interrupts(control: Arc<RunControl>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    warn!("Interrupt received; stopping after the current file (Ctrl-C again to exit now)");
    control.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Second interrupt, exiting");
        std::process::exit(130);
    }
}

fn print_summary(summary: &RunSummary) {
    if summary.cancelled {
        println!(
            "Cancelled after {} of {} files.",
            summary.processed(),
            summary.total_files
        );
    }
    println!(
        "Uploaded: {}  Already in ledger: {}  Failed: {}",
        summary.uploaded, summary.skipped, summary.failed
    );
    for failure in &summary.failures {
        println!("  FAILED {}: {}", failure.file_path, failure.message);
    }
}
