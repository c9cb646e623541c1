use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use s3_bank_sync::app::{App, SyncRequest};
use s3_bank_sync::config::ConfigLoader;
use s3_bank_sync::domain::{DestinationPath, PageUrl, TransferMode};
use s3_bank_sync::error::{ErrorKind, SyncError};
use s3_bank_sync::http::HttpSource;
use s3_bank_sync::output::{JsonOutput, OutputMode, TextProgress, TextReport};
use s3_bank_sync::s3::S3Sink;
use s3_bank_sync::transfer::{
    CancelFlag, ExecuteOptions, FetchedObject, ObjectSink, ProgressSink,
};

const EXIT_INPUT: u8 = 2;
const EXIT_NETWORK: u8 = 3;
const EXIT_PARTIAL_FAILURE: u8 = 4;

#[derive(Parser)]
#[command(name = "bank-sync")]
#[command(about = "Upload files listed on a web page to S3, organised by bank and sample")]
#[command(
    after_help = "Examples:\n  bank-sync --url https://example.com/files/ --s3-path s3://my-bucket/prefix/ --dry-run\n  bank-sync --url https://example.com/files/ --s3-path s3://my-bucket/prefix/ --execute"
)]
#[command(version, author)]
struct Cli {
    /// Listing page containing the file links
    #[arg(long)]
    url: String,

    /// Destination, e.g. s3://bucket-name/prefix/
    #[arg(long = "s3-path")]
    s3_path: String,

    /// Show what would be uploaded without transferring anything (default)
    #[arg(long)]
    dry_run: bool,

    /// Actually perform the upload (overrides --dry-run)
    #[arg(long)]
    execute: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    #[arg(long)]
    config: Option<String>,

    /// Parallel transfers in execute mode
    #[arg(long)]
    workers: Option<usize>,

    /// Per-request HTTP and per-call storage timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            match report.downcast_ref::<SyncError>() {
                Some(err) => ExitCode::from(map_exit_code(err)),
                None => ExitCode::from(1),
            }
        }
    }
}

fn map_exit_code(error: &SyncError) -> u8 {
    match error.kind() {
        ErrorKind::InputFormat => EXIT_INPUT,
        ErrorKind::Network => EXIT_NETWORK,
        ErrorKind::Storage | ErrorKind::Config => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let page_url: PageUrl = cli.url.parse()?;
    let destination: DestinationPath = cli.s3_path.parse()?;
    let mode = TransferMode::from_execute_flag(cli.execute);
    tracing::debug!(dry_run = cli.dry_run, execute = cli.execute, %mode, "mode selected");
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        config.workers = workers.max(1);
    }
    if let Some(secs) = cli.timeout {
        config.timeout = Duration::from_secs(secs);
        config.storage.timeout = Some(config.timeout);
    }

    let http = HttpSource::new(&config.user_agent, config.timeout)?;
    let request = SyncRequest {
        page_url,
        destination,
        options: ExecuteOptions {
            mode,
            workers: config.workers,
            cancel: CancelFlag::default(),
        },
    };
    let progress: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Text => &TextProgress,
    };

    let report = match mode {
        TransferMode::DryRun => {
            App::new(http.clone(), http, UnconfiguredSink).sync(&request, progress)?
        }
        TransferMode::Live => {
            let sink = S3Sink::new(&config.storage)?;
            App::new(http.clone(), http, sink).sync(&request, progress)?
        }
    };

    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Text => TextReport::print(&report).into_diagnostic()?,
    }

    if report.summary.has_failures() {
        return Ok(ExitCode::from(EXIT_PARTIAL_FAILURE));
    }
    Ok(ExitCode::SUCCESS)
}

/// Dry runs never write, so no storage client is built for them.
struct UnconfiguredSink;

impl ObjectSink for UnconfiguredSink {
    fn put(&self, key: &str, _object: FetchedObject) -> Result<u64, SyncError> {
        Err(SyncError::Storage(format!(
            "storage client not configured for {key}"
        )))
    }
}
