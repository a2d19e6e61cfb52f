use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use clap::Parser;
use tracing::{error, info, warn};

use pixelbot::config::{AppConfig, TriggerInput};
use pixelbot::model::GeminiClient;
use pixelbot::pipeline::{Outcome, Pipeline};
use pixelbot::progress::{GithubCommentChannel, ProgressChannel};
use pixelbot::request::Request;

/// Exit codes of the three-way process outcome contract: the caller
/// regenerates derived artifacts on success, skips them on a refusal, and
/// alerts on failure.
const EXIT_APPLIED: u8 = 0;
const EXIT_REFUSED: u8 = 3;
const EXIT_FAILED: u8 = 1;

#[derive(Parser, Debug)]
#[command(name = "pixelbot", version, about = "Process one canvas request")]
struct Cli {
    /// Canvas snapshot file
    #[arg(long, default_value = "grid.json")]
    grid: PathBuf,

    /// Usage ledger file
    #[arg(long, default_value = "usage.json")]
    usage: PathBuf,

    /// Pre-rendered PNG of the current canvas, sent to the model as a
    /// reference image when present
    #[arg(long)]
    canvas_image: Option<PathBuf>,

    /// Enable info logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        tracing::Level::DEBUG
    } else if cli.verbose {
        tracing::Level::INFO
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("Starting pixelbot version {}", env!("CARGO_PKG_VERSION"));

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Request failed: {e}");
            println!("Failed: {e}");
            ExitCode::from(EXIT_FAILED)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let input = TriggerInput::from_env()?;
    let config = AppConfig::new(cli.grid, cli.usage);

    let request = Request::new(
        &input.title,
        input.body.as_deref(),
        &input.requester,
        Utc::now(),
    );

    let client = GeminiClient::new(&input.gemini_api_key, 120)
        .map_err(|e| anyhow::anyhow!("model client setup failed: {e}"))?;

    let progress: Option<Box<dyn ProgressChannel>> = match input.progress_target() {
        Some((repo, issue, token)) => Some(Box::new(GithubCommentChannel::new(repo, issue, token)?)),
        None => {
            info!("Progress channel not configured; updates disabled");
            None
        }
    };

    let reference_png = match &cli.canvas_image {
        Some(path) => match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!("Could not read canvas image {:?}: {e}", path);
                None
            }
        },
        None => None,
    };

    let pipeline = Pipeline::new(&config, &client);
    let outcome = pipeline.run(&request, progress, reference_png).await?;

    println!("{}", outcome.status_line());

    let code = match outcome {
        Outcome::AppliedDirect(_) | Outcome::AppliedDrawing { .. } => EXIT_APPLIED,
        Outcome::RefusedByModel | Outcome::RefusedByQuota(_) => EXIT_REFUSED,
        Outcome::RejectedMalformed => EXIT_FAILED,
    };
    Ok(ExitCode::from(code))
}
