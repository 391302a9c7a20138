//! Main entry point for the bridge-check binary
//!
//! Reads an account list, converts every account to its bridged handle,
//! checks which bridged accounts exist and writes the results.

use std::path::PathBuf;

use clap::Parser;

use checker::services::{FileManager, LookupEndpoint, RealLookupClient};
use checker::{CheckerConfig, CheckerResult, Pipeline};
use shared::{logging, stage_debug, stage_info, stage_warn, Direction, RotationStrategy, Stage};

/// Find the bridged counterparts of the accounts you follow
#[derive(Parser)]
#[command(name = "bridge-check")]
#[command(about = "Converts account lists across the Bluesky/Mastodon bridge and checks which accounts exist")]
pub struct Args {
    /// Account list: Mastodon follow export CSV, plain list, or directory of JSON follow records
    pub input: PathBuf,

    /// Conversion direction (mastodon-to-bluesky, bluesky-to-mastodon)
    #[arg(long)]
    pub direction: Option<Direction>,

    /// Accounts already followed; skipped without any lookup
    #[arg(long)]
    pub known: Option<PathBuf>,

    /// Confirmed accounts CSV
    #[arg(long, default_value = "output.csv")]
    pub output: PathBuf,

    /// Per-account error CSV
    #[arg(long, default_value = "errors.csv")]
    pub errors: PathBuf,

    /// Also write an HTML page with one link per confirmed account
    #[arg(long)]
    pub html: Option<PathBuf>,

    /// JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Comma-separated lookup instances
    #[arg(long)]
    pub instances: Option<String>,

    /// Instance rotation (single, roundrobin)
    #[arg(long)]
    pub rotation: Option<String>,

    /// Requests per instance before rotating
    #[arg(long)]
    pub quota: Option<u32>,

    /// Maximum lookups in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Minimum gap between request starts
    #[arg(long)]
    pub spacing_ms: Option<u64>,

    /// Attempts per account before giving up on retryable failures
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Convert only, skip existence checks
    #[arg(long)]
    pub no_check: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

#[tokio::main]
async fn main() -> CheckerResult<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();

    logging::init_tracing(Some(&args.log_level));

    if let Err(err) = run(&args).await {
        logging::log_error(Stage::Output, "bridge-check", &err);
        return Err(err);
    }
    Ok(())
}

async fn run(args: &Args) -> CheckerResult<()> {
    let config = load_config(args).await?;
    config.validate()?;
    logging::log_startup(&format!("bridge-check ({})", config.direction));
    stage_debug!(Stage::Intake, "configuration: {:?}", config);

    let raw = FileManager::read_identifiers(&args.input).await?;
    stage_info!(Stage::Intake, "📄 read {} accounts from {}", raw.len(), args.input.display());

    let client = RealLookupClient::new(LookupEndpoint::for_direction(config.direction), config.request_timeout())?;
    let pipeline = Pipeline::new(client, &config)?;

    let known = match &args.known {
        Some(path) => pipeline.known_set(FileManager::read_identifiers(path).await?),
        None => pipeline.known_set(Vec::<String>::new()),
    };

    if args.no_check {
        let results = pipeline.convert(&raw, &known);
        FileManager::write_results_csv(&args.output, &results).await?;
        if let Some(html) = &args.html {
            FileManager::write_link_page(html, &results).await?;
        }
        logging::log_success(
            Stage::Output,
            &format!("converted {} accounts to {}", results.len(), args.output.display()),
        );
        return Ok(());
    }

    let report = pipeline.run(&raw, &known).await?;

    FileManager::write_results_csv(&args.output, &report.results).await?;
    FileManager::write_errors_csv(&args.errors, &report.errors).await?;
    if let Some(html) = &args.html {
        FileManager::write_link_page(html, &report.results).await?;
    }

    match &report.fatal {
        Some(reason) => {
            stage_warn!(
                Stage::Output,
                "⚠️ partial results written to {} (run stopped early: {})",
                args.output.display(),
                reason
            );
        }
        None => logging::log_success(
            Stage::Output,
            &format!(
                "{} confirmed accounts written to {}, {} errors to {}",
                report.results.len(),
                args.output.display(),
                report.errors.len(),
                args.errors.display()
            ),
        ),
    }

    Ok(())
}

/// Defaults, then config file, then environment, then flags
async fn load_config(args: &Args) -> CheckerResult<CheckerConfig> {
    let mut config = match &args.config {
        Some(path) => CheckerConfig::from_file(path).await?,
        None => CheckerConfig::default(),
    };
    config.apply_env()?;

    if let Some(direction) = args.direction {
        config.direction = direction;
    }
    if args.instances.is_some() || args.rotation.is_some() {
        let instances = match &args.instances {
            Some(list) => list.clone(),
            None => config.rotation_strategy().instances().join(","),
        };
        config.rotation = Some(RotationStrategy::parse(
            args.rotation.as_deref().unwrap_or("roundrobin"),
            &instances,
            args.quota,
        )?);
    } else if let Some(quota) = args.quota {
        let instances = config.rotation_strategy().instances();
        config.rotation = Some(RotationStrategy::round_robin(instances, quota));
    }
    if let Some(concurrency) = args.concurrency {
        config.max_in_flight = concurrency;
    }
    if let Some(spacing) = args.spacing_ms {
        config.request_spacing_ms = spacing;
    }
    if let Some(attempts) = args.max_attempts {
        config.max_attempts = attempts;
    }

    Ok(config)
}
