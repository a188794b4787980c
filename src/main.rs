//! EcoProfiler - environmental crime OSINT for a geographic region
//!
//! A CLI tool that resolves a place or coordinates into a region, queries
//! forest-loss alerts, corporate registries, sanctions lists, social media
//! and optionally satellite imagery and OpenStreetMap, then scores the
//! region and writes a report.
//!
//! Exit codes:
//!   0 - Success, including runs where some sources failed
//!   1 - Invalid arguments, configuration or location

mod analysis;
mod cli;
mod config;
mod error;
mod http;
mod location;
mod models;
mod report;
mod sources;

use analysis::Pipeline;
use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use error::ProfilerError;
use location::{LocationQuery, LocationResolver};
use models::{AnalysisResult, SourceStatus};
use report::DataStore;
use sources::AdapterOptions;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Configuration error: {:#}", e);
            std::process::exit(1);
        }
    };

    let guard = init_logging(&args, &config);

    info!("EcoProfiler v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    let exit_code = match run(args, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            1
        }
    };

    // Flush the log file before exiting
    drop(guard);
    std::process::exit(exit_code);
}

/// Handle --init-config: generate a default .ecoprofiler.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Edit it to customize bounds, endpoints and risk weights.");
    println!("   Credentials are best kept in the environment or a .env file.");
    Ok(())
}

/// Load the config file, then layer the environment and CLI arguments on top.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => match Config::load_default() {
            Ok(Some(config)) => config,
            Ok(None) => Config::default(),
            Err(e) => {
                eprintln!("⚠️  Ignoring {}: {:#}", CONFIG_FILE, e);
                Config::default()
            }
        },
    };

    config.merge_with_env()?;
    config.merge_with_args(args);
    config.validate()?;
    Ok(config)
}

/// Initialize logging to stderr and to a per-run file under the logs directory.
///
/// The returned guard must be kept alive for the file writer to flush.
fn init_logging(args: &Args, config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_new(args.log_filter(&config.general.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact();

    let logs_dir = DataStore::new(&config.general.data_dir).logs_dir();
    let file_name = format!("{}_{}.log", args.run_label(), Utc::now().format("%Y%m%d"));
    let appender = std::fs::create_dir_all(&logs_dir)
        .ok()
        .and_then(|_| {
            RollingFileAppender::builder()
                .rotation(Rotation::NEVER)
                .filename_prefix(file_name)
                .build(&logs_dir)
                .ok()
        });

    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("⚠️  Failed to set tracing subscriber: {}", e);
    }

    if guard.is_none() {
        warn!("Cannot write log files under {}", logs_dir.display());
    }
    guard
}

/// Run the complete profiling workflow. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    let store = DataStore::new(&config.general.data_dir);
    if let Err(e) = store.ensure_layout() {
        warn!("{}", e);
    }

    let client = http::build_client(&config.http)?;

    // Step 1: Parse the location. Failure here aborts before any source runs.
    let query = match LocationQuery::from_args(&args) {
        Ok(query) => query,
        Err(e) => return Ok(abort(&e)),
    };

    let options = AdapterOptions {
        include_osm: args.include_osm,
        include_satellite: args.include_satellite,
    };
    let adapters = sources::build_adapters(&config, client.clone(), &options);
    let resolver = LocationResolver::from_config(&config, client);
    let pipeline = Pipeline::new(adapters, config.risk.clone()).with_progress(!args.quiet);

    // Step 2: Resolve the region, then fetch every source
    println!("📍 Resolving location and querying sources...");
    let output = match pipeline
        .profile(&resolver, &query, args.radius, args.days)
        .await
    {
        Ok(output) => output,
        Err(e) => return Ok(abort(&e)),
    };

    let region = &output.result.region;
    println!("   Region: {}", region.display_name());
    println!("   Center: {}", region.center());
    println!("   Radius: {} km", region.radius_km());
    println!("   Window: {} days", region.time_window_days());

    let result = output.result;

    // Step 3: Persist what was collected
    if config.general.save_outputs {
        match store.save_outcomes(&result.region.label(), &output.outcomes) {
            Ok(paths) => info!("Saved {} source files under {}", paths.len(), store.root().display()),
            Err(e) => warn!("{}", e),
        }
    }

    if result.insufficient_data {
        let note = ProfilerError::InsufficientData(
            "no completed source returned records".to_string(),
        );
        warn!("{}", note);
    }

    // Step 4: Present
    let report_path = if args.report {
        println!("\n📝 Generating report...");
        match store.write_report(&result, args.format, args.output.as_deref()) {
            Ok(paths) => Some(paths),
            Err(e) => {
                error!("{}", e);
                eprintln!("⚠️  {}", e);
                None
            }
        }
    } else {
        None
    };

    print_summary(&result, start_time.elapsed().as_secs_f64());

    if let Some(paths) = report_path {
        println!("\n✅ Report saved to: {}", paths.report.display());
        println!("   Map layer: {}", paths.map_layer.display());
    }

    Ok(0)
}

/// Report an error that stops the run and return the exit code.
fn abort(e: &ProfilerError) -> i32 {
    error!("{}", e);
    eprintln!("\n❌ {}", e);
    if e.is_fatal() {
        1
    } else {
        0
    }
}

fn print_summary(result: &AnalysisResult, duration: f64) {
    println!("\n📊 Analysis Summary:");
    if result.insufficient_data {
        println!("   Risk: ⚪ insufficient data (score 0)");
    } else {
        println!(
            "   Risk: {} {} ({:.2}/100)",
            result.risk_level.emoji(),
            result.risk_level,
            result.risk_score
        );
    }
    println!(
        "   Records: {} alerts | {} entities ({} sanctioned) | {} posts | {} images | {} businesses",
        result.alerts.len(),
        result.entities.len(),
        result.sanctioned_entities().count(),
        result.posts.len(),
        result.images.len(),
        result.businesses.len()
    );

    println!(
        "   Sources: {} of {} completed",
        result.contributing_sources().len(),
        result.sources.len()
    );
    for source in &result.sources {
        match (&source.status, &source.error) {
            (SourceStatus::Failed | SourceStatus::Disabled, Some(reason)) => println!(
                "     {} {}: {} ({})",
                source.status.emoji(),
                source.kind,
                source.status,
                reason
            ),
            (SourceStatus::Partial, Some(reason)) => println!(
                "     {} {}: {} records, partial ({})",
                source.status.emoji(),
                source.kind,
                source.records,
                reason
            ),
            _ => println!(
                "     {} {}: {} records",
                source.status.emoji(),
                source.kind,
                source.records
            ),
        }
    }
    println!("   Duration: {:.1}s", duration);
}
