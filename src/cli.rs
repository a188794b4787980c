//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// EcoProfiler - environmental crime OSINT for a geographic region
///
/// Collects forest-loss alerts, corporate registry and sanctions data,
/// social media discussion and (optionally) satellite imagery around a
/// place, scores the region and writes a report.
///
/// Examples:
///   ecoprofiler --place "Sumatra"
///   ecoprofiler --coords "0.7893,101.3431" --radius 20 --days 30
///   ecoprofiler --place "Borneo" --include-osm --include-satellite --report
///   ecoprofiler --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Place name to analyze (e.g. "Sumatra")
    #[arg(
        long,
        value_name = "NAME",
        conflicts_with = "coords",
        required_unless_present_any = ["coords", "init_config"]
    )]
    pub place: Option<String>,

    /// Coordinates to analyze as "lat,lon" (e.g. "0.7893,101.3431")
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    pub coords: Option<String>,

    /// Search radius in km
    ///
    /// Defaults to DEFAULT_RADIUS_KM or the config file, bounded by MAX_RADIUS_KM.
    #[arg(long, value_name = "KM")]
    pub radius: Option<f64>,

    /// Days to look back
    ///
    /// Defaults to DEFAULT_DAYS_BACK or the config file.
    #[arg(long, value_name = "DAYS")]
    pub days: Option<u32>,

    /// Include the OpenStreetMap business search
    #[arg(long)]
    pub include_osm: bool,

    /// Include the satellite imagery fetch (needs Sentinel Hub credentials)
    #[arg(long)]
    pub include_satellite: bool,

    /// Write a report to the reports directory
    #[arg(long)]
    pub report: bool,

    /// Report format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Report file path (overrides the reports directory)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Root directory for collected data, reports and logs
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .ecoprofiler.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// HTTP request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Do not write per-source data files
    #[arg(long)]
    pub no_save: bool,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .ecoprofiler.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    ///
    /// Coordinate syntax and range are checked by the location resolver.
    pub fn validate(&self) -> Result<(), String> {
        if self.init_config {
            return Ok(());
        }

        match (&self.place, &self.coords) {
            (None, None) => return Err("One of --place or --coords is required".to_string()),
            (Some(place), _) if place.trim().is_empty() => {
                return Err("--place must not be empty".to_string())
            }
            _ => {}
        }

        if let Some(radius) = self.radius {
            if !(radius > 0.0) || !radius.is_finite() {
                return Err("Radius must be a positive number of km".to_string());
            }
        }

        if self.days == Some(0) {
            return Err("Days must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        Ok(())
    }

    /// Returns the log filter, preferring the verbosity flags over `configured`.
    pub fn log_filter(&self, configured: &str) -> String {
        if self.quiet {
            "error".to_string()
        } else if self.verbose {
            "debug".to_string()
        } else {
            configured.to_string()
        }
    }

    /// Label used to name the log file before the region is resolved.
    pub fn run_label(&self) -> String {
        match (&self.place, &self.coords) {
            (Some(place), _) => crate::models::slugify(place),
            (None, Some(coords)) => format!("coords_{}", crate::models::slugify(coords)),
            (None, None) => "ecoprofiler".to_string(),
        }
    }
}
