//! Persistence of collected data and reports under the data directory.
//!
//! Layout:
//!
//! ```text
//! data/
//!   alerts/     <region>_alerts.json
//!   companies/  <region>_registry.json, <region>_sanctions.json, <region>_businesses.json
//!   satellite/  <region>_satellite.json, <region>/<region>_<layer>.png
//!   reddit/     <region>_social.json
//!   reports/    <region>_<date>.md|json, <region>_<date>_map.geojson
//!   logs/       <region>_<date>.log
//! ```

use crate::analysis::SourceOutcome;
use crate::cli::OutputFormat;
use crate::error::ProfilerError;
use crate::models::AnalysisResult;
use crate::report::{generate_json_report, generate_markdown_report, map_layer};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const REPORTS_DIR: &str = "reports";
pub const LOGS_DIR: &str = "logs";

const SUBDIRS: &[&str] = &["alerts", "companies", "satellite", "reddit", REPORTS_DIR, LOGS_DIR];

/// Files written for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportPaths {
    pub report: PathBuf,
    pub map_layer: PathBuf,
}

/// The data directory tree.
#[derive(Debug, Clone)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join(LOGS_DIR)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.root.join(REPORTS_DIR)
    }

    /// Create every subdirectory of the tree.
    pub fn ensure_layout(&self) -> Result<(), ProfilerError> {
        for dir in SUBDIRS {
            let path = self.root.join(dir);
            std::fs::create_dir_all(&path).map_err(|e| {
                ProfilerError::PresentationFailure(format!(
                    "cannot create {}: {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Write the records of every completed source as `<label>_<source>.json`.
    ///
    /// Failed and disabled sources have nothing to write and are skipped.
    pub fn save_outcomes(
        &self,
        label: &str,
        outcomes: &[SourceOutcome],
    ) -> Result<Vec<PathBuf>, ProfilerError> {
        let mut written = Vec::new();

        for outcome in outcomes {
            let Some(ref records) = outcome.records else {
                continue;
            };
            let path = self
                .root
                .join(outcome.kind.data_subdir())
                .join(format!("{}_{}.json", label, outcome.kind.as_str()));
            let content = records.to_json().map_err(|e| {
                ProfilerError::PresentationFailure(format!(
                    "cannot serialize {} records: {}",
                    outcome.kind, e
                ))
            })?;
            write_file(&path, &content)?;
            debug!("Saved {} {} records to {}", records.len(), outcome.kind, path.display());
            written.push(path);
        }

        Ok(written)
    }

    /// Render and write the report and its map layer.
    ///
    /// `output` overrides the report path; the map layer is written beside it.
    pub fn write_report(
        &self,
        result: &AnalysisResult,
        format: OutputFormat,
        output: Option<&Path>,
    ) -> Result<ReportPaths, ProfilerError> {
        let content = match format {
            OutputFormat::Markdown => generate_markdown_report(result),
            OutputFormat::Json => generate_json_report(result)
                .map_err(|e| ProfilerError::PresentationFailure(e.to_string()))?,
        };

        let stem = format!(
            "{}_{}",
            result.region.label(),
            result.generated_at.format("%Y%m%d")
        );
        let report = match output {
            Some(path) => path.to_path_buf(),
            None => self
                .reports_dir()
                .join(format!("{}.{}", stem, format.extension())),
        };
        let map_path = report
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{}_map.geojson", stem));

        write_file(&report, &content)?;
        let layer = serde_json::to_string_pretty(&map_layer(result))
            .map_err(|e| ProfilerError::PresentationFailure(e.to_string()))?;
        write_file(&map_path, &layer)?;

        info!("Report written to {}", report.display());
        Ok(ReportPaths {
            report,
            map_layer: map_path,
        })
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), ProfilerError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            ProfilerError::PresentationFailure(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }
    std::fs::write(path, content).map_err(|e| {
        ProfilerError::PresentationFailure(format!("cannot write {}: {}", path.display(), e))
    })
}
