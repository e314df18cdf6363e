//! JSON output of a completed run.
//!
//! One file per run, named after the run timestamp:
//! `{json_output_dir}/{YYYYmmdd_HHMMSS}.json`.

use crate::models::RunReport;
use crate::utils::run_timestamp;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

/// Serialize `report` into `json_output_dir`, creating the directory if
/// needed. Returns the written path.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir.display()))]
pub async fn write_report(
    report: &RunReport,
    json_output_dir: &Path,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    if let Err(e) = fs::create_dir_all(json_output_dir).await {
        error!(error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = json_output_dir.join(format!("{}.json", run_timestamp()));
    fs::write(&path, json).await?;
    info!(path = %path.display(), articles = report.articles.len(), "Wrote JSON report");

    Ok(path)
}
