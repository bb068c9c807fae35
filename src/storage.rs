//! Run record persistence.

use crate::model::RunRecord;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Directory holding auto-saved run records.
pub fn runs_dir() -> Result<PathBuf> {
    let base = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .context("could not determine a data directory")?;
    Ok(base.join("squat-coach-cli").join("runs"))
}

fn record_file_name(record: &RunRecord) -> String {
    format!(
        "run-{}-{}.json",
        record.timestamp_utc.replace(':', "-"),
        record.submission_id
    )
}

/// Save a record to the auto-save directory and return its path.
pub fn save_run(record: &RunRecord) -> Result<PathBuf> {
    let dir = runs_dir()?;
    std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    let path = dir.join(record_file_name(record));
    write_json(&path, record)?;
    Ok(path)
}

/// Write a record to a user-specified location.
pub fn export_json(path: &Path, record: &RunRecord) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    write_json(path, record)
}

fn write_json(path: &Path, record: &RunRecord) -> Result<()> {
    let data = serde_json::to_vec_pretty(record).context("serialize run record")?;
    std::fs::write(path, data).with_context(|| format!("write {}", path.display()))
}
