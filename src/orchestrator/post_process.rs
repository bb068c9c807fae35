//! Post-run processing utilities.
//!
//! Builds the run record for a finished submission, then handles auto-save and exports.

use super::SubmissionId;
use crate::model::{OrchestrationState, RunConfig, RunRecord, SubmissionInput};
use crate::storage;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What we know about a submission's input once its payload has been handed off.
#[derive(Debug, Clone, Default)]
pub struct SubmissionSummary {
    pub file_name: Option<String>,
    pub file_bytes: Option<u64>,
}

impl From<&SubmissionInput> for SubmissionSummary {
    fn from(input: &SubmissionInput) -> Self {
        Self {
            file_name: input.file_name().map(str::to_string),
            file_bytes: input.file_bytes(),
        }
    }
}

/// Result of post-run processing, ready for presentation layers.
pub struct ProcessedRun {
    pub record: RunRecord,
    pub export_messages: Vec<String>,
    pub auto_saved_path: Option<PathBuf>,
}

/// Process a finished submission: build its record, auto-save, and export.
pub fn process_submission(
    cfg: &RunConfig,
    id: SubmissionId,
    summary: &SubmissionSummary,
    outcome: OrchestrationState,
    elapsed: Duration,
    auto_save: bool,
    export_json: Option<&Path>,
) -> ProcessedRun {
    let record = RunRecord {
        timestamp_utc: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "now".into()),
        submission_id: id.0,
        file_name: summary.file_name.clone(),
        file_bytes: summary.file_bytes,
        base_url: cfg.base_url.clone(),
        feedback_url: cfg.feedback_url.clone(),
        elapsed_ms: elapsed.as_millis() as u64,
        outcome,
    };

    let auto_saved_path = if auto_save {
        match storage::save_run(&record) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "auto-save failed");
                None
            }
        }
    } else {
        None
    };

    let mut export_messages = Vec::new();
    if let Some(export_path) = export_json {
        match storage::export_json(export_path, &record) {
            Ok(_) => export_messages.push(format!("Exported JSON: {}", export_path.display())),
            Err(e) => export_messages.push(format!("Export JSON failed: {e:#}")),
        }
    }

    ProcessedRun {
        record,
        export_messages,
        auto_saved_path,
    }
}
