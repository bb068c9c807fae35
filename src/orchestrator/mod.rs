//! Application-level orchestration.
//!
//! This module owns the submission lifecycle (validate, analyze, feedback), the
//! interactive session controller that feeds it, and post-run processing such as
//! auto-save and exports. CLI layers call into this module to keep responsibilities
//! separated.

mod controller;
mod post_process;
mod upload;

pub use controller::{run_controller, UiCommand};
pub use post_process::{process_submission, ProcessedRun, SubmissionSummary};
pub use upload::{Submission, SubmissionId, UploadOrchestrator};
