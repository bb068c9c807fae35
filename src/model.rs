use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Maximum number of characters of a raw (non-JSON) response body shown to the user.
pub const TRANSPORT_DIAGNOSTIC_LIMIT: usize = 200;

/// Extensions accepted by the analysis service.
pub const DEFAULT_ALLOWED_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mov", "mkv"];

/// Upload ceiling enforced by the analysis service (100 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub base_url: String,
    pub feedback_url: String,
    pub upload_field: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub max_upload_bytes: u64,
    /// `None` accepts any extension.
    #[serde(default)]
    pub allowed_extensions: Option<Vec<String>>,
    pub user_agent: String,
}

/// The two sequential network interactions of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Analysis,
    Feedback,
}

impl Phase {
    pub fn endpoint(self) -> &'static str {
        match self {
            Phase::Analysis => "analyze",
            Phase::Feedback => "ai-feedback",
        }
    }
}

/// A video selected for upload.
#[derive(Debug, Clone)]
pub struct VideoFile {
    pub name: String,
    pub bytes: Bytes,
}

impl VideoFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        extension_of(&self.name)
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("mp4") => "video/mp4",
            Some("avi") => "video/x-msvideo",
            Some("mov") => "video/quicktime",
            Some("mkv") => "video/x-matroska",
            _ => "application/octet-stream",
        }
    }
}

pub(crate) fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// What the user handed us for one submission.
#[derive(Debug, Clone)]
pub enum SubmissionInput {
    /// Nothing was selected.
    Missing,
    /// A path was given but could not be read.
    Unreadable { path: PathBuf, message: String },
    /// Larger than the upload ceiling; the contents were never read.
    Oversized { name: String, size: u64 },
    Video(VideoFile),
}

impl SubmissionInput {
    /// Read the video at `path`, unless its size already exceeds `max_bytes`.
    ///
    /// Read failures are kept in the input so that they surface as a local
    /// validation failure rather than an I/O error.
    pub async fn load(path: Option<&Path>, max_bytes: u64) -> Self {
        let Some(path) = path else {
            return SubmissionInput::Missing;
        };
        let unreadable = |e: std::io::Error| SubmissionInput::Unreadable {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(e) => return unreadable(e),
        };
        if size > max_bytes {
            tracing::debug!(path = %path.display(), size, max_bytes, "not reading oversized video");
            return SubmissionInput::Oversized { name, size };
        }
        match tokio::fs::read(path).await {
            Ok(bytes) => SubmissionInput::Video(VideoFile::new(name, bytes)),
            Err(e) => unreadable(e),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        match self {
            SubmissionInput::Video(v) => Some(&v.name),
            SubmissionInput::Oversized { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn file_bytes(&self) -> Option<u64> {
        match self {
            SubmissionInput::Video(v) => Some(v.len()),
            SubmissionInput::Oversized { size, .. } => Some(*size),
            _ => None,
        }
    }
}

/// Why a submission never reached the network.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    #[error("Please select a video file first!")]
    MissingVideo,
    #[error("Cannot read {path}: {message}")]
    Unreadable { path: String, message: String },
    #[error("{name} is empty. Please select a video file first!")]
    EmptyVideo { name: String },
    #[error("Invalid file type for {name}. Supported: {supported}")]
    UnsupportedExtension { name: String, supported: String },
    #[error("{name} is too large ({size} bytes). Maximum size is {limit} bytes.")]
    TooLarge { name: String, size: u64, limit: u64 },
}

/// Where a failure diagnostic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureOrigin {
    /// Raw body of a failed or non-JSON HTTP response.
    Transport,
    /// `error` field of a well-formed payload.
    Application,
    /// Client side: connection, timeout or undecodable payload.
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub origin: FailureOrigin,
    pub message: String,
}

impl FailureReason {
    /// Build a transport diagnostic from a raw body, keeping at most
    /// [`TRANSPORT_DIAGNOSTIC_LIMIT`] characters.
    pub fn transport(body: &str) -> Self {
        Self {
            origin: FailureOrigin::Transport,
            message: truncate_chars(body, TRANSPORT_DIAGNOSTIC_LIMIT),
        }
    }

    pub fn application(message: impl Into<String>) -> Self {
        Self {
            origin: FailureOrigin::Application,
            message: message.into(),
        }
    }

    pub fn client(message: impl Into<String>) -> Self {
        Self {
            origin: FailureOrigin::Client,
            message: message.into(),
        }
    }
}

/// First `limit` characters of `s`.
pub fn truncate_chars(s: &str, limit: usize) -> String {
    match s.char_indices().nth(limit) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// State of one submission. Transitions only move forward.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum OrchestrationState {
    Idle,
    Validating,
    Rejected {
        reason: Rejection,
    },
    Analyzing,
    AnalysisFailed {
        reason: FailureReason,
    },
    AwaitingFeedback {
        squat_count: u64,
    },
    FeedbackFailed {
        squat_count: u64,
        reason: FailureReason,
    },
    Complete {
        squat_count: u64,
        feedback: String,
    },
}

impl OrchestrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrchestrationState::Rejected { .. }
                | OrchestrationState::AnalysisFailed { .. }
                | OrchestrationState::FeedbackFailed { .. }
                | OrchestrationState::Complete { .. }
        )
    }

    pub fn squat_count(&self) -> Option<u64> {
        match self {
            OrchestrationState::AwaitingFeedback { squat_count }
            | OrchestrationState::FeedbackFailed { squat_count, .. }
            | OrchestrationState::Complete { squat_count, .. } => Some(*squat_count),
            _ => None,
        }
    }

    /// Phase whose request is in flight or last completed.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            OrchestrationState::Analyzing | OrchestrationState::AnalysisFailed { .. } => {
                Some(Phase::Analysis)
            }
            OrchestrationState::AwaitingFeedback { .. }
            | OrchestrationState::FeedbackFailed { .. }
            | OrchestrationState::Complete { .. } => Some(Phase::Feedback),
            _ => None,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            OrchestrationState::Idle => "idle",
            OrchestrationState::Validating => "validating",
            OrchestrationState::Rejected { .. } => "rejected",
            OrchestrationState::Analyzing => "analyzing",
            OrchestrationState::AnalysisFailed { .. } => "analysis_failed",
            OrchestrationState::AwaitingFeedback { .. } => "awaiting_feedback",
            OrchestrationState::FeedbackFailed { .. } => "feedback_failed",
            OrchestrationState::Complete { .. } => "complete",
        }
    }
}

/// A response body that decoded as JSON but does not satisfy the payload contract.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid JSON in response: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response carries neither `{0}` nor `error`")]
    Missing(&'static str),
    #[error("response carries both `{0}` and `error`")]
    Ambiguous(&'static str),
}

#[derive(Debug, Deserialize)]
struct AnalysisBody {
    // The full analysis service reports the count as `squats_detected`.
    #[serde(default, alias = "squats_detected")]
    squat_count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedbackBody {
    #[serde(default)]
    feedback: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Blank error strings count as absent.
fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|e| !e.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisResult {
    Counted { squat_count: u64 },
    Failed { error: String },
}

impl AnalysisResult {
    pub fn from_json(body: &[u8]) -> Result<Self, PayloadError> {
        let parsed: AnalysisBody = serde_json::from_slice(body)?;
        match (parsed.squat_count, non_empty(parsed.error)) {
            (Some(squat_count), None) => Ok(AnalysisResult::Counted { squat_count }),
            (None, Some(error)) => Ok(AnalysisResult::Failed { error }),
            (Some(_), Some(_)) => Err(PayloadError::Ambiguous("squat_count")),
            (None, None) => Err(PayloadError::Missing("squat_count")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackResult {
    Feedback { text: String },
    Failed { error: String },
}

impl FeedbackResult {
    pub fn from_json(body: &[u8]) -> Result<Self, PayloadError> {
        let parsed: FeedbackBody = serde_json::from_slice(body)?;
        match (parsed.feedback, non_empty(parsed.error)) {
            (Some(text), None) => Ok(FeedbackResult::Feedback { text }),
            (None, Some(error)) => Ok(FeedbackResult::Failed { error }),
            (Some(_), Some(_)) => Err(PayloadError::Ambiguous("feedback")),
            (None, None) => Err(PayloadError::Missing("feedback")),
        }
    }
}

/// Body of the feedback request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub text: String,
}

/// Prompt sent to the feedback service for a given count.
pub fn feedback_prompt(squat_count: u64) -> String {
    format!(
        "The user completed {squat_count} squats. Provide professional fitness feedback on their squat form and suggestions for improvement."
    )
}

/// Model availability reported by `GET /api-status`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiStatus {
    #[serde(default)]
    pub current_model: Option<String>,
    #[serde(default)]
    pub working_models: Vec<String>,
    #[serde(default)]
    pub failed_models: Vec<String>,
    #[serde(default)]
    pub quota_reset: Option<String>,
    #[serde(default)]
    pub time_until_reset: Option<String>,
    #[serde(default)]
    pub total_models: usize,
    #[serde(default)]
    pub available_models: usize,
}

/// Persisted summary of one finished submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    #[serde(default)]
    pub timestamp_utc: String,
    pub submission_id: u64,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_bytes: Option<u64>,
    pub base_url: String,
    pub feedback_url: String,
    pub elapsed_ms: u64,
    pub outcome: OrchestrationState,
}
