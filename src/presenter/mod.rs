//! State-to-text projection.
//!
//! [`ResultPresenter`] turns an [`OrchestrationState`] into exactly one
//! [`Presentation`] and hands it to a [`StatusSink`]. It keeps no state of its own.

mod chrome;
mod sink;

pub use chrome::{footer, navbar};
pub use sink::{RecordingSink, SilentSink, StatusSink, TerminalSink};

use crate::model::{truncate_chars, FailureOrigin, FailureReason, OrchestrationState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Note,
    Progress,
    Success,
    Error,
    Warning,
    Heading,
    Body,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub kind: LineKind,
    pub text: String,
}

impl StatusLine {
    fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// A complete status region. Each update replaces the previous block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBlock {
    pub lines: Vec<StatusLine>,
}

impl StatusBlock {
    /// Concatenated line texts, one per line.
    pub fn plain_text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Presentation {
    /// Blocking notice; the status region is left alone.
    Alert(String),
    Status(StatusBlock),
}

impl Presentation {
    pub fn plain_text(&self) -> String {
        match self {
            Presentation::Alert(msg) => msg.clone(),
            Presentation::Status(block) => block.plain_text(),
        }
    }
}

pub struct ResultPresenter<S> {
    sink: S,
}

impl<S: StatusSink> ResultPresenter<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    /// Render `state` and push exactly one update to the sink.
    pub fn present(&self, state: &OrchestrationState) {
        self.sink.show(Self::render(state));
    }

    pub fn render(state: &OrchestrationState) -> Presentation {
        use LineKind::*;
        let lines = match state {
            OrchestrationState::Rejected { reason } => {
                return Presentation::Alert(reason.to_string());
            }
            OrchestrationState::Idle => vec![StatusLine::new(
                Note,
                "Select a video of your squats to analyze.",
            )],
            OrchestrationState::Validating => {
                vec![StatusLine::new(Progress, "Checking your video...")]
            }
            OrchestrationState::Analyzing => vec![StatusLine::new(
                Progress,
                "Analyzing your video... Please wait.",
            )],
            OrchestrationState::AnalysisFailed { reason } => {
                vec![StatusLine::new(Error, analysis_failure(reason))]
            }
            OrchestrationState::AwaitingFeedback { squat_count } => count_so_far(*squat_count),
            OrchestrationState::FeedbackFailed {
                squat_count,
                reason,
            } => {
                let mut lines = count_so_far(*squat_count);
                lines.push(StatusLine::new(
                    Warning,
                    format!("AI feedback error: {}", reason.message),
                ));
                lines
            }
            OrchestrationState::Complete {
                squat_count,
                feedback,
            } => vec![
                StatusLine::new(Success, format!("Squat count: {squat_count}")),
                StatusLine::new(Heading, "AI Feedback:"),
                StatusLine::new(Body, feedback.trim()),
            ],
        };
        Presentation::Status(StatusBlock { lines })
    }
}

fn count_so_far(squat_count: u64) -> Vec<StatusLine> {
    vec![
        StatusLine::new(LineKind::Success, format!("Squat count: {squat_count}")),
        StatusLine::new(LineKind::Progress, "Generating AI feedback..."),
    ]
}

fn analysis_failure(reason: &FailureReason) -> String {
    match reason.origin {
        FailureOrigin::Transport => format!(
            "Upload failed: {}",
            truncate_chars(&reason.message, crate::model::TRANSPORT_DIAGNOSTIC_LIMIT)
        ),
        FailureOrigin::Application => format!("Error: {}", reason.message),
        FailureOrigin::Client => format!("Something went wrong: {}", reason.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rejection;
    use std::sync::Arc;

    fn render(state: OrchestrationState) -> Presentation {
        ResultPresenter::<SilentSink>::render(&state)
    }

    #[test]
    fn missing_video_is_an_alert() {
        let p = render(OrchestrationState::Rejected {
            reason: Rejection::MissingVideo,
        });
        assert_eq!(
            p,
            Presentation::Alert("Please select a video file first!".into())
        );
    }

    #[test]
    fn analyzing_is_in_progress() {
        let Presentation::Status(block) = render(OrchestrationState::Analyzing) else {
            panic!("expected status block");
        };
        assert_eq!(block.lines.len(), 1);
        assert_eq!(block.lines[0].kind, LineKind::Progress);
    }

    #[test]
    fn transport_failure_is_truncated() {
        // Reasons built elsewhere may carry a long body; the presenter still caps it.
        let reason = FailureReason {
            origin: FailureOrigin::Transport,
            message: "y".repeat(500),
        };
        let text = render(OrchestrationState::AnalysisFailed { reason }).plain_text();
        assert_eq!(text, format!("Upload failed: {}", "y".repeat(200)));
    }

    #[test]
    fn application_failure_is_not_truncated() {
        let long = "z".repeat(300);
        let text = render(OrchestrationState::AnalysisFailed {
            reason: FailureReason::application(long.clone()),
        })
        .plain_text();
        assert_eq!(text, format!("Error: {long}"));
    }

    #[test]
    fn partial_success_shows_count_and_pending_note() {
        let text = render(OrchestrationState::AwaitingFeedback { squat_count: 8 }).plain_text();
        assert!(text.contains("Squat count: 8"));
        assert!(text.contains("Generating AI feedback..."));
    }

    #[test]
    fn feedback_failure_keeps_count_and_appends_warning() {
        let partial = render(OrchestrationState::AwaitingFeedback { squat_count: 5 });
        let failed = render(OrchestrationState::FeedbackFailed {
            squat_count: 5,
            reason: FailureReason::application("rate limited"),
        });
        let (Presentation::Status(partial), Presentation::Status(failed)) = (partial, failed)
        else {
            panic!("expected status blocks");
        };
        assert_eq!(&failed.lines[..partial.lines.len()], &partial.lines[..]);
        let warning = failed.lines.last().unwrap();
        assert_eq!(warning.kind, LineKind::Warning);
        assert!(warning.text.contains("rate limited"));
    }

    #[test]
    fn complete_replaces_partial_message() {
        let text = render(OrchestrationState::Complete {
            squat_count: 12,
            feedback: "Good depth.".into(),
        })
        .plain_text();
        assert!(text.contains("12"));
        assert!(text.contains("Good depth."));
        assert!(!text.contains("Generating AI feedback"));
    }

    #[test]
    fn present_is_one_update_and_idempotent() {
        let sink = Arc::new(RecordingSink::default());
        let presenter = ResultPresenter::new(sink.clone());
        let state = OrchestrationState::AwaitingFeedback { squat_count: 3 };
        presenter.present(&state);
        presenter.present(&state);
        let updates = sink.updates();
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], updates[1]);
    }
}
