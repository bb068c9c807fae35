//! Upload → analysis → feedback sequence for a single submission.

use crate::engine::{CoachApi, HttpReply, PreflightChecks};
use crate::model::{
    feedback_prompt, AnalysisResult, FailureReason, FeedbackResult, OrchestrationState,
    SubmissionInput,
};
use crate::presenter::{ResultPresenter, StatusSink};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::Instrument;

/// Monotonic identifier of a submission; the highest issued id is the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SubmissionId(pub u64);

/// How a submission ended.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: SubmissionId,
    pub state: OrchestrationState,
    /// A newer submission started first, so `state` was never presented.
    pub superseded: bool,
}

pub struct UploadOrchestrator<A, S> {
    api: A,
    presenter: ResultPresenter<S>,
    checks: PreflightChecks,
    /// Last id handed out by [`begin`](UploadOrchestrator::begin).
    issued: AtomicU64,
    /// Highest id whose input passed local validation.
    latest: AtomicU64,
    // Serializes "is this run still current?" with the presentation it guards.
    present_gate: Mutex<()>,
}

impl<A: CoachApi, S: StatusSink> UploadOrchestrator<A, S> {
    pub fn new(api: A, sink: S, checks: PreflightChecks) -> Self {
        Self {
            api,
            presenter: ResultPresenter::new(sink),
            checks,
            issued: AtomicU64::new(0),
            latest: AtomicU64::new(0),
            present_gate: Mutex::new(()),
        }
    }

    /// Id of the newest submission that passed local validation (0 before the first one).
    pub fn latest_id(&self) -> SubmissionId {
        SubmissionId(self.latest.load(Ordering::SeqCst))
    }

    /// Maximum upload size enforced by the local checks.
    pub fn max_upload_bytes(&self) -> u64 {
        self.checks.max_upload_bytes
    }

    /// Reserve the id of the next submission.
    ///
    /// Ids order submissions by when the user made them, so callers that load
    /// input asynchronously reserve before loading and pass the id to [`run`](Self::run).
    pub fn begin(&self) -> SubmissionId {
        SubmissionId(self.issued.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Run one submission to a terminal state.
    ///
    /// A submission that passes local validation supersedes every run with a
    /// lower id. A superseded run stops at its next continuation without
    /// presenting anything and returns the last state it reached. Rejected
    /// input supersedes nothing.
    pub async fn submit(&self, input: SubmissionInput) -> OrchestrationState {
        self.submit_tracked(input).await.state
    }

    /// Like [`submit`](Self::submit), also reporting the run's id and whether it
    /// was superseded.
    pub async fn submit_tracked(&self, input: SubmissionInput) -> Submission {
        let id = self.begin();
        self.run(id, input).await
    }

    /// Run a submission under an id reserved with [`begin`](Self::begin).
    pub async fn run(&self, id: SubmissionId, input: SubmissionInput) -> Submission {
        let span = tracing::info_span!("submission", id = id.0);
        let (state, presented) = self.drive(id, input).instrument(span).await;
        Submission {
            id,
            state,
            superseded: !presented,
        }
    }

    /// Returns the state reached and whether it was presented.
    async fn drive(&self, id: SubmissionId, input: SubmissionInput) -> (OrchestrationState, bool) {
        let video = match self.checks.validate(&input) {
            Ok(video) => video,
            Err(reason) => {
                tracing::info!(%reason, "submission rejected locally");
                let state = OrchestrationState::Rejected { reason };
                self.alert(&state);
                return (state, true);
            }
        };
        self.latest.fetch_max(id.0, Ordering::SeqCst);

        let state = OrchestrationState::Analyzing;
        if !self.advance(id, &state) {
            return (state, false);
        }

        let state = match self.api.analyze(video).await {
            Ok(reply) => interpret_analysis(&reply),
            Err(e) => {
                tracing::warn!(error = %e, "analysis request failed");
                OrchestrationState::AnalysisFailed {
                    reason: FailureReason::client(e.to_string()),
                }
            }
        };
        if !self.advance(id, &state) {
            return (state, false);
        }
        let OrchestrationState::AwaitingFeedback { squat_count } = state else {
            return (state, true);
        };

        let state = match self.api.feedback(&feedback_prompt(squat_count)).await {
            Ok(reply) => interpret_feedback(squat_count, &reply),
            Err(e) => {
                tracing::warn!(error = %e, "feedback request failed");
                OrchestrationState::FeedbackFailed {
                    squat_count,
                    reason: FailureReason::client(e.to_string()),
                }
            }
        };
        let presented = self.advance(id, &state);
        (state, presented)
    }

    /// Show a local rejection. Alerts leave the status region alone, so they
    /// are shown whatever the live submission is.
    fn alert(&self, state: &OrchestrationState) {
        let _gate = self
            .present_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        self.presenter.present(state);
    }

    /// Present `state` if `id` is still the live submission. Returns whether it was.
    fn advance(&self, id: SubmissionId, state: &OrchestrationState) -> bool {
        let _gate = self
            .present_gate
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let latest = self.latest.load(Ordering::SeqCst);
        if latest != id.0 {
            tracing::debug!(
                latest,
                state = state.label(),
                "discarding continuation of superseded submission"
            );
            return false;
        }
        tracing::info!(
            state = state.label(),
            phase = ?state.phase(),
            squat_count = ?state.squat_count(),
            "transition"
        );
        self.presenter.present(state);
        true
    }
}

/// Decide what an analysis reply means.
///
/// Failed or non-JSON replies are never parsed; their raw body becomes the diagnostic.
pub(crate) fn interpret_analysis(reply: &HttpReply) -> OrchestrationState {
    if !reply.is_success() || !reply.is_json() {
        tracing::warn!(
            status = reply.status,
            content_type = ?reply.content_type,
            "analysis returned a non-JSON or failed response"
        );
        return OrchestrationState::AnalysisFailed {
            reason: FailureReason::transport(&reply.text()),
        };
    }
    match AnalysisResult::from_json(&reply.body) {
        Ok(AnalysisResult::Counted { squat_count }) => {
            OrchestrationState::AwaitingFeedback { squat_count }
        }
        Ok(AnalysisResult::Failed { error }) => OrchestrationState::AnalysisFailed {
            reason: FailureReason::application(error),
        },
        Err(e) => OrchestrationState::AnalysisFailed {
            reason: FailureReason::client(e.to_string()),
        },
    }
}

/// Decide what a feedback reply means. The count is carried into every outcome.
pub(crate) fn interpret_feedback(squat_count: u64, reply: &HttpReply) -> OrchestrationState {
    match FeedbackResult::from_json(&reply.body) {
        Ok(FeedbackResult::Feedback { text }) => OrchestrationState::Complete {
            squat_count,
            feedback: text,
        },
        Ok(FeedbackResult::Failed { error }) => OrchestrationState::FeedbackFailed {
            squat_count,
            reason: FailureReason::application(error),
        },
        Err(e) => {
            tracing::warn!(status = reply.status, error = %e, "feedback reply could not be decoded");
            OrchestrationState::FeedbackFailed {
                squat_count,
                reason: FailureReason::client(e.to_string()),
            }
        }
    }
}
