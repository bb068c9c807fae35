//! Interactive session controller.
//!
//! Turns user commands into submissions and post-processes each one as it finishes.
//! Submissions are not serialized: a new command starts a new run immediately and the
//! orchestrator's latest-submission guard decides what gets shown.

use super::post_process::{process_submission, SubmissionSummary};
use super::{Submission, UploadOrchestrator};
use crate::cli::Cli;
use crate::engine::CoachApi;
use crate::model::{RunConfig, SubmissionInput};
use crate::output::{OutputLine, OutputSender};
use crate::presenter::StatusSink;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinSet;

/// Commands emitted by the input layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    /// Submit the video at the given path; `None` means nothing was selected.
    Submit(Option<PathBuf>),
    Quit,
}

type Finished = (Submission, SubmissionSummary, Duration);

/// Drive submissions from `cmd_rx` until quit, then wait for runs still in flight.
pub async fn run_controller<A, S>(
    args: &Cli,
    cfg: &RunConfig,
    orchestrator: Arc<UploadOrchestrator<A, S>>,
    out: OutputSender,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()>
where
    A: CoachApi + 'static,
    S: StatusSink + 'static,
{
    let mut in_flight: JoinSet<Finished> = JoinSet::new();
    let mut quit_pending = false;

    loop {
        if quit_pending && in_flight.is_empty() {
            break Ok(());
        }

        tokio::select! {
            cmd = cmd_rx.recv(), if !quit_pending => {
                match cmd {
                    Some(UiCommand::Submit(path)) => {
                        // The id is taken in command order; loading may finish out of order.
                        let id = orchestrator.begin();
                        let orchestrator = orchestrator.clone();
                        in_flight.spawn(async move {
                            let started = Instant::now();
                            let input =
                                SubmissionInput::load(path.as_deref(), orchestrator.max_upload_bytes())
                                    .await;
                            let summary = SubmissionSummary::from(&input);
                            let submission = orchestrator.run(id, input).await;
                            (submission, summary, started.elapsed())
                        });
                    }
                    Some(UiCommand::Quit) | None => {
                        // Quit waits for outstanding runs so their records are not lost.
                        quit_pending = true;
                        if !in_flight.is_empty() {
                            let _ = out.send(OutputLine::Stderr(format!(
                                "Waiting for {} submission(s) to finish…",
                                in_flight.len()
                            )));
                        }
                    }
                }
            }
            maybe_done = async {
                if in_flight.is_empty() {
                    futures::future::pending().await
                } else {
                    in_flight.join_next().await
                }
            } => {
                match maybe_done {
                    Some(Ok(finished)) => finish(args, cfg, &out, finished),
                    Some(Err(e)) => {
                        let _ = out.send(OutputLine::Stderr(format!("Submission task failed: {e}")));
                    }
                    None => {}
                }
            }
        }
    }
}

fn finish(args: &Cli, cfg: &RunConfig, out: &OutputSender, finished: Finished) {
    let (submission, summary, elapsed) = finished;
    if submission.superseded {
        tracing::debug!(id = submission.id.0, "superseded submission finished; not recorded");
        return;
    }
    let processed = process_submission(
        cfg,
        submission.id,
        &summary,
        submission.state,
        elapsed,
        args.auto_save,
        args.export_json.as_deref(),
    );
    for msg in processed.export_messages {
        let _ = out.send(OutputLine::Stderr(msg));
    }
    if let Some(p) = processed.auto_saved_path {
        let _ = out.send(OutputLine::Stderr(format!("Saved: {}", p.display())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{HttpReply, PreflightChecks, ServiceError};
    use crate::model::VideoFile;
    use crate::presenter::RecordingSink;
    use async_trait::async_trait;
    use clap::Parser;
    use tokio::sync::mpsc;

    struct FixedApi;

    #[async_trait]
    impl CoachApi for FixedApi {
        async fn analyze(&self, _video: &VideoFile) -> Result<HttpReply, ServiceError> {
            Ok(HttpReply::json(200, r#"{"squat_count": 6}"#))
        }

        async fn feedback(&self, _prompt: &str) -> Result<HttpReply, ServiceError> {
            Ok(HttpReply::json(200, r#"{"feedback": "Solid reps."}"#))
        }
    }

    #[tokio::test]
    async fn controller_runs_submissions_until_quit() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("squat.mp4");
        std::fs::write(&video, b"not really a video").unwrap();
        let export = dir.path().join("last.json");

        let args = Cli::parse_from([
            "squat-coach",
            "--interactive",
            "--auto-save",
            "false",
            "--export-json",
            export.to_str().unwrap(),
        ]);
        let cfg = crate::cli::build_config(&args);
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = Arc::new(UploadOrchestrator::new(
            FixedApi,
            sink.clone(),
            PreflightChecks::default(),
        ));
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        cmd_tx.send(UiCommand::Submit(None)).unwrap();
        cmd_tx.send(UiCommand::Submit(Some(video))).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();

        run_controller(&args, &cfg, orchestrator, out_tx, cmd_rx)
            .await
            .unwrap();

        let texts: Vec<String> = sink.updates().iter().map(|p| p.plain_text()).collect();
        assert!(texts.iter().any(|t| t == "Please select a video file first!"));
        assert!(texts
            .last()
            .map(|t| t.contains("Squat count: 6") && t.contains("Solid reps."))
            .unwrap_or(false));
        assert!(export.exists());

        let mut stderr = Vec::new();
        while let Ok(line) = out_rx.try_recv() {
            stderr.push(line);
        }
        assert!(stderr
            .iter()
            .any(|l| matches!(l, OutputLine::Stderr(m) if m.starts_with("Exported JSON"))));
    }

    /// Counts two squats for large uploads and one for small ones.
    struct SizeCountingApi;

    #[async_trait]
    impl CoachApi for SizeCountingApi {
        async fn analyze(&self, video: &VideoFile) -> Result<HttpReply, ServiceError> {
            let n = if video.len() > 1024 * 1024 { 2 } else { 1 };
            Ok(HttpReply::json(200, format!(r#"{{"squat_count": {n}}}"#)))
        }

        async fn feedback(&self, prompt: &str) -> Result<HttpReply, ServiceError> {
            let n = if prompt.contains("completed 2 squats") { 2 } else { 1 };
            Ok(HttpReply::json(200, format!(r#"{{"feedback": "advice for {n}"}}"#)))
        }
    }

    #[tokio::test]
    async fn later_command_wins_over_slower_loading_file() {
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("big.mp4");
        let small = dir.path().join("small.mp4");
        std::fs::write(&big, vec![7u8; 8 * 1024 * 1024]).unwrap();
        std::fs::write(&small, b"tiny clip").unwrap();

        let args = Cli::parse_from(["squat-coach", "--interactive", "--auto-save", "false"]);
        let cfg = crate::cli::build_config(&args);
        let sink = Arc::new(RecordingSink::default());
        let orchestrator = Arc::new(UploadOrchestrator::new(
            SizeCountingApi,
            sink.clone(),
            PreflightChecks::default(),
        ));
        let (out_tx, _out_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        cmd_tx.send(UiCommand::Submit(Some(big))).unwrap();
        cmd_tx.send(UiCommand::Submit(Some(small))).unwrap();
        cmd_tx.send(UiCommand::Quit).unwrap();

        run_controller(&args, &cfg, orchestrator.clone(), out_tx, cmd_rx)
            .await
            .unwrap();

        let last = sink.last().unwrap().plain_text();
        assert!(last.contains("Squat count: 1"), "last update: {last}");
        assert!(last.contains("advice for 1"), "last update: {last}");
        assert_eq!(orchestrator.latest_id(), crate::orchestrator::SubmissionId(2));
    }
}
