use crate::engine::{CoachClient, PreflightChecks};
use crate::model::{
    RunConfig, SubmissionInput, DEFAULT_ALLOWED_EXTENSIONS, DEFAULT_MAX_UPLOAD_BYTES,
};
use crate::orchestrator::{
    process_submission, run_controller, Submission, SubmissionSummary, UiCommand,
    UploadOrchestrator,
};
use crate::output::{spawn_output_writer, OutputLine, OutputSender};
use crate::presenter::{self, SilentSink, StatusSink, TerminalSink};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Parser, Clone)]
#[command(
    name = "squat-coach",
    version,
    about = "Upload a squat video, get a rep count and AI coaching feedback"
)]
pub struct Cli {
    /// Video to analyze (mp4, avi, mov, mkv)
    pub video: Option<PathBuf>,

    /// Base URL of the analysis service
    #[arg(long, default_value = "http://127.0.0.1:5000")]
    pub base_url: String,

    /// Base URL of the feedback service (defaults to --base-url)
    #[arg(long)]
    pub feedback_url: Option<String>,

    /// Multipart field name carrying the video
    #[arg(long, default_value = "video")]
    pub upload_field: String,

    /// Per-request timeout
    #[arg(long, default_value = "120s")]
    pub timeout: humantime::Duration,

    /// Largest video accepted for upload, in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_size: u64,

    /// Upload files regardless of extension
    #[arg(long)]
    pub any_extension: bool,

    /// Print JSON result and exit
    #[arg(long)]
    pub json: bool,

    /// Print text status updates (default)
    #[arg(long)]
    pub text: bool,

    /// Run silently: suppress all output except errors (for scripting)
    #[arg(long)]
    pub silent: bool,

    /// Read video paths from stdin, one submission per line
    #[arg(long, conflicts_with = "video")]
    pub interactive: bool,

    /// Print the analysis service's model status and exit
    #[arg(long)]
    pub api_status: bool,

    /// Export the run record as JSON
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Use --auto-save true or --auto-save false to override
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub auto_save: bool,

    /// Do not print the header and footer
    #[arg(long)]
    pub no_chrome: bool,
}

pub async fn run(args: Cli) -> Result<()> {
    // Validate that --silent can only be used with --json
    if args.silent && !args.json {
        return Err(anyhow::anyhow!(
            "--silent can only be used with --json. Use --silent --json together."
        ));
    }
    if args.interactive && (args.json || args.silent) {
        return Err(anyhow::anyhow!(
            "--interactive prints text status updates and cannot be combined with --json."
        ));
    }

    let cfg = build_config(&args);
    tracing::debug!(?cfg, "configuration");

    if args.api_status {
        return run_api_status(&cfg, args.json).await;
    }
    if args.interactive {
        return run_interactive(args, cfg).await;
    }
    run_single(args, cfg).await
}

/// Build a `RunConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> RunConfig {
    RunConfig {
        base_url: args.base_url.clone(),
        feedback_url: args
            .feedback_url
            .clone()
            .unwrap_or_else(|| args.base_url.clone()),
        upload_field: args.upload_field.clone(),
        timeout: Duration::from(args.timeout),
        max_upload_bytes: args.max_upload_size,
        allowed_extensions: if args.any_extension {
            None
        } else {
            Some(
                DEFAULT_ALLOWED_EXTENSIONS
                    .iter()
                    .map(|e| e.to_string())
                    .collect(),
            )
        },
        user_agent: format!("squat-coach-cli/{}", env!("CARGO_PKG_VERSION")),
    }
}

async fn run_api_status(cfg: &RunConfig, json: bool) -> Result<()> {
    let client = CoachClient::new(cfg)?;
    let status = client
        .api_status()
        .await
        .context("failed to fetch service status")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    println!(
        "Current model: {}",
        status.current_model.as_deref().unwrap_or("-")
    );
    println!(
        "Available models: {}/{}",
        status.available_models, status.total_models
    );
    if !status.working_models.is_empty() {
        println!("Working: {}", status.working_models.join(", "));
    }
    if !status.failed_models.is_empty() {
        println!("Quota exhausted: {}", status.failed_models.join(", "));
    }
    println!(
        "Quota reset: {} (in {})",
        status.quota_reset.as_deref().unwrap_or("-"),
        status.time_until_reset.as_deref().unwrap_or("-")
    );
    Ok(())
}

async fn run_single(args: Cli, cfg: RunConfig) -> Result<()> {
    let text_mode = !args.json;
    let (out_tx, out_handle) = spawn_output_writer();
    let client = CoachClient::new(&cfg)?;

    if text_mode && !args.no_chrome {
        let _ = out_tx.send(OutputLine::Stdout(presenter::navbar()));
    }

    let input = SubmissionInput::load(args.video.as_deref(), cfg.max_upload_bytes).await;
    let summary = SubmissionSummary::from(&input);
    let started = Instant::now();
    let submission = if text_mode {
        submit_once(client, TerminalSink::new(out_tx.clone()), &cfg, input).await
    } else {
        submit_once(client, SilentSink, &cfg, input).await
    };

    let processed = process_submission(
        &cfg,
        submission.id,
        &summary,
        submission.state,
        started.elapsed(),
        args.auto_save,
        args.export_json.as_deref(),
    );

    if args.json && !args.silent {
        let out = serde_json::to_string_pretty(&processed.record)?;
        let _ = out_tx.send(OutputLine::Stdout(out));
    }
    if !args.silent {
        report_post_process(&out_tx, &processed.export_messages, processed.auto_saved_path);
    }
    if text_mode && !args.no_chrome {
        let _ = out_tx.send(OutputLine::Stdout(String::new()));
        let _ = out_tx.send(OutputLine::Stdout(presenter::footer()));
    }

    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

async fn submit_once<S: StatusSink>(
    client: CoachClient,
    sink: S,
    cfg: &RunConfig,
    input: SubmissionInput,
) -> Submission {
    let orchestrator = UploadOrchestrator::new(client, sink, PreflightChecks::from(cfg));
    orchestrator.submit_tracked(input).await
}

fn report_post_process(
    out: &OutputSender,
    export_messages: &[String],
    auto_saved_path: Option<PathBuf>,
) {
    for msg in export_messages {
        let _ = out.send(OutputLine::Stderr(msg.clone()));
    }
    if let Some(p) = auto_saved_path {
        let _ = out.send(OutputLine::Stderr(format!("Saved: {}", p.display())));
    }
}

async fn run_interactive(args: Cli, cfg: RunConfig) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();
    let client = CoachClient::new(&cfg)?;
    let orchestrator = Arc::new(UploadOrchestrator::new(
        client,
        TerminalSink::new(out_tx.clone()),
        PreflightChecks::from(&cfg),
    ));

    if !args.no_chrome {
        let _ = out_tx.send(OutputLine::Stdout(presenter::navbar()));
    }
    let _ = out_tx.send(OutputLine::Stderr(
        "Enter a video path per line (`quit` to exit).".into(),
    ));

    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<UiCommand>();
    let input_task = spawn_stdin_reader(cmd_tx.clone());
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cmd_tx.send(UiCommand::Quit);
        }
    });

    let res = run_controller(&args, &cfg, orchestrator, out_tx.clone(), cmd_rx).await;

    input_task.abort();
    signal_task.abort();
    if !args.no_chrome {
        let _ = out_tx.send(OutputLine::Stdout(String::new()));
        let _ = out_tx.send(OutputLine::Stdout(presenter::footer()));
    }
    drop(out_tx);
    let _ = out_handle.await;
    res
}

/// Forward stdin lines as commands. EOF is treated as quit.
fn spawn_stdin_reader(cmd_tx: mpsc::UnboundedSender<UiCommand>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let cmd = match lines.next_line().await {
                Ok(Some(line)) => parse_command(&line),
                Ok(None) | Err(_) => UiCommand::Quit,
            };
            let quit = cmd == UiCommand::Quit;
            if cmd_tx.send(cmd).is_err() || quit {
                break;
            }
        }
    })
}

fn parse_command(line: &str) -> UiCommand {
    match line.trim() {
        "quit" | "exit" | "q" => UiCommand::Quit,
        "" => UiCommand::Submit(None),
        path => UiCommand::Submit(Some(PathBuf::from(path))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_url_defaults_to_base() {
        let args = Cli::parse_from(["squat-coach", "--base-url", "http://coach.local:8080"]);
        let cfg = build_config(&args);
        assert_eq!(cfg.feedback_url, "http://coach.local:8080");
        assert_eq!(cfg.timeout, Duration::from_secs(120));
        assert_eq!(cfg.upload_field, "video");
        assert_eq!(cfg.allowed_extensions.as_ref().map(Vec::len), Some(4));
    }

    #[test]
    fn any_extension_disables_allow_list() {
        let args = Cli::parse_from(["squat-coach", "--any-extension", "clip.webm"]);
        assert!(build_config(&args).allowed_extensions.is_none());
        assert_eq!(args.video, Some(PathBuf::from("clip.webm")));
    }

    #[test]
    fn interactive_conflicts_with_positional_video() {
        assert!(Cli::try_parse_from(["squat-coach", "--interactive", "squat.mp4"]).is_err());
    }

    #[tokio::test]
    async fn silent_requires_json() {
        let args = Cli::parse_from(["squat-coach", "--silent"]);
        let err = run(args).await.unwrap_err();
        assert!(err.to_string().contains("--silent"));
    }

    #[test]
    fn stdin_lines_map_to_commands() {
        assert_eq!(parse_command("  quit "), UiCommand::Quit);
        assert_eq!(parse_command(""), UiCommand::Submit(None));
        assert_eq!(
            parse_command("videos/leg day.mp4"),
            UiCommand::Submit(Some(PathBuf::from("videos/leg day.mp4")))
        );
    }
}
