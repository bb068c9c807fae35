//! Terminal output routing.
//!
//! Everything user-facing goes through one writer task so that status blocks
//! from concurrent submissions and the messages of the post-processing step
//! never interleave mid-line.

use std::io::{LineWriter, Write};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLine {
    Stdout(String),
    Stderr(String),
    /// A rendered status block, written to stdout as one contiguous chunk.
    Block(Vec<String>),
}

pub type OutputSender = mpsc::UnboundedSender<OutputLine>;

/// Spawn the blocking stdout/stderr writer. The task ends once every sender is dropped.
pub fn spawn_output_writer() -> (OutputSender, JoinHandle<()>) {
    spawn_writer(std::io::stdout(), std::io::stderr())
}

fn spawn_writer<O, E>(out: O, err: E) -> (OutputSender, JoinHandle<()>)
where
    O: Write + Send + 'static,
    E: Write + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let mut out = LineWriter::new(out);
        let mut err = LineWriter::new(err);

        while let Some(line) = rx.blocking_recv() {
            let res = match line {
                OutputLine::Stdout(msg) => writeln!(out, "{msg}"),
                OutputLine::Stderr(msg) => writeln!(err, "{msg}"),
                OutputLine::Block(lines) => {
                    let mut chunk = lines.join("\n");
                    chunk.push('\n');
                    out.write_all(chunk.as_bytes())
                }
            };
            // Write errors such as a closed pipe are logged and otherwise ignored.
            if let Err(e) = res {
                tracing::debug!(error = %e, "terminal write failed");
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn blocks_go_to_stdout_and_messages_to_stderr() {
        let (out, err) = (SharedBuf::default(), SharedBuf::default());
        let (tx, handle) = spawn_writer(out.clone(), err.clone());

        tx.send(OutputLine::Block(vec![
            "✅ Squat count: 12".into(),
            "🤖 AI Feedback:".into(),
            "   Good depth.".into(),
        ]))
        .unwrap();
        tx.send(OutputLine::Stderr("Saved: /tmp/run.json".into()))
            .unwrap();
        tx.send(OutputLine::Stdout("done".into())).unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(
            out.text(),
            "✅ Squat count: 12\n🤖 AI Feedback:\n   Good depth.\ndone\n"
        );
        assert_eq!(err.text(), "Saved: /tmp/run.json\n");
    }
}
