use super::{LineKind, Presentation, StatusBlock};
use crate::output::{OutputLine, OutputSender};
use std::sync::{Arc, Mutex, PoisonError};

/// Destination for presentation updates.
pub trait StatusSink: Send + Sync {
    fn show(&self, presentation: Presentation);
}

impl<T: StatusSink + ?Sized> StatusSink for Arc<T> {
    fn show(&self, presentation: Presentation) {
        (**self).show(presentation)
    }
}

/// Writes status blocks to stdout and alerts to stderr.
pub struct TerminalSink {
    out: OutputSender,
}

impl TerminalSink {
    pub fn new(out: OutputSender) -> Self {
        Self { out }
    }
}

impl StatusSink for TerminalSink {
    fn show(&self, presentation: Presentation) {
        match presentation {
            Presentation::Alert(msg) => {
                let _ = self.out.send(OutputLine::Stderr(format!("! {msg}")));
            }
            Presentation::Status(block) => {
                let _ = self.out.send(OutputLine::Block(render_block(&block)));
            }
        }
    }
}

fn render_block(block: &StatusBlock) -> Vec<String> {
    let mut lines = vec![String::new()];
    for line in &block.lines {
        let marker = match line.kind {
            LineKind::Note => "",
            LineKind::Progress => "⏳ ",
            LineKind::Success => "✅ ",
            LineKind::Error => "❌ ",
            LineKind::Warning => "⚠️ ",
            LineKind::Heading => "🤖 ",
            LineKind::Body => "",
        };
        if line.kind == LineKind::Body {
            lines.extend(line.text.lines().map(|l| format!("   {l}")));
        } else {
            lines.push(format!("{marker}{}", line.text));
        }
    }
    lines
}

/// Discards updates (JSON and silent modes).
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentSink;

impl StatusSink for SilentSink {
    fn show(&self, _presentation: Presentation) {}
}

/// Keeps every update in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<Presentation>>,
}

impl RecordingSink {
    pub fn updates(&self) -> Vec<Presentation> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last(&self) -> Option<Presentation> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl StatusSink for RecordingSink {
    fn show(&self, presentation: Presentation) {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(presentation);
    }
}
