//! Progress sinks: caller-owned, append-only logs of status lines

use std::sync::{Arc, Mutex};

use crate::deploy::process::OutputObserver;

/// Prefix marking lines that came from a command's standard error
pub const STDERR_PREFIX: &str = "! ";

/// Append-only destination for progress lines of one orchestration run
pub trait ProgressSink: Send + Sync {
    fn append(&self, line: &str);
}

/// In-memory progress log
#[derive(Debug, Clone, Default)]
pub struct ProgressLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line appended so far
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProgressSink for ProgressLog {
    fn append(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(line.to_string());
    }
}

/// Forwards command output into a progress sink
pub struct SinkObserver<'a> {
    sink: &'a dyn ProgressSink,
}

impl<'a> SinkObserver<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink }
    }
}

impl OutputObserver for SinkObserver<'_> {
    fn on_output(&self, line: &str) {
        self.sink.append(line);
    }

    fn on_error(&self, line: &str) {
        self.sink.append(&format!("{STDERR_PREFIX}{line}"));
    }
}
