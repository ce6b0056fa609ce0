//! Derived session status and the bounded output ring buffer, per SPEC_FULL
//! §3's "Session Status (derived, not stored)" and output-buffer invariant.

use std::collections::VecDeque;

const OUTPUT_BUFFER_CAPACITY: usize = 100;

/// The coarse state a session is observed in from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStateKind {
    Running,
    Stopped,
    Reconnecting,
    Terminated,
}

/// What the Transport's last `stopped` event reported, cached until the
/// next `continue` (or a fresh stop) clears or replaces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopInfo {
    pub reason: String,
    pub thread_id: Option<i64>,
}

/// Status snapshot returned by the `status` tool — computed fresh each
/// call, never stored as its own field on Session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionStateKind,
    pub stop_reason: Option<String>,
    pub stopped_thread_id: Option<i64>,
    pub process_id: Option<u32>,
    pub uptime_secs: Option<u64>,
    pub breakpoint_count: usize,
    pub output_line_count: usize,
}

/// A FIFO capped at [`OUTPUT_BUFFER_CAPACITY`] lines; oldest entries drop
/// once the cap is exceeded. Fed by both DAP `output` events and
/// Watch Controller informational messages (bracket-tagged by the caller).
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    lines: VecDeque<String>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self { lines: VecDeque::new() }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() >= OUTPUT_BUFFER_CAPACITY {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The last `n` entries, oldest-first (newest-last), matching the
    /// `output` tool's contract.
    pub fn last(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }
}
