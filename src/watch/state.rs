//! The data a Watch Controller threads between its startup sequence,
//! background pollers, and reconnect cycles — per SPEC_FULL §3's
//! "Watch State".

use std::sync::atomic::{AtomicBool, AtomicU32};
use std::sync::Arc;

/// Shared, lock-free flags and the last-known debuggee pid, read and
/// written from multiple background tasks (stdout watcher, liveness
/// poller, the reattach routine itself).
#[derive(Default)]
pub struct WatchFlags {
    pub reconnecting: AtomicBool,
    pub early_cleanup_done: AtomicBool,
    pub last_child_pid: AtomicU32,
    pub stopped: AtomicBool,
}

impl WatchFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}
