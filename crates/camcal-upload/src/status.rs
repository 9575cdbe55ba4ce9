use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use camcal_types::UploadStatusCode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadStatus {
    pub message: String,
    pub code: UploadStatusCode,
}

impl UploadStatus {
    fn idle() -> Self {
        Self {
            message: String::new(),
            code: UploadStatusCode::Idle,
        }
    }
}

#[derive(Debug, Default)]
struct StatusInner {
    message: String,
    hide_at: Option<Instant>,
    running: bool,
}

/// Human-readable upload status with read-triggered expiry
#[derive(Debug, Default)]
pub struct StatusBoard {
    inner: Mutex<StatusInner>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StatusInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin_cycle(&self) {
        let mut inner = self.lock();
        inner.running = true;
        inner.hide_at = None;
        inner.message = "Looking for files to upload...".to_string();
    }

    /// `uploads_done` is the count already completed this cycle
    pub fn progress(&self, uploads_done: usize) {
        let mut inner = self.lock();
        inner.message = format!("Uploading file {}", uploads_done + 1);
    }

    /// Posts the cycle summary, visible until `now + hide_after`
    ///
    /// With no summary the message is cleared straight away.
    pub fn finish_cycle(&self, summary: Option<String>, now: Instant, hide_after: Duration) {
        let mut inner = self.lock();
        inner.running = false;
        match summary {
            Some(message) => {
                inner.message = message;
                // Too far out to represent means never hide
                inner.hide_at = now.checked_add(hide_after);
            }
            None => {
                inner.message.clear();
                inner.hide_at = None;
            }
        }
    }

    /// Ends a cycle that was interrupted before it could report
    pub fn abort_cycle(&self) {
        let mut inner = self.lock();
        inner.running = false;
        inner.message.clear();
        inner.hide_at = None;
    }

    /// Current message and code; an expired message is cleared by this read
    pub fn snapshot(&self, now: Instant) -> UploadStatus {
        let mut inner = self.lock();
        if inner.message.is_empty() {
            return UploadStatus::idle();
        }
        if inner.hide_at.is_some_and(|hide_at| now >= hide_at) {
            inner.message.clear();
            inner.hide_at = None;
            return UploadStatus::idle();
        }

        let code = if inner.running {
            UploadStatusCode::InProgress
        } else {
            UploadStatusCode::Completed
        };
        UploadStatus {
            message: inner.message.clone(),
            code,
        }
    }
}
