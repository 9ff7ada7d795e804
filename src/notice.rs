//! User-facing notices raised by failed PIN verification
//!
//! The session decides *when* the user must be told something; rendering
//! the localized message is up to the host UI.

use parking_lot::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Wrong PIN, more attempts allowed
    IncorrectPin { remaining_attempts: u32 },
    /// Attempt ceiling reached or attempt made during a lockout
    LockedOut { remaining: Duration },
}

pub trait NoticeSink: Send + Sync {
    fn notify(&self, notice: &Notice);
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNoticeSink;

impl NoticeSink for LogNoticeSink {
    fn notify(&self, notice: &Notice) {
        match notice {
            Notice::IncorrectPin { remaining_attempts } => {
                log::warn!("Incorrect PIN, {} attempts remaining", remaining_attempts)
            }
            Notice::LockedOut { remaining } => {
                let secs = remaining.as_secs();
                log::warn!(
                    "Too many attempts, locked for {} min {} sec",
                    secs / 60,
                    secs % 60
                )
            }
        }
    }
}

/// Keeps every notice in memory, in order
#[derive(Debug, Default)]
pub struct RecordingNoticeSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNoticeSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().last().cloned()
    }
}

impl NoticeSink for RecordingNoticeSink {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().push(notice.clone());
    }
}
