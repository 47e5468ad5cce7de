//! Sync failures.

use jobtrack_fetch::{ExitReason, Termination};
use thiserror::Error;

/// Ways a sync or body fetch can fail.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Address, secret or host is missing.
    #[error("Mailbox is not configured: address, password and IMAP server are required")]
    MailboxNotConfigured,

    /// The task ran past its time limit and was terminated.
    #[error("Fetch task timed out ({reason})")]
    TimedOut {
        /// Last termination stage reached.
        stage: Termination,
        /// Observed exit reason.
        reason: ExitReason,
        /// Captured standard error.
        stderr: String,
    },

    /// The task ended unsuccessfully on its own.
    #[error("Fetch task failed ({reason})")]
    Failed {
        /// Observed exit reason.
        reason: ExitReason,
        /// Captured standard error.
        stderr: String,
    },

    /// The task could not be started.
    #[error(transparent)]
    Launch(#[from] jobtrack_fetch::Error),

    /// The emails the task handed over could not be stored.
    #[error(transparent)]
    Store(#[from] crate::Error),
}

impl SyncError {
    /// Captured stderr, when there is any.
    #[must_use]
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            Self::TimedOut { stderr, .. } | Self::Failed { stderr, .. }
                if !stderr.trim().is_empty() =>
            {
                Some(stderr)
            }
            _ => None,
        }
    }
}
