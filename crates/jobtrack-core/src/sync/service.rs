//! Drives the external tasks and interprets what they report.
//!
//! The fetch task may hand over the emails it found by printing one JSON
//! object per line on stdout (the fields of [`NewEmail`]). Those lines are
//! merged into the email store; every other line is free text for the count
//! extractor. A task that writes the store itself, through the path in
//! [`EMAIL_DB_ENV`](crate::config::EMAIL_DB_ENV), prints only text.

use std::path::Path;

use jobtrack_fetch::{
    DateRange, Extraction, Mailbox, MatchedRule, ProcessTask, RawOutput, RunOutcome, SyncCounts,
    TaskRunner, body_arguments, extract, fetch_arguments,
};
use tracing::{error, info, warn};

use super::SyncError;
use crate::config::{AppConfig, Database};
use crate::email::{EmailRepository, MergeReport, NewEmail};

/// Result of a successful sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Counts for the run: the merge outcome when the task handed over
    /// emails, otherwise what the task's text reported.
    pub counts: SyncCounts,
    /// Extraction rule applied to the task's text.
    pub rule: MatchedRule,
    /// Emails the task handed over on stdout.
    pub candidates: Vec<NewEmail>,
    /// Outcome of merging `candidates`, once [`MailSync::sync`] stored them.
    pub merged: Option<MergeReport>,
    /// Everything the task printed.
    pub output: RawOutput,
}

/// Runs the fetch task (`F`) and the body task (`B`).
#[derive(Debug, Clone)]
pub struct MailSync<F, B = F> {
    fetcher: F,
    body_fetcher: B,
}

impl MailSync<ProcessTask> {
    /// Builds both tasks from configuration; relative script paths resolve
    /// against `base_dir`.
    #[must_use]
    pub fn from_config(config: &AppConfig, base_dir: &Path) -> Self {
        let email_db = config.db.database_path(Database::Emails);
        Self::new(
            config.fetch.fetch_task(base_dir, &email_db),
            config.fetch.body_task(base_dir),
        )
    }
}

impl<F: TaskRunner, B: TaskRunner> MailSync<F, B> {
    /// Creates a service from two runners.
    pub const fn new(fetcher: F, body_fetcher: B) -> Self {
        Self {
            fetcher,
            body_fetcher,
        }
    }

    /// Runs one sync for `mailbox`, optionally limited to `range`, without
    /// touching the store.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MailboxNotConfigured`] before spawning anything
    /// if the mailbox is incomplete; otherwise the classified task outcome.
    pub async fn fetch(
        &self,
        mailbox: &Mailbox,
        range: Option<&DateRange>,
    ) -> Result<SyncReport, SyncError> {
        if !mailbox.is_complete() {
            return Err(SyncError::MailboxNotConfigured);
        }

        info!(address = %mailbox.address, ?range, "Starting email sync");
        let outcome = self.fetcher.run(&fetch_arguments(mailbox, range)).await?;
        let output = into_success(outcome)?;

        let (candidates, text) = split_candidates(&output.stdout);
        let Extraction { counts, rule } = extract(&text);
        info!(
            processed = counts.processed,
            inserted = counts.inserted,
            candidates = candidates.len(),
            ?rule,
            "Email sync finished"
        );
        Ok(SyncReport {
            counts,
            rule,
            candidates,
            merged: None,
            output,
        })
    }

    /// Runs one sync and merges the emails the task handed over into `store`.
    ///
    /// # Errors
    ///
    /// Same as [`MailSync::fetch`], plus [`SyncError::Store`] if the merge
    /// fails.
    pub async fn sync(
        &self,
        mailbox: &Mailbox,
        range: Option<&DateRange>,
        store: &EmailRepository,
    ) -> Result<SyncReport, SyncError> {
        let mut report = self.fetch(mailbox, range).await?;
        if !report.candidates.is_empty() {
            let merged = store.merge(&report.candidates).await?;
            if merged.inserted != report.counts.inserted {
                warn!(
                    reported = report.counts.inserted,
                    inserted = merged.inserted,
                    "Task output disagrees with merge, using merge counts"
                );
            }
            report.counts = SyncCounts::new(merged.processed, merged.inserted);
            report.merged = Some(merged);
        }
        Ok(report)
    }

    /// Fetches one message body by its external id.
    ///
    /// # Errors
    ///
    /// Same as [`MailSync::fetch`].
    pub async fn fetch_body(
        &self,
        external_id: &str,
        mailbox: &Mailbox,
    ) -> Result<String, SyncError> {
        if !mailbox.is_complete() {
            return Err(SyncError::MailboxNotConfigured);
        }

        info!(external_id, "Fetching message body");
        let outcome = self
            .body_fetcher
            .run(&body_arguments(external_id, mailbox))
            .await?;
        Ok(into_success(outcome)?.stdout)
    }
}

/// Separates JSON candidate lines from the free text around them.
fn split_candidates(stdout: &str) -> (Vec<NewEmail>, String) {
    let mut candidates = Vec::new();
    let mut text = String::with_capacity(stdout.len());

    for line in stdout.lines() {
        if line.trim_start().starts_with('{') {
            match serde_json::from_str::<NewEmail>(line) {
                Ok(candidate) => {
                    candidates.push(candidate);
                    continue;
                }
                Err(e) => warn!(error = %e, "Unreadable email line in task output"),
            }
        }
        text.push_str(line);
        text.push('\n');
    }

    (candidates, text)
}

fn into_success(outcome: RunOutcome) -> Result<RawOutput, SyncError> {
    match outcome {
        RunOutcome::Success(output) => Ok(output),
        RunOutcome::Failure { reason, output } => {
            error!(%reason, stderr = %output.stderr, "Task failed");
            Err(SyncError::Failed {
                reason,
                stderr: output.stderr,
            })
        }
        RunOutcome::TimedOut {
            stage,
            reason,
            output,
        } => {
            warn!(?stage, %reason, "Task timed out");
            Err(SyncError::TimedOut {
                stage,
                reason,
                stderr: output.stderr,
            })
        }
    }
}
