//! Email data models.

use serde::{Deserialize, Serialize};

/// Characters of subject, sender and send date that take part in the
/// uniqueness key.
pub const KEY_PREFIX_CHARS: usize = 50;

/// A stored email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    /// Surrogate key.
    pub id: i64,
    /// Identifier assigned by the mail source.
    pub imap_id: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Sender address or display name.
    pub sender: String,
    /// Recipient address.
    pub recipient: String,
    /// Textual timestamp, compared lexicographically.
    pub send_date: String,
    /// Message body, if it was fetched.
    pub body: Option<String>,
    /// Whether the user marked the email as an application.
    pub delivered: bool,
}

/// A candidate email produced by a sync or an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewEmail {
    /// Identifier assigned by the mail source.
    pub imap_id: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Sender.
    pub sender: String,
    /// Recipient.
    pub recipient: String,
    /// Textual timestamp.
    pub send_date: String,
    /// Message body.
    pub body: Option<String>,
}

impl NewEmail {
    /// Creates a candidate without an external id or body.
    #[must_use]
    pub fn new(
        subject: impl Into<String>,
        sender: impl Into<String>,
        recipient: impl Into<String>,
        send_date: impl Into<String>,
    ) -> Self {
        Self {
            imap_id: None,
            subject: subject.into(),
            sender: sender.into(),
            recipient: recipient.into(),
            send_date: send_date.into(),
            body: None,
        }
    }

    /// Sets the external id.
    #[must_use]
    pub fn with_imap_id(mut self, imap_id: impl Into<String>) -> Self {
        self.imap_id = Some(imap_id.into());
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// The tuple that identifies this email for deduplication.
    #[must_use]
    pub fn dedup_key(&self) -> (String, String, String, String) {
        (
            self.imap_id.clone().unwrap_or_default(),
            key_prefix(&self.subject),
            key_prefix(&self.sender),
            key_prefix(&self.send_date),
        )
    }
}

fn key_prefix(value: &str) -> String {
    value.chars().take(KEY_PREFIX_CHARS).collect()
}

/// Outcome of merging a batch of candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Candidates examined.
    pub processed: u64,
    /// Candidates that were new.
    pub inserted: u64,
}

/// Summary figures over the whole store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmailStats {
    /// Number of stored emails.
    pub total: u64,
    /// Smallest non-empty send date.
    pub earliest: Option<String>,
    /// Largest non-empty send date.
    pub latest: Option<String>,
}
