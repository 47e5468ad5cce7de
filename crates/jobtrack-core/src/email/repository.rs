//! Email storage repository.

use chrono::NaiveDate;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite};
use tracing::{debug, info};

use super::model::{EmailRecord, EmailStats, KEY_PREFIX_CHARS, MergeReport, NewEmail};
use crate::{Error, Result, db};

const COLUMNS: &str = "id, imap_id, subject, sender, recipient, send_date, body, delivered";

/// Repository for synchronized emails.
///
/// The store enforces uniqueness of
/// `(imap_id, subject[..50], sender[..50], send_date[..50])`, with a missing
/// `imap_id` treated as the empty string. Inserting a duplicate is a silent
/// no-op.
pub struct EmailRepository {
    pool: SqlitePool,
}

impl EmailRepository {
    /// Opens the email store at `database_path`, creating the file, the
    /// table and its uniqueness index if they are missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        Self::with_pool(db::open_file(database_path).await?).await
    }

    /// A throwaway store, used by tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        Self::with_pool(db::open_memory().await?).await
    }

    async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS all_emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                imap_id TEXT,
                subject TEXT NOT NULL DEFAULT '',
                sender TEXT NOT NULL DEFAULT '',
                recipient TEXT NOT NULL DEFAULT '',
                send_date TEXT NOT NULL DEFAULT '',
                body TEXT,
                delivered INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        let n = KEY_PREFIX_CHARS;
        sqlx::query(&format!(
            r"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_all_emails_unique ON all_emails (
                COALESCE(imap_id, ''),
                substr(subject, 1, {n}),
                substr(sender, 1, {n}),
                substr(send_date, 1, {n})
            )
            "
        ))
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_all_emails_send_date ON all_emails(send_date)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All emails, newest `send_date` first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<EmailRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM all_emails ORDER BY send_date DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_email).collect())
    }

    /// Emails whose subject or body contains `keyword`, ignoring case.
    ///
    /// Case folding is Unicode-aware (`SQLite`'s `LOWER` folds ASCII only).
    /// A blank keyword returns everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn search(&self, keyword: &str) -> Result<Vec<EmailRecord>> {
        let keyword = keyword.trim();
        let emails = self.list().await?;
        if keyword.is_empty() {
            return Ok(emails);
        }

        let needle = keyword.to_lowercase();
        let contains = |text: &str| text.to_lowercase().contains(&needle);
        let matches: Vec<_> = emails
            .into_iter()
            .filter(|email| {
                contains(&email.subject) || email.body.as_deref().is_some_and(contains)
            })
            .collect();

        debug!(keyword, matches = matches.len(), "Searched emails");
        Ok(matches)
    }

    /// Looks up one email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: i64) -> Result<Option<EmailRecord>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM all_emails WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_email))
    }

    /// Inserts `email` unless an email with the same key is already stored.
    ///
    /// Returns whether a row was inserted.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn insert_if_absent(&self, email: &NewEmail) -> Result<bool> {
        insert_ignoring_duplicate(&self.pool, email).await
    }

    /// Inserts every new candidate, in input order, in one transaction.
    ///
    /// Merging the same batch again inserts nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails; no candidate of the
    /// batch is kept in that case.
    pub async fn merge(&self, emails: &[NewEmail]) -> Result<MergeReport> {
        let mut tx = self.pool.begin().await?;
        let mut report = MergeReport::default();

        for email in emails {
            report.processed += 1;
            if insert_ignoring_duplicate(&mut *tx, email).await? {
                report.inserted += 1;
            }
        }

        tx.commit().await?;
        info!(
            processed = report.processed,
            inserted = report.inserted,
            "Merged emails"
        );
        Ok(report)
    }

    /// Deletes one email.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no email has this id.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM all_emails WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Email {id}")));
        }
        debug!(id, "Deleted email");
        Ok(())
    }

    /// Sets the delivered flag and nothing else.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no email has this id.
    pub async fn set_delivered(&self, id: i64, delivered: bool) -> Result<()> {
        let result = sqlx::query("UPDATE all_emails SET delivered = ? WHERE id = ?")
            .bind(delivered)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Email {id}")));
        }
        debug!(id, delivered, "Updated delivered flag");
        Ok(())
    }

    /// Count and send-date bounds over the whole store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn stats(&self) -> Result<EmailStats> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total,
                   MIN(NULLIF(send_date, '')) AS earliest,
                   MAX(NULLIF(send_date, '')) AS latest
            FROM all_emails
            ",
        )
        .fetch_one(&self.pool)
        .await?;

        let total: i64 = row.get("total");
        Ok(EmailStats {
            total: u64::try_from(total).unwrap_or_default(),
            earliest: row.get("earliest"),
            latest: row.get("latest"),
        })
    }

    /// Emails whose `send_date` starts with `prefix`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn with_send_date_prefix(&self, prefix: &str) -> Result<Vec<EmailRecord>> {
        let pattern = format!("{}%", escape_like(prefix));
        let rows = sqlx::query(&format!(
            r"
            SELECT {COLUMNS}
            FROM all_emails
            WHERE send_date LIKE ? ESCAPE '\'
            ORDER BY send_date ASC, id ASC
            "
        ))
        .bind(&pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_email).collect())
    }

    /// Emails sent from the start of `start` to the end of `end`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn between(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<EmailRecord>> {
        let lower = format!("{} 00:00:00", start.format("%Y-%m-%d"));
        let upper = format!("{} 23:59:59", end.format("%Y-%m-%d"));
        let rows = sqlx::query(&format!(
            r"
            SELECT {COLUMNS}
            FROM all_emails
            WHERE send_date >= ? AND send_date <= ?
            ORDER BY send_date ASC, id ASC
            "
        ))
        .bind(&lower)
        .bind(&upper)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_email).collect())
    }

    /// All emails, oldest `send_date` first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_chronological(&self) -> Result<Vec<EmailRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM all_emails ORDER BY send_date ASC, id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_email).collect())
    }
}

async fn insert_ignoring_duplicate<'e, E>(executor: E, email: &NewEmail) -> Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r"
        INSERT INTO all_emails (imap_id, subject, sender, recipient, send_date, body)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(email.imap_id.as_deref())
    .bind(&email.subject)
    .bind(&email.sender)
    .bind(&email.recipient)
    .bind(&email.send_date)
    .bind(email.body.as_deref())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn row_to_email(row: &SqliteRow) -> EmailRecord {
    EmailRecord {
        id: row.get("id"),
        imap_id: row.get("imap_id"),
        subject: row.get("subject"),
        sender: row.get("sender"),
        recipient: row.get("recipient"),
        send_date: row.get("send_date"),
        body: row.get("body"),
        delivered: row.get("delivered"),
    }
}
