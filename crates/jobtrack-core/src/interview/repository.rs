//! Interview storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::info;

use super::model::{Interview, NewInterview};
use crate::{Result, db};
use crate::time::{from_storage, to_storage};

/// Repository for the interview schedule.
pub struct InterviewRepository {
    pool: SqlitePool,
}

impl InterviewRepository {
    /// Opens the schedule at `database_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        Self::with_pool(db::open_file(database_path).await?).await
    }

    /// An empty in-memory schedule.
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
            CREATE TABLE IF NOT EXISTS interviews (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company TEXT NOT NULL,
                position TEXT NOT NULL,
                datetime TEXT,
                preparation INTEGER NOT NULL DEFAULT 0,
                completion INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All interviews, earliest first; unscheduled ones lead.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Interview>> {
        let rows = sqlx::query(
            r"
            SELECT id, company, position, datetime, preparation, completion, created_at
            FROM interviews
            ORDER BY datetime ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_interview).collect())
    }

    /// Replaces the whole schedule with `interviews`.
    ///
    /// Either every row is replaced or nothing changes. An empty list leaves
    /// the schedule empty.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any entry lacks a company or position,
    /// or a database error if the transaction fails.
    pub async fn replace_all(&self, interviews: &[NewInterview]) -> Result<()> {
        for interview in interviews {
            interview.validate()?;
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM interviews")
            .execute(&mut *tx)
            .await?;

        for interview in interviews {
            sqlx::query(
                r"
                INSERT INTO interviews (company, position, datetime, preparation, completion)
                VALUES (?, ?, ?, ?, ?)
                ",
            )
            .bind(interview.company.trim())
            .bind(interview.position.trim())
            .bind(interview.datetime.as_ref().map(to_storage))
            .bind(interview.preparation)
            .bind(interview.completion)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(count = interviews.len(), "Replaced interview schedule");
        Ok(())
    }
}

fn row_to_interview(row: &SqliteRow) -> Interview {
    let datetime: Option<String> = row.get("datetime");
    Interview {
        id: row.get("id"),
        company: row.get("company"),
        position: row.get("position"),
        datetime: datetime.as_deref().and_then(from_storage),
        preparation: row.get("preparation"),
        completion: row.get("completion"),
        created_at: row.get("created_at"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::Error;
    use crate::time::parse_datetime;

    fn schedule() -> Vec<NewInterview> {
        vec![
            NewInterview::new("JD", "Sales").at(parse_datetime("2025-09-28T15:00").unwrap()),
            NewInterview::new("Tencent", "Frontend").at(parse_datetime("2025-09-20T09:00").unwrap()),
            NewInterview::new("Alibaba", "Java").at(parse_datetime("2025-09-22T14:00").unwrap()),
        ]
    }

    #[tokio::test]
    async fn test_list_ordered_by_datetime() {
        let repo = InterviewRepository::in_memory().await.unwrap();
        repo.replace_all(&schedule()).await.unwrap();

        let companies: Vec<_> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.company)
            .collect();
        assert_eq!(companies, ["Tencent", "Alibaba", "JD"]);
    }

    #[tokio::test]
    async fn test_replace_all_replaces() {
        let repo = InterviewRepository::in_memory().await.unwrap();
        repo.replace_all(&schedule()).await.unwrap();

        let mut next = NewInterview::new("ByteDance", "PM");
        next.preparation = true;
        repo.replace_all(&[next]).await.unwrap();

        let stored = repo.list().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].company, "ByteDance");
        assert!(stored[0].datetime.is_none());
        assert!(stored[0].preparation);
        assert!(!stored[0].completion);
    }

    #[tokio::test]
    async fn test_replace_all_with_empty_list() {
        let repo = InterviewRepository::in_memory().await.unwrap();
        repo.replace_all(&schedule()).await.unwrap();

        repo.replace_all(&[]).await.unwrap();
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_entry_leaves_schedule_untouched() {
        let repo = InterviewRepository::in_memory().await.unwrap();
        repo.replace_all(&schedule()).await.unwrap();

        let mut next = schedule();
        next.push(NewInterview::new("", "Nobody"));
        assert!(matches!(
            repo.replace_all(&next).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(repo.list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_datetime_round_trip() {
        let repo = InterviewRepository::in_memory().await.unwrap();
        repo.replace_all(&schedule()).await.unwrap();

        let first = &repo.list().await.unwrap()[0];
        assert_eq!(first.datetime, parse_datetime("2025-09-20T09:00"));
        assert!(!first.created_at.is_empty());
    }
}
