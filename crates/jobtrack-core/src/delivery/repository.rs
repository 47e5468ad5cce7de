//! Delivery storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use tracing::debug;

use super::model::{Delivery, NewDelivery};
use crate::{Error, Result, db};

const DUPLICATE: &str = "delivery record";

/// Repository for the application log.
///
/// `(company_name, delivery_date, status)` is unique.
pub struct DeliveryRepository {
    pool: SqlitePool,
}

impl DeliveryRepository {
    /// Opens the application log at `database_path`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        Self::with_pool(db::open_file(database_path).await?).await
    }

    /// In-memory log for tests.
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
            CREATE TABLE IF NOT EXISTS deliveries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                company_name TEXT NOT NULL,
                delivery_date TEXT NOT NULL,
                status TEXT NOT NULL,
                UNIQUE (company_name, delivery_date, status)
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All deliveries, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Delivery>> {
        let rows = sqlx::query(
            r"
            SELECT id, company_name, delivery_date, status
            FROM deliveries
            ORDER BY delivery_date DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_delivery).collect())
    }

    /// Adds a delivery and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for missing fields or a bad date, and
    /// [`Error::Duplicate`] if the same record already exists.
    pub async fn insert(&self, delivery: &NewDelivery) -> Result<i64> {
        let delivery = delivery.normalized()?;
        let result = sqlx::query(
            r"
            INSERT INTO deliveries (company_name, delivery_date, status)
            VALUES (?, ?, ?)
            ",
        )
        .bind(&delivery.company_name)
        .bind(&delivery.delivery_date)
        .bind(&delivery.status)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::from_write(e, DUPLICATE))?;

        let id = result.last_insert_rowid();
        debug!(id, company = %delivery.company_name, "Added delivery");
        Ok(id)
    }

    /// Overwrites every field of an existing delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id, [`Error::Duplicate`] if
    /// the new values collide with another record, and [`Error::Validation`]
    /// for bad input.
    pub async fn update(&self, id: i64, delivery: &NewDelivery) -> Result<()> {
        let delivery = delivery.normalized()?;
        let result = sqlx::query(
            r"
            UPDATE deliveries
            SET company_name = ?, delivery_date = ?, status = ?
            WHERE id = ?
            ",
        )
        .bind(&delivery.company_name)
        .bind(&delivery.delivery_date)
        .bind(&delivery.status)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::from_write(e, DUPLICATE))?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Delivery {id}")));
        }
        debug!(id, "Updated delivery");
        Ok(())
    }

    /// Removes a delivery.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM deliveries WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Delivery {id}")));
        }
        debug!(id, "Deleted delivery");
        Ok(())
    }
}

fn row_to_delivery(row: &SqliteRow) -> Delivery {
    Delivery {
        id: row.get("id"),
        company_name: row.get("company_name"),
        delivery_date: row.get("delivery_date"),
        status: row.get("status"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_and_list() {
        let repo = DeliveryRepository::in_memory().await.unwrap();
        let first = repo
            .insert(&NewDelivery::new("Acme", "2025-09-01", "applied"))
            .await
            .unwrap();
        let second = repo
            .insert(&NewDelivery::new("Globex", "2025-09-05 10:00", "interview"))
            .await
            .unwrap();
        assert_ne!(first, second);

        let list = repo.list().await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].company_name, "Globex");
        assert_eq!(list[0].delivery_date, "2025-09-05 10:00:00");
        assert_eq!(list[1].id, first);
    }

    #[tokio::test]
    async fn test_duplicate_insert() {
        let repo = DeliveryRepository::in_memory().await.unwrap();
        repo.insert(&NewDelivery::new("Acme", "2025-09-01", "applied"))
            .await
            .unwrap();

        // Same record after normalization.
        let err = repo
            .insert(&NewDelivery::new("Acme ", "2025-09-01T00:00", "applied"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate(_)));

        repo.insert(&NewDelivery::new("Acme", "2025-09-01", "rejected"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update() {
        let repo = DeliveryRepository::in_memory().await.unwrap();
        let id = repo
            .insert(&NewDelivery::new("Acme", "2025-09-01", "applied"))
            .await
            .unwrap();

        repo.update(id, &NewDelivery::new("Acme", "2025-09-01", "offer"))
            .await
            .unwrap();
        assert_eq!(repo.list().await.unwrap()[0].status, "offer");
    }

    #[tokio::test]
    async fn test_update_collision_and_missing() {
        let repo = DeliveryRepository::in_memory().await.unwrap();
        repo.insert(&NewDelivery::new("Acme", "2025-09-01", "applied"))
            .await
            .unwrap();
        let id = repo
            .insert(&NewDelivery::new("Acme", "2025-09-01", "rejected"))
            .await
            .unwrap();

        assert!(matches!(
            repo.update(id, &NewDelivery::new("Acme", "2025-09-01", "applied"))
                .await,
            Err(Error::Duplicate(_))
        ));
        assert!(matches!(
            repo.update(999, &NewDelivery::new("Acme", "2025-09-02", "applied"))
                .await,
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete() {
        let repo = DeliveryRepository::in_memory().await.unwrap();
        let id = repo
            .insert(&NewDelivery::new("Acme", "2025-09-01", "applied"))
            .await
            .unwrap();

        repo.delete(id).await.unwrap();
        assert!(repo.list().await.unwrap().is_empty());
        assert!(matches!(repo.delete(id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_invalid_input_never_reaches_storage() {
        let repo = DeliveryRepository::in_memory().await.unwrap();
        assert!(matches!(
            repo.insert(&NewDelivery::new("", "2025-09-01", "applied")).await,
            Err(Error::Validation(_))
        ));
        assert!(repo.list().await.unwrap().is_empty());
    }
}
