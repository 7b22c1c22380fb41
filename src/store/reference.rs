//! Reference-period baseline table

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

use super::{Db, StoreError};

/// One day of the reference period
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ReferenceDay {
    pub date: NaiveDate,
    /// 1 = Sunday .. 7 = Saturday
    pub dow: u32,
    pub mon: u32,
    pub fisc_mon: u32,
    pub ttl_earn: f64,
    pub day_wght: f64,
}

#[derive(Clone)]
pub struct ReferenceStore {
    db: Db,
}

impl ReferenceStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Swap the whole table for `rows`
    pub async fn replace_all(&self, rows: &[ReferenceDay]) -> Result<(), StoreError> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query("DELETE FROM ref_table").execute(&mut *tx).await?;
        for row in rows {
            sqlx::query(
                "INSERT INTO ref_table (date, dow, mon, fisc_mon, ttl_earn, day_wght)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(row.date)
            .bind(row.dow)
            .bind(row.mon)
            .bind(row.fisc_mon)
            .bind(row.ttl_earn)
            .bind(row.day_wght)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<ReferenceDay>, StoreError> {
        let rows = sqlx::query_as::<_, ReferenceDay>(
            "SELECT date, dow, mon, fisc_mon, ttl_earn, day_wght FROM ref_table ORDER BY date",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}
