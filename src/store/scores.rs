//! Daily SommScores

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

use super::{Db, StoreError};

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ScoreRow {
    pub score_date: NaiveDate,
    pub sales_associate: String,
    pub daily_score: f64,
}

/// Score store operations
#[derive(Clone)]
pub struct ScoreStore {
    db: Db,
}

impl ScoreStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Replace every stored score on the dates present in `rows` with `rows`.
    pub async fn replace_dates(&self, rows: &[ScoreRow]) -> Result<(), StoreError> {
        let dates: BTreeSet<NaiveDate> = rows.iter().map(|r| r.score_date).collect();

        let mut tx = self.db.pool().begin().await?;
        for date in &dates {
            sqlx::query("DELETE FROM somm_scores WHERE score_date = ?")
                .bind(*date)
                .execute(&mut *tx)
                .await?;
        }
        for row in rows {
            sqlx::query(
                "INSERT OR REPLACE INTO somm_scores (score_date, sales_associate, daily_score)
                 VALUES (?, ?, ?)",
            )
            .bind(row.score_date)
            .bind(&row.sales_associate)
            .bind(row.daily_score)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Scores on or after `start`, ordered by date then associate
    pub async fn scores_since(&self, start: NaiveDate) -> Result<Vec<ScoreRow>, StoreError> {
        let rows = sqlx::query_as::<_, ScoreRow>(
            "SELECT score_date, sales_associate, daily_score
             FROM somm_scores
             WHERE score_date >= ?
             ORDER BY score_date ASC, sales_associate",
        )
        .bind(start)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    pub async fn all_scores(&self) -> Result<Vec<ScoreRow>, StoreError> {
        let rows = sqlx::query_as::<_, ScoreRow>(
            "SELECT score_date, sales_associate, daily_score
             FROM somm_scores
             ORDER BY score_date ASC, sales_associate",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}
