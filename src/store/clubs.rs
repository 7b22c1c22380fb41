//! Club membership signups

use chrono::NaiveDate;
use sqlx::FromRow;

use super::{Db, StoreError};

/// Club signup ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewClub {
    pub club_id: String,
    pub club_name: Option<String>,
    pub club_signup_date: NaiveDate,
    pub sales_associate: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct DailyAssociateSignups {
    pub signup_date: NaiveDate,
    pub sales_associate: String,
    pub total_clubs: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct AssociateSignups {
    pub sales_associate: String,
    pub club_count: i64,
}

/// Signup volume over a range
#[derive(Debug, Clone, Copy, Default, FromRow)]
pub struct SignupStats {
    pub signups: i64,
    pub signup_days: i64,
}

impl SignupStats {
    /// Average signups per day that had at least one signup
    pub fn daily_average(&self) -> Option<f64> {
        (self.signup_days > 0).then(|| self.signups as f64 / self.signup_days as f64)
    }
}

/// Club store operations
#[derive(Clone)]
pub struct ClubStore {
    db: Db,
}

impl ClubStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert signups whose id is not stored yet. Returns how many were new.
    pub async fn insert_batch(&self, clubs: &[NewClub]) -> Result<u64, StoreError> {
        let mut tx = self.db.pool().begin().await?;
        let mut inserted = 0;
        for club in clubs {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO clubs (club_id, club_name, club_signup_date, sales_associate)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&club.club_id)
            .bind(&club.club_name)
            .bind(club.club_signup_date)
            .bind(&club.sales_associate)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn daily_associate_counts(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyAssociateSignups>, StoreError> {
        let rows = sqlx::query_as::<_, DailyAssociateSignups>(
            "SELECT
                date(club_signup_date) AS signup_date,
                sales_associate,
                COUNT(*) AS total_clubs
             FROM clubs
             WHERE date(club_signup_date) >= ? AND date(club_signup_date) <= ?
               AND sales_associate IS NOT NULL
             GROUP BY date(club_signup_date), sales_associate",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    pub async fn signup_stats(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<SignupStats, StoreError> {
        let stats = sqlx::query_as::<_, SignupStats>(
            "SELECT
                COUNT(*) AS signups,
                COUNT(DISTINCT date(club_signup_date)) AS signup_days
             FROM clubs
             WHERE date(club_signup_date) >= ? AND date(club_signup_date) <= ?",
        )
        .bind(start)
        .bind(end)
        .fetch_one(self.db.pool())
        .await?;
        Ok(stats)
    }

    pub async fn associate_counts(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AssociateSignups>, StoreError> {
        let rows = sqlx::query_as::<_, AssociateSignups>(
            "SELECT sales_associate, COUNT(*) AS club_count
             FROM clubs
             WHERE date(club_signup_date) >= ? AND date(club_signup_date) <= ?
               AND sales_associate IS NOT NULL
             GROUP BY sales_associate
             ORDER BY sales_associate",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn club(id: &str, date: NaiveDate, who: &str) -> NewClub {
        NewClub {
            club_id: id.to_string(),
            club_name: Some("Reserve".to_string()),
            club_signup_date: date,
            sales_associate: who.to_string(),
        }
    }

    #[tokio::test]
    async fn stats_count_distinct_days() {
        let store = ClubStore::new(Db::connect(":memory:").await.unwrap());
        let inserted = store
            .insert_batch(&[
                club("a", d(2024, 2, 1), "Ana"),
                club("b", d(2024, 2, 1), "Ben"),
                club("c", d(2024, 2, 3), "Ana"),
                club("a", d(2024, 2, 1), "Ana"),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, 3);

        let stats = store.signup_stats(d(2024, 2, 1), d(2024, 2, 29)).await.unwrap();
        assert_eq!(stats.signups, 3);
        assert_eq!(stats.signup_days, 2);
        assert_eq!(stats.daily_average(), Some(1.5));

        let per_associate = store.associate_counts(d(2024, 2, 1), d(2024, 2, 29)).await.unwrap();
        assert_eq!(per_associate[0].sales_associate, "Ana");
        assert_eq!(per_associate[0].club_count, 2);
    }

    #[tokio::test]
    async fn empty_range_has_no_average() {
        let store = ClubStore::new(Db::connect(":memory:").await.unwrap());
        let stats = store.signup_stats(d(2024, 1, 1), d(2024, 1, 31)).await.unwrap();
        assert_eq!(stats.daily_average(), None);
    }
}
