//! Point-of-sale orders

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

use super::{Db, StoreError};

/// Order ready for insertion
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_number: String,
    pub order_paid_date: NaiveDate,
    pub sales_associate: Option<String>,
    /// Currency units, not cents
    pub subtotal: f64,
    pub tip_total: f64,
}

/// Revenue of one associate on one day
#[derive(Debug, Clone, FromRow)]
pub struct DailyAssociateRevenue {
    pub work_date: NaiveDate,
    pub sales_associate: String,
    pub total_revenue: f64,
    pub order_count: i64,
}

/// Revenue of the whole store on one day
#[derive(Debug, Clone, FromRow)]
pub struct DailyRevenue {
    pub order_date: NaiveDate,
    pub daily_total: f64,
}

/// Per-associate sums over a date range
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssociateOrderSums {
    pub sales_associate: String,
    pub revenue: f64,
    pub tips: f64,
    pub order_count: i64,
}

/// Order store operations
#[derive(Clone)]
pub struct OrderStore {
    db: Db,
}

impl OrderStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert orders whose number is not stored yet. Returns how many were new.
    pub async fn insert_batch(&self, orders: &[NewOrder]) -> Result<u64, StoreError> {
        let mut tx = self.db.pool().begin().await?;
        let mut inserted = 0;
        for order in orders {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO orders
                    (order_number, order_date, order_paid_date,
                     sales_associate, subtotal, tip_total)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&order.order_number)
            .bind(order.order_paid_date)
            .bind(order.order_paid_date)
            .bind(&order.sales_associate)
            .bind(order.subtotal)
            .bind(order.tip_total)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Revenue and order count per (day, associate) within `[start, end]`
    pub async fn daily_associate_totals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyAssociateRevenue>, StoreError> {
        let rows = sqlx::query_as::<_, DailyAssociateRevenue>(
            "SELECT
                date(order_paid_date) AS work_date,
                sales_associate,
                COALESCE(SUM(subtotal), 0.0) AS total_revenue,
                COUNT(*) AS order_count
             FROM orders
             WHERE date(order_paid_date) >= ? AND date(order_paid_date) <= ?
               AND sales_associate IS NOT NULL
             GROUP BY date(order_paid_date), sales_associate
             ORDER BY work_date, sales_associate",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Store-wide revenue per day within `[start, end]`
    pub async fn daily_revenue_totals(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyRevenue>, StoreError> {
        let rows = sqlx::query_as::<_, DailyRevenue>(
            "SELECT
                date(order_paid_date) AS order_date,
                COALESCE(SUM(subtotal), 0.0) AS daily_total
             FROM orders
             WHERE date(order_paid_date) >= ? AND date(order_paid_date) <= ?
             GROUP BY date(order_paid_date)
             ORDER BY order_date",
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.db.pool())
        .await?;
        Ok(rows)
    }

    /// Revenue, tips and order counts per associate within `[start, end]`
    pub async fn associate_sums(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AssociateOrderSums>, StoreError> {
        let rows = sqlx::query_as::<_, AssociateOrderSums>(
            "SELECT
                sales_associate,
                COALESCE(SUM(subtotal), 0.0) AS revenue,
                COALESCE(SUM(tip_total), 0.0) AS tips,
                COUNT(*) AS order_count
             FROM orders
             WHERE date(order_paid_date) >= ? AND date(order_paid_date) <= ?
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

    /// Every associate name seen on an order or a club signup
    pub async fn all_associates(&self) -> Result<Vec<String>, StoreError> {
        let names = sqlx::query_scalar(
            "SELECT DISTINCT sales_associate FROM (
                SELECT sales_associate FROM orders WHERE sales_associate IS NOT NULL
                UNION
                SELECT sales_associate FROM clubs WHERE sales_associate IS NOT NULL
             )
             ORDER BY sales_associate",
        )
        .fetch_all(self.db.pool())
        .await?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn order(number: &str, date: NaiveDate, who: Option<&str>, subtotal: f64) -> NewOrder {
        NewOrder {
            order_number: number.to_string(),
            order_paid_date: date,
            sales_associate: who.map(String::from),
            subtotal,
            tip_total: subtotal * 0.2,
        }
    }

    #[tokio::test]
    async fn duplicate_order_numbers_are_ignored() {
        let store = OrderStore::new(Db::connect(":memory:").await.unwrap());
        let batch = vec![
            order("1001", d(2024, 3, 1), Some("Ana"), 100.0),
            order("1002", d(2024, 3, 1), Some("Ben"), 50.0),
        ];
        assert_eq!(store.insert_batch(&batch).await.unwrap(), 2);
        assert_eq!(store.insert_batch(&batch).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn daily_totals_group_by_day_and_associate() {
        let store = OrderStore::new(Db::connect(":memory:").await.unwrap());
        store
            .insert_batch(&[
                order("1", d(2024, 3, 1), Some("Ana"), 100.0),
                order("2", d(2024, 3, 1), Some("Ana"), 25.5),
                order("3", d(2024, 3, 1), Some("Ben"), 40.0),
                order("4", d(2024, 3, 2), None, 999.0),
                order("5", d(2024, 4, 1), Some("Ana"), 10.0),
            ])
            .await
            .unwrap();

        let rows = store
            .daily_associate_totals(d(2024, 3, 1), d(2024, 3, 31))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].sales_associate, "Ana");
        assert_eq!(rows[0].order_count, 2);
        assert!((rows[0].total_revenue - 125.5).abs() < 1e-9);

        // unattributed orders still count toward store revenue
        let daily = store
            .daily_revenue_totals(d(2024, 3, 1), d(2024, 3, 31))
            .await
            .unwrap();
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[1].order_date, d(2024, 3, 2));
        assert!((daily[1].daily_total - 999.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn associates_union_orders_and_clubs() {
        let db = Db::connect(":memory:").await.unwrap();
        let store = OrderStore::new(db.clone());
        store
            .insert_batch(&[order("1", d(2024, 3, 1), Some("Ben"), 10.0)])
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO clubs (club_id, club_signup_date, sales_associate)
             VALUES ('c1', '2024-03-01', 'Ana')",
        )
            .execute(db.pool())
            .await
            .unwrap();

        assert_eq!(store.all_associates().await.unwrap(), vec!["Ana", "Ben"]);
    }
}
