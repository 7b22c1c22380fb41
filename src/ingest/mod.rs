//! Commerce7 -> SQLite ingestion for orders and club signups

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use crate::commerce7::types::{next_cursor, ApiClubMembership, ApiOrder};
use crate::commerce7::{Commerce7Client, Commerce7Error, FIRST_CURSOR};
use crate::config::Config;
use crate::store::clubs::NewClub;
use crate::store::orders::NewOrder;
use crate::store::{ClubStore, Db, OrderStore, StoreError};
use crate::util::time::date_part;

/// Ingestion errors
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error(transparent)]
    Commerce7(#[from] Commerce7Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Pulls pages from Commerce7 and writes new rows to the store
#[derive(Clone)]
pub struct Ingestor {
    client: Commerce7Client,
    orders: OrderStore,
    clubs: ClubStore,
    excluded_vendors: Vec<String>,
    excluded_associates: Vec<String>,
}

impl Ingestor {
    pub fn new(client: Commerce7Client, db: Db, config: &Config) -> Self {
        Self {
            client,
            orders: OrderStore::new(db.clone()),
            clubs: ClubStore::new(db),
            excluded_vendors: config.excluded_vendors.clone(),
            excluded_associates: config.excluded_associates.clone(),
        }
    }

    /// Fetch every POS order paid in `[start, end]`. Returns how many were new.
    pub async fn ingest_orders(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<u64, IngestError> {
        info!(start = %start, end = %end, "Ingesting orders");

        let mut cursor = FIRST_CURSOR.to_string();
        let mut inserted = 0;
        loop {
            let page = self.client.order_page(&cursor, start, end).await?;
            let fetched = page.orders.len();
            let batch: Vec<NewOrder> = page
                .orders
                .iter()
                .filter_map(|o| convert_order(o, &self.excluded_vendors))
                .collect();

            let added = self.orders.insert_batch(&batch).await?;
            inserted += added;
            debug!(fetched, kept = batch.len(), added, total = inserted, "Order page stored");

            match next_cursor(page.cursor) {
                Some(next) => cursor = next,
                None => break,
            }
        }

        info!(inserted, "Order ingestion complete");
        Ok(inserted)
    }

    /// Fetch every club membership signed up in `[start, end]`. Returns how many were new.
    pub async fn ingest_clubs(&self, start: NaiveDate, end: NaiveDate) -> Result<u64, IngestError> {
        info!(start = %start, end = %end, "Ingesting club signups");

        let mut cursor = FIRST_CURSOR.to_string();
        let mut inserted = 0;
        loop {
            let page = self.client.club_page(&cursor, start, end).await?;
            let fetched = page.club_memberships.len();
            let batch: Vec<NewClub> = page
                .club_memberships
                .iter()
                .filter_map(|c| convert_club(c, &self.excluded_associates))
                .collect();

            let added = self.clubs.insert_batch(&batch).await?;
            inserted += added;
            debug!(fetched, kept = batch.len(), added, total = inserted, "Club page stored");

            match next_cursor(page.cursor) {
                Some(next) => cursor = next,
                None => break,
            }
        }

        info!(inserted, "Club ingestion complete");
        Ok(inserted)
    }
}

fn cents(amount: Option<f64>) -> f64 {
    amount.map(|c| c / 100.0).unwrap_or(0.0)
}

/// Map an API order to a storable row, or `None` when it must be skipped
pub fn convert_order(order: &ApiOrder, excluded_vendors: &[String]) -> Option<NewOrder> {
    if let Some(vendor) = &order.external_order_vendor {
        if excluded_vendors.iter().any(|v| v == vendor) {
            return None;
        }
    }

    let subtotal = cents(order.sub_total);
    if subtotal == 0.0 {
        return None;
    }

    let Some(order_number) = &order.order_number else {
        warn!(id = ?order.id, "Order without an order number, skipping");
        return None;
    };
    let Some(paid) = order.order_paid_date.as_deref().and_then(date_part) else {
        warn!(order_number = %order_number, "Order without a paid date, skipping");
        return None;
    };

    Some(NewOrder {
        order_number: order_number.to_string(),
        order_paid_date: paid,
        sales_associate: order.sales_associate.as_ref().and_then(|s| s.name.clone()),
        subtotal,
        tip_total: cents(order.tip_total),
    })
}

/// Map an API club membership to a storable row, or `None` when it must be skipped
pub fn convert_club(
    membership: &ApiClubMembership,
    excluded_associates: &[String],
) -> Option<NewClub> {
    let associate = membership.sales_associate.as_ref()?.name.clone()?;
    if excluded_associates.iter().any(|a| *a == associate) {
        return None;
    }

    let Some(signup) = membership.signup_date.as_deref().and_then(date_part) else {
        warn!(club_id = %membership.id, "Club membership without a signup date, skipping");
        return None;
    };

    Some(NewClub {
        club_id: membership.id.to_string(),
        club_name: membership.club.as_ref().and_then(|c| c.title.clone()),
        club_signup_date: signup,
        sales_associate: associate,
    })
}
