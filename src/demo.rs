//! Fake data for demo mode

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::info;

use crate::scoring::{self, day_weight};
use crate::store::clubs::NewClub;
use crate::store::orders::NewOrder;
use crate::store::reference::ReferenceDay;
use crate::store::{ClubStore, Db, OrderStore, ReferenceStore, SettingsStore, StoreError};
use crate::util::time::date_range;

pub const DEMO_ASSOCIATES: [&str; 10] = [
    "Sarah Johnson",
    "Michael Chen",
    "Emily Rodriguez",
    "David Kim",
    "Jessica Martinez",
    "Robert Wilson",
    "Jennifer Lee",
    "Christopher Brown",
    "Amanda Taylor",
    "Daniel Garcia",
];

const DEMO_DAYS: i64 = 365;

#[derive(Debug, Default)]
pub struct DemoData {
    pub orders: Vec<NewOrder>,
    pub clubs: Vec<NewClub>,
    pub reference: Vec<ReferenceDay>,
}

fn cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn is_weekday(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn pick(rng: &mut ChaCha8Rng) -> String {
    DEMO_ASSOCIATES[rng.gen_range(0..DEMO_ASSOCIATES.len())].to_string()
}

/// Build a year of data ending at `today`
pub fn generate(rng: &mut ChaCha8Rng, today: NaiveDate) -> DemoData {
    let days = date_range(today - Duration::days(DEMO_DAYS), today);
    let mut data = DemoData::default();

    for &date in days.iter().filter(|d| is_weekday(**d)) {
        for _ in 0..rng.gen_range(5..=15) {
            let subtotal = cents(rng.gen_range(50.0..500.0));
            let tip_total = cents(subtotal * rng.gen_range(0.15..0.25));
            data.orders.push(NewOrder {
                order_number: format!("ORD-{:06}", data.orders.len() + 1),
                order_paid_date: date,
                sales_associate: Some(pick(rng)),
                subtotal,
                tip_total,
            });
        }
    }

    for &date in &days {
        for _ in 0..rng.gen_range(0..=3) {
            data.clubs.push(NewClub {
                club_id: format!("club_{}", data.clubs.len() + 1),
                club_name: None,
                club_signup_date: date,
                sales_associate: pick(rng),
            });
        }
    }

    data.reference = days
        .iter()
        .map(|&date| ReferenceDay {
            date,
            dow: date.weekday().number_from_sunday(),
            mon: date.month(),
            fisc_mon: date.month(),
            ttl_earn: cents(rng.gen_range(1000.0..5000.0)),
            day_wght: day_weight(date),
        })
        .collect();

    data
}

/// Seeded generator, or one seeded from OS entropy
pub fn demo_rng(seed: Option<u64>) -> ChaCha8Rng {
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    }
}

/// Wipe the database and fill it with generated data, then score it
pub async fn load_demo(db: &Db, seed: Option<u64>, today: NaiveDate) -> Result<(), StoreError> {
    info!(seed = ?seed, "Generating demo data");
    let mut rng = demo_rng(seed);
    let data = generate(&mut rng, today);

    db.clear_data().await?;

    let settings = SettingsStore::new(db.clone());
    let associates: Vec<String> = DEMO_ASSOCIATES.iter().map(|s| s.to_string()).collect();
    settings.set_active_associates(&associates).await?;

    let orders = OrderStore::new(db.clone()).insert_batch(&data.orders).await?;
    let clubs = ClubStore::new(db.clone()).insert_batch(&data.clubs).await?;
    ReferenceStore::new(db.clone()).replace_all(&data.reference).await?;
    info!(orders, clubs, reference_days = data.reference.len(), "Demo data stored");

    let start = today - Duration::days(DEMO_DAYS);
    scoring::recalculate(db, start, today).await?;
    settings.set_last_update(today).await?;

    info!("Demo data generation complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ScoreStore;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    #[test]
    fn orders_only_on_weekdays_within_bounds() {
        let data = generate(&mut demo_rng(Some(7)), today());

        assert!(!data.orders.is_empty());
        assert_eq!(data.orders[0].order_number, "ORD-000001");
        for order in &data.orders {
            assert!(is_weekday(order.order_paid_date));
            assert!((50.0..=500.0).contains(&order.subtotal));
            let ratio = order.tip_total / order.subtotal;
            assert!((0.149..=0.251).contains(&ratio), "tip ratio {ratio}");
            let who = order.sales_associate.as_deref().unwrap();
            assert!(DEMO_ASSOCIATES.contains(&who));
        }

        let mut per_day = std::collections::HashMap::new();
        for order in &data.orders {
            *per_day.entry(order.order_paid_date).or_insert(0) += 1;
        }
        assert!(per_day.values().all(|n| (5..=15).contains(n)));

        let picked: std::collections::HashSet<_> =
            data.orders.iter().filter_map(|o| o.sales_associate.as_deref()).collect();
        assert_eq!(picked.len(), DEMO_ASSOCIATES.len());
    }

    #[test]
    fn clubs_and_reference_cover_every_day() {
        let data = generate(&mut demo_rng(Some(7)), today());

        assert_eq!(data.reference.len(), 366);
        assert!(data.reference.iter().all(|r| (1000.0..=5000.0).contains(&r.ttl_earn)));
        assert!(data.reference.iter().all(|r| r.fisc_mon == r.mon));
        if let Some(first) = data.clubs.first() {
            assert_eq!(first.club_id, "club_1");
        }
        assert!(data.clubs.len() <= 366 * 3);
    }

    #[test]
    fn same_seed_same_data() {
        let a = generate(&mut demo_rng(Some(42)), today());
        let b = generate(&mut demo_rng(Some(42)), today());
        assert_eq!(a.orders, b.orders);
        assert_eq!(a.clubs, b.clubs);
    }

    #[tokio::test]
    async fn load_demo_scores_everyone() {
        let db = Db::connect(":memory:").await.unwrap();
        load_demo(&db, Some(3), today()).await.unwrap();

        let settings = SettingsStore::new(db.clone()).load().await.unwrap();
        assert_eq!(settings.active_associates.len(), 10);
        assert!(settings.is_initialized());

        let scores = ScoreStore::new(db.clone()).all_scores().await.unwrap();
        assert!(!scores.is_empty());
        assert!(scores.iter().all(|s| (0.0..=100.0).contains(&s.daily_score)));
    }
}
