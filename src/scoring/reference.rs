//! Reference-period baseline: one row per day of the year before scoring starts

use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::info;

use super::day_weight;
use super::period::month_day;
use crate::store::reference::ReferenceDay;
use crate::store::{Db, OrderStore, ReferenceStore, Settings, StoreError, YearType};
use crate::util::time::date_range;

/// `[start - 366 days, start - 1 day]`
pub fn reference_period(start: NaiveDate) -> (NaiveDate, NaiveDate) {
    (start - Duration::days(366), start - Duration::days(1))
}

/// Month counted from the fiscal start month (1-based)
pub fn fiscal_month(month: u32, fiscal_start_month: Option<u32>) -> u32 {
    match fiscal_start_month {
        Some(start) => (month + 12 - start) % 12 + 1,
        None => month,
    }
}

/// Raw reference rows for `[start, end]` with each day's total revenue
pub fn generate_reference(
    start: NaiveDate,
    end: NaiveDate,
    fiscal_start_month: Option<u32>,
    daily_totals: &HashMap<NaiveDate, f64>,
) -> Vec<ReferenceDay> {
    date_range(start, end)
        .into_iter()
        .map(|date| ReferenceDay {
            date,
            dow: date.weekday().number_from_sunday(),
            mon: date.month(),
            fisc_mon: fiscal_month(date.month(), fiscal_start_month),
            ttl_earn: daily_totals.get(&date).copied().unwrap_or(0.0),
            day_wght: day_weight(date),
        })
        .collect()
}

#[derive(Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Replace every (month, weekday) cell's earnings by a smoothed average.
///
/// Only days with earnings count. A cell uses its own average when it has at
/// least two such days, then the average of the neighbouring months for that
/// weekday, then the weekday's average over the whole period, then 0.
pub fn normalize_reference(rows: &[ReferenceDay]) -> Vec<ReferenceDay> {
    let mut monthly: HashMap<(u32, u32), Mean> = HashMap::new();
    let mut overall: HashMap<u32, Mean> = HashMap::new();
    for row in rows.iter().filter(|r| r.ttl_earn > 0.0) {
        monthly.entry((row.mon, row.dow)).or_default().add(row.ttl_earn);
        overall.entry(row.dow).or_default().add(row.ttl_earn);
    }

    let adjacent = |mon: u32, dow: u32| -> Option<f64> {
        let prev = if mon > 1 { mon - 1 } else { 12 };
        let next = if mon < 12 { mon + 1 } else { 1 };
        let mut mean = Mean::default();
        for m in [prev, next] {
            if let Some(cell) = monthly.get(&(m, dow)) {
                mean.sum += cell.sum;
                mean.count += cell.count;
            }
        }
        mean.value()
    };

    let mut cells: HashMap<(u32, u32), f64> = HashMap::new();
    for mon in 1..=12 {
        for dow in 1..=7 {
            let value = match monthly.get(&(mon, dow)) {
                Some(cell) if cell.count >= 2 => cell.sum / cell.count as f64,
                _ => adjacent(mon, dow)
                    .or_else(|| overall.get(&dow).and_then(Mean::value))
                    .unwrap_or(0.0),
            };
            cells.insert((mon, dow), value);
        }
    }

    rows.iter()
        .map(|row| ReferenceDay {
            ttl_earn: cells.get(&(row.mon, row.dow)).copied().unwrap_or(0.0),
            ..row.clone()
        })
        .collect()
}

/// Generate, normalize and store the reference table for a scoring year
/// beginning at `start`. Returns the number of rows written.
pub async fn build_reference(
    db: &Db,
    settings: &Settings,
    start: NaiveDate,
) -> Result<usize, StoreError> {
    let (ref_start, ref_end) = reference_period(start);
    let fiscal_start_month = match settings.year_type {
        YearType::Fiscal => month_day(&settings.fiscal_year_start).map(|(m, _)| m),
        YearType::Calendar => None,
    };

    let totals: HashMap<NaiveDate, f64> = OrderStore::new(db.clone())
        .daily_revenue_totals(ref_start, ref_end)
        .await?
        .into_iter()
        .map(|d| (d.order_date, d.daily_total))
        .collect();

    let raw = generate_reference(ref_start, ref_end, fiscal_start_month, &totals);
    let days_with_data = raw.iter().filter(|r| r.ttl_earn > 0.0).count();
    let normalized = normalize_reference(&raw);
    ReferenceStore::new(db.clone()).replace_all(&normalized).await?;

    info!(
        start = %ref_start,
        end = %ref_end,
        days = normalized.len(),
        days_with_data,
        "Reference table generated"
    );
    Ok(normalized.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn cell(date: NaiveDate, earn: f64) -> ReferenceDay {
        ReferenceDay {
            date,
            dow: date.weekday().number_from_sunday(),
            mon: date.month(),
            fisc_mon: date.month(),
            ttl_earn: earn,
            day_wght: day_weight(date),
        }
    }

    #[test]
    fn period_is_the_366_days_before_start() {
        assert_eq!(reference_period(d(2024, 1, 1)), (d(2022, 12, 31), d(2023, 12, 31)));
    }

    #[test]
    fn generated_rows_use_sunday_first_weekdays() {
        let totals = HashMap::from([(d(2024, 3, 3), 900.0)]);
        let rows = generate_reference(d(2024, 3, 3), d(2024, 3, 9), Some(7), &totals);

        assert_eq!(rows.len(), 7);
        // 2024-03-03 is a Sunday
        assert_eq!(rows[0].dow, 1);
        assert_eq!(rows[0].ttl_earn, 900.0);
        assert_eq!(rows[0].day_wght, 1.0);
        assert_eq!(rows[1].dow, 2);
        assert_eq!(rows[1].day_wght, 1.5);
        assert_eq!(rows[6].dow, 7);
        assert_eq!(rows[0].fisc_mon, 9);
        assert!(rows.iter().skip(1).all(|r| r.ttl_earn == 0.0));
    }

    #[test]
    fn fiscal_month_wraps() {
        assert_eq!(fiscal_month(7, Some(7)), 1);
        assert_eq!(fiscal_month(6, Some(7)), 12);
        assert_eq!(fiscal_month(1, Some(7)), 7);
        assert_eq!(fiscal_month(4, None), 4);
    }

    #[test]
    fn normalization_fallbacks() {
        // Mondays in March 2023: 6, 13, 20, 27. Mondays in April: 3, 10.
        let rows = vec![
            cell(d(2023, 3, 6), 100.0),
            cell(d(2023, 3, 13), 300.0),
            cell(d(2023, 3, 20), 0.0),
            // April Monday with a single data point borrows from March and May
            cell(d(2023, 4, 3), 1000.0),
            cell(d(2023, 4, 10), 0.0),
            // Tuesday in June with no neighbours falls back to all Tuesdays
            cell(d(2023, 6, 6), 0.0),
            cell(d(2023, 1, 3), 40.0),
            // Wednesday without any earnings anywhere
            cell(d(2023, 3, 1), 0.0),
        ];
        let normalized = normalize_reference(&rows);

        // March Mondays: own average over days with data
        assert_eq!(normalized[0].ttl_earn, 200.0);
        assert_eq!(normalized[2].ttl_earn, 200.0);
        // April Mondays: adjacent months (March only has data)
        assert_eq!(normalized[3].ttl_earn, 200.0);
        assert_eq!(normalized[4].ttl_earn, 200.0);
        // June Tuesday: overall Tuesday average
        assert_eq!(normalized[5].ttl_earn, 40.0);
        // January Tuesday has one data point, no neighbours: overall Tuesday average
        assert_eq!(normalized[6].ttl_earn, 40.0);
        assert_eq!(normalized[7].ttl_earn, 0.0);
    }

    #[test]
    fn adjacent_months_wrap_around_the_year() {
        // Sundays: Dec 2022 has two data points, Jan 2023 has one
        let rows = vec![
            cell(d(2022, 12, 4), 500.0),
            cell(d(2022, 12, 11), 700.0),
            cell(d(2023, 1, 1), 50.0),
        ];
        let normalized = normalize_reference(&rows);
        assert_eq!(normalized[0].ttl_earn, 600.0);
        assert_eq!(normalized[2].ttl_earn, 600.0);
    }

    #[tokio::test]
    async fn build_reference_reads_order_totals() {
        use crate::store::orders::NewOrder;
        use crate::store::SettingsStore;

        let db = Db::connect(":memory:").await.unwrap();
        let orders = OrderStore::new(db.clone());
        orders
            .insert_batch(&[
                NewOrder {
                    order_number: "1".into(),
                    order_paid_date: d(2023, 6, 5),
                    sales_associate: Some("Ana".into()),
                    subtotal: 120.0,
                    tip_total: 0.0,
                },
                NewOrder {
                    order_number: "2".into(),
                    order_paid_date: d(2023, 6, 12),
                    sales_associate: Some("Ana".into()),
                    subtotal: 80.0,
                    tip_total: 0.0,
                },
            ])
            .await
            .unwrap();

        let settings = SettingsStore::new(db.clone()).load().await.unwrap();
        let written = build_reference(&db, &settings, d(2024, 1, 1)).await.unwrap();
        assert_eq!(written, 366);

        let stored = ReferenceStore::new(db).all().await.unwrap();
        let june_monday = stored.iter().find(|r| r.date == d(2023, 6, 19)).unwrap();
        assert_eq!(june_monday.ttl_earn, 100.0);
    }
}
