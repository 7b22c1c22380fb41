//! SommScore calculation
//!
//! Each day every working associate (active, with at least one order) is
//! scored on revenue relative to the day's team average, weighted by day of
//! week, plus a bonus per club signup. Raw scores are then min-max
//! normalized per day onto 0..=100.

pub mod period;
pub mod reference;

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::info;

use crate::store::clubs::DailyAssociateSignups;
use crate::store::orders::DailyAssociateRevenue;
use crate::store::scores::ScoreRow;
use crate::store::{ClubStore, Db, OrderStore, ScoreStore, SettingsStore, StoreError};

/// Points added per club signup before normalization
pub const CLUB_SIGNUP_BONUS: f64 = 50.0;

/// Scale applied to relative revenue performance
pub const REVENUE_SCALE: f64 = 50.0;

/// Score given to everyone on a day where all raw scores are equal
pub const NEUTRAL_SCORE: f64 = 50.0;

/// 1.0 for Friday through Sunday, 1.5 for Monday through Thursday
pub fn day_weight(date: NaiveDate) -> f64 {
    match date.weekday() {
        Weekday::Fri | Weekday::Sat | Weekday::Sun => 1.0,
        _ => 1.5,
    }
}

/// Raw (unnormalized) score for one associate on one day
pub fn raw_score(revenue: f64, team_average: f64, weight: f64, signups: i64) -> f64 {
    let revenue_score = if team_average > 0.0 {
        (revenue - team_average) / team_average * REVENUE_SCALE
    } else {
        0.0
    };
    revenue_score * weight + CLUB_SIGNUP_BONUS * signups as f64
}

/// Min-max normalize onto 0..=100, or the neutral score when all inputs are equal
pub fn normalize(raw: &[f64]) -> Vec<f64> {
    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    raw.iter()
        .map(|score| {
            if range == 0.0 {
                NEUTRAL_SCORE
            } else {
                ((score - min) / range * 100.0).clamp(0.0, 100.0)
            }
        })
        .collect()
}

/// Compute normalized daily scores from per-day aggregates.
///
/// Only associates in `active` who have at least one order on a date are
/// scored for that date. Dates without working associates yield nothing.
pub fn compute_daily_scores(
    revenue: &[DailyAssociateRevenue],
    signups: &[DailyAssociateSignups],
    active: &[String],
) -> Vec<ScoreRow> {
    let mut by_date: BTreeMap<NaiveDate, Vec<(&str, f64)>> = BTreeMap::new();
    for row in revenue {
        if row.order_count > 0 && active.iter().any(|a| *a == row.sales_associate) {
            by_date
                .entry(row.work_date)
                .or_default()
                .push((row.sales_associate.as_str(), row.total_revenue));
        }
    }

    let clubs: HashMap<(NaiveDate, &str), i64> = signups
        .iter()
        .map(|s| ((s.signup_date, s.sales_associate.as_str()), s.total_clubs))
        .collect();

    let mut rows = Vec::new();
    for (date, working) in by_date {
        let team_average = working.iter().map(|(_, r)| r).sum::<f64>() / working.len() as f64;
        let weight = day_weight(date);

        let raw: Vec<f64> = working
            .iter()
            .map(|(who, revenue)| {
                let count = clubs.get(&(date, *who)).copied().unwrap_or(0);
                raw_score(*revenue, team_average, weight, count)
            })
            .collect();

        for ((who, _), score) in working.iter().zip(normalize(&raw)) {
            rows.push(ScoreRow {
                score_date: date,
                sales_associate: who.to_string(),
                daily_score: score,
            });
        }
    }
    rows
}

/// Per-associate aggregate over a set of scores
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreSummary {
    pub sales_associate: String,
    pub days_counted: usize,
    pub average: f64,
    pub min: f64,
    pub max: f64,
}

pub fn summarize(rows: &[ScoreRow]) -> Vec<ScoreSummary> {
    let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.sales_associate.as_str()).or_default().push(row.daily_score);
    }

    let mut summaries: Vec<ScoreSummary> = grouped
        .into_iter()
        .map(|(who, scores)| ScoreSummary {
            sales_associate: who.to_string(),
            days_counted: scores.len(),
            average: scores.iter().sum::<f64>() / scores.len() as f64,
            min: scores.iter().copied().fold(f64::INFINITY, f64::min),
            max: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
        .collect();
    summaries.sort_by(|a, b| b.average.total_cmp(&a.average));
    summaries
}

/// Recompute and store scores for every date in `[start, today]`.
/// Returns the number of score rows written.
pub async fn recalculate(db: &Db, start: NaiveDate, today: NaiveDate) -> Result<usize, StoreError> {
    info!(start = %start, end = %today, "Calculating SommScores");

    let active = SettingsStore::new(db.clone()).active_associates().await?;
    let revenue = OrderStore::new(db.clone()).daily_associate_totals(start, today).await?;
    let signups = ClubStore::new(db.clone()).daily_associate_counts(start, today).await?;

    let rows = compute_daily_scores(&revenue, &signups, &active);
    let scores = ScoreStore::new(db.clone());
    scores.replace_dates(&rows).await?;
    info!(rows = rows.len(), "Stored daily SommScores");

    let stored = scores.scores_since(start).await?;
    let active_rows: Vec<ScoreRow> = stored
        .into_iter()
        .filter(|r| active.contains(&r.sales_associate))
        .collect();
    for summary in summarize(&active_rows) {
        info!(
            associate = %summary.sales_associate,
            days = summary.days_counted,
            avg = %format!("{:.1}", summary.average),
            range = %format!("{:.1}-{:.1}", summary.min, summary.max),
            "SommScore summary"
        );
    }

    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn rev(date: NaiveDate, who: &str, revenue: f64) -> DailyAssociateRevenue {
        DailyAssociateRevenue {
            work_date: date,
            sales_associate: who.to_string(),
            total_revenue: revenue,
            order_count: 1,
        }
    }

    fn clubs(date: NaiveDate, who: &str, n: i64) -> DailyAssociateSignups {
        DailyAssociateSignups {
            signup_date: date,
            sales_associate: who.to_string(),
            total_clubs: n,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn score_of(rows: &[ScoreRow], date: NaiveDate, who: &str) -> f64 {
        rows.iter()
            .find(|r| r.score_date == date && r.sales_associate == who)
            .map(|r| r.daily_score)
            .unwrap()
    }

    #[test]
    fn weekday_weights() {
        // 2024-03-04 is a Monday
        assert_eq!(day_weight(d(2024, 3, 4)), 1.5);
        assert_eq!(day_weight(d(2024, 3, 7)), 1.5);
        assert_eq!(day_weight(d(2024, 3, 8)), 1.0);
        assert_eq!(day_weight(d(2024, 3, 10)), 1.0);
    }

    #[test]
    fn raw_score_combines_revenue_and_clubs() {
        assert_eq!(raw_score(150.0, 100.0, 1.0, 0), 25.0);
        assert_eq!(raw_score(50.0, 100.0, 1.5, 1), 12.5);
        assert_eq!(raw_score(10.0, 0.0, 1.5, 2), 100.0);
    }

    #[test]
    fn normalize_spans_zero_to_hundred() {
        assert_eq!(normalize(&[-10.0, 0.0, 30.0]), vec![0.0, 25.0, 100.0]);
        assert_eq!(normalize(&[7.0, 7.0]), vec![50.0, 50.0]);
        assert_eq!(normalize(&[3.0]), vec![50.0]);
    }

    #[test]
    fn single_working_associate_scores_fifty() {
        let day = d(2024, 3, 4);
        let rows = compute_daily_scores(
            &[rev(day, "Ana", 900.0)],
            &[clubs(day, "Ana", 3)],
            &names(&["Ana"]),
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].daily_score, 50.0);
    }

    #[test]
    fn inactive_and_idle_associates_are_not_scored() {
        let day = d(2024, 3, 8);
        let mut idle = rev(day, "Cy", 0.0);
        idle.order_count = 0;
        let rows = compute_daily_scores(
            &[rev(day, "Ana", 300.0), rev(day, "Ben", 100.0), rev(day, "Zed", 5000.0), idle],
            &[],
            &names(&["Ana", "Ben", "Cy"]),
        );

        assert_eq!(rows.len(), 2);
        assert_eq!(score_of(&rows, day, "Ana"), 100.0);
        assert_eq!(score_of(&rows, day, "Ben"), 0.0);
    }

    #[test]
    fn club_signups_can_overtake_revenue() {
        // Friday, weight 1.0: avg 200, Ana raw = 50, Ben raw = -25 + 150 = 125, Cy raw = -25
        let day = d(2024, 3, 8);
        let rows = compute_daily_scores(
            &[rev(day, "Ana", 400.0), rev(day, "Ben", 100.0), rev(day, "Cy", 100.0)],
            &[clubs(day, "Ben", 3)],
            &names(&["Ana", "Ben", "Cy"]),
        );

        assert_eq!(score_of(&rows, day, "Ben"), 100.0);
        assert_eq!(score_of(&rows, day, "Ana"), 50.0);
        assert_eq!(score_of(&rows, day, "Cy"), 0.0);
    }

    #[test]
    fn weekday_weight_reduces_the_club_effect() {
        // Same figures on a Monday: Ana raw = 75, Ben raw = -37.5 + 150 = 112.5, Cy raw = -37.5
        let day = d(2024, 3, 4);
        let rows = compute_daily_scores(
            &[rev(day, "Ana", 400.0), rev(day, "Ben", 100.0), rev(day, "Cy", 100.0)],
            &[clubs(day, "Ben", 3)],
            &names(&["Ana", "Ben", "Cy"]),
        );

        assert_eq!(score_of(&rows, day, "Ana"), 75.0);
        assert_eq!(score_of(&rows, day, "Ben"), 100.0);
        assert_eq!(score_of(&rows, day, "Cy"), 0.0);
    }

    #[test]
    fn days_are_normalized_independently() {
        let (mon, tue) = (d(2024, 3, 4), d(2024, 3, 5));
        let rows = compute_daily_scores(
            &[rev(mon, "Ana", 100.0), rev(mon, "Ben", 300.0), rev(tue, "Ana", 100.0)],
            &[],
            &names(&["Ana", "Ben"]),
        );
        assert_eq!(rows.len(), 3);
        assert_eq!(score_of(&rows, mon, "Ana"), 0.0);
        assert_eq!(score_of(&rows, tue, "Ana"), 50.0);
        assert!(rows.iter().all(|r| (0.0..=100.0).contains(&r.daily_score)));
    }

    #[test]
    fn summaries_sort_by_average() {
        let day = |n| d(2024, 3, n);
        let rows = vec![
            ScoreRow { score_date: day(4), sales_associate: "Ana".into(), daily_score: 20.0 },
            ScoreRow { score_date: day(5), sales_associate: "Ana".into(), daily_score: 40.0 },
            ScoreRow { score_date: day(4), sales_associate: "Ben".into(), daily_score: 80.0 },
        ];
        let summary = summarize(&rows);
        assert_eq!(summary[0].sales_associate, "Ben");
        assert_eq!(summary[1].average, 30.0);
        assert_eq!((summary[1].min, summary[1].max), (20.0, 40.0));
    }

    #[tokio::test]
    async fn recalculate_replaces_stale_scores() {
        use crate::store::orders::NewOrder;

        let db = Db::connect(":memory:").await.unwrap();
        let order = |n: &str, day: u32, who: &str, amount: f64| NewOrder {
            order_number: n.into(),
            order_paid_date: d(2024, 3, day),
            sales_associate: Some(who.into()),
            subtotal: amount,
            tip_total: 0.0,
        };
        OrderStore::new(db.clone())
            .insert_batch(&[order("1", 4, "Ana", 300.0), order("2", 4, "Ben", 100.0)])
            .await
            .unwrap();
        SettingsStore::new(db.clone())
            .set_active_associates(&names(&["Ana", "Ben"]))
            .await
            .unwrap();
        ScoreStore::new(db.clone())
            .replace_dates(&[ScoreRow {
                score_date: d(2024, 3, 4),
                sales_associate: "Gone".into(),
                daily_score: 99.0,
            }])
            .await
            .unwrap();

        let written = recalculate(&db, d(2024, 3, 1), d(2024, 3, 31)).await.unwrap();
        assert_eq!(written, 2);

        let stored = ScoreStore::new(db).all_scores().await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(score_of(&stored, d(2024, 3, 4), "Ana"), 100.0);
        assert_eq!(score_of(&stored, d(2024, 3, 4), "Ben"), 0.0);
    }
}
