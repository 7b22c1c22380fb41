//! Pure aggregations over stored scores and sales sums

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::store::scores::ScoreRow;

pub const SOMM_WEIGHT: f64 = 0.4;
pub const REVENUE_WEIGHT: f64 = 0.4;
pub const CLUB_WEIGHT: f64 = 0.2;

/// Scores at or above this count as a strong day
pub const STRONG_DAY: f64 = 75.0;

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.into_iter().fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradedScore {
    pub value: Option<f64>,
    pub grade: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetric {
    pub current: Option<f64>,
    pub reference: Option<f64>,
    /// Percent change of current vs reference
    pub performance: Option<f64>,
    pub grade: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamPerformance {
    pub somm_score: GradedScore,
    pub revenue: PerformanceMetric,
    pub clubs: PerformanceMetric,
    pub overall_grade: f64,
}

/// Average over dates of each date's average score, among `active`
pub fn team_average(scores: &[ScoreRow], active: &[String]) -> Option<f64> {
    let mut by_date: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for row in scores.iter().filter(|r| active.contains(&r.sales_associate)) {
        by_date.entry(row.score_date).or_default().push(row.daily_score);
    }
    mean(by_date.values().filter_map(|day| mean(day.iter().copied())).map(|v| round_to(v, 2)))
        .map(|v| round_to(v, 2))
}

/// Percent change from `reference` to `current`, one decimal
pub fn percent_change(current: Option<f64>, reference: Option<f64>) -> Option<f64> {
    match (current, reference) {
        (Some(current), Some(reference)) if reference > 0.0 => {
            Some(round_to((current - reference) / reference * 100.0, 1))
        }
        _ => None,
    }
}

fn performance_metric(current: Option<f64>, reference: Option<f64>) -> PerformanceMetric {
    let performance = percent_change(current, reference);
    PerformanceMetric {
        current: current.map(|v| round_to(v, 2)),
        reference: reference.map(|v| round_to(v, 2)),
        performance,
        grade: (50.0 + performance.unwrap_or(0.0)).clamp(0.0, 100.0),
    }
}

/// Weighted team grade from the SommScore average and the revenue and club
/// daily averages for the current and reference periods
pub fn team_performance(
    somm: Option<f64>,
    revenue: (Option<f64>, Option<f64>),
    clubs: (Option<f64>, Option<f64>),
) -> TeamPerformance {
    let somm_score = GradedScore {
        value: somm,
        grade: somm.unwrap_or(0.0).clamp(0.0, 100.0),
    };
    let revenue = performance_metric(revenue.0, revenue.1);
    let clubs = performance_metric(clubs.0, clubs.1);
    let overall_grade = round_to(
        somm_score.grade * SOMM_WEIGHT + revenue.grade * REVENUE_WEIGHT + clubs.grade * CLUB_WEIGHT,
        1,
    );
    TeamPerformance {
        somm_score,
        revenue,
        clubs,
        overall_grade,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub sales_associate: String,
    pub days_counted: usize,
    pub average_score: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub team_average: Option<f64>,
    pub diff_from_avg: Option<f64>,
}

/// Per-associate score statistics ordered by average, best first
pub fn rankings(scores: &[ScoreRow], active: &[String]) -> Vec<Ranking> {
    let team = team_average(scores, active);
    let mut grouped: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for row in scores.iter().filter(|r| active.contains(&r.sales_associate)) {
        grouped.entry(&row.sales_associate).or_default().push(row.daily_score);
    }

    let mut out: Vec<Ranking> = grouped
        .into_iter()
        .map(|(who, values)| {
            let average = round_to(values.iter().sum::<f64>() / values.len() as f64, 2);
            Ranking {
                sales_associate: who.to_string(),
                days_counted: values.len(),
                average_score: average,
                min_score: round_to(values.iter().copied().fold(f64::INFINITY, f64::min), 2),
                max_score: round_to(values.iter().copied().fold(f64::NEG_INFINITY, f64::max), 2),
                team_average: team,
                diff_from_avg: team.map(|t| round_to(average - t, 1)),
            }
        })
        .collect();
    out.sort_by(|a, b| b.average_score.total_cmp(&a.average_score));
    out
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub score: Option<f64>,
    /// Running average of the associate's scores from year start to this date
    pub cumulative: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub dates: Vec<NaiveDate>,
    pub trends: BTreeMap<String, Vec<TrendPoint>>,
}

/// One point per date in `[window_start, today]` for every active associate.
///
/// `year_scores` must hold every score since the scoring year start.
pub fn trend_series(
    year_scores: &[ScoreRow],
    active: &[String],
    window_start: NaiveDate,
    today: NaiveDate,
) -> TrendSeries {
    let dates = crate::util::time::date_range(window_start, today);

    let mut by_associate: HashMap<&str, Vec<(NaiveDate, f64)>> = HashMap::new();
    for row in year_scores {
        by_associate
            .entry(&row.sales_associate)
            .or_default()
            .push((row.score_date, row.daily_score));
    }

    let trends = active
        .iter()
        .map(|who| {
            let mut history = by_associate.get(who.as_str()).cloned().unwrap_or_default();
            history.sort_by_key(|(date, _)| *date);

            let points = dates
                .iter()
                .map(|date| {
                    let score = history.iter().find(|(d, _)| d == date).map(|(_, s)| *s);
                    let cumulative = score.and_then(|_| {
                        mean(history.iter().filter(|(d, _)| d <= date).map(|(_, s)| *s))
                            .map(|v| round_to(v, 2))
                    });
                    TrendPoint {
                        date: *date,
                        score,
                        cumulative,
                    }
                })
                .collect();
            (who.clone(), points)
        })
        .collect();

    TrendSeries { dates, trends }
}

/// Rank of every (date, associate) among that date's scores; ties share the better rank
pub fn daily_ranks(scores: &[ScoreRow]) -> HashMap<(NaiveDate, &str), usize> {
    let mut by_date: HashMap<NaiveDate, Vec<f64>> = HashMap::new();
    for row in scores {
        by_date.entry(row.score_date).or_default().push(row.daily_score);
    }
    scores
        .iter()
        .map(|row| {
            let better = by_date[&row.score_date]
                .iter()
                .filter(|s| **s > row.daily_score)
                .count();
            ((row.score_date, row.sales_associate.as_str()), better + 1)
        })
        .collect()
}

/// All-time score statistics for one associate
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreProfile {
    pub total_days: usize,
    pub avg_score: Option<f64>,
    /// Share of scored days on which the associate ranked first
    pub top_performer_pct: f64,
    pub days_above_75: usize,
}

pub fn score_profile(
    scores: &[ScoreRow],
    ranks: &HashMap<(NaiveDate, &str), usize>,
    who: &str,
) -> ScoreProfile {
    let own: Vec<&ScoreRow> = scores.iter().filter(|r| r.sales_associate == who).collect();
    if own.is_empty() {
        return ScoreProfile::default();
    }
    let firsts = own
        .iter()
        .filter(|r| ranks.get(&(r.score_date, who)) == Some(&1))
        .count();
    ScoreProfile {
        total_days: own.len(),
        avg_score: mean(own.iter().map(|r| r.daily_score)).map(|v| round_to(v, 2)),
        top_performer_pct: round_to(firsts as f64 / own.len() as f64 * 100.0, 1),
        days_above_75: own.iter().filter(|r| r.daily_score >= STRONG_DAY).count(),
    }
}

/// Average of one associate's scores on or after `since`, two decimals
pub fn average_since(scores: &[ScoreRow], who: &str, since: NaiveDate) -> Option<f64> {
    mean(
        scores
            .iter()
            .filter(|r| r.sales_associate == who && r.score_date >= since)
            .map(|r| r.daily_score),
    )
    .map(|v| round_to(v, 2))
}

/// `part` as a percentage of `total`, one decimal
pub fn share_pct(part: f64, total: f64) -> Option<f64> {
    (total > 0.0).then(|| round_to(part * 100.0 / total, 1))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leader {
    pub name: Option<String>,
    pub amount: f64,
}

impl Default for Leader {
    fn default() -> Self {
        Self { name: None, amount: 0.0 }
    }
}

/// Highest amount among `active`; ties go to the alphabetically first name
pub fn leader<'a>(amounts: impl IntoIterator<Item = (&'a str, f64)>, active: &[String]) -> Leader {
    let mut best: Option<(&str, f64)> = None;
    for (who, amount) in amounts {
        if !active.iter().any(|a| a == who) {
            continue;
        }
        best = match best {
            Some((name, top)) if top > amount || (top == amount && name <= who) => {
                Some((name, top))
            }
            _ => Some((who, amount)),
        };
    }
    best.map(|(name, amount)| Leader {
        name: Some(name.to_string()),
        amount: round_to(amount, 2),
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn row(day: u32, who: &str, score: f64) -> ScoreRow {
        ScoreRow {
            score_date: d(day),
            sales_associate: who.to_string(),
            daily_score: score,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn team_average_weights_days_equally() {
        let scores = vec![
            row(1, "Ana", 100.0),
            row(1, "Ben", 0.0),
            row(2, "Ana", 80.0),
            row(2, "Old", 0.0),
        ];
        // Day 1 averages 50, day 2 averages 80 (Old is not active)
        assert_eq!(team_average(&scores, &names(&["Ana", "Ben"])), Some(65.0));
        assert_eq!(team_average(&[], &names(&["Ana"])), None);
    }

    #[test]
    fn team_grade_weights_and_neutral_defaults() {
        let perf = team_performance(
            Some(60.0),
            (Some(1100.0), Some(1000.0)),
            (Some(2.0), Some(4.0)),
        );
        assert_eq!(perf.revenue.performance, Some(10.0));
        assert_eq!(perf.revenue.grade, 60.0);
        assert_eq!(perf.clubs.performance, Some(-50.0));
        assert_eq!(perf.clubs.grade, 0.0);
        assert_eq!(perf.overall_grade, 48.0);

        let empty = team_performance(None, (None, None), (Some(3.0), Some(0.0)));
        assert_eq!(empty.somm_score.grade, 0.0);
        assert_eq!(empty.revenue.grade, 50.0);
        assert_eq!(empty.clubs.performance, None);
        assert_eq!(empty.overall_grade, 30.0);
    }

    #[test]
    fn grades_are_clamped() {
        let perf = team_performance(Some(140.0), (Some(500.0), Some(100.0)), (None, None));
        assert_eq!(perf.somm_score.grade, 100.0);
        assert_eq!(perf.revenue.grade, 100.0);
    }

    #[test]
    fn rankings_order_and_diff() {
        let scores = vec![
            row(1, "Ana", 100.0),
            row(1, "Ben", 0.0),
            row(2, "Ben", 30.0),
            row(2, "Ana", 70.0),
        ];
        let ranks = rankings(&scores, &names(&["Ana", "Ben"]));

        assert_eq!(ranks[0].sales_associate, "Ana");
        assert_eq!(ranks[0].average_score, 85.0);
        assert_eq!(ranks[0].team_average, Some(50.0));
        assert_eq!(ranks[0].diff_from_avg, Some(35.0));
        assert_eq!((ranks[1].min_score, ranks[1].max_score), (0.0, 30.0));
        assert_eq!(ranks[1].days_counted, 2);
    }

    #[test]
    fn trend_fills_gaps_and_tracks_cumulative_average() {
        let year = vec![row(1, "Ana", 40.0), row(3, "Ana", 80.0), row(4, "Ana", 60.0)];
        let series = trend_series(&year, &names(&["Ana", "Ben"]), d(3), d(5));

        assert_eq!(series.dates, vec![d(3), d(4), d(5)]);
        let ana = &series.trends["Ana"];
        assert_eq!(ana[0].score, Some(80.0));
        assert_eq!(ana[0].cumulative, Some(60.0));
        assert_eq!(ana[1].cumulative, Some(60.0));
        assert_eq!(ana[2].score, None);
        assert_eq!(ana[2].cumulative, None);
        assert!(series.trends["Ben"].iter().all(|p| p.score.is_none()));
    }

    #[test]
    fn ties_share_first_place() {
        let scores = vec![
            row(1, "Ana", 100.0),
            row(1, "Ben", 100.0),
            row(1, "Cy", 0.0),
            row(2, "Ana", 0.0),
            row(2, "Cy", 100.0),
        ];
        let ranks = daily_ranks(&scores);
        assert_eq!(ranks[&(d(1), "Ana")], 1);
        assert_eq!(ranks[&(d(1), "Ben")], 1);
        assert_eq!(ranks[&(d(1), "Cy")], 3);

        let ana = score_profile(&scores, &ranks, "Ana");
        assert_eq!(ana.total_days, 2);
        assert_eq!(ana.top_performer_pct, 50.0);
        assert_eq!(ana.days_above_75, 1);
        assert_eq!(ana.avg_score, Some(50.0));
        assert_eq!(score_profile(&scores, &ranks, "Nobody"), ScoreProfile::default());
    }

    #[test]
    fn leader_picks_highest_active_amount() {
        let active = names(&["Ana", "Ben"]);
        let top = leader([("Ana", 10.0), ("Ben", 25.456), ("Zed", 99.0)], &active);
        assert_eq!(top.name.as_deref(), Some("Ben"));
        assert_eq!(top.amount, 25.46);

        let tie = leader([("Ben", 5.0), ("Ana", 5.0)], &active);
        assert_eq!(tie.name.as_deref(), Some("Ana"));

        assert_eq!(leader([("Zed", 1.0)], &active), Leader::default());
    }

    #[test]
    fn shares_need_a_positive_total() {
        assert_eq!(share_pct(1.0, 3.0), Some(33.3));
        assert_eq!(share_pct(0.0, 0.0), None);
        let scores = [row(1, "Ana", 10.0), row(5, "Ana", 20.0)];
        assert_eq!(average_since(&scores, "Ana", d(2)), Some(20.0));
    }
}
