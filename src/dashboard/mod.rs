//! Read-side views: team performance, rankings, trends, leaders and per-associate stats

pub mod metrics;

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use tracing::info;

use crate::scoring::period::{roll_fiscal_year, settings_year_start, TrendWindow};
use crate::store::orders::DailyRevenue;
use crate::store::scores::ScoreRow;
use crate::store::settings::{FISCAL_YEAR_END, FISCAL_YEAR_START};
use crate::store::{
    ClubStore, Db, OrderStore, ScoreStore, Settings, SettingsStore, StoreError, YearType,
};
use crate::util::time::{days_ago, format_date, start_of_month, start_of_year};

use metrics::{
    average_since, daily_ranks, leader, rankings, score_profile, share_pct, team_average,
    team_performance, trend_series, Leader, Ranking, TeamPerformance, TrendSeries,
};

/// Window of the dashboard's trend chart
pub const DASHBOARD_TREND_DAYS: i64 = 14;

/// Lookback for the team average shown next to associate summaries
pub const SUMMARY_TEAM_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodLeaders {
    pub weekly: Leader,
    pub monthly: Leader,
    pub yearly: Leader,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Leaderboard {
    pub tips: PeriodLeaders,
    pub revenue: PeriodLeaders,
    pub clubs: PeriodLeaders,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailedStats {
    pub total_days: usize,
    pub avg_score: Option<f64>,
    pub top_performer_pct: f64,
    pub days_above_75: usize,
    /// Share of this calendar year's active-team club signups
    pub club_signup_pct: Option<f64>,
    /// Share of this calendar year's active-team sales dollars
    pub sales_dollars_pct: Option<f64>,
    pub seven_day_avg: Option<f64>,
    pub mtd_avg: Option<f64>,
}

/// Compact per-associate numbers for the settings and team setup pages
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociateSummary {
    pub days_counted: usize,
    pub average_score: f64,
    pub top_performer_pct: f64,
    pub days_above_75: usize,
    pub team_avg: f64,
    pub diff_from_avg: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub today: NaiveDate,
    pub year_type: YearType,
    pub year_start: NaiveDate,
    pub active_associates: Vec<String>,
    /// No associates are active yet, so the team page should be shown first
    pub needs_team_setup: bool,
    pub team_performance: TeamPerformance,
    pub rankings: Vec<Ranking>,
    pub trends: TrendSeries,
    pub leaders: Leaderboard,
    pub detailed_stats: BTreeMap<String, DetailedStats>,
    pub dark_mode: bool,
    pub show_tip_badges: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendView {
    #[serde(flatten)]
    pub series: TrendSeries,
    pub metric_type: String,
}

/// Dashboard queries over the local store
#[derive(Clone)]
pub struct Dashboard {
    settings: SettingsStore,
    orders: OrderStore,
    clubs: ClubStore,
    scores: ScoreStore,
}

impl Dashboard {
    pub fn new(db: Db) -> Self {
        Self {
            settings: SettingsStore::new(db.clone()),
            orders: OrderStore::new(db.clone()),
            clubs: ClubStore::new(db.clone()),
            scores: ScoreStore::new(db),
        }
    }

    /// Advance full-date fiscal bounds once the fiscal year has ended.
    /// Returns the refreshed settings.
    pub async fn roll_fiscal_year(&self, today: NaiveDate) -> Result<Settings, StoreError> {
        let settings = self.settings.load().await?;
        if settings.year_type != YearType::Fiscal {
            return Ok(settings);
        }
        let rolled = roll_fiscal_year(
            &settings.fiscal_year_start,
            &settings.fiscal_year_end,
            today,
        );
        let Some((start, end)) = rolled else {
            return Ok(settings);
        };

        info!(start = %start, end = %end, "Fiscal year rolled over");
        self.settings
            .set_many(&[
                (FISCAL_YEAR_START, format_date(start)),
                (FISCAL_YEAR_END, format_date(end)),
            ])
            .await?;
        self.settings.load().await
    }

    /// Everything the main dashboard page renders
    pub async fn view(&self, today: NaiveDate) -> Result<DashboardView, StoreError> {
        let settings = self.roll_fiscal_year(today).await?;
        let active = settings.active_associates.clone();
        let year_start = settings_year_start(&settings, today);

        let year_scores = self.scores.scores_since(year_start).await?;
        let all_scores = self.scores.all_scores().await?;

        let team_performance = self
            .team_performance(&year_scores, &active, year_start, today)
            .await?;
        let trend_start = days_ago(today, DASHBOARD_TREND_DAYS);
        let trends = self
            .windowed_trends(&active, year_start, trend_start, today)
            .await?;

        Ok(DashboardView {
            today,
            year_type: settings.year_type,
            year_start,
            needs_team_setup: active.is_empty(),
            team_performance,
            rankings: rankings(&year_scores, &active),
            trends,
            leaders: self.leaders(&active, today).await?,
            detailed_stats: self.detailed_stats(&all_scores, &active, today).await?,
            dark_mode: settings.dark_mode,
            show_tip_badges: settings.show_tip_badges,
            active_associates: active,
        })
    }

    async fn team_performance(
        &self,
        year_scores: &[ScoreRow],
        active: &[String],
        year_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<TeamPerformance, StoreError> {
        let ref_start = year_start - Duration::days(365);
        let ref_end = year_start - Duration::days(1);

        let daily_revenue = |rows: Vec<DailyRevenue>| {
            (!rows.is_empty())
                .then(|| rows.iter().map(|r| r.daily_total).sum::<f64>() / rows.len() as f64)
        };
        let revenue_now = daily_revenue(self.orders.daily_revenue_totals(year_start, today).await?);
        let revenue_ref =
            daily_revenue(self.orders.daily_revenue_totals(ref_start, ref_end).await?);

        let clubs_now = self.clubs.signup_stats(year_start, today).await?.daily_average();
        let clubs_ref = self.clubs.signup_stats(ref_start, ref_end).await?.daily_average();

        Ok(team_performance(
            team_average(year_scores, active),
            (revenue_now, revenue_ref),
            (clubs_now, clubs_ref),
        ))
    }

    /// Tip, revenue and club leaders for the last 7 days, month and calendar year
    pub async fn leaders(
        &self,
        active: &[String],
        today: NaiveDate,
    ) -> Result<Leaderboard, StoreError> {
        let mut board = Leaderboard::default();
        let periods = [
            days_ago(today, 7),
            start_of_month(today),
            start_of_year(today),
        ];

        for (i, start) in periods.into_iter().enumerate() {
            let sums = self.orders.associate_sums(start, today).await?;
            let counts = self.clubs.associate_counts(start, today).await?;

            let tips = leader(sums.iter().map(|s| (s.sales_associate.as_str(), s.tips)), active);
            let revenue = leader(
                sums.iter().map(|s| (s.sales_associate.as_str(), s.revenue)),
                active,
            );
            let clubs = leader(
                counts.iter().map(|c| (c.sales_associate.as_str(), c.club_count as f64)),
                active,
            );

            let slot = |leaders: &mut PeriodLeaders, value: Leader| match i {
                0 => leaders.weekly = value,
                1 => leaders.monthly = value,
                _ => leaders.yearly = value,
            };
            slot(&mut board.tips, tips);
            slot(&mut board.revenue, revenue);
            slot(&mut board.clubs, clubs);
        }
        Ok(board)
    }

    async fn detailed_stats(
        &self,
        all_scores: &[ScoreRow],
        active: &[String],
        today: NaiveDate,
    ) -> Result<BTreeMap<String, DetailedStats>, StoreError> {
        let ranks = daily_ranks(all_scores);
        let year_start = start_of_year(today);

        let sales = self.orders.associate_sums(year_start, today).await?;
        let signups = self.clubs.associate_counts(year_start, today).await?;
        let team_sales: f64 = sales
            .iter()
            .filter(|s| active.contains(&s.sales_associate))
            .map(|s| s.revenue)
            .sum();
        let team_clubs: i64 = signups
            .iter()
            .filter(|c| active.contains(&c.sales_associate))
            .map(|c| c.club_count)
            .sum();

        let mut out = BTreeMap::new();
        for who in active {
            let profile = score_profile(all_scores, &ranks, who);
            let own_sales = sales
                .iter()
                .find(|s| s.sales_associate == *who)
                .map_or(0.0, |s| s.revenue);
            let own_clubs = signups
                .iter()
                .find(|c| c.sales_associate == *who)
                .map_or(0, |c| c.club_count);

            out.insert(
                who.clone(),
                DetailedStats {
                    total_days: profile.total_days,
                    avg_score: profile.avg_score,
                    top_performer_pct: profile.top_performer_pct,
                    days_above_75: profile.days_above_75,
                    club_signup_pct: share_pct(own_clubs as f64, team_clubs as f64),
                    sales_dollars_pct: share_pct(own_sales, team_sales),
                    seven_day_avg: average_since(all_scores, who, days_ago(today, 7)),
                    mtd_avg: average_since(all_scores, who, start_of_month(today)),
                },
            );
        }
        Ok(out)
    }

    /// Trend chart data for a selectable window
    pub async fn trends(
        &self,
        duration: Option<&str>,
        metric_type: Option<&str>,
        today: NaiveDate,
    ) -> Result<TrendView, StoreError> {
        let settings = self.settings.load().await?;
        let window = TrendWindow::from_param(duration);
        let window_start = window.start(settings.year_type, &settings.fiscal_year_start, today);
        let year_start = settings_year_start(&settings, today);

        let series = self
            .windowed_trends(&settings.active_associates, year_start, window_start, today)
            .await?;

        Ok(TrendView {
            series,
            metric_type: metric_type.unwrap_or("daily").to_string(),
        })
    }

    /// Trend points for `[window_start, today]`.
    ///
    /// Running averages start at `year_start`. Scores from before the year start
    /// still appear, without a running average.
    async fn windowed_trends(
        &self,
        active: &[String],
        year_start: NaiveDate,
        window_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<TrendSeries, StoreError> {
        let scores = self.scores.scores_since(year_start.min(window_start)).await?;
        let in_year: Vec<_> = scores
            .iter()
            .filter(|r| r.score_date >= year_start)
            .cloned()
            .collect();
        let mut series = trend_series(&in_year, active, window_start, today);

        if window_start < year_start {
            for (who, points) in series.trends.iter_mut() {
                for point in points.iter_mut().filter(|p| p.date < year_start) {
                    point.score = scores
                        .iter()
                        .find(|r| r.sales_associate == *who && r.score_date == point.date)
                        .map(|r| r.daily_score);
                }
            }
        }
        Ok(series)
    }

    /// Summary numbers for every associate ever seen
    pub async fn associate_summaries(
        &self,
        today: NaiveDate,
    ) -> Result<BTreeMap<String, AssociateSummary>, StoreError> {
        let associates = self.orders.all_associates().await?;
        let all_scores = self.scores.all_scores().await?;
        let ranks = daily_ranks(&all_scores);

        let since = days_ago(today, SUMMARY_TEAM_DAYS);
        let recent: Vec<f64> = all_scores
            .iter()
            .filter(|r| r.score_date >= since)
            .map(|r| r.daily_score)
            .collect();
        let team_avg = if recent.is_empty() {
            0.0
        } else {
            metrics::round_to(recent.iter().sum::<f64>() / recent.len() as f64, 2)
        };

        Ok(associates
            .into_iter()
            .map(|who| {
                let profile = score_profile(&all_scores, &ranks, &who);
                let summary = AssociateSummary {
                    days_counted: profile.total_days,
                    average_score: profile.avg_score.unwrap_or(0.0),
                    top_performer_pct: profile.top_performer_pct,
                    days_above_75: profile.days_above_75,
                    team_avg,
                    diff_from_avg: profile
                        .avg_score
                        .map(|avg| metrics::round_to(avg - team_avg, 1))
                        .unwrap_or(0.0),
                };
                (who, summary)
            })
            .collect())
    }
}
