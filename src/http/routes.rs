//! HTTP route definitions

use std::collections::BTreeMap;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::app::AppState;
use crate::dashboard::{AssociateSummary, DashboardView, TrendView};
use crate::http::middleware::require_initialized;
use crate::scoring::period::month_day;
use crate::store::settings::{
    DARK_MODE, FISCAL_YEAR_END, FISCAL_YEAR_START, SHOW_TIP_BADGES, TIMEZONE, YEAR_TYPE,
};
use crate::store::{OrderStore, StoreError, YearType};
use crate::sync::{run_setup, SetupProgress, SetupRequest, SyncError};
use crate::util::time::{parse_date, uptime_secs};
use crate::util::timezone::{parse_timezone, timezones_by_region, TimezoneOption};

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // Reachable while startup initialization is still running
    let public_routes = Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/status", get(status_handler))
        .route("/setup", post(setup_handler))
        .route("/setup/progress", get(setup_progress_handler));

    let data_routes = Router::new()
        .route("/api/dashboard", get(dashboard_handler))
        .route("/api/trends", get(trends_handler))
        .route("/settings", get(settings_handler).post(update_settings_handler))
        .route("/team_setup", get(team_setup_handler).post(save_team_handler))
        .route("/manual_update", post(manual_update_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_initialized));

    Router::new()
        .merge(public_routes)
        .merge(data_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

// ============================================================================
// Health and status
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    initialized: bool,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        initialized: state.is_initialized(),
    })
}

#[derive(Serialize)]
struct StatusResponse {
    initialized: bool,
    error: Option<String>,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    if state.is_initialized() {
        return Json(StatusResponse {
            initialized: true,
            error: None,
        });
    }

    let error = match state.db.missing_tables().await {
        Ok(missing) if !missing.is_empty() => {
            Some(format!("Waiting for tables: {}", missing.join(", ")))
        }
        Ok(_) => state.init_error(),
        Err(e) => Some(format!("Error checking status: {}", e)),
    };
    Json(StatusResponse {
        initialized: false,
        error,
    })
}

// ============================================================================
// Dashboard endpoints
// ============================================================================

async fn dashboard_handler(State(state): State<AppState>) -> Result<Json<DashboardView>, AppError> {
    let today = state.today().await?;
    Ok(Json(state.dashboard.view(today).await?))
}

#[derive(Deserialize)]
struct TrendsQuery {
    duration: Option<String>,
    metric_type: Option<String>,
}

async fn trends_handler(
    State(state): State<AppState>,
    Query(query): Query<TrendsQuery>,
) -> Result<Json<TrendView>, AppError> {
    if state.settings.active_associates().await?.is_empty() {
        return Err(AppError::BadRequest("No active associates".to_string()));
    }

    let today = state.today().await?;
    let view = state
        .dashboard
        .trends(query.duration.as_deref(), query.metric_type.as_deref(), today)
        .await?;
    Ok(Json(view))
}

// ============================================================================
// Settings endpoints
// ============================================================================

#[derive(Serialize)]
struct SettingsResponse {
    all_associates: Vec<String>,
    active_associates: Vec<String>,
    hidden_associates: Vec<String>,
    year_type: YearType,
    fiscal_start: String,
    fiscal_end: String,
    dark_mode: bool,
    show_tip_badges: bool,
    current_timezone: String,
    timezones_by_region: Vec<TimezoneOption>,
    last_update_time: String,
    detailed_stats: BTreeMap<String, AssociateSummary>,
}

async fn settings_handler(
    State(state): State<AppState>,
) -> Result<Json<SettingsResponse>, AppError> {
    let today = state.today().await?;
    let settings = state.dashboard.roll_fiscal_year(today).await?;

    let last_update_time = settings
        .last_order_update
        .map(|d| d.format("%m/%d/%Y").to_string())
        .unwrap_or_else(|| "Never".to_string());

    Ok(Json(SettingsResponse {
        all_associates: OrderStore::new(state.db.clone()).all_associates().await?,
        detailed_stats: state.dashboard.associate_summaries(today).await?,
        timezones_by_region: timezones_by_region(Utc::now()),
        last_update_time,
        year_type: settings.year_type,
        fiscal_start: settings.fiscal_year_start,
        fiscal_end: settings.fiscal_year_end,
        dark_mode: settings.dark_mode,
        show_tip_badges: settings.show_tip_badges,
        current_timezone: settings.timezone,
        active_associates: settings.active_associates,
        hidden_associates: settings.hidden_associates,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct SettingsUpdate {
    timezone: Option<String>,
    active_associates: Option<Vec<String>>,
    hidden_associates: Option<Vec<String>>,
    year_type: Option<YearType>,
    fiscal_start: Option<String>,
    fiscal_end: Option<String>,
    dark_mode: Option<bool>,
    show_tip_badges: Option<bool>,
}

#[derive(Serialize)]
struct SuccessResponse {
    status: &'static str,
}

const SUCCESS: SuccessResponse = SuccessResponse { status: "success" };

async fn update_settings_handler(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> Result<Json<SuccessResponse>, AppError> {
    let current = state.settings.load().await?;
    let mut entries: Vec<(&str, String)> = Vec::new();

    let mut new_tz: Option<Tz> = None;
    if let Some(name) = update.timezone.as_deref() {
        let tz = parse_timezone(name)
            .ok_or_else(|| AppError::BadRequest(format!("Invalid timezone: {}", name)))?;
        if name != current.timezone {
            new_tz = Some(tz);
        }
        entries.push((TIMEZONE, name.trim().to_string()));
    }

    if let Some(year_type) = update.year_type {
        entries.push((YEAR_TYPE, year_type.to_string()));
        if year_type == YearType::Fiscal {
            let bounds = [
                (FISCAL_YEAR_START, &update.fiscal_start),
                (FISCAL_YEAR_END, &update.fiscal_end),
            ];
            for (key, value) in bounds {
                let Some(value) = value else { continue };
                if month_day(value).is_none() {
                    return Err(AppError::BadRequest(format!("Invalid fiscal date: {}", value)));
                }
                entries.push((key, value.trim().to_string()));
            }
        }
    }

    if let Some(dark_mode) = update.dark_mode {
        entries.push((DARK_MODE, dark_mode.to_string()));
    }
    if let Some(show) = update.show_tip_badges {
        entries.push((SHOW_TIP_BADGES, show.to_string()));
    }

    state.settings.set_many(&entries).await?;

    if update.active_associates.is_some() || update.hidden_associates.is_some() {
        let active = update.active_associates.unwrap_or(current.active_associates.clone());
        let hidden = update.hidden_associates.unwrap_or(current.hidden_associates.clone());
        state.settings.set_associates(&active, &hidden).await?;
    }

    if let Some(tz) = new_tz {
        if current.is_initialized() || state.scheduler_running() {
            state.start_scheduler(tz);
        }
    }

    info!(keys = entries.len(), "Settings updated");
    Ok(Json(SUCCESS))
}

// ============================================================================
// Setup endpoints
// ============================================================================

async fn setup_handler(
    State(state): State<AppState>,
    request: Option<Json<SetupRequest>>,
) -> Result<(StatusCode, Json<SetupProgress>), AppError> {
    if state.settings.load().await?.is_initialized() {
        return Err(AppError::Conflict("Application is already initialized".to_string()));
    }
    if !state.setup.try_start() {
        return Err(AppError::Conflict("Setup is already running".to_string()));
    }

    let plan = request.map(|Json(r)| r).unwrap_or_default().resolve();
    info!(
        year_type = %plan.year_type,
        start = %plan.start,
        timezone = %plan.timezone,
        "Starting setup wizard"
    );

    let worker = state.clone();
    tokio::spawn(async move {
        let tz = parse_timezone(&plan.timezone).unwrap_or(Tz::UTC);
        if run_setup(&worker.sync, plan, &worker.setup).await.is_ok() {
            worker.start_scheduler(tz);
        }
    });

    Ok((StatusCode::ACCEPTED, Json(state.setup.snapshot())))
}

async fn setup_progress_handler(State(state): State<AppState>) -> Json<SetupProgress> {
    Json(state.setup.snapshot())
}

#[derive(Serialize)]
struct TeamSetupResponse {
    all_associates: Vec<String>,
    active_associates: Vec<String>,
    hidden_associates: Vec<String>,
    associate_stats: BTreeMap<String, AssociateSummary>,
    dark_mode: bool,
}

async fn team_setup_handler(
    State(state): State<AppState>,
) -> Result<Json<TeamSetupResponse>, AppError> {
    let today = state.today().await?;
    let settings = state.settings.load().await?;

    Ok(Json(TeamSetupResponse {
        all_associates: OrderStore::new(state.db.clone()).all_associates().await?,
        associate_stats: state.dashboard.associate_summaries(today).await?,
        active_associates: settings.active_associates,
        hidden_associates: settings.hidden_associates,
        dark_mode: settings.dark_mode,
    }))
}

#[derive(Deserialize)]
struct TeamSelection {
    #[serde(default)]
    active_associates: Vec<String>,
    #[serde(default)]
    hidden_associates: Vec<String>,
}

async fn save_team_handler(
    State(state): State<AppState>,
    Json(team): Json<TeamSelection>,
) -> Result<Json<SuccessResponse>, AppError> {
    state
        .settings
        .set_associates(&team.active_associates, &team.hidden_associates)
        .await?;
    info!(
        active = team.active_associates.len(),
        hidden = team.hidden_associates.len(),
        "Team saved"
    );
    Ok(Json(SUCCESS))
}

// ============================================================================
// Manual update
// ============================================================================

#[derive(Deserialize)]
struct ManualUpdateRequest {
    start_date: Option<String>,
}

#[derive(Serialize)]
struct ManualUpdateResponse {
    message: &'static str,
    all_associates: Vec<String>,
    active_associates: Vec<String>,
    hidden_associates: Vec<String>,
}

async fn manual_update_handler(
    State(state): State<AppState>,
    request: Option<Json<ManualUpdateRequest>>,
) -> Result<Json<ManualUpdateResponse>, AppError> {
    let raw = request
        .and_then(|Json(r)| r.start_date)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Start date is required".to_string()))?;
    let start = parse_date(&raw)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid start date: {}", raw)))?;

    let today = state.today().await?;
    let summary = state
        .sync
        .update_data(Some(start), Some(today))
        .await
        .map_err(|e| match e {
            SyncError::InvalidRange { .. } => AppError::BadRequest(e.to_string()),
            other => {
                error!(error = %other, "Manual update failed");
                AppError::Internal(other.to_string())
            }
        })?;
    info!(
        orders_added = summary.orders_added,
        clubs_added = summary.clubs_added,
        "Manual update finished"
    );

    let settings = state.settings.load().await?;
    Ok(Json(ManualUpdateResponse {
        message: "Update completed successfully. Check the logs for details.",
        all_associates: OrderStore::new(state.db.clone()).all_associates().await?,
        active_associates: settings.active_associates,
        hidden_associates: settings.hidden_associates,
    }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "Store error");
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
