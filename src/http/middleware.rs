//! Request gating while startup initialization is still running

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::routes::AppError;
use crate::app::AppState;

/// Reject data routes with 503 until initialization has completed
pub async fn require_initialized(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.is_initialized() {
        let message = state
            .init_error()
            .unwrap_or_else(|| "Application is initializing".to_string());
        return Err(AppError::Unavailable(message));
    }
    Ok(next.run(request).await)
}
