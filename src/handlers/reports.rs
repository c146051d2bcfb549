use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::ServiceError;
use crate::handlers::{authenticated_merchant, AppState};
use crate::services::reporting::{resolve_explicit, ReportSummary, ReportingWindow};
use crate::ApiResponse;

/// Either a named period key or explicit bounds; explicit bounds win when
/// both are present.
#[derive(Debug, Deserialize, IntoParams)]
pub struct WindowParams {
    /// Named period key, e.g. "last_7d" or "this_month"
    pub period: Option<String>,
    /// Explicit range start (inclusive, whole day)
    pub from: Option<NaiveDate>,
    /// Explicit range end (inclusive, whole day)
    pub to: Option<NaiveDate>,
}

fn resolve_window(state: &AppState, params: &WindowParams) -> Result<ReportingWindow, ServiceError> {
    match (params.from, params.to) {
        (Some(from), Some(to)) => resolve_explicit(from, to),
        (Some(_), None) | (None, Some(_)) => Err(ServiceError::InvalidRequest(
            "explicit ranges need both from and to".into(),
        )),
        (None, None) => {
            let key = params.period.as_deref().unwrap_or("today");
            state
                .services
                .reporting
                .resolve_key(key, Utc::now().date_naive())
        }
    }
}

/// Resolve a reporting window from a period key or explicit bounds.
#[utoipa::path(
    get,
    path = "/api/v1/reports/window",
    params(WindowParams),
    responses(
        (status = 200, description = "Resolved window", body = crate::ApiResponse<ReportingWindow>),
        (status = 400, description = "Invalid range", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn reporting_window(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<WindowParams>,
) -> Result<Json<ApiResponse<ReportingWindow>>, ServiceError> {
    authenticated_merchant(&state, &headers).await?;
    let window = resolve_window(&state, &params)?;
    Ok(Json(ApiResponse::success(window)))
}

/// Window-filtered aggregates for the authenticated merchant's dashboard.
#[utoipa::path(
    get,
    path = "/api/v1/reports/summary",
    params(WindowParams),
    responses(
        (status = 200, description = "Counts and revenue inside the window", body = crate::ApiResponse<ReportSummary>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn reporting_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<WindowParams>,
) -> Result<Json<ApiResponse<ReportSummary>>, ServiceError> {
    let merchant = authenticated_merchant(&state, &headers).await?;
    let window = resolve_window(&state, &params)?;
    let summary = state
        .services
        .reporting
        .summary(merchant.id, window)
        .await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Reporting routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/window", get(reporting_window))
        .route("/summary", get(reporting_summary))
}
