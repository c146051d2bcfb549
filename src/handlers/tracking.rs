use axum::{
    extract::{Json, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::handlers::{client_ip, AppState};
use crate::services::tracking::VisitInput;
use crate::ApiResponse;

#[derive(Debug, Deserialize, ToSchema)]
pub struct TrackVisitRequest {
    pub funnel_id: Uuid,
    pub funnel_step_id: Option<Uuid>,
    pub referrer: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackVisitResponse {
    pub recorded: bool,
}

/// Record a page view.
///
/// Fire-and-forget contract: the write happens on a detached task with its
/// own error containment, and the endpoint answers success-shaped no matter
/// what — tracking must never degrade the visitor-facing page.
#[utoipa::path(
    post,
    path = "/api/v1/track",
    request_body = TrackVisitRequest,
    responses(
        (status = 200, description = "Acknowledged (even on internal failure)", body = crate::ApiResponse<TrackVisitResponse>)
    ),
    tag = "Tracking"
)]
pub async fn track_visit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TrackVisitRequest>,
) -> Json<ApiResponse<TrackVisitResponse>> {
    let input = VisitInput {
        funnel_id: request.funnel_id,
        funnel_step_id: request.funnel_step_id,
        user_agent: headers
            .get(http::header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string(),
        ip_address: client_ip(&headers),
        referrer: request.referrer,
    };

    let tracking = state.services.tracking.clone();
    tokio::spawn(async move {
        // record_visit contains its own failures; nothing propagates here
        tracking.record_visit(input).await;
    });

    Json(ApiResponse::success(TrackVisitResponse { recorded: true }))
}

/// Tracking routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(track_visit))
}
