use axum::{
    extract::{Json, State},
    http::HeaderMap,
    routing::post,
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::{authenticated_merchant, AppState};
use crate::payments::{adapter_for, ProviderKind};
use crate::ApiResponse;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PortalRequest {
    pub provider: ProviderKind,
    /// The provider's customer id for the subscriber
    #[validate(length(min = 1, message = "customer_id is required"))]
    pub customer_id: String,
    #[validate(url(message = "return_url must be a valid URL"))]
    pub return_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PortalResponse {
    pub redirect_url: String,
}

/// Open a subscription management portal for a customer.
///
/// Only subscription-capable providers support this; the rest answer
/// `Unsupported`.
#[utoipa::path(
    post,
    path = "/api/v1/portal",
    request_body = PortalRequest,
    responses(
        (status = 200, description = "Portal redirect", body = crate::ApiResponse<PortalResponse>),
        (status = 400, description = "Provider has no portal", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn open_portal(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PortalRequest>,
) -> Result<Json<ApiResponse<PortalResponse>>, ServiceError> {
    let merchant = authenticated_merchant(&state, &headers).await?;
    request.validate()?;

    let credentials = state
        .services
        .merchants
        .credentials_for(merchant.id, request.provider)
        .await?;

    let adapter = adapter_for(
        request.provider,
        (&credentials).into(),
        state.services.http.clone(),
        Duration::from_secs(state.config.webhook_tolerance_secs),
    );

    let redirect_url = adapter
        .open_management_portal(&request.customer_id, &request.return_url)
        .await?;

    Ok(Json(ApiResponse::success(PortalResponse { redirect_url })))
}

/// Portal routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(open_portal))
}
