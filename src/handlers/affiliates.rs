use axum::{
    extract::{Json, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};

use crate::entities::affiliate::Model as AffiliateModel;
use crate::errors::ServiceError;
use crate::handlers::{authenticated_merchant, AppState};
use crate::services::affiliates::CreateAffiliateRequest;
use crate::ApiResponse;

/// Look up an affiliate by code.
#[utoipa::path(
    get,
    path = "/api/v1/affiliates/{code}",
    params(("code" = String, Path, description = "Affiliate code")),
    responses(
        (status = 200, description = "Affiliate", body = crate::ApiResponse<serde_json::Value>),
        (status = 404, description = "Not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Affiliates"
)]
pub async fn get_affiliate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Result<Json<ApiResponse<AffiliateModel>>, ServiceError> {
    authenticated_merchant(&state, &headers).await?;

    let affiliate = state
        .services
        .affiliates
        .find_by_code(&code)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("affiliate {code} not found")))?;

    Ok(Json(ApiResponse::success(affiliate)))
}

/// Register an affiliate code.
#[utoipa::path(
    post,
    path = "/api/v1/affiliates",
    request_body = CreateAffiliateRequest,
    responses(
        (status = 201, description = "Affiliate created", body = crate::ApiResponse<serde_json::Value>),
        (status = 409, description = "Code already exists", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Affiliates"
)]
pub async fn create_affiliate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateAffiliateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AffiliateModel>>), ServiceError> {
    authenticated_merchant(&state, &headers).await?;

    let affiliate = state.services.affiliates.create(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(affiliate))))
}

/// Affiliate routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_affiliate))
        .route("/:code", get(get_affiliate))
}
