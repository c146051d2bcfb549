use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use axum_extra::extract::cookie::CookieJar;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::checkout::{CheckoutRedirect, StartCheckoutRequest};
use crate::ApiResponse;

/// Start a checkout session against the funnel's configured provider.
///
/// The visitor's attribution cookie rides along; a token that matches no
/// affiliate simply produces an unattributed checkout.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = StartCheckoutRequest,
    responses(
        (status = 200, description = "Redirect target for the provider-hosted checkout", body = crate::ApiResponse<CheckoutRedirect>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 502, description = "Provider unavailable", body = crate::errors::ErrorResponse),
        (status = 503, description = "Payment unavailable for this funnel", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn start_checkout(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<StartCheckoutRequest>,
) -> Result<Json<ApiResponse<CheckoutRedirect>>, ServiceError> {
    let attribution_token = jar
        .get(&state.config.affiliate_cookie_name)
        .map(|cookie| cookie.value().to_string());

    let redirect = state
        .services
        .checkout
        .start_checkout(request, attribution_token.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(redirect)))
}

/// Checkout routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/", post(start_checkout))
}
