use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::payments::{adapter_for, ProviderKind};
use crate::services::fulfillment::FulfillmentOutcome;

/// Inbound payment notification endpoint, one URL per (provider, merchant).
///
/// Signature verification happens before the ledger is touched. Every
/// acknowledged case answers 2xx, including redeliveries and semantically
/// invalid payloads, so the provider stops retrying; only verification
/// failures and infrastructure errors are non-2xx.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhooks/{provider}/{merchant_id}",
    params(
        ("provider" = String, Path, description = "Provider name: stripe, univapay or aquagates"),
        ("merchant_id" = Uuid, Path, description = "Merchant the endpoint was registered for")
    ),
    request_body = String,
    responses(
        (status = 200, description = "Notification acknowledged"),
        (status = 400, description = "Malformed payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 503, description = "Provider not configured for this merchant", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Path((provider, merchant_id)): Path<(String, Uuid)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let provider = ProviderKind::parse(&provider)?;
    crate::metrics::WEBHOOKS_RECEIVED
        .with_label_values(&[&provider.to_string()])
        .inc();

    let merchant = state
        .services
        .merchants
        .find(merchant_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("merchant {merchant_id} not found")))?;

    let credentials = state
        .services
        .merchants
        .credentials_for(merchant.id, provider)
        .await?;

    let adapter = adapter_for(
        provider,
        (&credentials).into(),
        state.services.http.clone(),
        Duration::from_secs(state.config.webhook_tolerance_secs),
    );

    // Mandatory gate: nothing below runs on an unverified payload
    let notification = match adapter.verify_notification(&body, &headers) {
        Ok(Some(notification)) => notification,
        Ok(None) => {
            info!(provider = %provider, "verified non-payment notification acknowledged");
            return Ok((StatusCode::OK, "ok"));
        }
        Err(e) => {
            warn!(provider = %provider, error = %e, "webhook rejected");
            crate::metrics::WEBHOOKS_REJECTED
                .with_label_values(&[match &e {
                    ServiceError::InvalidSignature => "invalid_signature",
                    ServiceError::MalformedPayload(_) => "malformed_payload",
                    _ => "other",
                }])
                .inc();
            return Err(e);
        }
    };

    match state
        .services
        .fulfillment
        .process(&merchant, notification)
        .await?
    {
        FulfillmentOutcome::Fulfilled { order_id } => {
            info!(order_id = %order_id, "notification fulfilled");
        }
        FulfillmentOutcome::AlreadyProcessed => {
            info!("notification already processed");
        }
        FulfillmentOutcome::Invalid { order_id, reason } => {
            warn!(order_id = %order_id, reason = %reason, "notification recorded as failed");
        }
    }

    Ok((StatusCode::OK, "ok"))
}

/// Webhook routes (unauthenticated, signature-verified)
pub fn routes() -> Router<AppState> {
    Router::new().route("/:provider/:merchant_id", post(payment_webhook))
}
