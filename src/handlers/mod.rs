pub mod affiliates;
pub mod checkout;
pub mod portal;
pub mod reports;
pub mod tracking;
pub mod webhooks;

use axum::http::HeaderMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::merchant::Model as MerchantModel;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub affiliates: Arc<services::affiliates::AffiliateService>,
    pub merchants: Arc<services::merchants::MerchantService>,
    pub checkout: Arc<services::checkout::CheckoutService>,
    pub fulfillment: Arc<services::fulfillment::FulfillmentService>,
    pub tracking: Arc<services::tracking::TrackingService>,
    pub reporting: Arc<services::reporting::ReportingService>,
    pub dispatch: Arc<services::dispatch::DispatchService>,
    /// Shared outbound client with the configured provider timeout
    pub http: reqwest::Client,
}

impl AppServices {
    /// Wires the full service graph from a database pool and configuration.
    pub fn new(db: Arc<DbPool>, config: &AppConfig, event_sender: EventSender) -> Self {
        let provider_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.provider_timeout_secs))
            .build()
            .unwrap_or_default();
        let dispatch_http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.dispatch_timeout_secs))
            .build()
            .unwrap_or_default();

        let affiliates = Arc::new(services::affiliates::AffiliateService::new(db.clone()));
        let merchants = Arc::new(services::merchants::MerchantService::new(db.clone()));
        let contacts = Arc::new(services::contacts::ContactService::new(db.clone()));
        let dispatch = Arc::new(services::dispatch::DispatchService::new(dispatch_http));
        let tracking = Arc::new(services::tracking::TrackingService::new(
            db.clone(),
            config.fingerprint_key.clone(),
        ));
        let reporting = Arc::new(services::reporting::ReportingService::new(
            db.clone(),
            config.reporting.clone(),
        ));
        let checkout = Arc::new(services::checkout::CheckoutService::new(
            affiliates.clone(),
            merchants.clone(),
            event_sender.clone(),
            provider_http.clone(),
            Duration::from_secs(config.webhook_tolerance_secs),
        ));
        let fulfillment = Arc::new(services::fulfillment::FulfillmentService::new(
            db,
            merchants.clone(),
            contacts,
            dispatch.clone(),
            event_sender,
        ));

        Self {
            affiliates,
            merchants,
            checkout,
            fulfillment,
            tracking,
            reporting,
            dispatch,
            http: provider_http,
        }
    }
}

/// Resolves the merchant behind a `Authorization: Bearer <api key>` header.
/// Issuing keys is the upstream auth system's concern; this only looks the
/// presented key up.
pub async fn authenticated_merchant(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<MerchantModel, ServiceError> {
    let token = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer api key".into()))?;

    state.services.merchants.authenticate(token).await
}

/// Best-effort client IP: honors the usual proxy headers before falling back.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}
