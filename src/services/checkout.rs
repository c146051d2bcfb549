use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::payments::{adapter_for, LineItem, ProviderKind, SessionRequest};
use crate::services::affiliates::AffiliateService;
use crate::services::merchants::MerchantService;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "funnel_id": "550e8400-e29b-41d4-a716-446655440000",
    "provider": "stripe",
    "line_items": [{"name": "Creator Course", "unit_price": "149.00", "quantity": 1}],
    "currency": "USD",
    "success_url": "https://funnel.example/thanks",
    "cancel_url": "https://funnel.example/checkout"
}))]
pub struct StartCheckoutRequest {
    pub funnel_id: Uuid,
    pub provider: ProviderKind,
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub line_items: Vec<CheckoutLineItem>,
    #[validate(length(min = 3, max = 3, message = "Currency must be 3 characters"))]
    pub currency: String,
    #[validate(url(message = "success_url must be a valid URL"))]
    pub success_url: String,
    #[validate(url(message = "cancel_url must be a valid URL"))]
    pub cancel_url: String,
    #[validate(email(message = "customer_email must be a valid email"))]
    pub customer_email: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutLineItem {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CheckoutRedirect {
    pub redirect_url: String,
    pub provider_session_id: String,
}

/// Orchestrates checkout creation: attaches attribution, resolves the
/// merchant's provider configuration, and delegates session creation to the
/// matching adapter. The provider is the source of truth for the session
/// until its notification arrives; nothing durable is written here.
#[derive(Clone)]
pub struct CheckoutService {
    affiliates: Arc<AffiliateService>,
    merchants: Arc<MerchantService>,
    events: EventSender,
    http: reqwest::Client,
    webhook_tolerance: Duration,
}

impl CheckoutService {
    pub fn new(
        affiliates: Arc<AffiliateService>,
        merchants: Arc<MerchantService>,
        events: EventSender,
        http: reqwest::Client,
        webhook_tolerance: Duration,
    ) -> Self {
        Self {
            affiliates,
            merchants,
            events,
            http,
            webhook_tolerance,
        }
    }

    #[instrument(skip(self, request, attribution_token), fields(funnel_id = %request.funnel_id, provider = %request.provider))]
    pub async fn start_checkout(
        &self,
        request: StartCheckoutRequest,
        attribution_token: Option<&str>,
    ) -> Result<CheckoutRedirect, ServiceError> {
        request.validate()?;
        for item in &request.line_items {
            if item.quantity == 0 {
                return Err(ServiceError::ValidationError(
                    "line item quantity must be positive".into(),
                ));
            }
            if item.unit_price <= Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "line item unit price must be positive".into(),
                ));
            }
        }

        let funnel = self
            .merchants
            .find_funnel(request.funnel_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidRequest(format!("unknown funnel {}", request.funnel_id))
            })?;

        // Soft resolution: a broken attribution token never blocks checkout
        let affiliate_id = self.affiliates.resolve(attribution_token).await;

        let credentials = self
            .merchants
            .credentials_for(funnel.merchant_id, request.provider)
            .await?;

        let adapter = adapter_for(
            request.provider,
            (&credentials).into(),
            self.http.clone(),
            self.webhook_tolerance,
        );

        let session_request = SessionRequest {
            funnel_id: funnel.id,
            affiliate_id,
            line_items: request
                .line_items
                .iter()
                .map(|item| LineItem {
                    name: item.name.clone(),
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                })
                .collect(),
            currency: request.currency.to_ascii_uppercase(),
            success_url: request.success_url.clone(),
            cancel_url: request.cancel_url.clone(),
            customer_email: request.customer_email.clone(),
        };

        // Adapter errors are returned unmodified in kind
        let session = adapter.create_session(&session_request).await?;

        crate::metrics::CHECKOUT_SESSIONS
            .with_label_values(&[&request.provider.to_string()])
            .inc();
        info!(
            provider_session_id = %session.provider_session_id,
            affiliate_attributed = affiliate_id.is_some(),
            "checkout session created"
        );
        self.events
            .send_or_log(Event::CheckoutSessionCreated {
                funnel_id: funnel.id,
                provider: request.provider.to_string(),
                provider_session_id: session.provider_session_id.clone(),
                affiliate_id,
            })
            .await;

        Ok(CheckoutRedirect {
            redirect_url: session.redirect_url,
            provider_session_id: session.provider_session_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request() -> StartCheckoutRequest {
        StartCheckoutRequest {
            funnel_id: Uuid::new_v4(),
            provider: ProviderKind::Stripe,
            line_items: vec![CheckoutLineItem {
                name: "Course".into(),
                unit_price: dec!(149.00),
                quantity: 1,
            }],
            currency: "USD".into(),
            success_url: "https://funnel.example/thanks".into(),
            cancel_url: "https://funnel.example/checkout".into(),
            customer_email: None,
        }
    }

    #[test]
    fn request_validation_accepts_well_formed_input() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn request_validation_rejects_bad_currency_and_urls() {
        let mut bad_currency = request();
        bad_currency.currency = "USDT".into();
        assert!(bad_currency.validate().is_err());

        let mut bad_url = request();
        bad_url.success_url = "not a url".into();
        assert!(bad_url.validate().is_err());
    }
}
