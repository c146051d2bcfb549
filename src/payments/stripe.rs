use async_trait::async_trait;
use chrono::Utc;
use http::HeaderMap;
use serde::Deserialize;
use std::time::Duration;
use tracing::{instrument, warn};
use uuid::Uuid;

use super::{
    constant_time_eq, from_minor_units, hmac_sha256_hex, map_status_error, map_transport_error,
    require_signature_header, to_minor_units, PaymentNotification, PaymentProvider,
    ProviderConfig, ProviderKind, ProviderSession, SessionRequest,
};
use crate::errors::ServiceError;

const DEFAULT_ENDPOINT: &str = "https://api.stripe.com";
const SIGNATURE_HEADER: &str = "stripe-signature";
const COMPLETED_EVENT: &str = "checkout.session.completed";

/// Stripe adapter: hosted Checkout session + signed webhook + billing portal.
pub struct StripeAdapter {
    config: ProviderConfig,
    client: reqwest::Client,
    webhook_tolerance: Duration,
}

impl StripeAdapter {
    pub fn new(
        config: ProviderConfig,
        client: reqwest::Client,
        webhook_tolerance: Duration,
    ) -> Self {
        Self {
            config,
            client,
            webhook_tolerance,
        }
    }

    fn endpoint(&self) -> &str {
        self.config
            .endpoint_override
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
    }

    /// Splits `Stripe-Signature: t=<ts>,v1=<hex>[,v1=...]` into parts.
    fn parse_signature_header(value: &str) -> Option<(i64, Vec<&str>)> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in value.split(',') {
            match part.trim().split_once('=') {
                Some(("t", ts)) => timestamp = ts.parse().ok(),
                Some(("v1", sig)) => signatures.push(sig),
                _ => {}
            }
        }
        match (timestamp, signatures.is_empty()) {
            (Some(ts), false) => Some((ts, signatures)),
            _ => None,
        }
    }

    fn verify_signature(&self, payload: &[u8], headers: &HeaderMap) -> Result<(), ServiceError> {
        let header = require_signature_header(headers, SIGNATURE_HEADER)?;
        let (timestamp, signatures) =
            Self::parse_signature_header(header).ok_or(ServiceError::InvalidSignature)?;

        let age = (Utc::now().timestamp() - timestamp).unsigned_abs();
        if age > self.webhook_tolerance.as_secs() {
            warn!(age_secs = age, "stripe webhook timestamp outside tolerance");
            return Err(ServiceError::InvalidSignature);
        }

        let mut signed = timestamp.to_string().into_bytes();
        signed.push(b'.');
        signed.extend_from_slice(payload);
        let expected = hmac_sha256_hex(&self.config.webhook_secret, &signed);

        if signatures.iter().any(|sig| constant_time_eq(&expected, sig)) {
            Ok(())
        } else {
            Err(ServiceError::InvalidSignature)
        }
    }
}

#[derive(Deserialize)]
struct CheckoutSessionResponse {
    id: String,
    url: String,
}

#[derive(Deserialize)]
struct PortalSessionResponse {
    url: String,
}

#[derive(Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookEventData,
}

#[derive(Deserialize)]
struct WebhookEventData {
    object: CheckoutSessionObject,
}

#[derive(Deserialize)]
struct CheckoutSessionObject {
    id: String,
    payment_intent: Option<String>,
    amount_total: Option<i64>,
    currency: Option<String>,
    #[serde(default)]
    metadata: SessionMetadata,
    customer_details: Option<CustomerDetails>,
}

#[derive(Deserialize, Default)]
struct SessionMetadata {
    funnel_id: Option<String>,
    affiliate_id: Option<String>,
}

#[derive(Deserialize)]
struct CustomerDetails {
    email: Option<String>,
    name: Option<String>,
}

#[async_trait]
impl PaymentProvider for StripeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    #[instrument(skip(self, request), fields(funnel_id = %request.funnel_id))]
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<ProviderSession, ServiceError> {
        let currency = request.currency.to_ascii_lowercase();
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("success_url".into(), request.success_url.clone()),
            ("cancel_url".into(), request.cancel_url.clone()),
            ("metadata[funnel_id]".into(), request.funnel_id.to_string()),
        ];
        if let Some(affiliate_id) = request.affiliate_id {
            form.push(("metadata[affiliate_id]".into(), affiliate_id.to_string()));
        }
        if let Some(email) = &request.customer_email {
            form.push(("customer_email".into(), email.clone()));
        }
        for (i, item) in request.line_items.iter().enumerate() {
            let unit_amount = to_minor_units(item.unit_price, &currency)?;
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                currency.clone(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                item.name.clone(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                unit_amount.to_string(),
            ));
            form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
        }

        let response = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.endpoint()))
            .basic_auth(&self.config.api_key, Option::<&str>::None)
            .form(&form)
            .send()
            .await
            .map_err(|e| map_transport_error(self.kind(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(self.kind(), status, &body));
        }

        let session: CheckoutSessionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ProviderUnavailable(format!("stripe: {e}")))?;

        Ok(ProviderSession {
            provider_session_id: session.id,
            redirect_url: session.url,
        })
    }

    fn verify_notification(
        &self,
        payload: &[u8],
        headers: &HeaderMap,
    ) -> Result<Option<PaymentNotification>, ServiceError> {
        self.verify_signature(payload, headers)?;

        let event: WebhookEvent = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::MalformedPayload(format!("stripe event: {e}")))?;

        // Verified but not a payment completion: acknowledge without action.
        if event.event_type != COMPLETED_EVENT {
            return Ok(None);
        }

        let object = event.data.object;
        let currency = object
            .currency
            .ok_or_else(|| ServiceError::MalformedPayload("missing currency".into()))?
            .to_ascii_uppercase();
        let amount_minor = object
            .amount_total
            .ok_or_else(|| ServiceError::MalformedPayload("missing amount_total".into()))?;

        // The payment intent is the durable payment identity; fall back to the
        // session id for payment-method flows that do not produce one.
        let external_reference = object.payment_intent.unwrap_or(object.id);

        Ok(Some(PaymentNotification {
            provider: ProviderKind::Stripe,
            external_reference,
            amount: from_minor_units(amount_minor, &currency),
            currency,
            funnel_id: object.metadata.funnel_id.and_then(|s| Uuid::parse_str(&s).ok()),
            affiliate_id: object
                .metadata
                .affiliate_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            customer_email: object.customer_details.as_ref().and_then(|c| c.email.clone()),
            customer_name: object.customer_details.as_ref().and_then(|c| c.name.clone()),
            received_at: Utc::now(),
        }))
    }

    async fn open_management_portal(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, ServiceError> {
        let form = [("customer", customer_id), ("return_url", return_url)];

        let response = self
            .client
            .post(format!("{}/v1/billing_portal/sessions", self.endpoint()))
            .basic_auth(&self.config.api_key, Option::<&str>::None)
            .form(&form)
            .send()
            .await
            .map_err(|e| map_transport_error(self.kind(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(self.kind(), status, &body));
        }

        let portal: PortalSessionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ProviderUnavailable(format!("stripe: {e}")))?;
        Ok(portal.url)
    }
}
