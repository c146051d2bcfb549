use async_trait::async_trait;
use chrono::Utc;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use super::{
    from_minor_units, map_status_error, map_transport_error, require_signature_header,
    to_minor_units, verify_body_hmac, PaymentNotification, PaymentProvider, ProviderConfig,
    ProviderKind, ProviderSession, SessionRequest,
};
use crate::errors::ServiceError;

const DEFAULT_ENDPOINT: &str = "https://api.univapay.com";
const SIGNATURE_HEADER: &str = "x-univapay-signature";

/// UnivaPay adapter: token-authenticated JSON API, hex HMAC webhook
/// signature over the raw body. No subscription portal.
pub struct UnivaPayAdapter {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl UnivaPayAdapter {
    pub fn new(config: ProviderConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn endpoint(&self) -> &str {
        self.config
            .endpoint_override
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
    }
}

#[derive(Serialize)]
struct CreateSessionBody<'a> {
    amount: i64,
    currency: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_email: Option<&'a str>,
    metadata: SessionMetadataBody,
}

#[derive(Serialize)]
struct SessionMetadataBody {
    funnel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliate_id: Option<String>,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    id: String,
    redirect_url: String,
}

#[derive(Deserialize)]
struct ChargeNotification {
    id: String,
    status: String,
    amount: i64,
    currency: String,
    #[serde(default)]
    metadata: ChargeMetadata,
    customer: Option<ChargeCustomer>,
}

#[derive(Deserialize, Default)]
struct ChargeMetadata {
    funnel_id: Option<String>,
    affiliate_id: Option<String>,
}

#[derive(Deserialize)]
struct ChargeCustomer {
    email: Option<String>,
    name: Option<String>,
}

#[async_trait]
impl PaymentProvider for UnivaPayAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Univapay
    }

    #[instrument(skip(self, request), fields(funnel_id = %request.funnel_id))]
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<ProviderSession, ServiceError> {
        let amount = to_minor_units(request.total_amount(), &request.currency)?;
        let body = CreateSessionBody {
            amount,
            currency: &request.currency,
            success_url: &request.success_url,
            cancel_url: &request.cancel_url,
            customer_email: request.customer_email.as_deref(),
            metadata: SessionMetadataBody {
                funnel_id: request.funnel_id.to_string(),
                affiliate_id: request.affiliate_id.map(|id| id.to_string()),
            },
        };

        let response = self
            .client
            .post(format!("{}/checkout_sessions", self.endpoint()))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(self.kind(), e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status_error(self.kind(), status, &body));
        }

        let session: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::ProviderUnavailable(format!("univapay: {e}")))?;

        Ok(ProviderSession {
            provider_session_id: session.id,
            redirect_url: session.redirect_url,
        })
    }

    fn verify_notification(
        &self,
        payload: &[u8],
        headers: &HeaderMap,
    ) -> Result<Option<PaymentNotification>, ServiceError> {
        let signature = require_signature_header(headers, SIGNATURE_HEADER)?;
        verify_body_hmac(&self.config.webhook_secret, payload, signature)?;

        let charge: ChargeNotification = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::MalformedPayload(format!("univapay charge: {e}")))?;

        // Pending/failed charge callbacks verify fine but carry no payment.
        if charge.status != "successful" {
            return Ok(None);
        }

        let currency = charge.currency.to_ascii_uppercase();
        Ok(Some(PaymentNotification {
            provider: ProviderKind::Univapay,
            external_reference: charge.id,
            amount: from_minor_units(charge.amount, &currency),
            currency,
            funnel_id: charge.metadata.funnel_id.and_then(|s| Uuid::parse_str(&s).ok()),
            affiliate_id: charge
                .metadata
                .affiliate_id
                .and_then(|s| Uuid::parse_str(&s).ok()),
            customer_email: charge.customer.as_ref().and_then(|c| c.email.clone()),
            customer_name: charge.customer.as_ref().and_then(|c| c.name.clone()),
            received_at: Utc::now(),
        }))
    }

    async fn open_management_portal(
        &self,
        _customer_id: &str,
        _return_url: &str,
    ) -> Result<String, ServiceError> {
        Err(ServiceError::Unsupported(
            "univapay does not offer a management portal".into(),
        ))
    }
}
