use async_trait::async_trait;
use chrono::Utc;
use http::HeaderMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use super::{
    map_status_error, map_transport_error, require_signature_header, verify_body_hmac,
    PaymentNotification, PaymentProvider, ProviderConfig, ProviderKind, ProviderSession,
    SessionRequest,
};
use crate::errors::ServiceError;

const DEFAULT_ENDPOINT: &str = "https://gateway.aquagates.jp";
const SIGNATURE_HEADER: &str = "x-aquagates-signature";

/// AquaGates adapter: api-key JSON gateway, hex HMAC webhook signature over
/// the raw body. Amounts are exchanged in major units. No portal.
pub struct AquaGatesAdapter {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl AquaGatesAdapter {
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
    amount: Decimal,
    currency: &'a str,
    return_url: &'a str,
    cancel_url: &'a str,
    funnel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    affiliate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buyer_email: Option<&'a str>,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    session_id: String,
    payment_url: String,
}

#[derive(Deserialize)]
struct TransactionNotification {
    transaction_id: String,
    result: String,
    amount: Decimal,
    currency: String,
    funnel_id: Option<String>,
    affiliate_id: Option<String>,
    buyer_email: Option<String>,
    buyer_name: Option<String>,
}

#[async_trait]
impl PaymentProvider for AquaGatesAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Aquagates
    }

    #[instrument(skip(self, request), fields(funnel_id = %request.funnel_id))]
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<ProviderSession, ServiceError> {
        let body = CreateSessionBody {
            amount: request.total_amount(),
            currency: &request.currency,
            return_url: &request.success_url,
            cancel_url: &request.cancel_url,
            funnel_id: request.funnel_id.to_string(),
            affiliate_id: request.affiliate_id.map(|id| id.to_string()),
            buyer_email: request.customer_email.as_deref(),
        };

        let response = self
            .client
            .post(format!("{}/api/v2/sessions", self.endpoint()))
            .header("x-api-key", &self.config.api_key)
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
            .map_err(|e| ServiceError::ProviderUnavailable(format!("aquagates: {e}")))?;

        Ok(ProviderSession {
            provider_session_id: session.session_id,
            redirect_url: session.payment_url,
        })
    }

    fn verify_notification(
        &self,
        payload: &[u8],
        headers: &HeaderMap,
    ) -> Result<Option<PaymentNotification>, ServiceError> {
        let signature = require_signature_header(headers, SIGNATURE_HEADER)?;
        verify_body_hmac(&self.config.webhook_secret, payload, signature)?;

        let txn: TransactionNotification = serde_json::from_slice(payload)
            .map_err(|e| ServiceError::MalformedPayload(format!("aquagates transaction: {e}")))?;

        if txn.result != "captured" {
            return Ok(None);
        }

        Ok(Some(PaymentNotification {
            provider: ProviderKind::Aquagates,
            external_reference: txn.transaction_id,
            amount: txn.amount,
            currency: txn.currency.to_ascii_uppercase(),
            funnel_id: txn.funnel_id.and_then(|s| Uuid::parse_str(&s).ok()),
            affiliate_id: txn.affiliate_id.and_then(|s| Uuid::parse_str(&s).ok()),
            customer_email: txn.buyer_email,
            customer_name: txn.buyer_name,
            received_at: Utc::now(),
        }))
    }

    async fn open_management_portal(
        &self,
        _customer_id: &str,
        _return_url: &str,
    ) -> Result<String, ServiceError> {
        Err(ServiceError::Unsupported(
            "aquagates does not offer a management portal".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payments::hmac_sha256_hex;
    use http::HeaderValue;
    use rust_decimal_macros::dec;

    fn adapter() -> AquaGatesAdapter {
        AquaGatesAdapter::new(
            ProviderConfig {
                api_key: "ag_key_1".into(),
                api_secret: None,
                webhook_secret: "ag_secret".into(),
                endpoint_override: None,
            },
            reqwest::Client::new(),
        )
    }

    fn signed_headers(payload: &[u8]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            SIGNATURE_HEADER,
            HeaderValue::from_str(&hmac_sha256_hex("ag_secret", payload)).unwrap(),
        );
        headers
    }

    #[test]
    fn captured_transaction_parses() {
        let adapter = adapter();
        let funnel_id = Uuid::new_v4();
        let affiliate_id = Uuid::new_v4();
        let payload = serde_json::json!({
            "transaction_id": "AGT-2024-000123",
            "result": "captured",
            "amount": "19800",
            "currency": "jpy",
            "funnel_id": funnel_id.to_string(),
            "affiliate_id": affiliate_id.to_string(),
            "buyer_email": "buyer@example.jp",
            "buyer_name": "山田 太郎"
        })
        .to_string()
        .into_bytes();

        let notification = adapter
            .verify_notification(&payload, &signed_headers(&payload))
            .unwrap()
            .expect("captured transaction should yield a notification");

        assert_eq!(notification.external_reference, "AGT-2024-000123");
        assert_eq!(notification.amount, dec!(19800));
        assert_eq!(notification.funnel_id, Some(funnel_id));
        assert_eq!(notification.affiliate_id, Some(affiliate_id));
    }

    #[test]
    fn declined_transaction_is_acknowledged_without_action() {
        let adapter = adapter();
        let payload = serde_json::json!({
            "transaction_id": "AGT-2024-000124",
            "result": "declined",
            "amount": "500",
            "currency": "jpy"
        })
        .to_string()
        .into_bytes();

        assert!(adapter
            .verify_notification(&payload, &signed_headers(&payload))
            .unwrap()
            .is_none());
    }

    #[test]
    fn garbage_payload_with_valid_signature_is_malformed() {
        let adapter = adapter();
        let payload = b"not json at all";
        assert!(matches!(
            adapter.verify_notification(payload, &signed_headers(payload)),
            Err(ServiceError::MalformedPayload(_))
        ));
    }
}
