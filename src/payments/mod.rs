//! Payment provider adapters.
//!
//! One adapter per provider behind a single capability trait: create a
//! redirect-based checkout session, verify an asynchronous payment
//! notification, open a subscription management portal. Adapters are built
//! per request from a merchant's stored credentials; nothing provider-specific
//! leaks past this module boundary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http::HeaderMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;

use crate::entities::provider_credentials;
use crate::errors::ServiceError;

mod aquagates;
mod stripe;
mod univapay;

pub use aquagates::AquaGatesAdapter;
pub use stripe::StripeAdapter;
pub use univapay::UnivaPayAdapter;

type HmacSha256 = Hmac<Sha256>;

/// Supported payment providers
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Stripe,
    Univapay,
    Aquagates,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        value
            .parse()
            .map_err(|_| ServiceError::InvalidRequest(format!("unknown payment provider: {value}")))
    }
}

/// Adapter configuration taken from a merchant's stored credentials row.
/// Constructed fresh per request so merchants never share client state.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub api_secret: Option<String>,
    pub webhook_secret: String,
    pub endpoint_override: Option<String>,
}

impl From<&provider_credentials::Model> for ProviderConfig {
    fn from(row: &provider_credentials::Model) -> Self {
        Self {
            api_key: row.api_key.clone(),
            api_secret: row.api_secret.clone(),
            webhook_secret: row.webhook_secret.clone(),
            endpoint_override: row.endpoint_override.clone(),
        }
    }
}

/// One purchasable line of a checkout request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Everything an adapter needs to open a provider-hosted checkout session.
/// Funnel and affiliate ids ride along as opaque metadata so the asynchronous
/// notification can carry them back.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub funnel_id: Uuid,
    pub affiliate_id: Option<Uuid>,
    pub line_items: Vec<LineItem>,
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
}

impl SessionRequest {
    pub fn total_amount(&self) -> Decimal {
        self.line_items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum()
    }
}

/// Provider-hosted session handle returned by `create_session`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSession {
    pub provider_session_id: String,
    pub redirect_url: String,
}

/// A verified payment-completed notification. Only `verify_notification`
/// produces these; an unverified payload never reaches the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentNotification {
    pub provider: ProviderKind,
    /// The provider's unique identifier for the payment; the idempotency key
    pub external_reference: String,
    pub amount: Decimal,
    pub currency: String,
    pub funnel_id: Option<Uuid>,
    pub affiliate_id: Option<Uuid>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub received_at: DateTime<Utc>,
}

/// Uniform capability surface over the payment providers.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Opens a provider-hosted checkout session and returns the redirect
    /// target. Transport failures and provider 5xx map to
    /// `ProviderUnavailable`; provider 4xx maps to `InvalidRequest`.
    async fn create_session(
        &self,
        request: &SessionRequest,
    ) -> Result<ProviderSession, ServiceError>;

    /// Verifies the signature over the raw payload, then parses it. Must be
    /// called before any side effect; a mis-signed payload is rejected with
    /// `InvalidSignature` and never parsed further. `Ok(None)` means the
    /// payload verified but carries no completed payment (a non-payment event
    /// or a non-success status) and must be acknowledged without action.
    fn verify_notification(
        &self,
        payload: &[u8],
        headers: &HeaderMap,
    ) -> Result<Option<PaymentNotification>, ServiceError>;

    /// Subscription-capable providers return a management portal URL; the
    /// rest answer `Unsupported`.
    async fn open_management_portal(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, ServiceError>;
}

/// Builds the adapter for a provider from a merchant's credentials.
pub fn adapter_for(
    kind: ProviderKind,
    config: ProviderConfig,
    client: reqwest::Client,
    webhook_tolerance: Duration,
) -> Box<dyn PaymentProvider> {
    match kind {
        ProviderKind::Stripe => Box::new(StripeAdapter::new(config, client, webhook_tolerance)),
        ProviderKind::Univapay => Box::new(UnivaPayAdapter::new(config, client)),
        ProviderKind::Aquagates => Box::new(AquaGatesAdapter::new(config, client)),
    }
}

/// Currencies whose minor unit equals the major unit (no decimal places).
const ZERO_DECIMAL_CURRENCIES: &[&str] = &["bif", "clp", "djf", "gnf", "jpy", "kmf", "krw", "mga",
    "pyg", "rwf", "vnd", "vuv", "xaf", "xof", "xpf"];

fn is_zero_decimal(currency: &str) -> bool {
    ZERO_DECIMAL_CURRENCIES.contains(&currency.to_ascii_lowercase().as_str())
}

/// Converts a major-unit amount to the provider's integer minor units.
pub(crate) fn to_minor_units(amount: Decimal, currency: &str) -> Result<i64, ServiceError> {
    let scaled = if is_zero_decimal(currency) {
        amount
    } else {
        amount * Decimal::from(100)
    };
    let rounded = scaled.round();
    if rounded != scaled {
        return Err(ServiceError::ValidationError(format!(
            "amount {amount} has sub-minor-unit precision for currency {currency}"
        )));
    }
    rounded
        .to_i64()
        .ok_or_else(|| ServiceError::ValidationError(format!("amount {amount} out of range")))
}

/// Converts an integer minor-unit amount back to a major-unit decimal.
pub(crate) fn from_minor_units(amount: i64, currency: &str) -> Decimal {
    if is_zero_decimal(currency) {
        Decimal::from(amount)
    } else {
        Decimal::new(amount, 2)
    }
}

pub(crate) fn hmac_sha256_hex(secret: &str, message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

/// Maps an outbound HTTP failure to the adapter error taxonomy.
pub(crate) fn map_transport_error(kind: ProviderKind, err: reqwest::Error) -> ServiceError {
    if err.is_timeout() || err.is_connect() {
        ServiceError::ProviderUnavailable(format!("{kind}: {err}"))
    } else {
        ServiceError::ProviderUnavailable(format!("{kind} request failed: {err}"))
    }
}

/// Maps a non-success provider response status to the adapter error taxonomy.
pub(crate) fn map_status_error(
    kind: ProviderKind,
    status: http::StatusCode,
    body: &str,
) -> ServiceError {
    if status.is_client_error() {
        ServiceError::InvalidRequest(format!("{kind} rejected the request ({status}): {body}"))
    } else {
        ServiceError::ProviderUnavailable(format!("{kind} returned {status}"))
    }
}

/// Reads an HMAC signature header, rejecting absence as an invalid signature.
pub(crate) fn require_signature_header<'a>(
    headers: &'a HeaderMap,
    name: &str,
) -> Result<&'a str, ServiceError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServiceError::InvalidSignature)
}

/// Verifies a plain hex HMAC-SHA256 signature over the raw body.
pub(crate) fn verify_body_hmac(
    secret: &str,
    payload: &[u8],
    signature: &str,
) -> Result<(), ServiceError> {
    let expected = hmac_sha256_hex(secret, payload);
    if constant_time_eq(&expected, signature.trim()) {
        Ok(())
    } else {
        Err(ServiceError::InvalidSignature)
    }
}
