// Shared across several integration-test binaries; not every binary uses
// every helper.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, Response, StatusCode},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use sha2::Sha256;
use syncra_api::{
    config::{AppConfig, ReportingConfig},
    db,
    entities::{affiliate, funnel, merchant, provider_credentials},
    events::{self, EventSender},
    handlers::AppServices,
    AppState,
};
use tower::ServiceExt;
use uuid::Uuid;

pub const MERCHANT_API_KEY: &str = "sk_merchant_test_1";

/// Helper harness for spinning up an application state backed by an
/// in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let cfg = test_config();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_sender, event_rx) = EventSender::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), &cfg, event_sender.clone());
        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .route(
                "/health/live",
                get(|| async { (StatusCode::OK, Json(json!({"status": "up"}))) }),
            )
            .nest("/api/v1", syncra_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            _event_task: event_task,
        }
    }

    /// Seed a merchant; `notify_url` wires the post-purchase channel.
    pub async fn seed_merchant(&self, notify_url: Option<String>) -> merchant::Model {
        merchant::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set("Test Merchant".into()),
            api_key: Set(MERCHANT_API_KEY.into()),
            notify_url: Set(notify_url),
            notify_token: Set(Some("notify-token".into())),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed merchant")
    }

    pub async fn seed_funnel(&self, merchant_id: Uuid) -> funnel::Model {
        funnel::ActiveModel {
            id: Set(Uuid::new_v4()),
            merchant_id: Set(merchant_id),
            name: Set("Launch Funnel".into()),
            launched_at: Set(Some(Utc::now())),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed funnel")
    }

    pub async fn seed_credentials(
        &self,
        merchant_id: Uuid,
        provider: &str,
        webhook_secret: &str,
        endpoint_override: Option<String>,
    ) -> provider_credentials::Model {
        provider_credentials::ActiveModel {
            id: Set(Uuid::new_v4()),
            merchant_id: Set(merchant_id),
            provider: Set(provider.into()),
            api_key: Set("test_api_key".into()),
            api_secret: Set(None),
            webhook_secret: Set(webhook_secret.into()),
            endpoint_override: Set(endpoint_override),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed provider credentials")
    }

    pub async fn seed_affiliate(&self, code: &str) -> affiliate::Model {
        affiliate::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.into()),
            display_name: Set(format!("Affiliate {code}")),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed affiliate")
    }

    /// Fire one request at the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("build request"),
            None => builder.body(Body::empty()).expect("build request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Fire a request with a pre-serialized body, preserving the exact bytes
    /// a webhook signature was computed over.
    pub async fn request_raw(
        &self,
        method: Method,
        uri: &str,
        body: String,
        headers: &[(&str, &str)],
    ) -> Response<Body> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::from(body)).expect("build request"))
            .await
            .expect("router response")
    }

    /// Fire a request with the seeded merchant's bearer api key.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response<Body> {
        let auth = format!("Bearer {MERCHANT_API_KEY}");
        let headers = [("authorization", auth.as_str())];
        self.request(method, uri, body, &headers).await
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        host: "127.0.0.1".into(),
        port: 18_080,
        environment: "test".into(),
        log_level: "info".into(),
        log_json: false,
        auto_migrate: false,
        fingerprint_key: "test_fingerprint_key_0123456789abcdef".into(),
        affiliate_cookie_name: "syncra_affiliate".into(),
        provider_timeout_secs: 5,
        dispatch_timeout_secs: 5,
        webhook_tolerance_secs: 300,
        reporting: ReportingConfig::default(),
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        // A single pooled connection keeps the in-memory database alive and
        // shared for the lifetime of the test app.
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 30,
        db_idle_timeout_secs: 600,
        db_acquire_timeout_secs: 8,
        event_channel_capacity: 256,
    }
}

pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

fn hmac_hex(secret: &str, message: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Builds a Stripe `checkout.session.completed` payload for a funnel.
pub fn stripe_completed_payload(
    payment_intent: &str,
    amount_minor: i64,
    funnel_id: Uuid,
    affiliate_id: Option<Uuid>,
) -> Value {
    let mut metadata = json!({"funnel_id": funnel_id.to_string()});
    if let Some(affiliate_id) = affiliate_id {
        metadata["affiliate_id"] = json!(affiliate_id.to_string());
    }
    json!({
        "id": "evt_test_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": "cs_test_1",
                "payment_intent": payment_intent,
                "amount_total": amount_minor,
                "currency": "usd",
                "metadata": metadata,
                "customer_details": {"email": "buyer@example.com", "name": "Test Buyer"}
            }
        }
    })
}

/// Signs a payload the way Stripe's webhook signature scheme does.
pub fn stripe_signature(payload: &Value, secret: &str) -> (String, String) {
    let body = payload.to_string();
    let ts = Utc::now().timestamp();
    let signed = format!("{ts}.{body}");
    let sig = hmac_hex(secret, signed.as_bytes());
    (body, format!("t={ts},v1={sig}"))
}

/// Signs a payload with the plain body HMAC used by UnivaPay and AquaGates.
pub fn body_signature(payload: &Value, secret: &str) -> (String, String) {
    let body = payload.to_string();
    let sig = hmac_hex(secret, body.as_bytes());
    (body, sig)
}
