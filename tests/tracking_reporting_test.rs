mod common;

use axum::http::{Method, StatusCode};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use std::time::Duration;
use syncra_api::entities::visit;
use uuid::Uuid;

use common::{response_json, stripe_completed_payload, stripe_signature, TestApp};

const MOBILE_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0) Mobile/15E148";

/// The visit write is detached from the request; poll briefly for it.
async fn wait_for_visits(app: &TestApp, expected: u64) -> u64 {
    for _ in 0..100 {
        let count = visit::Entity::find().count(&*app.state.db).await.unwrap();
        if count >= expected {
            return count;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    visit::Entity::find().count(&*app.state.db).await.unwrap()
}

#[tokio::test]
async fn tracking_appends_a_classified_visit_record() {
    let app = TestApp::new().await;
    let merchant = app.seed_merchant(None).await;
    let funnel = app.seed_funnel(merchant.id).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/track",
            Some(json!({
                "funnel_id": funnel.id,
                "referrer": "https://www.google.com/search?q=creator+course"
            })),
            &[
                ("user-agent", MOBILE_UA),
                ("x-forwarded-for", "203.0.113.7"),
            ],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(wait_for_visits(&app, 1).await, 1);
    let row = visit::Entity::find()
        .one(&*app.state.db)
        .await
        .unwrap()
        .expect("visit row");
    assert_eq!(row.funnel_id, funnel.id);
    assert_eq!(row.source_type, "Organic Search");
    assert_eq!(row.device_type, "Mobile");
    assert_eq!(row.session_id, row.visitor_id);
    assert!(!row.visitor_id.contains("203.0.113.7"));
}

#[tokio::test]
async fn tracking_always_answers_success_shaped() {
    let app = TestApp::new().await;
    // No funnel seeded; the write may do whatever it wants internally,
    // the endpoint must still answer success-shaped.
    let response = app
        .request(
            Method::POST,
            "/api/v1/track",
            Some(json!({"funnel_id": Uuid::new_v4()})),
            &[("user-agent", MOBILE_UA)],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn reporting_window_resolves_named_period() {
    let app = TestApp::new().await;
    app.seed_merchant(None).await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/reports/window?period=yesterday", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let start = body["data"]["start"].as_str().expect("start bound");
    let end = body["data"]["end"].as_str().expect("end bound");
    assert!(start.contains("T00:00:00"));
    assert!(end.contains("T23:59:59.999"));
}

#[tokio::test]
async fn reporting_window_accepts_explicit_bounds() {
    let app = TestApp::new().await;
    app.seed_merchant(None).await;

    let response = app
        .request_authenticated(
            Method::GET,
            "/api/v1/reports/window?from=2025-02-01&to=2025-02-03",
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["start"], "2025-02-01T00:00:00Z");
    assert_eq!(body["data"]["end"], "2025-02-03T23:59:59.999Z");
}

#[tokio::test]
async fn reporting_requires_merchant_auth() {
    let app = TestApp::new().await;
    app.seed_merchant(None).await;

    let response = app
        .request(Method::GET, "/api/v1/reports/window?period=today", None, &[])
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(
            Method::GET,
            "/api/v1/reports/summary?period=today",
            None,
            &[("authorization", "Bearer not-a-real-key")],
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn summary_counts_fulfilled_orders_inside_the_window() {
    let app = TestApp::new().await;
    let merchant = app.seed_merchant(None).await;
    let funnel = app.seed_funnel(merchant.id).await;
    app.seed_credentials(merchant.id, "stripe", "whsec_sum", None)
        .await;

    // Fulfill one order through the real webhook path
    let (body, signature) = stripe_signature(
        &stripe_completed_payload("pi_summary_1", 4999, funnel.id, None),
        "whsec_sum",
    );
    let response = app
        .request_raw(
            Method::POST,
            &format!("/api/v1/payments/webhooks/stripe/{}", merchant.id),
            body,
            &[("stripe-signature", signature.as_str())],
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_authenticated(Method::GET, "/api/v1/reports/summary?period=today", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["orders_fulfilled"], 1);
    assert_eq!(body["data"]["orders_failed"], 0);
    assert_eq!(body["data"]["contacts"], 1);
}
