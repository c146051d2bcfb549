mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{response_json, TestApp};

fn checkout_body(funnel_id: Uuid) -> serde_json::Value {
    json!({
        "funnel_id": funnel_id,
        "provider": "stripe",
        "line_items": [{"name": "Creator Course", "unit_price": "149.00", "quantity": 1}],
        "currency": "USD",
        "success_url": "https://funnel.example/thanks",
        "cancel_url": "https://funnel.example/checkout"
    })
}

async fn stripe_stub() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_live_123",
            "url": "https://checkout.stripe.com/c/pay/cs_live_123"
        })))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn checkout_returns_provider_redirect() {
    let stripe = stripe_stub().await;
    let app = TestApp::new().await;
    let merchant = app.seed_merchant(None).await;
    let funnel = app.seed_funnel(merchant.id).await;
    app.seed_credentials(merchant.id, "stripe", "whsec_x", Some(stripe.uri()))
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body(funnel.id)),
            &[],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(
        body["data"]["redirect_url"],
        "https://checkout.stripe.com/c/pay/cs_live_123"
    );
    assert_eq!(body["data"]["provider_session_id"], "cs_live_123");
}

#[tokio::test]
async fn attribution_cookie_rides_into_session_metadata() {
    let stripe = MockServer::start().await;
    let app = TestApp::new().await;
    let merchant = app.seed_merchant(None).await;
    let funnel = app.seed_funnel(merchant.id).await;
    let affiliate = app.seed_affiliate("partner-7").await;
    app.seed_credentials(merchant.id, "stripe", "whsec_x", Some(stripe.uri()))
        .await;

    // The provider session must carry the resolved affiliate id as metadata
    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(body_string_contains(affiliate.id.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_attr_1",
            "url": "https://checkout.stripe.com/c/pay/cs_attr_1"
        })))
        .expect(1)
        .mount(&stripe)
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body(funnel.id)),
            &[("cookie", "syncra_affiliate=partner-7")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_attribution_token_still_checks_out() {
    let stripe = stripe_stub().await;
    let app = TestApp::new().await;
    let merchant = app.seed_merchant(None).await;
    let funnel = app.seed_funnel(merchant.id).await;
    app.seed_credentials(merchant.id, "stripe", "whsec_x", Some(stripe.uri()))
        .await;

    // Cookie names an affiliate that does not exist; checkout must succeed
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body(funnel.id)),
            &[("cookie", "syncra_affiliate=expired-partner")],
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn provider_5xx_surfaces_as_provider_unavailable() {
    let stripe = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&stripe)
        .await;

    let app = TestApp::new().await;
    let merchant = app.seed_merchant(None).await;
    let funnel = app.seed_funnel(merchant.id).await;
    app.seed_credentials(merchant.id, "stripe", "whsec_x", Some(stripe.uri()))
        .await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body(funnel.id)),
            &[],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn missing_provider_credentials_is_a_generic_buyer_failure() {
    let app = TestApp::new().await;
    let merchant = app.seed_merchant(None).await;
    let funnel = app.seed_funnel(merchant.id).await;
    // No stripe credentials seeded

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body(funnel.id)),
            &[],
        )
        .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = response_json(response).await;
    let message = body["message"].as_str().unwrap_or_default();
    assert_eq!(message, "Payment is temporarily unavailable");
    assert!(
        !message.contains(&merchant.id.to_string()),
        "no merchant setup detail may leak to the buyer"
    );
}

#[tokio::test]
async fn unknown_funnel_is_an_invalid_request() {
    let app = TestApp::new().await;
    app.seed_merchant(None).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(checkout_body(Uuid::new_v4())),
            &[],
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn portal_is_unsupported_for_non_subscription_providers() {
    let app = TestApp::new().await;
    let merchant = app.seed_merchant(None).await;
    app.seed_credentials(merchant.id, "aquagates", "ag_secret", None)
        .await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/portal",
            Some(json!({
                "provider": "aquagates",
                "customer_id": "cust_1",
                "return_url": "https://dashboard.example/billing"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
