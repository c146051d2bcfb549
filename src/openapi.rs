use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Syncra API",
        version = "0.3.0",
        description = r#"
# Syncra Payment & Attribution Orchestration API

The orchestration core of the Syncra marketing-funnel platform: provider-
agnostic checkout creation, affiliate attribution, exactly-once webhook
fulfillment, visit classification and reporting windows.

## Authentication

Merchant-facing endpoints take the merchant api key as a bearer token:

```
Authorization: Bearer <api-key>
```

Buyer-facing endpoints (checkout, tracking) are unauthenticated; webhook
endpoints are authenticated by provider signature instead.
        "#,
        contact(
            name = "Syncra Engineering",
            email = "eng@syncra.io",
            url = "https://syncra.io"
        ),
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "https://api.syncra.io", description = "Production server"),
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Checkout", description = "Checkout session creation"),
        (name = "Payments", description = "Webhooks and portal"),
        (name = "Tracking", description = "Visit tracking"),
        (name = "Reports", description = "Reporting windows and aggregates"),
        (name = "Affiliates", description = "Affiliate attribution")
    ),
    paths(
        crate::handlers::checkout::start_checkout,
        crate::handlers::webhooks::payment_webhook,
        crate::handlers::portal::open_portal,
        crate::handlers::tracking::track_visit,
        crate::handlers::reports::reporting_window,
        crate::handlers::reports::reporting_summary,
        crate::handlers::affiliates::get_affiliate,
        crate::handlers::affiliates::create_affiliate,
    ),
    components(schemas(
        crate::ApiResponse<serde_json::Value>,
        crate::services::checkout::StartCheckoutRequest,
        crate::services::checkout::CheckoutLineItem,
        crate::services::checkout::CheckoutRedirect,
        crate::services::reporting::ReportingWindow,
        crate::services::reporting::ReportSummary,
        crate::services::affiliates::CreateAffiliateRequest,
        crate::handlers::tracking::TrackVisitRequest,
        crate::handlers::tracking::TrackVisitResponse,
        crate::handlers::portal::PortalRequest,
        crate::handlers::portal::PortalResponse,
        crate::payments::ProviderKind,
        crate::errors::ErrorResponse
    ))
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string(&openapi).unwrap();
        assert!(json.contains("Syncra API"));
        assert!(json.contains("/api/v1/checkout"));
        assert!(json.contains("/api/v1/payments/webhooks/{provider}/{merchant_id}"));
    }
}
