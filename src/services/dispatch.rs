use serde::Serialize;
use tracing::instrument;

use crate::errors::ServiceError;

/// Destination for post-purchase messages: the merchant's configured
/// messaging-channel endpoint and optional bearer token.
#[derive(Debug, Clone)]
pub struct NotifyChannel {
    pub url: String,
    pub token: Option<String>,
}

#[derive(Serialize)]
struct DispatchBody<'a> {
    to: &'a str,
    message: &'a str,
}

/// Best-effort delivery of a post-purchase message through the merchant's
/// external messaging channel. Exactly one attempt, bounded by the client's
/// timeout; retries are the caller's decision and must never re-run order
/// creation.
#[derive(Clone)]
pub struct DispatchService {
    client: reqwest::Client,
}

impl DispatchService {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    #[instrument(skip(self, channel, message), fields(recipient = %recipient))]
    pub async fn send(
        &self,
        channel: &NotifyChannel,
        recipient: &str,
        message: &str,
    ) -> Result<(), ServiceError> {
        let mut request = self
            .client
            .post(&channel.url)
            .json(&DispatchBody { to: recipient, message });
        if let Some(token) = &channel.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServiceError::DeliveryFailed(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ServiceError::DeliveryFailed(format!(
                "channel returned {}",
                response.status()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn delivers_message_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/push"))
            .and(header("authorization", "Bearer channel-token"))
            .and(body_partial_json(
                serde_json::json!({"to": "buyer@example.com"}),
            ))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let service = DispatchService::new(reqwest::Client::new());
        let channel = NotifyChannel {
            url: format!("{}/push", server.uri()),
            token: Some("channel-token".into()),
        };

        service
            .send(&channel, "buyer@example.com", "Thanks for your purchase!")
            .await
            .expect("delivery should succeed");
    }

    #[tokio::test]
    async fn non_success_status_is_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let service = DispatchService::new(reqwest::Client::new());
        let channel = NotifyChannel {
            url: server.uri(),
            token: None,
        };

        assert!(matches!(
            service.send(&channel, "buyer@example.com", "hi").await,
            Err(ServiceError::DeliveryFailed(_))
        ));
    }
}
