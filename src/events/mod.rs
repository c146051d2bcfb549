use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the orchestration core. Consumers are in-process only;
/// emission failures are logged and never propagate into the caller's flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Checkout events
    CheckoutSessionCreated {
        funnel_id: Uuid,
        provider: String,
        provider_session_id: String,
        affiliate_id: Option<Uuid>,
    },

    // Fulfillment events
    OrderFulfilled {
        order_id: Uuid,
        external_reference: String,
        amount: Decimal,
        currency: String,
    },
    OrderRecordedFailed {
        order_id: Uuid,
        external_reference: String,
        reason: String,
    },
    DuplicateNotificationAcknowledged {
        external_reference: String,
    },

    // Downstream side effects
    ContactCreated {
        contact_id: Uuid,
        funnel_id: Uuid,
        affiliate_id: Option<Uuid>,
    },
    NotificationDispatched {
        order_id: Uuid,
    },
    NotificationDispatchFailed {
        order_id: Uuid,
        reason: String,
    },

    // Tracking events
    VisitRecorded {
        funnel_id: Uuid,
        source_type: String,
        device_type: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Builds a sender/receiver pair with the given channel capacity
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Used by code paths whose own outcome must not depend on event delivery.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event channel unavailable, dropping event");
        }
    }
}

/// Background task draining the event channel. Today the only consumer is
/// structured logging; external delivery belongs to a separate system.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderFulfilled {
                order_id,
                external_reference,
                amount,
                currency,
            } => {
                info!(
                    order_id = %order_id,
                    external_reference = %external_reference,
                    amount = %amount,
                    currency = %currency,
                    "order fulfilled"
                );
            }
            Event::OrderRecordedFailed {
                order_id,
                external_reference,
                reason,
            } => {
                warn!(
                    order_id = %order_id,
                    external_reference = %external_reference,
                    reason = %reason,
                    "order recorded as failed"
                );
            }
            Event::NotificationDispatchFailed { order_id, reason } => {
                warn!(order_id = %order_id, reason = %reason, "notification dispatch failed");
            }
            other => {
                info!(event = ?other, "event processed");
            }
        }
    }
    info!("event channel closed, processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_succeeds_while_receiver_alive() {
        let (sender, mut rx) = EventSender::channel(8);
        sender
            .send(Event::DuplicateNotificationAcknowledged {
                external_reference: "pi_123".into(),
            })
            .await
            .expect("send should succeed");

        match rx.recv().await {
            Some(Event::DuplicateNotificationAcknowledged { external_reference }) => {
                assert_eq!(external_reference, "pi_123");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (sender, rx) = EventSender::channel(1);
        drop(rx);
        // Must not panic or error
        sender
            .send_or_log(Event::NotificationDispatched {
                order_id: Uuid::new_v4(),
            })
            .await;
    }
}
