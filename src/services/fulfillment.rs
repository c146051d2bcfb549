use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveModelTrait, DbErr, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::merchant::Model as MerchantModel;
use crate::entities::order::{self, Entity as OrderEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::payments::PaymentNotification;
use crate::services::contacts::{ContactService, NewContact};
use crate::services::dispatch::DispatchService;
use crate::services::merchants::MerchantService;

/// Result of feeding one verified notification through the ledger. Every
/// variant is an acknowledged outcome; the webhook boundary answers 2xx for
/// all of them so providers stop redelivering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FulfillmentOutcome {
    /// First delivery: order committed and downstream effects attempted
    Fulfilled { order_id: Uuid },
    /// The external reference was seen before; nothing was reprocessed
    AlreadyProcessed,
    /// Verified but semantically invalid; recorded as a failed order for audit
    Invalid { order_id: Uuid, reason: String },
}

/// The idempotency core. State machine per external reference:
/// `unseen → pending → {fulfilled | failed}`, with the `unseen → pending`
/// edge implemented as a single conflict-detecting insert on the unique
/// `external_reference` index. Terminal states are never revisited.
#[derive(Clone)]
pub struct FulfillmentService {
    db: Arc<DbPool>,
    merchants: Arc<MerchantService>,
    contacts: Arc<ContactService>,
    dispatch: Arc<DispatchService>,
    events: EventSender,
}

impl FulfillmentService {
    pub fn new(
        db: Arc<DbPool>,
        merchants: Arc<MerchantService>,
        contacts: Arc<ContactService>,
        dispatch: Arc<DispatchService>,
        events: EventSender,
    ) -> Self {
        Self {
            db,
            merchants,
            contacts,
            dispatch,
            events,
        }
    }

    #[instrument(skip(self, merchant, notification), fields(external_reference = %notification.external_reference, provider = %notification.provider))]
    pub async fn process(
        &self,
        merchant: &MerchantModel,
        notification: PaymentNotification,
    ) -> Result<FulfillmentOutcome, ServiceError> {
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        // unseen → pending: a single atomic check-and-insert. Concurrent
        // duplicate deliveries race on the unique index; exactly one insert
        // wins and every loser takes the already-processed branch.
        let row = order::ActiveModel {
            id: Set(order_id),
            funnel_id: Set(notification.funnel_id),
            merchant_id: Set(merchant.id),
            affiliate_id: Set(notification.affiliate_id),
            provider: Set(notification.provider.to_string()),
            external_reference: Set(notification.external_reference.clone()),
            amount: Set(notification.amount),
            currency: Set(notification.currency.clone()),
            status: Set(order::status::PENDING.to_string()),
            failure_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
        };

        let inserted = OrderEntity::insert(row)
            .on_conflict(
                OnConflict::column(order::Column::ExternalReference)
                    .do_nothing()
                    .to_owned(),
            )
            .exec(&*self.db)
            .await;

        match inserted {
            Ok(_) => {}
            Err(DbErr::RecordNotInserted) => {
                info!("duplicate notification acknowledged without reprocessing");
                crate::metrics::ORDERS_DUPLICATE.inc();
                self.events
                    .send_or_log(Event::DuplicateNotificationAcknowledged {
                        external_reference: notification.external_reference,
                    })
                    .await;
                return Ok(FulfillmentOutcome::AlreadyProcessed);
            }
            Err(e) => return Err(ServiceError::DatabaseError(e)),
        }

        // pending → failed: verified payloads that fail semantic validation
        // stay on the ledger for audit instead of being dropped.
        let funnel_id = match self.validate_semantics(merchant, &notification).await? {
            Ok(funnel_id) => funnel_id,
            Err(reason) => {
                self.transition(order_id, order::status::FAILED, Some(reason.clone()))
                    .await?;
                self.events
                    .send_or_log(Event::OrderRecordedFailed {
                        order_id,
                        external_reference: notification.external_reference,
                        reason: reason.clone(),
                    })
                    .await;
                return Ok(FulfillmentOutcome::Invalid { order_id, reason });
            }
        };

        // pending → fulfilled: downstream effects are best-effort and never
        // roll back the committed order.

        let contact = self
            .contacts
            .create(NewContact {
                merchant_id: merchant.id,
                funnel_id,
                affiliate_id: notification.affiliate_id,
                order_id: Some(order_id),
                email: notification.customer_email.clone(),
                name: notification.customer_name.clone(),
            })
            .await;
        match contact {
            Ok(contact) => {
                self.events
                    .send_or_log(Event::ContactCreated {
                        contact_id: contact.id,
                        funnel_id,
                        affiliate_id: notification.affiliate_id,
                    })
                    .await;
            }
            Err(e) => {
                warn!(error = %e, order_id = %order_id, "contact creation failed, order still fulfilled");
            }
        }

        self.dispatch_post_purchase(merchant, order_id, &notification)
            .await;

        self.transition(order_id, order::status::FULFILLED, None)
            .await?;

        crate::metrics::ORDERS_FULFILLED.inc();
        info!(order_id = %order_id, amount = %notification.amount, "order fulfilled");
        self.events
            .send_or_log(Event::OrderFulfilled {
                order_id,
                external_reference: notification.external_reference,
                amount: notification.amount,
                currency: notification.currency,
            })
            .await;

        Ok(FulfillmentOutcome::Fulfilled { order_id })
    }

    /// Checks payload semantics against merchant state, yielding the funnel
    /// the order attributes to. `Ok(Err(reason))` is a validation failure;
    /// `Err(_)` is an infrastructure failure.
    async fn validate_semantics(
        &self,
        merchant: &MerchantModel,
        notification: &PaymentNotification,
    ) -> Result<Result<Uuid, String>, ServiceError> {
        if notification.amount <= Decimal::ZERO {
            return Ok(Err(format!(
                "non-positive amount {}",
                notification.amount
            )));
        }
        if notification.currency.trim().is_empty() {
            return Ok(Err("missing currency".into()));
        }

        let Some(funnel_id) = notification.funnel_id else {
            return Ok(Err("notification carries no funnel id".into()));
        };
        match self.merchants.find_funnel(funnel_id).await? {
            Some(funnel) if funnel.merchant_id == merchant.id => Ok(Ok(funnel_id)),
            Some(_) => Ok(Err(format!(
                "funnel {funnel_id} belongs to another merchant"
            ))),
            None => Ok(Err(format!("unknown funnel {funnel_id}"))),
        }
    }

    async fn transition(
        &self,
        order_id: Uuid,
        status: &str,
        failure_reason: Option<String>,
    ) -> Result<(), ServiceError> {
        let update = order::ActiveModel {
            id: Set(order_id),
            status: Set(status.to_string()),
            failure_reason: Set(failure_reason),
            updated_at: Set(Some(Utc::now())),
            ..Default::default()
        };
        update.update(&*self.db).await?;
        Ok(())
    }

    /// One dispatch attempt through the merchant's messaging channel.
    /// Failure is logged and contained; the order stays fulfilled.
    async fn dispatch_post_purchase(
        &self,
        merchant: &MerchantModel,
        order_id: Uuid,
        notification: &PaymentNotification,
    ) {
        let Some(channel) = MerchantService::notify_channel(merchant) else {
            return;
        };
        let Some(recipient) = notification.customer_email.as_deref() else {
            return;
        };

        let message = format!(
            "Your order is confirmed. Reference: {}",
            notification.external_reference
        );
        match self.dispatch.send(&channel, recipient, &message).await {
            Ok(()) => {
                self.events
                    .send_or_log(Event::NotificationDispatched { order_id })
                    .await;
            }
            Err(e) => {
                warn!(error = %e, order_id = %order_id, "post-purchase dispatch failed");
                crate::metrics::DISPATCH_FAILURES.inc();
                self.events
                    .send_or_log(Event::NotificationDispatchFailed {
                        order_id,
                        reason: e.to_string(),
                    })
                    .await;
            }
        }
    }
}
