use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::contact::{self, Model as ContactModel};
use crate::errors::ServiceError;

/// Input for the lead record created at fulfillment
#[derive(Debug, Clone)]
pub struct NewContact {
    pub merchant_id: Uuid,
    pub funnel_id: Uuid,
    pub affiliate_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Creates CRM contact records with funnel attribution applied.
#[derive(Clone)]
pub struct ContactService {
    db: Arc<DbPool>,
}

impl ContactService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(funnel_id = %input.funnel_id))]
    pub async fn create(&self, input: NewContact) -> Result<ContactModel, ServiceError> {
        self.create_on(&*self.db, input).await
    }

    /// Variant taking an explicit connection so callers holding a
    /// transaction can reuse it.
    pub async fn create_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: NewContact,
    ) -> Result<ContactModel, ServiceError> {
        let row = contact::ActiveModel {
            id: Set(Uuid::new_v4()),
            merchant_id: Set(input.merchant_id),
            funnel_id: Set(input.funnel_id),
            affiliate_id: Set(input.affiliate_id),
            order_id: Set(input.order_id),
            email: Set(input.email),
            name: Set(input.name),
            created_at: Set(Utc::now()),
        };

        row.insert(conn).await.map_err(ServiceError::DatabaseError)
    }
}
