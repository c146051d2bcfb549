use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The fulfillment ledger row. `external_reference` carries the provider's
/// own payment identifier and is unique: the insert racing on that index is
/// what makes duplicate webhook deliveries collapse to a single order.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Null only on audit rows whose payload carried no usable funnel
    pub funnel_id: Option<Uuid>,
    pub merchant_id: Uuid,
    pub affiliate_id: Option<Uuid>,
    pub provider: String,
    #[sea_orm(unique)]
    pub external_reference: String,
    pub amount: Decimal,
    pub currency: String,
    /// "pending", "fulfilled" or "failed"; terminal states are never revisited
    pub status: String,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::funnel::Entity",
        from = "Column::FunnelId",
        to = "super::funnel::Column::Id"
    )]
    Funnel,
    #[sea_orm(
        belongs_to = "super::affiliate::Entity",
        from = "Column::AffiliateId",
        to = "super::affiliate::Column::Id"
    )]
    Affiliate,
}

impl Related<super::funnel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Funnel.def()
    }
}

impl Related<super::affiliate::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Affiliate.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Order lifecycle states
pub mod status {
    pub const PENDING: &str = "pending";
    pub const FULFILLED: &str = "fulfilled";
    pub const FAILED: &str = "failed";
}
