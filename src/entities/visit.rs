use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only page-view record; there is no update or delete path.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "visits")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub visitor_id: String,
    pub session_id: String,
    pub funnel_id: Uuid,
    pub funnel_step_id: Option<Uuid>,
    pub user_agent: String,
    pub referrer: Option<String>,
    /// "Direct", "Organic Search", "Social", "Video" or "Referral"
    pub source_type: String,
    /// "Mobile", "Tablet" or "Desktop"
    pub device_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::funnel::Entity",
        from = "Column::FunnelId",
        to = "super::funnel::Column::Id"
    )]
    Funnel,
}

impl Related<super::funnel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Funnel.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
