use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant of the platform. The merchant's stored configuration carries the
/// per-provider payment credentials and the post-purchase messaging channel.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "merchants")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    #[sea_orm(unique)]
    pub api_key: String,
    pub notify_url: Option<String>,
    pub notify_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::funnel::Entity")]
    Funnels,
    #[sea_orm(has_many = "super::provider_credentials::Entity")]
    ProviderCredentials,
}

impl Related<super::funnel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Funnels.def()
    }
}

impl Related<super::provider_credentials::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProviderCredentials.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
