use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::funnel::{self, Model as FunnelModel};
use crate::entities::merchant::{self, Model as MerchantModel};
use crate::entities::provider_credentials::{self, Model as CredentialsModel};
use crate::errors::ServiceError;
use crate::payments::ProviderKind;
use crate::services::dispatch::NotifyChannel;

/// Looks up tenants, their funnels and their stored provider configuration.
#[derive(Clone)]
pub struct MerchantService {
    db: Arc<DbPool>,
}

impl MerchantService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Resolves a merchant api key presented on a merchant-facing endpoint.
    /// Key issuance and rotation live in the upstream auth system.
    pub async fn authenticate(&self, api_key: &str) -> Result<MerchantModel, ServiceError> {
        merchant::Entity::find()
            .filter(merchant::Column::ApiKey.eq(api_key))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("unknown api key".into()))
    }

    pub async fn find(&self, merchant_id: Uuid) -> Result<Option<MerchantModel>, ServiceError> {
        merchant::Entity::find_by_id(merchant_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn find_funnel(&self, funnel_id: Uuid) -> Result<Option<FunnelModel>, ServiceError> {
        funnel::Entity::find_by_id(funnel_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Loads the credentials a merchant stored for a provider. A merchant
    /// with no row for the requested provider is a setup gap, surfaced to
    /// buyers as a generic failure and to logs with the merchant id.
    #[instrument(skip(self), fields(merchant_id = %merchant_id, provider = %provider))]
    pub async fn credentials_for(
        &self,
        merchant_id: Uuid,
        provider: ProviderKind,
    ) -> Result<CredentialsModel, ServiceError> {
        provider_credentials::Entity::find()
            .filter(provider_credentials::Column::MerchantId.eq(merchant_id))
            .filter(provider_credentials::Column::Provider.eq(provider.to_string()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ProviderNotConfigured(format!(
                    "merchant {merchant_id} has no {provider} credentials"
                ))
            })
    }

    /// The merchant's post-purchase messaging channel, when configured.
    pub fn notify_channel(merchant: &MerchantModel) -> Option<NotifyChannel> {
        merchant.notify_url.as_ref().map(|url| NotifyChannel {
            url: url.clone(),
            token: merchant.notify_token.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn notify_channel_requires_a_url() {
        let mut merchant = MerchantModel {
            id: Uuid::new_v4(),
            name: "Acme Funnels".into(),
            api_key: "sk_merchant_1".into(),
            notify_url: None,
            notify_token: Some("tok".into()),
            created_at: Utc::now(),
        };
        assert!(MerchantService::notify_channel(&merchant).is_none());

        merchant.notify_url = Some("https://notify.example/send".into());
        let channel = MerchantService::notify_channel(&merchant).unwrap();
        assert_eq!(channel.url, "https://notify.example/send");
        assert_eq!(channel.token.as_deref(), Some("tok"));
    }
}
