use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::db::DbPool;
use crate::entities::affiliate::{self, Entity as AffiliateEntity, Model as AffiliateModel};
use crate::errors::ServiceError;

#[derive(Debug, Serialize, Deserialize, Validate, utoipa::ToSchema)]
pub struct CreateAffiliateRequest {
    #[validate(length(min = 1, max = 64, message = "Affiliate code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 128, message = "Display name is required"))]
    pub display_name: String,
}

/// Resolves attribution tokens to affiliate identities.
#[derive(Clone)]
pub struct AffiliateService {
    db: Arc<DbPool>,
}

impl AffiliateService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Resolves an attribution token (the affiliate code carried in the
    /// visitor's cookie) to an affiliate id. Absence is not an error, an
    /// unknown code is not an error, and a lookup failure is not an error:
    /// a broken or expired token must never block a purchase, so every
    /// miss collapses to `None`.
    #[instrument(skip(self))]
    pub async fn resolve(&self, token: Option<&str>) -> Option<Uuid> {
        let code = token.map(str::trim).filter(|t| !t.is_empty())?;

        match self.find_by_code(code).await {
            Ok(found) => found.map(|affiliate| affiliate.id),
            Err(e) => {
                warn!(error = %e, code = %code, "affiliate lookup failed, continuing unattributed");
                None
            }
        }
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<AffiliateModel>, ServiceError> {
        AffiliateEntity::find()
            .filter(affiliate::Column::Code.eq(code))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Creates an affiliate. Codes are unique; a duplicate create is a
    /// caller-visible conflict, not an upsert.
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn create(
        &self,
        request: CreateAffiliateRequest,
    ) -> Result<AffiliateModel, ServiceError> {
        request.validate()?;

        if self.find_by_code(&request.code).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "affiliate code {} already exists",
                request.code
            )));
        }

        let model = affiliate::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(request.code),
            display_name: Set(request.display_name),
            created_at: Set(Utc::now()),
        };

        model
            .insert(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::DatabaseConnection;

    fn disconnected_service() -> AffiliateService {
        AffiliateService::new(Arc::new(DatabaseConnection::Disconnected))
    }

    #[tokio::test]
    async fn absent_or_blank_token_resolves_to_none() {
        let service = disconnected_service();
        assert_eq!(service.resolve(None).await, None);
        assert_eq!(service.resolve(Some("")).await, None);
        assert_eq!(service.resolve(Some("   ")).await, None);
    }

    #[tokio::test]
    async fn lookup_failure_is_swallowed_to_none() {
        // The disconnected pool makes every query fail; resolve must still
        // answer None instead of propagating the error.
        let service = disconnected_service();
        assert_eq!(service.resolve(Some("partner-77")).await, None);
    }
}
