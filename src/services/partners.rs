use crate::{entities::partner, errors::ServiceError};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Input for creating a partner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPartner {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Clone)]
pub struct PartnerService {
    db: Arc<DatabaseConnection>,
}

impl PartnerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: NewPartner) -> Result<partner::Model, ServiceError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Partner name cannot be blank".to_string(),
            ));
        }

        let created = partner::ActiveModel {
            name: Set(name.to_string()),
            email: Set(input.email),
            phone: Set(input.phone),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(partner_id = created.id, "Created partner {}", created.name);
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, partner_id: i32) -> Result<Option<partner::Model>, ServiceError> {
        Ok(partner::Entity::find_by_id(partner_id).one(&*self.db).await?)
    }

    pub async fn exists(&self, partner_id: i32) -> Result<bool, ServiceError> {
        let count = partner::Entity::find()
            .filter(partner::Column::Id.eq(partner_id))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<partner::Model>, ServiceError> {
        Ok(partner::Entity::find()
            .filter(partner::Column::Name.eq(name))
            .one(&*self.db)
            .await?)
    }

    pub async fn list(&self) -> Result<Vec<partner::Model>, ServiceError> {
        Ok(partner::Entity::find()
            .order_by_asc(partner::Column::Id)
            .all(&*self.db)
            .await?)
    }
}
