use crate::{entities::currency, errors::ServiceError};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Read access to the currency table
#[derive(Clone)]
pub struct CurrencyService {
    db: Arc<DatabaseConnection>,
    default_code: String,
}

impl CurrencyService {
    pub fn new(db: Arc<DatabaseConnection>, default_code: impl Into<String>) -> Self {
        Self {
            db,
            default_code: default_code.into(),
        }
    }

    /// ISO code of the owning company's currency
    pub fn default_code(&self) -> &str {
        &self.default_code
    }

    #[instrument(skip(self))]
    pub async fn find_by_code(&self, code: &str) -> Result<Option<currency::Model>, ServiceError> {
        Ok(currency::Entity::find()
            .filter(currency::Column::Name.eq(code.to_ascii_uppercase()))
            .one(&*self.db)
            .await?)
    }

    pub async fn list(&self) -> Result<Vec<currency::Model>, ServiceError> {
        Ok(currency::Entity::find()
            .order_by_asc(currency::Column::Name)
            .all(&*self.db)
            .await?)
    }

    /// Id of the company currency, or `None` when that code is not in the table.
    pub async fn default_currency_id(&self) -> Result<Option<i32>, ServiceError> {
        let found = self.find_by_code(&self.default_code).await?;
        if found.is_none() {
            warn!(
                code = %self.default_code,
                "Company currency is not registered; materials will be stored without one"
            );
        }
        Ok(found.map(|c| c.id))
    }
}
