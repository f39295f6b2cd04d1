pub mod common;
pub mod materials;

use crate::{
    config::AppConfig,
    services::{currencies::CurrencyService, materials::MaterialService, partners::PartnerService},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;

/// Services shared by all handlers through `AppState`
#[derive(Clone)]
pub struct AppServices {
    pub materials: Arc<MaterialService>,
    pub partners: Arc<PartnerService>,
    pub currencies: Arc<CurrencyService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DatabaseConnection>, config: &AppConfig) -> Self {
        let currencies = CurrencyService::new(db_pool.clone(), config.default_currency.clone());
        let materials = Arc::new(MaterialService::new(db_pool.clone(), currencies.clone()));
        let partners = Arc::new(PartnerService::new(db_pool));

        Self {
            materials,
            partners,
            currencies: Arc::new(currencies),
        }
    }
}
