//! Demo data for local development and smoke tests.

use crate::{
    auth::AuthService,
    entities::{material, MaterialType},
    errors::ServiceError,
    handlers::AppServices,
    services::{materials::NewMaterial, partners::NewPartner},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

pub const DEMO_PARTNER: &str = "Julia Agrolait";
pub const DEMO_LOGIN: &str = "demo";

/// What a seeding run inserted; rows that already existed are not counted.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SeedSummary {
    pub partners: usize,
    pub users: usize,
    pub materials: usize,
}

struct DemoMaterial {
    code: &'static str,
    name: &'static str,
    material_type: MaterialType,
    price: Decimal,
    currency: &'static str,
}

const DEMO_MATERIALS: [DemoMaterial; 3] = [
    DemoMaterial {
        code: "KS",
        name: "Kaos",
        material_type: MaterialType::Fabric,
        price: dec!(100000),
        currency: "IDR",
    },
    DemoMaterial {
        code: "DNM",
        name: "Denim Indigo",
        material_type: MaterialType::Jeans,
        price: dec!(250000),
        currency: "IDR",
    },
    DemoMaterial {
        code: "CTN",
        name: "Combed Cotton 30s",
        material_type: MaterialType::Cotton,
        price: dec!(150),
        currency: "USD",
    },
];

/// Insert the demo partner, user and materials. Safe to run repeatedly.
pub async fn seed_demo_data(
    db: Arc<DatabaseConnection>,
    services: &AppServices,
    auth: &AuthService,
    demo_password: &str,
) -> Result<SeedSummary, ServiceError> {
    let mut summary = SeedSummary::default();
    let AppServices {
        materials,
        partners,
        currencies,
    } = services;

    let partner = match partners.find_by_name(DEMO_PARTNER).await? {
        Some(existing) => existing,
        None => {
            summary.partners += 1;
            partners
                .create(NewPartner {
                    name: DEMO_PARTNER.to_string(),
                    email: Some("julia@agrolait.example.com".to_string()),
                    phone: Some("+32 10 588 558".to_string()),
                })
                .await?
        }
    };

    let user = match auth.find_user_by_login(DEMO_LOGIN).await? {
        Some(existing) => existing,
        None => {
            summary.users += 1;
            auth.create_user(DEMO_LOGIN, "Demo User", demo_password)
                .await?
        }
    };

    for demo in DEMO_MATERIALS.iter() {
        let present = material::Entity::find()
            .filter(material::Column::MaterialCode.eq(demo.code))
            .count(&*db)
            .await?;
        if present > 0 {
            continue;
        }

        let currency_id = currencies.find_by_code(demo.currency).await?.map(|c| c.id);
        materials
            .create(
                NewMaterial {
                    material_code: demo.code.to_string(),
                    name: demo.name.to_string(),
                    material_type: demo.material_type,
                    material_buy_price: demo.price,
                    partner_id: partner.id,
                    currency_id,
                },
                Some(user.id),
            )
            .await?;
        summary.materials += 1;
    }

    info!(
        partners = summary.partners,
        users = summary.users,
        materials = summary.materials,
        "Demo data seeded"
    );
    Ok(summary)
}
