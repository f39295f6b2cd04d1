use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lowest accepted buy price for a material, inclusive.
pub const MIN_BUY_PRICE: Decimal = dec!(100);

/// Kind of material held in the register.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MaterialType {
    #[sea_orm(string_value = "fabric")]
    Fabric,
    #[sea_orm(string_value = "jeans")]
    Jeans,
    #[sea_orm(string_value = "cotton")]
    Cotton,
}

impl MaterialType {
    pub const ALLOWED: [&'static str; 3] = ["fabric", "jeans", "cotton"];

    /// Parse the wire representation. Matching is exact: `"Fabric"` is rejected.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "fabric" => Some(Self::Fabric),
            "jeans" => Some(Self::Jeans),
            "cotton" => Some(Self::Cotton),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fabric => "fabric",
            Self::Jeans => "jeans",
            Self::Cotton => "cotton",
        }
    }
}

impl Default for MaterialType {
    fn default() -> Self {
        Self::Fabric
    }
}

/// A registered material.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub material_code: String,

    pub name: String,

    pub material_type: MaterialType,

    /// Falls back to the company currency when not supplied on create
    pub currency_id: Option<i32>,

    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub material_buy_price: Decimal,

    pub partner_id: i32,

    pub create_date: DateTime<Utc>,
    pub write_date: DateTime<Utc>,
    pub create_uid: Option<i32>,
    pub write_uid: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::partner::Entity",
        from = "Column::PartnerId",
        to = "super::partner::Column::Id"
    )]
    Partner,
    #[sea_orm(
        belongs_to = "super::currency::Entity",
        from = "Column::CurrencyId",
        to = "super::currency::Column::Id"
    )]
    Currency,
}

impl Related<super::partner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partner.def()
    }
}

impl Related<super::currency::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Currency.def()
    }
}

/// Buy price constraint applied on every write.
pub fn check_buy_price(price: &Decimal) -> Result<(), String> {
    if *price < MIN_BUY_PRICE {
        return Err("Material Buy Price must be higher than 100".to_string());
    }
    Ok(())
}

fn current<V>(value: &ActiveValue<V>) -> Option<&V>
where
    V: Into<sea_orm::Value>,
{
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v),
        ActiveValue::NotSet => None,
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        match current(&active_model.material_buy_price) {
            Some(price) => check_buy_price(price).map_err(DbErr::Custom)?,
            None if insert => {
                return Err(DbErr::Custom(
                    "Material Buy Price is required".to_string(),
                ))
            }
            None => {}
        }

        for (field, value) in [
            ("Material Code", current(&active_model.material_code)),
            ("Material Name", current(&active_model.name)),
        ] {
            match value {
                Some(text) if text.trim().is_empty() => {
                    return Err(DbErr::Custom(format!("{} cannot be blank", field)))
                }
                None if insert => return Err(DbErr::Custom(format!("{} is required", field))),
                _ => {}
            }
        }

        let now = Utc::now();
        if insert {
            if let ActiveValue::NotSet = active_model.material_type {
                active_model.material_type = Set(MaterialType::default());
            }
            active_model.create_date = Set(now);
            if let ActiveValue::NotSet = active_model.write_uid {
                active_model.write_uid = active_model.create_uid.clone();
            }
        }
        active_model.write_date = Set(now);

        Ok(active_model)
    }
}
