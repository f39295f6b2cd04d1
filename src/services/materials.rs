use crate::{
    auth::user,
    entities::{currency, material, partner, MaterialType},
    errors::ServiceError,
    metrics::MATERIAL_METRICS,
    services::currencies::CurrencyService,
};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const DEFAULT_ORDER: &str = "id desc";

/// Largest row count or offset the database driver can bind
pub const MAX_PAGE_VALUE: u64 = i64::MAX as u64;

/// Filters and paging for listing materials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialQuery {
    /// Case-insensitive substring of the code
    pub material_code: Option<String>,
    /// Case-insensitive substring of the name
    pub name: Option<String>,
    pub material_type: Option<MaterialType>,
    /// Zero means no limit
    pub limit: u64,
    pub offset: u64,
    pub order: Option<String>,
}

/// One page of materials plus the number matching the filters
#[derive(Debug, Clone)]
pub struct MaterialPage {
    pub items: Vec<MaterialRecord>,
    pub total: u64,
}

/// A material with its references resolved
#[derive(Debug, Clone)]
pub struct MaterialRecord {
    pub material: material::Model,
    pub currency: Option<currency::Model>,
    pub partner: Option<partner::Model>,
    pub creator: Option<user::Model>,
    pub writer: Option<user::Model>,
}

/// Input for creating a material
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMaterial {
    pub material_code: String,
    pub name: String,
    pub material_type: MaterialType,
    pub material_buy_price: Decimal,
    pub partner_id: i32,
    /// Company currency when absent
    pub currency_id: Option<i32>,
}

/// Fields to change on an existing material; `None` leaves a field alone
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialChanges {
    pub material_code: Option<String>,
    pub name: Option<String>,
    pub material_type: Option<MaterialType>,
    pub material_buy_price: Option<Decimal>,
    pub partner_id: Option<i32>,
    pub currency_id: Option<i32>,
}

impl MaterialChanges {
    pub fn is_empty(&self) -> bool {
        self.material_code.is_none()
            && self.name.is_none()
            && self.material_type.is_none()
            && self.material_buy_price.is_none()
            && self.partner_id.is_none()
            && self.currency_id.is_none()
    }
}

/// Parse an order clause such as `"name asc, id desc"`.
///
/// Only stored scalar columns may be sorted on; the direction defaults to ascending.
pub fn parse_order(clause: &str) -> Result<Vec<(material::Column, Order)>, ServiceError> {
    let mut terms = Vec::new();
    for term in clause.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let mut parts = term.split_whitespace();
        let field = parts.next().unwrap_or_default();
        let column = match field {
            "id" => material::Column::Id,
            "material_code" => material::Column::MaterialCode,
            "name" => material::Column::Name,
            "material_type" => material::Column::MaterialType,
            "material_buy_price" => material::Column::MaterialBuyPrice,
            "create_date" => material::Column::CreateDate,
            "write_date" => material::Column::WriteDate,
            other => {
                return Err(ServiceError::InvalidInput(format!(
                    "Invalid order field '{}'",
                    other
                )))
            }
        };
        let direction = match parts.next().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") => Order::Asc,
            Some("desc") => Order::Desc,
            Some(other) => {
                return Err(ServiceError::InvalidInput(format!(
                    "Invalid order direction '{}'",
                    other
                )))
            }
        };
        if parts.next().is_some() {
            return Err(ServiceError::InvalidInput(format!(
                "Invalid order term '{}'",
                term
            )));
        }
        terms.push((column, direction));
    }

    if terms.is_empty() {
        return parse_order(DEFAULT_ORDER);
    }
    Ok(terms)
}

/// Material register operations
#[derive(Clone)]
pub struct MaterialService {
    db: Arc<DatabaseConnection>,
    currencies: CurrencyService,
}

impl MaterialService {
    pub fn new(db: Arc<DatabaseConnection>, currencies: CurrencyService) -> Self {
        Self { db, currencies }
    }

    /// List materials matching the filters, newest first unless ordered otherwise
    #[instrument(skip(self))]
    pub async fn list(&self, query: MaterialQuery) -> Result<MaterialPage, ServiceError> {
        let order = parse_order(query.order.as_deref().unwrap_or(DEFAULT_ORDER))?;

        let mut select = material::Entity::find();
        if let Some(code) = query.material_code.as_deref().filter(|c| !c.is_empty()) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(material::Column::MaterialCode)))
                    .like(format!("%{}%", code.to_lowercase())),
            );
        }
        if let Some(name) = query.name.as_deref().filter(|n| !n.is_empty()) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col(material::Column::Name)))
                    .like(format!("%{}%", name.to_lowercase())),
            );
        }
        if let Some(material_type) = query.material_type {
            select = select.filter(material::Column::MaterialType.eq(material_type));
        }

        let total = select.clone().count(&*self.db).await?;

        for (column, direction) in order {
            select = select.order_by(column, direction);
        }
        let offset = query.offset.min(MAX_PAGE_VALUE);
        // SQLite only accepts OFFSET after a LIMIT
        let limit = match query.limit {
            0 if offset > 0 => Some(MAX_PAGE_VALUE),
            0 => None,
            n => Some(n.min(MAX_PAGE_VALUE)),
        };
        if let Some(limit) = limit {
            select = select.limit(limit);
        }
        if offset > 0 {
            select = select.offset(offset);
        }

        let models = select.all(&*self.db).await?;
        let items = resolve_records(&*self.db, models).await?;

        Ok(MaterialPage { items, total })
    }

    #[instrument(skip(self))]
    pub async fn get(&self, material_id: i32) -> Result<Option<MaterialRecord>, ServiceError> {
        let Some(model) = material::Entity::find_by_id(material_id)
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };
        Ok(resolve_records(&*self.db, vec![model]).await?.pop())
    }

    pub async fn exists(&self, material_id: i32) -> Result<bool, ServiceError> {
        let count = material::Entity::find()
            .filter(material::Column::Id.eq(material_id))
            .count(&*self.db)
            .await?;
        Ok(count > 0)
    }

    /// Create a material on behalf of `actor`
    #[instrument(skip(self))]
    pub async fn create(
        &self,
        input: NewMaterial,
        actor: Option<i32>,
    ) -> Result<MaterialRecord, ServiceError> {
        let currency_id = match input.currency_id {
            Some(id) => Some(id),
            None => self.currencies.default_currency_id().await?,
        };

        let txn = self.db.begin().await?;
        ensure_partner(&txn, input.partner_id).await?;
        if let Some(id) = currency_id {
            ensure_currency(&txn, id).await?;
        }

        let created = material::ActiveModel {
            material_code: Set(input.material_code),
            name: Set(input.name),
            material_type: Set(input.material_type),
            currency_id: Set(currency_id),
            material_buy_price: Set(input.material_buy_price),
            partner_id: Set(input.partner_id),
            create_uid: Set(actor),
            write_uid: Set(actor),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(reject_write)?;

        let record = resolve_records(&txn, vec![created])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("created material vanished".into()))?;
        txn.commit().await?;

        MATERIAL_METRICS.created.inc();
        info!(
            material_id = record.material.id,
            code = %record.material.material_code,
            "Created material {}",
            record.material.name
        );
        Ok(record)
    }

    /// Apply `changes` to a material. Untouched fields keep their values.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        material_id: i32,
        changes: MaterialChanges,
        actor: Option<i32>,
    ) -> Result<MaterialRecord, ServiceError> {
        let txn = self.db.begin().await?;

        let existing = material::Entity::find_by_id(material_id)
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Material with ID {} not found", material_id))
            })?;

        if changes.is_empty() {
            let record = resolve_records(&txn, vec![existing]).await?.pop();
            txn.commit().await?;
            return record
                .ok_or_else(|| ServiceError::InternalError("material vanished".into()));
        }

        if let Some(partner_id) = changes.partner_id {
            ensure_partner(&txn, partner_id).await?;
        }
        if let Some(currency_id) = changes.currency_id {
            ensure_currency(&txn, currency_id).await?;
        }

        let mut active: material::ActiveModel = existing.into();
        if let Some(code) = changes.material_code {
            active.material_code = Set(code);
        }
        if let Some(name) = changes.name {
            active.name = Set(name);
        }
        if let Some(material_type) = changes.material_type {
            active.material_type = Set(material_type);
        }
        if let Some(price) = changes.material_buy_price {
            active.material_buy_price = Set(price);
        }
        if let Some(partner_id) = changes.partner_id {
            active.partner_id = Set(partner_id);
        }
        if let Some(currency_id) = changes.currency_id {
            active.currency_id = Set(Some(currency_id));
        }
        active.write_uid = Set(actor);

        let updated = active.update(&txn).await.map_err(reject_write)?;
        let record = resolve_records(&txn, vec![updated])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("updated material vanished".into()))?;
        txn.commit().await?;

        MATERIAL_METRICS.updated.inc();
        info!(material_id, "Updated material {}", record.material.name);
        Ok(record)
    }

    /// Hard delete. Returns the removed row, or `None` if there was none.
    #[instrument(skip(self))]
    pub async fn delete(&self, material_id: i32) -> Result<Option<material::Model>, ServiceError> {
        let Some(existing) = material::Entity::find_by_id(material_id)
            .one(&*self.db)
            .await?
        else {
            return Ok(None);
        };

        existing.clone().delete(&*self.db).await?;

        MATERIAL_METRICS.deleted.inc();
        info!(material_id, "Deleted material {}", existing.name);
        Ok(Some(existing))
    }
}

fn reject_write(err: sea_orm::DbErr) -> ServiceError {
    let err = ServiceError::from_write(err);
    if let ServiceError::ValidationError(message) = &err {
        MATERIAL_METRICS.rejected.inc();
        warn!("Material write rejected: {}", message);
    }
    err
}

async fn ensure_partner<C: ConnectionTrait>(db: &C, partner_id: i32) -> Result<(), ServiceError> {
    let found = partner::Entity::find()
        .filter(partner::Column::Id.eq(partner_id))
        .count(db)
        .await?;
    if found == 0 {
        return Err(ServiceError::ValidationError(format!(
            "Partner with ID {} not found",
            partner_id
        )));
    }
    Ok(())
}

async fn ensure_currency<C: ConnectionTrait>(db: &C, currency_id: i32) -> Result<(), ServiceError> {
    let found = currency::Entity::find()
        .filter(currency::Column::Id.eq(currency_id))
        .count(db)
        .await?;
    if found == 0 {
        return Err(ServiceError::ValidationError(format!(
            "Currency with ID {} not found",
            currency_id
        )));
    }
    Ok(())
}

/// Attach partner, currency and user rows with one query per table.
async fn resolve_records<C: ConnectionTrait>(
    db: &C,
    models: Vec<material::Model>,
) -> Result<Vec<MaterialRecord>, ServiceError> {
    if models.is_empty() {
        return Ok(Vec::new());
    }

    let partner_ids: HashSet<i32> = models.iter().map(|m| m.partner_id).collect();
    let currency_ids: HashSet<i32> = models.iter().filter_map(|m| m.currency_id).collect();
    let user_ids: HashSet<i32> = models
        .iter()
        .flat_map(|m| [m.create_uid, m.write_uid])
        .flatten()
        .collect();

    let partners: HashMap<i32, partner::Model> = partner::Entity::find()
        .filter(partner::Column::Id.is_in(partner_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let currencies: HashMap<i32, currency::Model> = if currency_ids.is_empty() {
        HashMap::new()
    } else {
        currency::Entity::find()
            .filter(currency::Column::Id.is_in(currency_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect()
    };

    let users: HashMap<i32, user::Model> = if user_ids.is_empty() {
        HashMap::new()
    } else {
        user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect()
    };

    Ok(models
        .into_iter()
        .map(|material| MaterialRecord {
            currency: material
                .currency_id
                .and_then(|id| currencies.get(&id).cloned()),
            partner: partners.get(&material.partner_id).cloned(),
            creator: material.create_uid.and_then(|id| users.get(&id).cloned()),
            writer: material.write_uid.and_then(|id| users.get(&id).cloned()),
            material,
        })
        .collect())
}
