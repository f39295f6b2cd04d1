use crate::{
    auth::{user, AuthUser},
    entities::{currency, partner, MaterialType},
    errors::{codes, ApiError, ApiJson, ApiPath, ApiQuery, ServiceError},
    handlers::common::{
        created_response, list_response, normalize_optional_string, normalize_string,
        success_response, FieldValue, ListMeta,
    },
    services::materials::{
        MaterialChanges, MaterialQuery, MaterialRecord, NewMaterial, MAX_PAGE_VALUE,
    },
    AppState,
};
use axum::{
    extract::State,
    response::Response,
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use utoipa::{IntoParams, ToSchema};

/// Creates the router for material endpoints
pub fn materials_routes() -> Router<AppState> {
    Router::new()
        .route("/materials", get(list_materials).post(create_material))
        .route(
            "/materials/:id",
            get(get_material)
                .put(update_material)
                .delete(delete_material),
        )
}

/// Filters, paging and ordering for the material listing
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MaterialListParams {
    /// Case-insensitive substring match on the code
    pub material_code: Option<String>,
    /// Case-insensitive substring match on the name
    pub name: Option<String>,
    /// Exact material type
    pub material_type: Option<String>,
    /// Maximum rows to return; 0 or absent returns everything
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    /// Comma separated `field [asc|desc]` terms, `id desc` by default
    pub order: Option<String>,
}

/// Body of a create request. Every field keeps mistyped values so the
/// required, type and price checks run in order.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CreateMaterialRequest {
    #[schema(value_type = Option<String>, example = "KS-001")]
    pub material_code: Option<FieldValue<String>>,
    #[schema(value_type = Option<String>, example = "Kain Katun")]
    pub name: Option<FieldValue<String>>,
    #[schema(value_type = Option<String>, example = "fabric")]
    pub material_type: Option<FieldValue<String>>,
    /// Accepts a JSON number or a numeric string
    #[schema(value_type = Option<f64>, example = 150.0)]
    pub material_buy_price: Option<FieldValue<Decimal>>,
    #[schema(value_type = Option<i64>)]
    pub partner_id: Option<FieldValue<i64>>,
    /// Company currency when omitted
    #[schema(value_type = Option<i32>)]
    pub currency_id: Option<FieldValue<i32>>,
}

/// Drop text values that are empty once trimmed
fn non_blank(value: Option<FieldValue<String>>) -> Option<FieldValue<String>> {
    value.filter(|v| !matches!(v, FieldValue::Valid(text) if text.trim().is_empty()))
}

impl CreateMaterialRequest {
    const REQUIRED: [&'static str; 5] = [
        "material_code",
        "name",
        "material_type",
        "material_buy_price",
        "partner_id",
    ];

    /// Required fields that are absent or blank, in declaration order
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let present_text = |value: &Option<FieldValue<String>>| {
            non_blank(value.clone()).is_some()
        };
        let present = [
            present_text(&self.material_code),
            present_text(&self.name),
            present_text(&self.material_type),
            self.material_buy_price.is_some(),
            self.partner_id.is_some(),
        ];
        Self::REQUIRED
            .iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(field, _)| *field)
            .collect()
    }
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateMaterialRequest {
    #[schema(value_type = Option<String>)]
    pub material_code: Option<FieldValue<String>>,
    #[schema(value_type = Option<String>)]
    pub name: Option<FieldValue<String>>,
    #[schema(value_type = Option<String>)]
    pub material_type: Option<FieldValue<String>>,
    #[schema(value_type = Option<f64>)]
    pub material_buy_price: Option<FieldValue<Decimal>>,
    #[schema(value_type = Option<i64>)]
    pub partner_id: Option<FieldValue<i64>>,
    #[schema(value_type = Option<i32>)]
    pub currency_id: Option<FieldValue<i32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CurrencySummary {
    pub id: i32,
    #[schema(example = "USD")]
    pub name: String,
    #[schema(example = "$")]
    pub symbol: String,
}

impl From<currency::Model> for CurrencySummary {
    fn from(model: currency::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            symbol: model.symbol,
        }
    }
}

/// `{id, name}` reference to a partner or user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NamedRef {
    pub id: i32,
    pub name: String,
}

impl From<partner::Model> for NamedRef {
    fn from(model: partner::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

impl From<user::Model> for NamedRef {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PartnerDetail {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl From<partner::Model> for PartnerDetail {
    fn from(model: partner::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
        }
    }
}

/// Row of the material listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialListItem {
    pub id: i32,
    pub material_code: String,
    pub name: String,
    pub material_type: MaterialType,
    pub material_buy_price: f64,
    pub currency: Option<CurrencySummary>,
    pub partner: Option<NamedRef>,
    pub create_date: DateTime<Utc>,
    pub write_date: DateTime<Utc>,
}

impl From<MaterialRecord> for MaterialListItem {
    fn from(record: MaterialRecord) -> Self {
        let MaterialRecord {
            material,
            currency,
            partner,
            ..
        } = record;
        Self {
            id: material.id,
            material_code: material.material_code,
            name: material.name,
            material_type: material.material_type,
            material_buy_price: price_number(&material.material_buy_price),
            currency: currency.map(Into::into),
            partner: partner.map(Into::into),
            create_date: material.create_date,
            write_date: material.write_date,
        }
    }
}

/// Full material with partner contact details and authorship
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MaterialDetail {
    pub id: i32,
    pub material_code: String,
    pub name: String,
    pub material_type: MaterialType,
    pub material_buy_price: f64,
    pub currency: Option<CurrencySummary>,
    pub partner: Option<PartnerDetail>,
    pub create_date: DateTime<Utc>,
    pub write_date: DateTime<Utc>,
    pub create_uid: Option<NamedRef>,
    pub write_uid: Option<NamedRef>,
}

impl From<MaterialRecord> for MaterialDetail {
    fn from(record: MaterialRecord) -> Self {
        let MaterialRecord {
            material,
            currency,
            partner,
            creator,
            writer,
        } = record;
        Self {
            id: material.id,
            material_code: material.material_code,
            name: material.name,
            material_type: material.material_type,
            material_buy_price: price_number(&material.material_buy_price),
            currency: currency.map(Into::into),
            partner: partner.map(Into::into),
            create_date: material.create_date,
            write_date: material.write_date,
            create_uid: creator.map(Into::into),
            write_uid: writer.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreatedMaterial {
    pub id: i32,
    pub material_code: String,
    pub name: String,
    pub material_type: MaterialType,
    pub material_buy_price: f64,
    pub create_date: DateTime<Utc>,
}

impl From<MaterialRecord> for CreatedMaterial {
    fn from(record: MaterialRecord) -> Self {
        let material = record.material;
        Self {
            id: material.id,
            material_code: material.material_code,
            name: material.name,
            material_type: material.material_type,
            material_buy_price: price_number(&material.material_buy_price),
            create_date: material.create_date,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdatedMaterial {
    pub id: i32,
    pub material_code: String,
    pub name: String,
    pub material_type: MaterialType,
    pub material_buy_price: f64,
    pub partner: Option<NamedRef>,
    pub write_date: DateTime<Utc>,
    pub write_uid: Option<NamedRef>,
}

impl From<MaterialRecord> for UpdatedMaterial {
    fn from(record: MaterialRecord) -> Self {
        let MaterialRecord {
            material,
            partner,
            writer,
            ..
        } = record;
        Self {
            id: material.id,
            material_code: material.material_code,
            name: material.name,
            material_type: material.material_type,
            material_buy_price: price_number(&material.material_buy_price),
            partner: partner.map(Into::into),
            write_date: material.write_date,
            write_uid: writer.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeletedMaterialInfo {
    pub id: i32,
    pub material_code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeletedMaterial {
    pub deleted: bool,
    pub material: DeletedMaterialInfo,
}

fn price_number(price: &Decimal) -> f64 {
    price.to_f64().unwrap_or_default()
}

/// Log a service failure and turn it into the operation's envelope
fn service_failure(err: ServiceError, fallback_code: &'static str, context: &str) -> ApiError {
    let api_error = ApiError::from_service(err, fallback_code, context);
    if api_error.status.is_server_error() {
        error!(code = %api_error.code, "{}", api_error.message);
    } else {
        warn!(code = %api_error.code, "{}", api_error.message);
    }
    api_error
}

/// The material type named by the client; anything but a known type string is rejected
fn material_type_field(value: FieldValue<String>) -> Result<MaterialType, ApiError> {
    value
        .valid()
        .and_then(|raw| MaterialType::parse(raw.trim()))
        .ok_or_else(ApiError::invalid_material_type)
}

/// A strictly positive buy price
fn price_field(value: FieldValue<Decimal>) -> Result<Decimal, ApiError> {
    match value {
        FieldValue::Valid(price) if price > Decimal::ZERO => Ok(price),
        _ => Err(ApiError::invalid_price()),
    }
}

fn typed_value<T>(field: &str, expected: &str, value: FieldValue<T>) -> Result<T, ApiError> {
    match value {
        FieldValue::Valid(value) => Ok(value),
        FieldValue::Invalid(raw) => Err(ApiError::bad_request(
            codes::INVALID_REQUEST_BODY,
            format!("Invalid request body: {} must be {}, got {}", field, expected, raw),
        )),
    }
}

fn typed_field<T>(
    field: &str,
    expected: &str,
    value: Option<FieldValue<T>>,
) -> Result<Option<T>, ApiError> {
    value.map(|v| typed_value(field, expected, v)).transpose()
}

/// Resolve a client supplied partner id to an existing partner
async fn ensure_partner(
    state: &AppState,
    partner_id: i64,
    fallback_code: &'static str,
    context: &str,
) -> Result<i32, ApiError> {
    let Ok(id) = i32::try_from(partner_id) else {
        return Err(ApiError::partner_not_found(partner_id));
    };
    let exists = state
        .services
        .partners
        .exists(id)
        .await
        .map_err(|e| service_failure(e, fallback_code, context))?;
    if !exists {
        return Err(ApiError::partner_not_found(partner_id));
    }
    Ok(id)
}

/// List materials
#[utoipa::path(
    get,
    path = "/api/v1/materials",
    params(MaterialListParams),
    responses(
        (status = 200, description = "Materials retrieved", body = crate::ApiResponse<Vec<MaterialListItem>>),
        (status = 400, description = "Invalid query or order clause", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Listing failed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []), ("Basic" = [])),
    tag = "Materials"
)]
pub async fn list_materials(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<MaterialListParams>,
) -> Result<Response, ApiError> {
    let limit = params.limit.unwrap_or(0);
    let offset = params.offset.unwrap_or(0);
    if limit > MAX_PAGE_VALUE || offset > MAX_PAGE_VALUE {
        return Err(ApiError::bad_request(
            codes::INVALID_QUERY,
            format!(
                "Invalid query parameters: limit and offset must not exceed {}",
                MAX_PAGE_VALUE
            ),
        ));
    }

    // An unknown type can never match a stored row.
    let material_type = match normalize_optional_string(params.material_type) {
        None => None,
        Some(raw) => match MaterialType::parse(&raw) {
            Some(material_type) => Some(material_type),
            None => {
                return Ok(list_response(
                    Vec::<MaterialListItem>::new(),
                    "Materials retrieved successfully",
                    ListMeta::new(0, offset, limit, 0),
                ))
            }
        },
    };

    let query = MaterialQuery {
        material_code: normalize_optional_string(params.material_code),
        name: normalize_optional_string(params.name),
        material_type,
        limit,
        offset,
        order: normalize_optional_string(params.order),
    };

    let page = state
        .services
        .materials
        .list(query)
        .await
        .map_err(|e| service_failure(e, codes::MATERIALS_FETCH_ERROR, "Failed to retrieve materials"))?;

    let items: Vec<MaterialListItem> = page.items.into_iter().map(Into::into).collect();
    let meta = ListMeta::new(page.total, offset, limit, items.len());

    Ok(list_response(items, "Materials retrieved successfully", meta))
}

/// Get a material by ID
#[utoipa::path(
    get,
    path = "/api/v1/materials/{id}",
    params(("id" = i32, Path, description = "Material ID")),
    responses(
        (status = 200, description = "Material retrieved", body = crate::ApiResponse<MaterialDetail>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []), ("Basic" = [])),
    tag = "Materials"
)]
pub async fn get_material(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Response, ApiError> {
    let context = format!("Failed to retrieve material with ID {}", id);
    let record = state
        .services
        .materials
        .get(id)
        .await
        .map_err(|e| service_failure(e, codes::MATERIAL_FETCH_ERROR, &context))?
        .ok_or_else(|| ApiError::material_not_found(id))?;

    let message = format!("Material '{}' retrieved successfully", record.material.name);
    Ok(success_response(MaterialDetail::from(record), message))
}

/// Create a material
#[utoipa::path(
    post,
    path = "/api/v1/materials",
    request_body = CreateMaterialRequest,
    responses(
        (status = 201, description = "Material created", body = crate::ApiResponse<CreatedMaterial>),
        (status = 400, description = "Missing fields, bad type, bad price, unknown partner or rejected by the model", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 500, description = "Creation failed", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []), ("Basic" = [])),
    tag = "Materials"
)]
pub async fn create_material(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateMaterialRequest>,
) -> Result<Response, ApiError> {
    let missing = payload.missing_fields();
    let CreateMaterialRequest {
        material_code,
        name,
        material_type,
        material_buy_price,
        partner_id,
        currency_id,
    } = payload;

    let (Some(material_code), Some(name), Some(material_type), Some(price), Some(partner_id)) = (
        non_blank(material_code),
        non_blank(name),
        non_blank(material_type),
        material_buy_price,
        partner_id,
    ) else {
        return Err(ApiError::missing_required_fields(&missing));
    };

    let material_type = material_type_field(material_type)?;
    let price = price_field(price)?;

    let material_code = normalize_string(typed_value("material_code", "a string", material_code)?);
    let name = normalize_string(typed_value("name", "a string", name)?);
    let currency_id = typed_field("currency_id", "an integer", currency_id)?;
    let partner_id = typed_value("partner_id", "an integer", partner_id)?;
    let partner_id = ensure_partner(
        &state,
        partner_id,
        codes::MATERIAL_CREATE_ERROR,
        "Failed to create material",
    )
    .await?;

    let input = NewMaterial {
        material_code,
        name,
        material_type,
        material_buy_price: price,
        partner_id,
        currency_id,
    };

    let record = state
        .services
        .materials
        .create(input, Some(user.user_id))
        .await
        .map_err(|e| service_failure(e, codes::MATERIAL_CREATE_ERROR, "Failed to create material"))?;

    let message = format!("Material '{}' created successfully", record.material.name);
    Ok(created_response(CreatedMaterial::from(record), message))
}

/// Update a material
#[utoipa::path(
    put,
    path = "/api/v1/materials/{id}",
    params(("id" = i32, Path, description = "Material ID")),
    request_body = UpdateMaterialRequest,
    responses(
        (status = 200, description = "Material updated", body = crate::ApiResponse<UpdatedMaterial>),
        (status = 400, description = "Bad type, bad price, unknown partner, nothing to update or rejected by the model", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []), ("Basic" = [])),
    tag = "Materials"
)]
pub async fn update_material(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateMaterialRequest>,
) -> Result<Response, ApiError> {
    const CONTEXT: &str = "Failed to update material";

    let exists = state
        .services
        .materials
        .exists(id)
        .await
        .map_err(|e| service_failure(e, codes::MATERIAL_UPDATE_ERROR, CONTEXT))?;
    if !exists {
        return Err(ApiError::material_not_found(id));
    }

    let mut changes = MaterialChanges::default();
    if let Some(value) = payload.material_type {
        changes.material_type = Some(material_type_field(value)?);
    }
    if let Some(value) = payload.material_buy_price {
        changes.material_buy_price = Some(price_field(value)?);
    }
    changes.material_code =
        typed_field("material_code", "a string", payload.material_code)?.map(normalize_string);
    changes.name = typed_field("name", "a string", payload.name)?.map(normalize_string);
    changes.currency_id = typed_field("currency_id", "an integer", payload.currency_id)?;
    if let Some(partner_id) = typed_field("partner_id", "an integer", payload.partner_id)? {
        changes.partner_id =
            Some(ensure_partner(&state, partner_id, codes::MATERIAL_UPDATE_ERROR, CONTEXT).await?);
    }

    if changes.is_empty() {
        return Err(ApiError::no_update_data());
    }

    let record = state
        .services
        .materials
        .update(id, changes, Some(user.user_id))
        .await
        .map_err(|e| service_failure(e, codes::MATERIAL_UPDATE_ERROR, CONTEXT))?;

    let message = format!("Material '{}' updated successfully", record.material.name);
    Ok(success_response(UpdatedMaterial::from(record), message))
}

/// Delete a material
#[utoipa::path(
    delete,
    path = "/api/v1/materials/{id}",
    params(("id" = i32, Path, description = "Material ID")),
    responses(
        (status = 200, description = "Material deleted", body = crate::ApiResponse<DeletedMaterial>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    security(("Bearer" = []), ("Basic" = [])),
    tag = "Materials"
)]
pub async fn delete_material(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> Result<Response, ApiError> {
    let removed = state
        .services
        .materials
        .delete(id)
        .await
        .map_err(|e| service_failure(e, codes::MATERIAL_DELETE_ERROR, "Failed to delete material"))?
        .ok_or_else(|| ApiError::material_not_found(id))?;

    let message = format!("Material '{}' deleted successfully", removed.name);
    let body = DeletedMaterial {
        deleted: true,
        material: DeletedMaterialInfo {
            id,
            material_code: removed.material_code,
            name: removed.name,
        },
    };
    Ok(success_response(body, message))
}
