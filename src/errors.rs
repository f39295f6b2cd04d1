use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::error::DbErr;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::borrow::Cow;
use utoipa::ToSchema;

fn current_request_id() -> Option<String> {
    crate::tracing::current_request_id().map(|rid| rid.as_str().to_string())
}

/// Error codes carried in the failure envelope.
pub mod codes {
    pub const MISSING_REQUIRED_FIELDS: &str = "MISSING_REQUIRED_FIELDS";
    pub const INVALID_MATERIAL_TYPE: &str = "INVALID_MATERIAL_TYPE";
    pub const INVALID_PRICE: &str = "INVALID_PRICE";
    pub const PARTNER_NOT_FOUND: &str = "PARTNER_NOT_FOUND";
    pub const NO_UPDATE_DATA: &str = "NO_UPDATE_DATA";
    pub const MATERIAL_NOT_FOUND: &str = "MATERIAL_NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const INVALID_ORDER: &str = "INVALID_ORDER";
    pub const INVALID_REQUEST_BODY: &str = "INVALID_REQUEST_BODY";
    pub const INVALID_QUERY: &str = "INVALID_QUERY";
    pub const INVALID_ID: &str = "INVALID_ID";
    pub const MATERIALS_FETCH_ERROR: &str = "MATERIALS_FETCH_ERROR";
    pub const MATERIAL_FETCH_ERROR: &str = "MATERIAL_FETCH_ERROR";
    pub const MATERIAL_CREATE_ERROR: &str = "MATERIAL_CREATE_ERROR";
    pub const MATERIAL_UPDATE_ERROR: &str = "MATERIAL_UPDATE_ERROR";
    pub const MATERIAL_DELETE_ERROR: &str = "MATERIAL_DELETE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl ServiceError {
    /// Classify a failed write. Model hooks reject writes with
    /// `DbErr::Custom`, which surfaces as a validation failure.
    pub fn from_write(err: DbErr) -> Self {
        match err {
            DbErr::Custom(message) => ServiceError::ValidationError(message),
            other => ServiceError::DatabaseError(other),
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::AuthError(_) | Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::DatabaseError(_)
            | Self::HashError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::HashError(_) | Self::Other(_) => "Internal server error".to_string(),
            Self::NotFound(msg)
            | Self::ValidationError(msg)
            | Self::InvalidInput(msg)
            | Self::AuthError(msg)
            | Self::Unauthorized(msg)
            | Self::InternalError(msg) => msg.clone(),
        }
    }
}

/// Body of the failure envelope
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    #[schema(example = "Material with ID 42 not found")]
    pub message: String,
    #[schema(example = "MATERIAL_NOT_FOUND")]
    pub code: String,
    /// Unique request identifier for support and debugging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

/// Failure envelope returned by every API error
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": false,
    "error": {"message": "Material with ID 42 not found", "code": "MATERIAL_NOT_FOUND"}
}))]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

/// API Error type for HTTP responses
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: Cow<'static, str>,
    pub message: String,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, code, message)
    }

    pub fn missing_required_fields(fields: &[&str]) -> Self {
        Self::bad_request(
            codes::MISSING_REQUIRED_FIELDS,
            format!("Missing required fields: {}", fields.join(", ")),
        )
    }

    pub fn invalid_material_type() -> Self {
        Self::bad_request(
            codes::INVALID_MATERIAL_TYPE,
            format!(
                "Invalid material type. Allowed values: {}",
                crate::entities::MaterialType::ALLOWED.join(", ")
            ),
        )
    }

    pub fn invalid_price() -> Self {
        Self::bad_request(codes::INVALID_PRICE, "Material buy price must be positive")
    }

    pub fn partner_not_found(partner_id: i64) -> Self {
        Self::bad_request(
            codes::PARTNER_NOT_FOUND,
            format!("Partner with ID {} not found", partner_id),
        )
    }

    pub fn no_update_data() -> Self {
        Self::bad_request(codes::NO_UPDATE_DATA, "No fields to update provided")
    }

    pub fn material_not_found(material_id: i32) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            codes::MATERIAL_NOT_FOUND,
            format!("Material with ID {} not found", material_id),
        )
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
    }

    /// Map a service failure onto the envelope. Anything that is not a
    /// client mistake becomes a 500 with the operation's `fallback_code`.
    pub fn from_service(err: ServiceError, fallback_code: &'static str, context: &str) -> Self {
        match err {
            ServiceError::ValidationError(message) => {
                Self::bad_request(codes::VALIDATION_ERROR, message)
            }
            ServiceError::InvalidInput(message) => Self::bad_request(codes::INVALID_ORDER, message),
            ServiceError::NotFound(message) => {
                Self::new(StatusCode::NOT_FOUND, codes::MATERIAL_NOT_FOUND, message)
            }
            other => Self::internal(fallback_code, format!("{}: {}", context, other)),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self::new(err.status_code(), codes::INTERNAL_ERROR, err.response_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: ErrorDetail {
                message: self.message,
                code: self.code.into_owned(),
                request_id: current_request_id(),
            },
        };

        (self.status, Json(body)).into_response()
    }
}

/// JSON body extractor whose rejections use the failure envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    // Oversized bodies keep their 413; everything else is a client mistake.
    let status = match rejection.status() {
        StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    };
    ApiError::new(
        status,
        codes::INVALID_REQUEST_BODY,
        format!("Invalid request body: {}", rejection.body_text()),
    )
}

/// Query string extractor whose rejections use the failure envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Query::<T>::from_request_parts(parts, state)
            .await
            .map(|Query(value)| Self(value))
            .map_err(|rejection: QueryRejection| {
                ApiError::bad_request(
                    codes::INVALID_QUERY,
                    format!("Invalid query parameters: {}", rejection.body_text()),
                )
            })
    }
}

/// Path extractor whose rejections use the failure envelope
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<T>::from_request_parts(parts, state)
            .await
            .map(|Path(value)| Self(value))
            .map_err(|rejection: PathRejection| {
                ApiError::bad_request(
                    codes::INVALID_ID,
                    format!("Invalid path parameter: {}", rejection.body_text()),
                )
            })
    }
}
