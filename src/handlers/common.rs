use crate::ApiResponse;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Standard success response
pub fn success_response<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data).with_message(message))).into_response()
}

/// Standard created response
pub fn created_response<T: Serialize>(data: T, message: impl Into<String>) -> Response {
    (
        StatusCode::CREATED,
        Json(ApiResponse::success(data).with_message(message)),
    )
        .into_response()
}

/// Success response for a page of results
pub fn list_response<T: Serialize>(
    data: Vec<T>,
    message: impl Into<String>,
    meta: ListMeta,
) -> Response {
    (
        StatusCode::OK,
        Json(ApiResponse::success(data).with_message(message).with_meta(meta)),
    )
        .into_response()
}

pub fn normalize_string(value: String) -> String {
    value.trim().to_string()
}

pub fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .and_then(|v| if v.is_empty() { None } else { Some(v) })
}

/// A request body field that holds on to values of the wrong JSON type
/// instead of rejecting the whole body, so handlers can report them in
/// their own validation order.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<T> {
    Valid(T),
    Invalid(Value),
}

impl<T> FieldValue<T> {
    pub fn valid(self) -> Option<T> {
        match self {
            FieldValue::Valid(value) => Some(value),
            FieldValue::Invalid(_) => None,
        }
    }
}

impl<T> From<T> for FieldValue<T> {
    fn from(value: T) -> Self {
        FieldValue::Valid(value)
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for FieldValue<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(match T::deserialize(&raw) {
            Ok(value) => FieldValue::Valid(value),
            Err(_) => FieldValue::Invalid(raw),
        })
    }
}

/// Paging metadata attached to list responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ListMeta {
    /// Rows matching the filters, ignoring limit and offset
    pub total_count: u64,
    pub offset: u64,
    /// Zero when the listing was unbounded
    pub limit: u64,
    pub has_more: bool,
}

impl ListMeta {
    pub fn new(total_count: u64, offset: u64, limit: u64, returned: usize) -> Self {
        Self {
            total_count,
            offset,
            limit,
            has_more: offset.saturating_add(returned as u64) < total_count,
        }
    }
}
