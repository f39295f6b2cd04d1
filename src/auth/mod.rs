/*!
 * # Authentication Module
 *
 * Gate in front of the material API. Two schemes are accepted on the
 * `Authorization` header:
 *
 * - `Bearer <api-key>`: checked against the scoped API key store
 * - `Basic <base64(login:password)>`: checked against the user store
 *
 * Anything else is rejected with a 401 failure envelope.
 */

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine as _;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::{ApiError, ServiceError};
use crate::metrics::AUTH_METRICS;

// Entity modules
pub mod api_key;
pub mod user;

/// Number of leading key characters stored in clear for lookup
pub const KEY_INDEX_LEN: usize = 8;
const KEY_RANDOM_LEN: usize = 40;

/// How the caller proved its identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ApiKey,
    Basic,
}

/// Authenticated user bound to the current request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub login: String,
    pub name: String,
    pub method: AuthMethod,
}

impl AuthUser {
    fn from_user(user: user::Model, method: AuthMethod) -> Self {
        Self {
            user_id: user.id,
            login: user.login,
            name: user.name,
            method,
        }
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingAuth,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Authentication failed: Invalid username or password")]
    InvalidCredentials,

    #[error("Authentication error: {0}")]
    MalformedCredentials(String),

    #[error("Unsupported authorization method")]
    UnsupportedScheme,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingAuth => "AUTH_MISSING",
            Self::InvalidApiKey => "AUTH_INVALID_API_KEY",
            Self::InvalidCredentials => "AUTH_INVALID_CREDENTIALS",
            Self::MalformedCredentials(_) => "AUTH_MALFORMED_CREDENTIALS",
            Self::UnsupportedScheme => "AUTH_UNSUPPORTED_SCHEME",
            Self::DatabaseError(_) | Self::InternalError(_) => "AUTH_INTERNAL_ERROR",
        }
    }

    /// Every failure to authenticate, storage failures included, is a 401
    pub fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl From<sea_orm::DbErr> for AuthError {
    fn from(err: sea_orm::DbErr) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Do not leak storage details to unauthenticated callers
            Self::DatabaseError(_) | Self::InternalError(_) => {
                "Authentication error: internal failure".to_string()
            }
            other => other.to_string(),
        };
        ApiError::new(self.status_code(), self.code(), message).into_response()
    }
}

/// Credentials parsed from an `Authorization` header value
#[derive(Debug, PartialEq, Eq)]
pub enum Credentials<'a> {
    ApiKey(&'a str),
    Basic(&'a str),
}

/// Split an `Authorization` header into scheme and payload.
pub fn parse_authorization(header: Option<&str>) -> Result<Credentials<'_>, AuthError> {
    let value = header.map(str::trim).filter(|v| !v.is_empty());
    let Some(value) = value else {
        return Err(AuthError::MissingAuth);
    };

    if let Some(key) = value.strip_prefix("Bearer ") {
        let key = key.trim();
        if key.is_empty() {
            return Err(AuthError::InvalidApiKey);
        }
        return Ok(Credentials::ApiKey(key));
    }

    if let Some(encoded) = value.strip_prefix("Basic ") {
        return Ok(Credentials::Basic(encoded.trim()));
    }

    Err(AuthError::UnsupportedScheme)
}

/// Decode `base64(login:password)`. Only the first `:` separates the two,
/// so passwords may contain colons.
pub fn decode_basic(encoded: &str) -> Result<(String, String), AuthError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| AuthError::MalformedCredentials(format!("invalid base64: {}", e)))?;
    let decoded = String::from_utf8(bytes)
        .map_err(|_| AuthError::MalformedCredentials("credentials are not UTF-8".into()))?;
    let (login, password) = decoded
        .split_once(':')
        .ok_or_else(|| AuthError::MalformedCredentials("expected login:password".into()))?;
    Ok((login.to_string(), password.to_string()))
}

/// SHA-256 hex digest stored in place of the plaintext key
pub fn hash_api_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

fn key_index(key: &str) -> String {
    key.chars().take(KEY_INDEX_LEN).collect()
}

pub fn hash_password(password: &str) -> Result<String, ServiceError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::HashError(e.to_string()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

/// Plaintext API key handed out once at creation time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedApiKey {
    pub id: i32,
    pub name: String,
    pub user_id: i32,
    pub scope: Option<String>,
    pub key: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Credential checks and credential store management
#[derive(Clone)]
pub struct AuthService {
    db: Arc<DatabaseConnection>,
    scope: String,
    key_prefix: String,
}

impl AuthService {
    pub fn new(db: Arc<DatabaseConnection>, scope: String, key_prefix: String) -> Self {
        Self {
            db,
            scope,
            key_prefix,
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Resolve the `Authorization` header of a request to a user.
    pub async fn authenticate(&self, header: Option<&str>) -> Result<AuthUser, AuthError> {
        match parse_authorization(header)? {
            Credentials::ApiKey(key) => self.check_api_key(&self.scope, key).await,
            Credentials::Basic(encoded) => self.check_basic(encoded).await,
        }
    }

    /// Validate an API key for `scope`. Keys without a scope are valid everywhere.
    #[instrument(skip(self, key))]
    pub async fn check_api_key(&self, scope: &str, key: &str) -> Result<AuthUser, AuthError> {
        let digest = hash_api_key(key);
        let candidates = api_key::Entity::find()
            .filter(api_key::Column::KeyIndex.eq(key_index(key)))
            .all(&*self.db)
            .await?;

        let now = Utc::now();
        let record = candidates
            .into_iter()
            .find(|k| k.key_hash == digest && k.allows_scope(scope) && !k.is_expired(now))
            .ok_or(AuthError::InvalidApiKey)?;

        let user = user::Entity::find_by_id(record.user_id)
            .one(&*self.db)
            .await?
            .filter(|u| u.active)
            .ok_or(AuthError::InvalidApiKey)?;

        let key_id = record.id;
        let mut touched: api_key::ActiveModel = record.into();
        touched.last_used_at = Set(Some(now));
        if let Err(e) = touched.update(&*self.db).await {
            // last_used_at is best effort
            warn!(key_id, "Failed to record API key usage: {}", e);
        }

        debug!(user_id = user.id, "API key accepted");
        Ok(AuthUser::from_user(user, AuthMethod::ApiKey))
    }

    /// Validate base64 encoded `login:password` against the user store.
    #[instrument(skip(self, encoded))]
    pub async fn check_basic(&self, encoded: &str) -> Result<AuthUser, AuthError> {
        let (login, password) = decode_basic(encoded)?;

        let user = user::Entity::find()
            .filter(user::Column::Login.eq(login.as_str()))
            .filter(user::Column::Active.eq(true))
            .one(&*self.db)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(&password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        debug!(user_id = user.id, "Basic credentials accepted");
        Ok(AuthUser::from_user(user, AuthMethod::Basic))
    }

    /// Create an active user with an argon2 hashed password.
    #[instrument(skip(self, password))]
    pub async fn create_user(
        &self,
        login: &str,
        name: &str,
        password: &str,
    ) -> Result<user::Model, ServiceError> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(ServiceError::ValidationError(
                "Login and password are required".to_string(),
            ));
        }

        let existing = user::Entity::find()
            .filter(user::Column::Login.eq(login))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "A user with login '{}' already exists",
                login
            )));
        }

        let created = user::ActiveModel {
            login: Set(login.to_string()),
            name: Set(name.trim().to_string()),
            password_hash: Set(hash_password(password)?),
            active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = created.id, login = %created.login, "User created");
        Ok(created)
    }

    pub async fn find_user_by_login(&self, login: &str) -> Result<Option<user::Model>, ServiceError> {
        Ok(user::Entity::find()
            .filter(user::Column::Login.eq(login))
            .one(&*self.db)
            .await?)
    }

    /// Issue a new API key. The plaintext is only ever returned here.
    #[instrument(skip(self))]
    pub async fn issue_api_key(
        &self,
        user_id: i32,
        name: &str,
        scope: Option<String>,
        expires_in_days: Option<i64>,
    ) -> Result<IssuedApiKey, ServiceError> {
        let owner = user::Entity::find_by_id(user_id).one(&*self.db).await?;
        if owner.is_none() {
            return Err(ServiceError::NotFound(format!(
                "User with ID {} not found",
                user_id
            )));
        }

        let random: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(KEY_RANDOM_LEN)
            .map(char::from)
            .collect();
        let key = format!("{}{}", self.key_prefix, random);
        let now = Utc::now();
        let expires_at = match expires_in_days {
            None => None,
            Some(days) => Some(
                ChronoDuration::try_days(days)
                    .and_then(|ttl| now.checked_add_signed(ttl))
                    .ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "API key lifetime of {} days is out of range",
                            days
                        ))
                    })?,
            ),
        };

        let record = api_key::ActiveModel {
            name: Set(name.to_string()),
            user_id: Set(user_id),
            scope: Set(scope.clone()),
            key_index: Set(key_index(&key)),
            key_hash: Set(hash_api_key(&key)),
            created_at: Set(now),
            expires_at: Set(expires_at),
            last_used_at: Set(None),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(key_id = record.id, user_id, "API key issued");
        Ok(IssuedApiKey {
            id: record.id,
            name: record.name,
            user_id,
            scope,
            key,
            expires_at,
        })
    }

    /// Delete an API key. Returns false when no key had that id.
    #[instrument(skip(self))]
    pub async fn revoke_api_key(&self, key_id: i32) -> Result<bool, ServiceError> {
        let result = api_key::Entity::delete_by_id(key_id)
            .exec(&*self.db)
            .await?;
        if result.rows_affected > 0 {
            info!(key_id, "API key revoked");
        }
        Ok(result.rows_affected > 0)
    }
}

/// Authentication middleware: resolves the caller and stores `AuthUser`
/// in the request extensions, or answers 401 itself.
pub async fn auth_middleware(
    State(auth): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default().to_string());

    match auth.authenticate(header_value.as_deref()).await {
        Ok(user) => {
            match user.method {
                AuthMethod::ApiKey => AUTH_METRICS.api_key_success.inc(),
                AuthMethod::Basic => AUTH_METRICS.basic_success.inc(),
            }
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => {
            AUTH_METRICS.failures.inc();
            match &e {
                AuthError::DatabaseError(_) | AuthError::InternalError(_) => {
                    error!(code = e.code(), "Authentication failed: {}", e)
                }
                _ => warn!(
                    code = e.code(),
                    method = %request.method(),
                    uri = %request.uri(),
                    "Rejected request: {}", e
                ),
            }
            e.into_response()
        }
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self, auth: Arc<AuthService>) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self, auth: Arc<AuthService>) -> Self {
        self.layer(axum::middleware::from_fn_with_state(auth, auth_middleware))
    }
}
