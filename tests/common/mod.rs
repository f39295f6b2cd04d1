#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use base64::Engine;
use material_register::{
    app_router,
    auth::AuthService,
    config::AppConfig,
    db,
    entities::partner,
    services::partners::{NewPartner, PartnerService},
    AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_LOGIN: &str = "tester";
pub const TEST_PASSWORD: &str = "s3cret:with-colon";

/// Helper harness for spinning up the full router backed by a throwaway SQLite file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub user_id: i32,
    pub partner: partner::Model,
    api_key: String,
    _db_dir: TempDir,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("failed to create temp dir");
        let db_path = db_dir.path().join("material_register_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = AppState::new(Arc::new(pool), cfg);

        let user = state
            .auth
            .create_user(TEST_LOGIN, "Test User", TEST_PASSWORD)
            .await
            .expect("create test user");
        let issued = state
            .auth
            .issue_api_key(user.id, "tests", Some(state.auth.scope().to_string()), None)
            .await
            .expect("issue test api key");

        let partner = PartnerService::new(state.db.clone())
            .create(NewPartner {
                name: "Julia Agrolait".to_string(),
                email: Some("julia@agrolait.example.com".to_string()),
                phone: Some("+32 10 588 558".to_string()),
            })
            .await
            .expect("create test partner");

        let router = app_router(state.clone());

        Self {
            router,
            state,
            user_id: user.id,
            partner,
            api_key: issued.key,
            _db_dir: db_dir,
        }
    }

    pub fn auth_service(&self) -> Arc<AuthService> {
        self.state.auth.clone()
    }

    /// The API key issued to the test user
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.api_key)
    }

    pub fn basic_header(login: &str, password: &str) -> String {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!("{}:{}", login, password));
        format!("Basic {}", encoded)
    }

    /// Send a request against the router with an optional `Authorization` value.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        authorization: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Convenience helper for requests authenticated with the test API key.
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        let header = self.bearer_header();
        self.request(method, uri, body, Some(&header)).await
    }

    /// Create a material through the API and return its id.
    pub async fn create_material(&self, code: &str, name: &str, material_type: &str, price: f64) -> i32 {
        let response = self
            .request_authenticated(
                Method::POST,
                "/api/v1/materials",
                Some(json!({
                    "material_code": code,
                    "name": name,
                    "material_type": material_type,
                    "material_buy_price": price,
                    "partner_id": self.partner.id,
                })),
            )
            .await;
        let (status, body) = read_json(response).await;
        assert_eq!(status, StatusCode::CREATED, "unexpected create response: {body}");
        body["data"]["id"].as_i64().expect("created id") as i32
    }
}

/// Split a response into its status and JSON body
pub async fn read_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is not JSON")
    };
    (status, value)
}

/// Assert the failure envelope and return its error code
pub fn error_code(body: &Value) -> &str {
    assert_eq!(body["success"], json!(false), "expected failure envelope: {body}");
    body["error"]["code"].as_str().expect("error code")
}
