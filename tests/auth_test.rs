mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use common::{error_code, read_json, TestApp, TEST_LOGIN, TEST_PASSWORD};
use material_register::auth::{api_key, user, AuthError, AuthMethod};
use rstest::rstest;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set};

const MATERIALS: &str = "/api/v1/materials";

#[rstest]
#[case(None, "AUTH_MISSING", "Missing authorization header")]
#[case(Some("Token abc"), "AUTH_UNSUPPORTED_SCHEME", "Unsupported authorization method")]
#[case(Some("Bearer mr_notarealkey"), "AUTH_INVALID_API_KEY", "Invalid API key")]
#[tokio::test]
async fn requests_without_valid_credentials_are_rejected(
    #[case] authorization: Option<&str>,
    #[case] expected_code: &str,
    #[case] expected_message: &str,
) {
    let app = TestApp::new().await;

    let (status, body) =
        read_json(app.request(Method::GET, MATERIALS, None, authorization).await).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), expected_code);
    assert_eq!(body["error"]["message"], expected_message);
}

#[tokio::test]
async fn api_key_grants_access_and_records_usage() {
    let app = TestApp::new().await;

    let response = app.request_authenticated(Method::GET, MATERIALS, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let keys = api_key::Entity::find()
        .all(&*app.state.db)
        .await
        .expect("list api keys");
    assert_eq!(keys.len(), 1);
    assert!(keys[0].last_used_at.is_some());
    assert_ne!(keys[0].key_hash, app.api_key());
}

#[tokio::test]
async fn basic_credentials_grant_access() {
    let app = TestApp::new().await;
    let header = TestApp::basic_header(TEST_LOGIN, TEST_PASSWORD);

    let response = app.request(Method::GET, MATERIALS, None, Some(&header)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn basic_author_is_recorded_on_create() {
    let app = TestApp::new().await;
    let header = TestApp::basic_header(TEST_LOGIN, TEST_PASSWORD);

    let (status, body) = read_json(
        app.request(
            Method::POST,
            MATERIALS,
            Some(serde_json::json!({
                "material_code": "B-1",
                "name": "Basic Cotton",
                "material_type": "cotton",
                "material_buy_price": 180,
                "partner_id": app.partner.id,
            })),
            Some(&header),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = body["data"]["id"].as_i64().expect("id") as i32;
    let record = app
        .state
        .services
        .materials
        .get(id)
        .await
        .expect("load material")
        .expect("material exists");
    assert_eq!(record.material.create_uid, Some(app.user_id));
    assert_eq!(record.creator.map(|u| u.login).as_deref(), Some(TEST_LOGIN));
}

#[rstest]
#[case(TEST_LOGIN, "wrong-password")]
#[case("nobody", TEST_PASSWORD)]
#[case(TEST_LOGIN, "s3cret")]
#[tokio::test]
async fn wrong_basic_credentials_are_rejected(#[case] login: &str, #[case] password: &str) {
    let app = TestApp::new().await;
    let header = TestApp::basic_header(login, password);

    let (status, body) =
        read_json(app.request(Method::GET, MATERIALS, None, Some(&header)).await).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "AUTH_INVALID_CREDENTIALS");
    assert_eq!(
        body["error"]["message"],
        "Authentication failed: Invalid username or password"
    );
}

#[rstest]
#[case("Basic !!!not-base64!!!")]
#[case("Basic bm9jb2xvbg==")]
#[tokio::test]
async fn malformed_basic_credentials_are_rejected(#[case] header: &str) {
    let app = TestApp::new().await;

    let (status, body) =
        read_json(app.request(Method::GET, MATERIALS, None, Some(header)).await).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "AUTH_MALFORMED_CREDENTIALS");
}

#[tokio::test]
async fn revoked_key_stops_working() {
    let app = TestApp::new().await;
    let key_id = api_key::Entity::find()
        .one(&*app.state.db)
        .await
        .expect("query api keys")
        .expect("test key exists")
        .id;

    assert!(app
        .auth_service()
        .revoke_api_key(key_id)
        .await
        .expect("revoke key"));
    assert!(!app
        .auth_service()
        .revoke_api_key(key_id)
        .await
        .expect("second revoke"));

    let (status, body) = read_json(app.request_authenticated(Method::GET, MATERIALS, None).await).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "AUTH_INVALID_API_KEY");
}

#[tokio::test]
async fn expired_key_is_rejected() {
    let app = TestApp::new().await;
    let auth = app.auth_service();
    let issued = auth
        .issue_api_key(app.user_id, "stale", None, Some(-1))
        .await
        .expect("issue expired key");

    assert_matches!(
        auth.check_api_key(auth.scope(), &issued.key).await,
        Err(AuthError::InvalidApiKey)
    );
}

#[rstest]
#[case(Some(1_000_000_000_000))]
#[case(Some(i64::MAX))]
#[case(Some(i64::MIN))]
#[tokio::test]
async fn out_of_range_key_lifetime_is_refused(#[case] expires_in_days: Option<i64>) {
    let app = TestApp::new().await;

    let result = app
        .auth_service()
        .issue_api_key(app.user_id, "far", None, expires_in_days)
        .await;

    assert_matches!(
        result,
        Err(material_register::errors::ServiceError::ValidationError(_))
    );
    assert_eq!(
        api_key::Entity::find()
            .all(&*app.state.db)
            .await
            .expect("list api keys")
            .len(),
        1
    );
}

#[tokio::test]
async fn storage_failure_during_authentication_is_unauthorized() {
    let app = TestApp::new().await;
    app.state
        .db
        .execute_unprepared("DROP TABLE api_keys")
        .await
        .expect("drop api key table");

    let (status, body) =
        read_json(app.request_authenticated(Method::GET, MATERIALS, None).await).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(&body), "AUTH_INTERNAL_ERROR");
    assert_eq!(body["error"]["message"], "Authentication error: internal failure");
}

#[tokio::test]
async fn key_scope_must_match_or_be_empty() {
    let app = TestApp::new().await;
    let auth = app.auth_service();

    let foreign = auth
        .issue_api_key(app.user_id, "other module", Some("inventory_api".into()), None)
        .await
        .expect("issue foreign key");
    assert_matches!(
        auth.check_api_key(auth.scope(), &foreign.key).await,
        Err(AuthError::InvalidApiKey)
    );

    let unscoped = auth
        .issue_api_key(app.user_id, "global", None, None)
        .await
        .expect("issue unscoped key");
    let user = auth
        .check_api_key(auth.scope(), &unscoped.key)
        .await
        .expect("unscoped key is accepted");
    assert_eq!(user.user_id, app.user_id);
    assert_eq!(user.method, AuthMethod::ApiKey);
    assert!(unscoped.key.starts_with("mr_"));
}

#[tokio::test]
async fn inactive_user_cannot_authenticate() {
    let app = TestApp::new().await;
    let account = user::Entity::find_by_id(app.user_id)
        .one(&*app.state.db)
        .await
        .expect("query user")
        .expect("user exists");
    let mut active: user::ActiveModel = account.into();
    active.active = Set(false);
    active.update(&*app.state.db).await.expect("deactivate user");

    let bearer = app.request_authenticated(Method::GET, MATERIALS, None).await;
    assert_eq!(bearer.status(), StatusCode::UNAUTHORIZED);

    let header = TestApp::basic_header(TEST_LOGIN, TEST_PASSWORD);
    let basic = app.request(Method::GET, MATERIALS, None, Some(&header)).await;
    assert_eq!(basic.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_login_is_refused() {
    let app = TestApp::new().await;

    let result = app
        .auth_service()
        .create_user(TEST_LOGIN, "Again", "another")
        .await;

    assert_matches!(
        result,
        Err(material_register::errors::ServiceError::ValidationError(_))
    );
}
