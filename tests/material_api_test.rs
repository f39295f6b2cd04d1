mod common;

use axum::http::{Method, StatusCode};
use common::{error_code, read_json, TestApp};
use rstest::rstest;
use serde_json::{json, Value};

fn valid_payload(partner_id: i32) -> Value {
    json!({
        "material_code": "KS-001",
        "name": "Kaos Combed",
        "material_type": "fabric",
        "material_buy_price": 150.0,
        "partner_id": partner_id,
    })
}

#[tokio::test]
async fn create_returns_created_summary() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/materials",
            Some(valid_payload(app.partner.id)),
        )
        .await;
    let (status, body) = read_json(response).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["message"], "Material 'Kaos Combed' created successfully");
    let data = &body["data"];
    assert_eq!(data["material_code"], "KS-001");
    assert_eq!(data["material_type"], "fabric");
    assert_eq!(data["material_buy_price"], json!(150.0));
    assert!(data["id"].as_i64().is_some());
    assert!(data["create_date"].as_str().is_some());
}

#[rstest]
#[case(json!(99.99))]
#[case(json!(50))]
#[case(json!("1"))]
#[tokio::test]
async fn create_below_minimum_price_is_rejected(#[case] price: Value) {
    let app = TestApp::new().await;
    let mut payload = valid_payload(app.partner.id);
    payload["material_buy_price"] = price;

    let response = app
        .request_authenticated(Method::POST, "/api/v1/materials", Some(payload))
        .await;
    let (status, body) = read_json(response).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "VALIDATION_ERROR");
    assert_eq!(
        body["error"]["message"],
        "Material Buy Price must be higher than 100"
    );

    let (_, listing) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials", None)
            .await,
    )
    .await;
    assert_eq!(listing["meta"]["total_count"], json!(0));
}

#[tokio::test]
async fn create_at_minimum_price_is_accepted() {
    let app = TestApp::new().await;
    let mut payload = valid_payload(app.partner.id);
    payload["material_buy_price"] = json!("100.00");

    let response = app
        .request_authenticated(Method::POST, "/api/v1/materials", Some(payload))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[rstest]
#[case(json!(0))]
#[case(json!(-5))]
#[case(json!("a lot"))]
#[case(json!(true))]
#[tokio::test]
async fn create_with_non_positive_price_reports_invalid_price(#[case] price: Value) {
    let app = TestApp::new().await;
    let mut payload = valid_payload(app.partner.id);
    payload["material_buy_price"] = price;

    let (status, body) = read_json(
        app.request_authenticated(Method::POST, "/api/v1/materials", Some(payload))
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_PRICE");
    assert_eq!(body["error"]["message"], "Material buy price must be positive");
}

#[rstest]
#[case("material_code")]
#[case("name")]
#[case("material_type")]
#[case("material_buy_price")]
#[case("partner_id")]
#[tokio::test]
async fn create_without_required_field_is_rejected(#[case] field: &str) {
    let app = TestApp::new().await;
    let mut payload = valid_payload(app.partner.id);
    payload
        .as_object_mut()
        .expect("payload is an object")
        .remove(field);

    let (status, body) = read_json(
        app.request_authenticated(Method::POST, "/api/v1/materials", Some(payload))
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "MISSING_REQUIRED_FIELDS");
    assert_eq!(
        body["error"]["message"],
        format!("Missing required fields: {}", field)
    );
}

#[tokio::test]
async fn create_lists_every_missing_field() {
    let app = TestApp::new().await;

    let (status, body) = read_json(
        app.request_authenticated(
            Method::POST,
            "/api/v1/materials",
            Some(json!({"name": "Denim"})),
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"]["message"],
        "Missing required fields: material_code, material_type, material_buy_price, partner_id"
    );
}

#[rstest]
#[case("silk")]
#[case("Fabric")]
#[case("JEANS")]
#[tokio::test]
async fn create_with_unknown_type_is_rejected(#[case] material_type: &str) {
    let app = TestApp::new().await;
    let mut payload = valid_payload(app.partner.id);
    payload["material_type"] = json!(material_type);

    let (status, body) = read_json(
        app.request_authenticated(Method::POST, "/api/v1/materials", Some(payload))
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_MATERIAL_TYPE");
    assert_eq!(
        body["error"]["message"],
        "Invalid material type. Allowed values: fabric, jeans, cotton"
    );
}

#[tokio::test]
async fn create_with_unknown_partner_is_rejected() {
    let app = TestApp::new().await;
    let payload = valid_payload(app.partner.id + 1000);

    let (status, body) = read_json(
        app.request_authenticated(Method::POST, "/api/v1/materials", Some(payload))
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "PARTNER_NOT_FOUND");
    assert_eq!(
        body["error"]["message"],
        format!("Partner with ID {} not found", app.partner.id + 1000)
    );
}

#[tokio::test]
async fn malformed_body_uses_failure_envelope() {
    let app = TestApp::new().await;

    let (status, body) = read_json(
        app.request_authenticated(Method::POST, "/api/v1/materials", Some(json!("not an object")))
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_REQUEST_BODY");
}

#[rstest]
#[case(json!(5))]
#[case(json!(["fabric"]))]
#[tokio::test]
async fn create_with_non_text_type_reports_invalid_type(#[case] material_type: Value) {
    let app = TestApp::new().await;
    let mut payload = valid_payload(app.partner.id);
    payload["material_type"] = material_type;

    let (status, body) = read_json(
        app.request_authenticated(Method::POST, "/api/v1/materials", Some(payload))
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_MATERIAL_TYPE");
}

#[tokio::test]
async fn missing_fields_win_over_mistyped_values() {
    let app = TestApp::new().await;

    let (status, body) = read_json(
        app.request_authenticated(
            Method::POST,
            "/api/v1/materials",
            Some(json!({"material_code": 123, "material_type": 5})),
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "MISSING_REQUIRED_FIELDS");
    assert_eq!(
        body["error"]["message"],
        "Missing required fields: name, material_buy_price, partner_id"
    );
}

#[tokio::test]
async fn create_with_non_text_code_is_rejected_after_type_and_price() {
    let app = TestApp::new().await;
    let mut payload = valid_payload(app.partner.id);
    payload["material_code"] = json!(123);

    let (status, body) = read_json(
        app.request_authenticated(Method::POST, "/api/v1/materials", Some(payload))
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_REQUEST_BODY");
    assert_eq!(
        body["error"]["message"],
        "Invalid request body: material_code must be a string, got 123"
    );
}

#[tokio::test]
async fn get_returns_detail_with_currency_partner_and_authors() {
    let app = TestApp::new().await;
    let id = app.create_material("DNM", "Denim Indigo", "jeans", 250.0).await;

    let (status, body) = read_json(
        app.request_authenticated(Method::GET, &format!("/api/v1/materials/{}", id), None)
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Material 'Denim Indigo' retrieved successfully");
    let data = &body["data"];
    assert_eq!(data["id"], json!(id));
    assert_eq!(data["material_type"], "jeans");
    assert_eq!(data["material_buy_price"], json!(250.0));
    assert_eq!(data["currency"]["name"], "USD");
    assert_eq!(data["currency"]["symbol"], "$");
    assert_eq!(data["partner"]["id"], json!(app.partner.id));
    assert_eq!(data["partner"]["email"], "julia@agrolait.example.com");
    assert_eq!(data["partner"]["phone"], "+32 10 588 558");
    assert_eq!(data["create_uid"], json!({"id": app.user_id, "name": "Test User"}));
    assert_eq!(data["write_uid"], json!({"id": app.user_id, "name": "Test User"}));
}

#[tokio::test]
async fn get_unknown_material_returns_not_found() {
    let app = TestApp::new().await;

    let (status, body) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials/4242", None)
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "MATERIAL_NOT_FOUND");
    assert_eq!(body["error"]["message"], "Material with ID 4242 not found");
}

#[tokio::test]
async fn non_numeric_id_is_rejected() {
    let app = TestApp::new().await;

    let (status, body) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials/abc", None)
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_ID");
}

#[tokio::test]
async fn list_returns_items_and_paging_meta() {
    let app = TestApp::new().await;
    let first = app.create_material("KS", "Kaos", "fabric", 100.0).await;
    let second = app.create_material("DNM", "Denim", "jeans", 250.0).await;
    let third = app.create_material("CTN", "Cotton 30s", "cotton", 150.0).await;

    let (status, body) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials?limit=2", None)
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Materials retrieved successfully");
    assert_eq!(
        body["meta"],
        json!({"total_count": 3, "offset": 0, "limit": 2, "has_more": true})
    );

    // Newest first by default
    let ids: Vec<i64> = body["data"]
        .as_array()
        .expect("data is a list")
        .iter()
        .map(|item| item["id"].as_i64().expect("id"))
        .collect();
    assert_eq!(ids, vec![third as i64, second as i64]);

    let item = &body["data"][0];
    assert_eq!(item["partner"], json!({"id": app.partner.id, "name": "Julia Agrolait"}));
    assert_eq!(item["currency"]["name"], "USD");
    assert!(item.get("create_uid").is_none());

    let (_, rest) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials?limit=2&offset=2", None)
            .await,
    )
    .await;
    assert_eq!(rest["data"][0]["id"], json!(first));
    assert_eq!(rest["meta"]["has_more"], json!(false));
}

#[tokio::test]
async fn list_filters_by_code_name_and_type() {
    let app = TestApp::new().await;
    app.create_material("KS-01", "Kaos Putih", "fabric", 120.0).await;
    app.create_material("KS-02", "Kaos Hitam", "fabric", 130.0).await;
    app.create_material("DNM-01", "Denim Hitam", "jeans", 250.0).await;

    let (_, by_code) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials?material_code=ks", None)
            .await,
    )
    .await;
    assert_eq!(by_code["meta"]["total_count"], json!(2));

    let (_, by_name) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials?name=HITAM", None)
            .await,
    )
    .await;
    assert_eq!(by_name["meta"]["total_count"], json!(2));

    let (_, by_type) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials?material_type=jeans", None)
            .await,
    )
    .await;
    assert_eq!(by_type["meta"]["total_count"], json!(1));
    assert_eq!(by_type["data"][0]["material_code"], "DNM-01");

    let (status, unknown_type) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials?material_type=silk", None)
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(unknown_type["data"], json!([]));
    assert_eq!(unknown_type["meta"]["total_count"], json!(0));
}

#[tokio::test]
async fn list_honours_order_clause() {
    let app = TestApp::new().await;
    app.create_material("B", "Beta", "fabric", 300.0).await;
    app.create_material("A", "Alpha", "fabric", 200.0).await;
    app.create_material("C", "Gamma", "fabric", 250.0).await;

    let (status, body) = read_json(
        app.request_authenticated(
            Method::GET,
            "/api/v1/materials?order=material_buy_price%20asc",
            None,
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let codes: Vec<&str> = body["data"]
        .as_array()
        .expect("data is a list")
        .iter()
        .map(|item| item["material_code"].as_str().expect("code"))
        .collect();
    assert_eq!(codes, vec!["A", "C", "B"]);
}

#[rstest]
#[case("password asc")]
#[case("name sideways")]
#[case("id desc nulls")]
#[tokio::test]
async fn list_rejects_invalid_order(#[case] order: &str) {
    let app = TestApp::new().await;
    let uri = format!("/api/v1/materials?order={}", order.replace(' ', "%20"));

    let (status, body) = read_json(app.request_authenticated(Method::GET, &uri, None).await).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_ORDER");
}

#[tokio::test]
async fn list_offset_without_limit_returns_the_rest() {
    let app = TestApp::new().await;
    let first = app.create_material("KS", "Kaos", "fabric", 100.0).await;
    app.create_material("DNM", "Denim", "jeans", 250.0).await;

    let (status, body) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials?offset=1", None)
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["meta"],
        json!({"total_count": 2, "offset": 1, "limit": 0, "has_more": false})
    );
    let data = body["data"].as_array().expect("data is a list");
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["id"], json!(first));
}

#[rstest]
#[case("limit=18446744073709551615")]
#[case("offset=9223372036854775808")]
#[tokio::test]
async fn list_rejects_paging_beyond_driver_range(#[case] query: &str) {
    let app = TestApp::new().await;
    app.create_material("KS", "Kaos", "fabric", 100.0).await;

    let (status, body) = read_json(
        app.request_authenticated(Method::GET, &format!("/api/v1/materials?{}", query), None)
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_QUERY");
}

#[tokio::test]
async fn list_rejects_negative_paging() {
    let app = TestApp::new().await;

    let (status, body) = read_json(
        app.request_authenticated(Method::GET, "/api/v1/materials?limit=-1", None)
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), "INVALID_QUERY");
}

#[tokio::test]
async fn renamed_material_is_visible_on_refetch() {
    let app = TestApp::new().await;
    let id = app.create_material("KS", "Kaos", "fabric", 150.0).await;

    let (status, body) = read_json(
        app.request_authenticated(
            Method::PUT,
            &format!("/api/v1/materials/{}", id),
            Some(json!({"name": "Kaos Premium"})),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Material 'Kaos Premium' updated successfully");
    assert_eq!(body["data"]["name"], "Kaos Premium");
    assert_eq!(body["data"]["partner"]["id"], json!(app.partner.id));
    assert_eq!(body["data"]["write_uid"]["id"], json!(app.user_id));

    let (_, refetched) = read_json(
        app.request_authenticated(Method::GET, &format!("/api/v1/materials/{}", id), None)
            .await,
    )
    .await;
    assert_eq!(refetched["data"]["name"], "Kaos Premium");
    assert_eq!(refetched["data"]["material_code"], "KS");
    assert_eq!(refetched["data"]["material_buy_price"], json!(150.0));
}

#[tokio::test]
async fn update_unknown_material_returns_not_found() {
    let app = TestApp::new().await;

    let (status, body) = read_json(
        app.request_authenticated(
            Method::PUT,
            "/api/v1/materials/999",
            Some(json!({"name": "Ghost"})),
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "MATERIAL_NOT_FOUND");
}

#[rstest]
#[case(json!({}), "NO_UPDATE_DATA")]
#[case(json!({"unrelated": true}), "NO_UPDATE_DATA")]
#[case(json!({"material_type": "wool"}), "INVALID_MATERIAL_TYPE")]
#[case(json!({"material_type": 5}), "INVALID_MATERIAL_TYPE")]
#[case(json!({"material_type": 5, "material_buy_price": 0}), "INVALID_MATERIAL_TYPE")]
#[case(json!({"material_buy_price": 0}), "INVALID_PRICE")]
#[case(json!({"material_buy_price": "cheap"}), "INVALID_PRICE")]
#[case(json!({"partner_id": "julia"}), "INVALID_REQUEST_BODY")]
#[case(json!({"material_buy_price": 99}), "VALIDATION_ERROR")]
#[case(json!({"partner_id": 987654}), "PARTNER_NOT_FOUND")]
#[case(json!({"name": "   "}), "VALIDATION_ERROR")]
#[tokio::test]
async fn update_rejections(#[case] payload: Value, #[case] expected_code: &str) {
    let app = TestApp::new().await;
    let id = app.create_material("KS", "Kaos", "fabric", 150.0).await;

    let (status, body) = read_json(
        app.request_authenticated(
            Method::PUT,
            &format!("/api/v1/materials/{}", id),
            Some(payload),
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&body), expected_code);

    let (_, unchanged) = read_json(
        app.request_authenticated(Method::GET, &format!("/api/v1/materials/{}", id), None)
            .await,
    )
    .await;
    assert_eq!(unchanged["data"]["name"], "Kaos");
    assert_eq!(unchanged["data"]["material_buy_price"], json!(150.0));
}

#[tokio::test]
async fn update_can_move_material_to_another_partner_and_type() {
    let app = TestApp::new().await;
    let id = app.create_material("KS", "Kaos", "fabric", 150.0).await;
    let other = material_register::services::partners::PartnerService::new(app.state.db.clone())
        .create(material_register::services::partners::NewPartner {
            name: "Deco Addict".to_string(),
            email: None,
            phone: None,
        })
        .await
        .expect("create second partner");

    let (status, body) = read_json(
        app.request_authenticated(
            Method::PUT,
            &format!("/api/v1/materials/{}", id),
            Some(json!({"partner_id": other.id, "material_type": "cotton", "material_buy_price": "175.5"})),
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["partner"], json!({"id": other.id, "name": "Deco Addict"}));
    assert_eq!(body["data"]["material_type"], "cotton");
    assert_eq!(body["data"]["material_buy_price"], json!(175.5));
}

#[tokio::test]
async fn deleted_material_no_longer_exists() {
    let app = TestApp::new().await;
    let id = app.create_material("KS", "Kaos", "fabric", 150.0).await;

    let (status, body) = read_json(
        app.request_authenticated(Method::DELETE, &format!("/api/v1/materials/{}", id), None)
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Material 'Kaos' deleted successfully");
    assert_eq!(
        body["data"],
        json!({"deleted": true, "material": {"id": id, "material_code": "KS", "name": "Kaos"}})
    );

    assert!(!app
        .state
        .services
        .materials
        .exists(id)
        .await
        .expect("existence check"));

    let (status, body) = read_json(
        app.request_authenticated(Method::GET, &format!("/api/v1/materials/{}", id), None)
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "MATERIAL_NOT_FOUND");

    let (status, body) = read_json(
        app.request_authenticated(Method::DELETE, &format!("/api/v1/materials/{}", id), None)
            .await,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_code(&body), "MATERIAL_NOT_FOUND");
}

#[tokio::test]
async fn infrastructure_routes_do_not_require_auth() {
    let app = TestApp::new().await;

    let health = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(health.status(), StatusCode::OK);

    let ready = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(ready.status(), StatusCode::OK);

    let metrics = app.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(metrics.status(), StatusCode::OK);

    let docs = app.request(Method::GET, "/api-docs/openapi.json", None, None).await;
    assert_eq!(docs.status(), StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::GET, "/api/v1/materials/777", None)
        .await;
    let header = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .expect("request id header");
    let (_, body) = read_json(response).await;

    assert_eq!(body["error"]["request_id"], json!(header));
}
