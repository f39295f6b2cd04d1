use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Material Register API",
        version = "1.0.0",
        description = r#"
# Material Register API

Register of the materials bought from suppliers: fabric, jeans and cotton.

## Authentication

Every `/api/v1` endpoint requires an `Authorization` header, either an API key
issued with `material-admin create-api-key`:

```
Authorization: Bearer <api-key>
```

or HTTP Basic credentials of an active user:

```
Authorization: Basic <base64(login:password)>
```

## Responses

Successful calls answer `{"success": true, "data": ..., "message": ..., "meta": ...}`.
Failures answer with a matching HTTP status and

```json
{
  "success": false,
  "error": {"message": "Material with ID 42 not found", "code": "MATERIAL_NOT_FOUND"}
}
```

## Listing

`GET /api/v1/materials` accepts `material_code` and `name` (case-insensitive
substring), `material_type`, `limit` (0 for all), `offset` and `order`
(for example `name asc, id desc`).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Materials", description = "Material register endpoints")
    ),
    paths(
        crate::handlers::materials::list_materials,
        crate::handlers::materials::get_material,
        crate::handlers::materials::create_material,
        crate::handlers::materials::update_material,
        crate::handlers::materials::delete_material,
    ),
    components(
        schemas(
            crate::handlers::common::ListMeta,
            crate::handlers::materials::CreateMaterialRequest,
            crate::handlers::materials::UpdateMaterialRequest,
            crate::handlers::materials::MaterialListItem,
            crate::handlers::materials::MaterialDetail,
            crate::handlers::materials::CreatedMaterial,
            crate::handlers::materials::UpdatedMaterial,
            crate::handlers::materials::DeletedMaterial,
            crate::entities::MaterialType,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

/// Registers the two accepted `Authorization` schemes
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .description(Some("Material register API key"))
                    .build(),
            ),
        );
        components.add_security_scheme(
            "Basic",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Basic).build()),
        );
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
