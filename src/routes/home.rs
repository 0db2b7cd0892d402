use axum::response::Json;
use serde::Serialize;

#[derive(Serialize, utoipa::ToSchema)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub docs: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service banner", body = RootResponse)
    ),
    tag = "General"
)]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Storefront CMS API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "/api-docs/openapi.json".to_string(),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    ),
    tag = "General"
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}
