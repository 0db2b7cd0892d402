mod auth;
mod categories;
mod home;
mod images;
mod products;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    response::Json,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::middleware::auth::auth_middleware;
use crate::state::AppState;

/// Multipart framing overhead allowed on top of the configured file size.
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(
        home::root,
        home::health,
        auth::login,
        auth::register,
        auth::me,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        images::upload_image,
        images::serve_image,
        images::get_image_metadata,
        images::update_image_metadata,
        images::delete_image,
        images::list_images,
    ),
    components(
        schemas(
            home::RootResponse,
            home::HealthResponse,
            home::MessageResponse,
            home::ErrorResponse,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::RegisterRequest,
            auth::UserResponse,
            products::CreateProductRequest,
            products::UpdateProductRequest,
            products::ProductResponse,
            products::ProductImage,
            categories::CreateCategoryRequest,
            categories::UpdateCategoryRequest,
            categories::CategoryResponse,
            images::UploadResponse,
            images::ImageMetadata,
            images::ImageSummary,
            images::ImageListResponse,
            images::UpdateImageRequest,
            crate::entities::image::EntityType,
        )
    ),
    tags(
        (name = "General", description = "Service information"),
        (name = "Authentication", description = "Login, registration and the current user"),
        (name = "Catalog", description = "Products and categories"),
        (name = "Images", description = "Image upload, serving and metadata")
    ),
    info(
        title = "Storefront CMS API",
        version = "0.1.0",
        description = "Product catalog backend with JWT authentication and an image ingestion pipeline",
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            utoipa::openapi::security::SecurityScheme::Http(
                utoipa::openapi::security::Http::new(
                    utoipa::openapi::security::HttpAuthScheme::Bearer,
                ),
            ),
        );
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(allowed))
    }
}

pub fn create_routes(state: AppState, cors_origins: &[String]) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);
    let upload_limit = state.image_settings.max_file_size + MULTIPART_OVERHEAD;

    // Routes that require a bearer token
    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/products", post(products::create_product))
        .route(
            "/api/products/{id}",
            put(products::update_product).delete(products::delete_product),
        )
        .route("/api/categories", post(categories::create_category))
        .route(
            "/api/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route(
            "/api/images/upload/{entity_type}",
            post(images::upload_image).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/api/images/list/{entity_type}", get(images::list_images))
        // `{key}` is the image id here and the entity type on the serving route below;
        // both routes must use the same parameter name at this segment.
        .route(
            "/api/images/{key}",
            get(images::get_image_metadata)
                .put(images::update_image_metadata)
                .delete(images::delete_image),
        )
        .route_layer(auth_layer);

    let public_routes = Router::new()
        .route("/", get(home::root))
        .route("/health", get(home::health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/register", post(auth::register))
        .route("/api/products", get(products::list_products))
        .route("/api/products/{id}", get(products::get_product))
        .route("/api/categories", get(categories::list_categories))
        .route("/api/categories/{id}", get(categories::get_category))
        .route("/api/images/{key}/{filename}", get(images::serve_image));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}
