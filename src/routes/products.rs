use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use super::home::MessageResponse;
use crate::entities::image;
use crate::error::AppError;
use crate::pagination::Pagination;
use crate::services::catalog::{self, NewProduct, ProductChanges, ProductWithImages};

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateProductRequest {
    name: String,
    description: Option<String>,
    price: f64,
    category: Option<String>,
    image_url: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateProductRequest {
    name: Option<String>,
    description: Option<String>,
    price: Option<f64>,
    category: Option<String>,
    image_url: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProductImage {
    id: i32,
    url: String,
    thumbnail_url: String,
    alt_text: Option<String>,
}

impl From<image::Model> for ProductImage {
    fn from(image: image::Model) -> Self {
        ProductImage {
            id: image.id,
            url: image.url(),
            thumbnail_url: image.thumbnail_url(),
            alt_text: image.alt_text,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProductResponse {
    id: i32,
    name: String,
    description: Option<String>,
    price: f64,
    category: Option<String>,
    image_url: Option<String>,
    images: Vec<ProductImage>,
    created_at: chrono::NaiveDateTime,
    updated_at: Option<chrono::NaiveDateTime>,
}

impl From<ProductWithImages> for ProductResponse {
    fn from(ProductWithImages { product, images }: ProductWithImages) -> Self {
        ProductResponse {
            id: product.id,
            name: product.name,
            description: product.description,
            price: product.price,
            category: product.category,
            image_url: product.image_url,
            images: images.into_iter().map(ProductImage::from).collect(),
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/products",
    params(Pagination),
    responses(
        (status = 200, description = "Products with their active images", body = [ProductResponse])
    ),
    tag = "Catalog"
)]
pub async fn list_products(
    State(db): State<DatabaseConnection>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<ProductResponse>>, AppError> {
    let products = catalog::list_products(&db, &pagination).await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/products/{id}",
    params(
        ("id" = i32, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product details", body = ProductResponse),
        (status = 404, description = "Product not found")
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<Json<ProductResponse>, AppError> {
    Ok(Json(catalog::get_product(&db, id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/api/products",
    request_body = CreateProductRequest,
    responses(
        (status = 200, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid product")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Catalog"
)]
pub async fn create_product(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    let created = catalog::create_product(
        &db,
        NewProduct {
            name: payload.name,
            description: payload.description,
            price: payload.price,
            category: payload.category,
            image_url: payload.image_url,
        },
    )
    .await?;
    Ok(Json(created.into()))
}

#[utoipa::path(
    put,
    path = "/api/products/{id}",
    params(
        ("id" = i32, Path, description = "Product ID")
    ),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ProductResponse),
        (status = 400, description = "Invalid product"),
        (status = 404, description = "Product not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Catalog"
)]
pub async fn update_product(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<Json<ProductResponse>, AppError> {
    let updated = catalog::update_product(
        &db,
        id,
        ProductChanges {
            name: payload.name,
            description: payload.description,
            price: payload.price,
            category: payload.category,
            image_url: payload.image_url,
        },
    )
    .await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    params(
        ("id" = i32, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product deleted", body = MessageResponse),
        (status = 404, description = "Product not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Catalog"
)]
pub async fn delete_product(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    catalog::delete_product(&db, id).await?;
    Ok(MessageResponse::new("Product deleted"))
}
