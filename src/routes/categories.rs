use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};

use super::home::MessageResponse;
use crate::entities::category;
use crate::error::AppError;
use crate::pagination::Pagination;
use crate::services::catalog::{self, CategoryChanges, NewCategory};

#[derive(Deserialize, utoipa::ToSchema)]
pub struct CreateCategoryRequest {
    name: String,
    description: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateCategoryRequest {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct CategoryResponse {
    id: i32,
    name: String,
    description: Option<String>,
    created_at: chrono::NaiveDateTime,
    updated_at: Option<chrono::NaiveDateTime>,
}

impl From<category::Model> for CategoryResponse {
    fn from(category: category::Model) -> Self {
        CategoryResponse {
            id: category.id,
            name: category.name,
            description: category.description,
            created_at: category.created_at,
            updated_at: category.updated_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/categories",
    params(Pagination),
    responses(
        (status = 200, description = "List of categories", body = [CategoryResponse])
    ),
    tag = "Catalog"
)]
pub async fn list_categories(
    State(db): State<DatabaseConnection>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<Vec<CategoryResponse>>, AppError> {
    let categories = catalog::list_categories(&db, &pagination).await?;
    Ok(Json(categories.into_iter().map(CategoryResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category details", body = CategoryResponse),
        (status = 404, description = "Category not found")
    ),
    tag = "Catalog"
)]
pub async fn get_category(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<Json<CategoryResponse>, AppError> {
    Ok(Json(catalog::get_category(&db, id).await?.into()))
}

#[utoipa::path(
    post,
    path = "/api/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 200, description = "Category created", body = CategoryResponse),
        (status = 400, description = "Category name already exists")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Catalog"
)]
pub async fn create_category(
    State(db): State<DatabaseConnection>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    let created = catalog::create_category(
        &db,
        NewCategory {
            name: payload.name,
            description: payload.description,
        },
    )
    .await?;
    Ok(Json(created.into()))
}

#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated", body = CategoryResponse),
        (status = 400, description = "Category name already exists"),
        (status = 404, description = "Category not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Catalog"
)]
pub async fn update_category(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> Result<Json<CategoryResponse>, AppError> {
    let updated = catalog::update_category(
        &db,
        id,
        CategoryChanges {
            name: payload.name,
            description: payload.description,
        },
    )
    .await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    params(
        ("id" = i32, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category deleted", body = MessageResponse),
        (status = 404, description = "Category not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Catalog"
)]
pub async fn delete_category(
    State(db): State<DatabaseConnection>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    catalog::delete_category(&db, id).await?;
    Ok(MessageResponse::new("Category deleted"))
}
