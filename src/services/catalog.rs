use std::collections::HashMap;

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

use crate::entities::category::{self, Entity as Category};
use crate::entities::image::{self, EntityType, Entity as Image};
use crate::entities::product::{self, Entity as Product};
use crate::error::{is_unique_violation, AppError};
use crate::pagination::Pagination;

pub const DEFAULT_PAGE_SIZE: u64 = 100;

const DUPLICATE_CATEGORY: &str = "Category name already exists";

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

/// A product together with its active images.
#[derive(Debug, Clone)]
pub struct ProductWithImages {
    pub product: product::Model,
    pub images: Vec<image::Model>,
}

fn require_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name must not be empty".to_string()));
    }
    Ok(name.to_string())
}

fn require_price(price: f64) -> Result<f64, AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::BadRequest(
            "Price must be a non-negative number".to_string(),
        ));
    }
    Ok(price)
}

fn map_duplicate(err: sea_orm::DbErr, message: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::BadRequest(message.to_string())
    } else {
        AppError::DatabaseError(err)
    }
}

// Categories

pub async fn list_categories(
    db: &DatabaseConnection,
    pagination: &Pagination,
) -> Result<Vec<category::Model>, AppError> {
    Ok(Category::find()
        .order_by_asc(category::Column::Id)
        .offset(pagination.offset())
        .limit(pagination.limit(DEFAULT_PAGE_SIZE))
        .all(db)
        .await?)
}

pub async fn get_category(db: &DatabaseConnection, id: i32) -> Result<category::Model, AppError> {
    Category::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
}

/// Inserts a category; the unique index on `name` decides conflicts.
pub async fn create_category(
    db: &DatabaseConnection,
    input: NewCategory,
) -> Result<category::Model, AppError> {
    let category = category::ActiveModel {
        name: Set(require_name(&input.name)?),
        description: Set(input.description),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    let created = category
        .insert(db)
        .await
        .map_err(|e| map_duplicate(e, DUPLICATE_CATEGORY))?;
    tracing::info!(category_id = created.id, name = %created.name, "Category created");
    Ok(created)
}

pub async fn update_category(
    db: &DatabaseConnection,
    id: i32,
    changes: CategoryChanges,
) -> Result<category::Model, AppError> {
    let mut category = get_category(db, id).await?.into_active_model();

    if let Some(name) = changes.name {
        category.name = Set(require_name(&name)?);
    }
    if let Some(description) = changes.description {
        category.description = Set(Some(description));
    }
    category.updated_at = Set(Some(Utc::now().naive_utc()));

    category
        .update(db)
        .await
        .map_err(|e| map_duplicate(e, DUPLICATE_CATEGORY))
}

/// Deletes a category and deactivates the images attached to it.
pub async fn delete_category(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    let txn = db.begin().await?;

    let result = Category::delete_by_id(id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Category not found".to_string()));
    }
    let detached = deactivate_images(&txn, EntityType::Categories, id).await?;

    txn.commit().await?;
    tracing::info!(category_id = id, detached, "Category deleted");
    Ok(())
}

// Products

pub async fn list_products(
    db: &DatabaseConnection,
    pagination: &Pagination,
) -> Result<Vec<ProductWithImages>, AppError> {
    let products = Product::find()
        .order_by_asc(product::Column::Id)
        .offset(pagination.offset())
        .limit(pagination.limit(DEFAULT_PAGE_SIZE))
        .all(db)
        .await?;

    let ids: Vec<i32> = products.iter().map(|p| p.id).collect();
    let mut images = active_images_by_entity(db, EntityType::Products, &ids).await?;

    Ok(products
        .into_iter()
        .map(|product| ProductWithImages {
            images: images.remove(&product.id).unwrap_or_default(),
            product,
        })
        .collect())
}

pub async fn get_product(db: &DatabaseConnection, id: i32) -> Result<ProductWithImages, AppError> {
    let product = find_product(db, id).await?;
    let images = active_images_by_entity(db, EntityType::Products, &[id])
        .await?
        .remove(&id)
        .unwrap_or_default();
    Ok(ProductWithImages { product, images })
}

pub async fn create_product(
    db: &DatabaseConnection,
    input: NewProduct,
) -> Result<ProductWithImages, AppError> {
    let product = product::ActiveModel {
        name: Set(require_name(&input.name)?),
        description: Set(input.description),
        price: Set(require_price(input.price)?),
        category: Set(input.category),
        image_url: Set(input.image_url),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    let created = product.insert(db).await?;
    tracing::info!(product_id = created.id, name = %created.name, "Product created");
    Ok(ProductWithImages {
        product: created,
        images: Vec::new(),
    })
}

pub async fn update_product(
    db: &DatabaseConnection,
    id: i32,
    changes: ProductChanges,
) -> Result<ProductWithImages, AppError> {
    let mut product = find_product(db, id).await?.into_active_model();

    if let Some(name) = changes.name {
        product.name = Set(require_name(&name)?);
    }
    if let Some(description) = changes.description {
        product.description = Set(Some(description));
    }
    if let Some(price) = changes.price {
        product.price = Set(require_price(price)?);
    }
    if let Some(category) = changes.category {
        product.category = Set(Some(category));
    }
    if let Some(image_url) = changes.image_url {
        product.image_url = Set(Some(image_url));
    }
    product.updated_at = Set(Some(Utc::now().naive_utc()));

    product.update(db).await?;
    get_product(db, id).await
}

/// Deletes a product and deactivates the images attached to it.
pub async fn delete_product(db: &DatabaseConnection, id: i32) -> Result<(), AppError> {
    let txn = db.begin().await?;

    let result = Product::delete_by_id(id).exec(&txn).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Product not found".to_string()));
    }
    let detached = deactivate_images(&txn, EntityType::Products, id).await?;

    txn.commit().await?;
    tracing::info!(product_id = id, detached, "Product deleted");
    Ok(())
}

async fn find_product(db: &DatabaseConnection, id: i32) -> Result<product::Model, AppError> {
    Product::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

// Image references

/// Active images for the given owners, grouped by `entity_id`, oldest first.
pub async fn active_images_by_entity(
    db: &DatabaseConnection,
    entity_type: EntityType,
    ids: &[i32],
) -> Result<HashMap<i32, Vec<image::Model>>, AppError> {
    let mut grouped: HashMap<i32, Vec<image::Model>> = HashMap::new();
    if ids.is_empty() {
        return Ok(grouped);
    }

    let images = Image::find()
        .filter(image::Column::EntityType.eq(entity_type))
        .filter(image::Column::EntityId.is_in(ids.iter().copied()))
        .filter(image::Column::IsActive.eq(true))
        .order_by_asc(image::Column::Id)
        .all(db)
        .await?;

    for image in images {
        if let Some(entity_id) = image.entity_id {
            grouped.entry(entity_id).or_default().push(image);
        }
    }
    Ok(grouped)
}

/// Checks that an image's `entity_id` points at an existing row. Banners have no table
/// and are accepted as-is.
pub async fn ensure_entity_exists(
    db: &DatabaseConnection,
    entity_type: EntityType,
    entity_id: i32,
) -> Result<(), AppError> {
    let exists = match entity_type {
        EntityType::Products => Product::find_by_id(entity_id).count(db).await? > 0,
        EntityType::Categories => Category::find_by_id(entity_id).count(db).await? > 0,
        EntityType::Banners => true,
    };

    if exists {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "Referenced {} entry {} does not exist",
            entity_type, entity_id
        )))
    }
}

async fn deactivate_images<C: ConnectionTrait>(
    conn: &C,
    entity_type: EntityType,
    entity_id: i32,
) -> Result<u64, sea_orm::DbErr> {
    let result = Image::update_many()
        .col_expr(image::Column::IsActive, Expr::value(false))
        .col_expr(
            image::Column::UpdatedAt,
            Expr::value(Utc::now().naive_utc()),
        )
        .filter(image::Column::EntityType.eq(entity_type))
        .filter(image::Column::EntityId.eq(entity_id))
        .filter(image::Column::IsActive.eq(true))
        .exec(conn)
        .await?;
    Ok(result.rows_affected)
}
