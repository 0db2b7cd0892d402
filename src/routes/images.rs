use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};

use super::home::MessageResponse;
use crate::entities::image::{self, EntityType, Entity as Image};
use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::services::catalog;
use crate::services::image_store::ImageStore;
use crate::state::AppState;
use crate::utils::image_processor::{process_image, OUTPUT_MIME_TYPE};
use crate::utils::image_validator::{check_size, validate_image_content};
use crate::utils::ImageError;

pub const CACHE_CONTROL: &str = "public, max-age=31536000";
const DEFAULT_LIST_LIMIT: u64 = 50;
const IMAGE_NOT_FOUND: &str = "Image not found";

#[derive(Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    success: bool,
    id: i32,
    filename: String,
    url: String,
    thumbnail_url: String,
    width: i32,
    height: i32,
    size: i64,
    mime_type: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ImageMetadata {
    id: i32,
    filename: String,
    original_filename: String,
    url: String,
    thumbnail_url: String,
    width: i32,
    height: i32,
    size: i64,
    mime_type: String,
    entity_type: EntityType,
    entity_id: Option<i32>,
    alt_text: Option<String>,
    is_active: bool,
    uploaded_by: i32,
    created_at: chrono::NaiveDateTime,
    updated_at: Option<chrono::NaiveDateTime>,
}

impl From<image::Model> for ImageMetadata {
    fn from(image: image::Model) -> Self {
        ImageMetadata {
            url: image.url(),
            thumbnail_url: image.thumbnail_url(),
            id: image.id,
            filename: image.filename,
            original_filename: image.original_filename,
            width: image.width,
            height: image.height,
            size: image.file_size,
            mime_type: image.mime_type,
            entity_type: image.entity_type,
            entity_id: image.entity_id,
            alt_text: image.alt_text,
            is_active: image.is_active,
            uploaded_by: image.uploaded_by,
            created_at: image.created_at,
            updated_at: image.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ImageSummary {
    id: i32,
    filename: String,
    url: String,
    thumbnail_url: String,
    width: i32,
    height: i32,
    size: i64,
    alt_text: Option<String>,
    created_at: chrono::NaiveDateTime,
}

impl From<image::Model> for ImageSummary {
    fn from(image: image::Model) -> Self {
        ImageSummary {
            url: image.url(),
            thumbnail_url: image.thumbnail_url(),
            id: image.id,
            filename: image.filename,
            width: image.width,
            height: image.height,
            size: image.file_size,
            alt_text: image.alt_text,
            created_at: image.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ImageListResponse {
    total: u64,
    images: Vec<ImageSummary>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateImageRequest {
    alt_text: Option<String>,
    entity_id: Option<i32>,
    is_active: Option<bool>,
}

#[derive(Deserialize, utoipa::IntoParams)]
pub struct ListImagesQuery {
    /// Only images attached to this record.
    entity_id: Option<i32>,
    #[param(default = 0, minimum = 0)]
    skip: Option<u64>,
    #[param(default = 50, minimum = 1, maximum = 1000)]
    limit: Option<u64>,
}

fn parse_entity_type(value: &str) -> Result<EntityType, AppError> {
    EntityType::parse(value).ok_or_else(|| {
        let allowed: Vec<&str> = EntityType::ALL.iter().map(EntityType::as_str).collect();
        AppError::BadRequest(format!(
            "Invalid entity type. Allowed: {}",
            allowed.join(", ")
        ))
    })
}

fn image_not_found() -> AppError {
    AppError::NotFound(IMAGE_NOT_FOUND.to_string())
}

fn multipart_error(err: MultipartError, max_file_size: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::from(ImageError::TooLarge {
            max_mb: max_file_size / (1024 * 1024),
        })
    } else {
        AppError::BadRequest(format!("Invalid multipart data: {}", err.body_text()))
    }
}

struct UploadForm {
    filename: String,
    data: Bytes,
    alt_text: Option<String>,
    entity_id: Option<i32>,
}

async fn read_upload_form(
    mut multipart: Multipart,
    max_file_size: usize,
) -> Result<UploadForm, AppError> {
    let mut file = None;
    let mut alt_text = None;
    let mut entity_id = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        match field.name() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error(e, max_file_size))?;
                file = Some((filename, data));
            }
            Some("alt_text") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_file_size))?;
                alt_text = Some(text).filter(|t| !t.is_empty());
            }
            Some("entity_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_file_size))?;
                let text = text.trim();
                if !text.is_empty() {
                    entity_id = Some(text.parse::<i32>().map_err(|_| {
                        AppError::BadRequest("entity_id must be an integer".to_string())
                    })?);
                }
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::BadRequest("No file field found".to_string()))?;
    Ok(UploadForm {
        filename,
        data,
        alt_text,
        entity_id,
    })
}

#[utoipa::path(
    post,
    path = "/api/images/upload/{entity_type}",
    params(
        ("entity_type" = EntityType, Path, description = "Owning record type")
    ),
    request_body(content = Vec<u8>, content_type = "multipart/form-data",
        description = "Fields: file (required), alt_text, entity_id"),
    responses(
        (status = 200, description = "Image stored", body = UploadResponse),
        (status = 400, description = "Invalid entity type or image", body = super::home::ErrorResponse),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Image processing failed", body = super::home::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Images"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(entity_type): Path<String>,
    multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let entity_type = parse_entity_type(&entity_type)?;
    let settings = state.image_settings.clone();

    let form = read_upload_form(multipart, settings.max_file_size).await?;
    check_size(form.data.len(), settings.max_file_size)?;
    let mime_type = validate_image_content(&form.data, &form.filename)?;

    if let Some(entity_id) = form.entity_id {
        catalog::ensure_entity_exists(&state.db, entity_type, entity_id).await?;
    }

    let filename = ImageStore::generate_filename(&form.data, &form.filename);

    let data = form.data.clone();
    let processed = tokio::task::spawn_blocking(move || process_image(&data, mime_type, &settings))
        .await
        .map_err(|e| AppError::InternalServerError(format!("Image processing failed: {}", e)))??;

    let stored = state.images.save(entity_type, &filename, &processed).await?;

    let now = Utc::now().naive_utc();
    let record = image::ActiveModel {
        filename: Set(filename.clone()),
        original_filename: Set(form.filename),
        file_path: Set(stored.main_path.to_string_lossy().into_owned()),
        thumbnail_path: Set(stored.thumbnail_path.to_string_lossy().into_owned()),
        file_size: Set(stored.main_size as i64),
        mime_type: Set(OUTPUT_MIME_TYPE.to_string()),
        width: Set(processed.width as i32),
        height: Set(processed.height as i32),
        entity_type: Set(entity_type),
        entity_id: Set(form.entity_id),
        alt_text: Set(form.alt_text),
        is_active: Set(true),
        uploaded_by: Set(auth_user.id),
        created_at: Set(now),
        ..Default::default()
    };

    let saved = match record.insert(&state.db).await {
        Ok(saved) => saved,
        Err(e) => {
            tracing::error!(filename = %filename, error = %e, "Image record insert failed, removing files");
            state.images.discard(&stored).await;
            return Err(AppError::InternalServerError(format!(
                "Image processing failed: {}",
                e
            )));
        }
    };

    tracing::info!(
        image_id = saved.id,
        filename = %saved.filename,
        entity_type = %entity_type,
        user_id = auth_user.id,
        "Image uploaded"
    );

    Ok(Json(UploadResponse {
        success: true,
        url: saved.url(),
        thumbnail_url: saved.thumbnail_url(),
        id: saved.id,
        filename: saved.filename,
        width: saved.width,
        height: saved.height,
        size: saved.file_size,
        mime_type: saved.mime_type,
    }))
}

// Shares the `{key}` segment with the metadata routes; here it carries the entity type.
#[utoipa::path(
    get,
    path = "/api/images/{entity_type}/{filename}",
    params(
        ("entity_type" = String, Path, description = "Owning record type"),
        ("filename" = String, Path, description = "Stored filename, optionally prefixed with thumb_")
    ),
    responses(
        (status = 200, description = "Image bytes", content_type = "image/jpeg"),
        (status = 304, description = "Not modified"),
        (status = 404, description = "Image not found", body = super::home::ErrorResponse)
    ),
    tag = "Images"
)]
pub async fn serve_image(
    State(state): State<AppState>,
    Path((entity_type, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let served = state
        .images
        .resolve(&entity_type, &filename)
        .await
        .ok_or_else(image_not_found)?;

    let etag = HeaderValue::from_str(&served.etag)
        .map_err(|e| AppError::InternalServerError(format!("Invalid ETag: {}", e)))?;
    let cache_headers = [
        (header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL)),
        (header::ETAG, etag),
    ];

    let not_modified = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|candidates| {
            candidates
                .split(',')
                .any(|c| c.trim() == served.etag || c.trim() == "*")
        });
    if not_modified {
        return Ok((StatusCode::NOT_MODIFIED, cache_headers).into_response());
    }

    let bytes = match tokio::fs::read(&served.path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(image_not_found()),
        Err(e) => {
            return Err(AppError::InternalServerError(format!(
                "Failed to read image: {}",
                e
            )))
        }
    };

    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static(OUTPUT_MIME_TYPE))],
        cache_headers,
        Body::from(bytes),
    )
        .into_response())
}

async fn find_image(state: &AppState, image_id: i32) -> Result<image::Model, AppError> {
    Image::find_by_id(image_id)
        .one(&state.db)
        .await?
        .ok_or_else(image_not_found)
}

#[utoipa::path(
    get,
    path = "/api/images/{image_id}",
    params(
        ("image_id" = i32, Path, description = "Image ID")
    ),
    responses(
        (status = 200, description = "Image metadata", body = ImageMetadata),
        (status = 404, description = "Image not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Images"
)]
pub async fn get_image_metadata(
    State(state): State<AppState>,
    Path(image_id): Path<i32>,
) -> Result<Json<ImageMetadata>, AppError> {
    Ok(Json(find_image(&state, image_id).await?.into()))
}

#[utoipa::path(
    put,
    path = "/api/images/{image_id}",
    params(
        ("image_id" = i32, Path, description = "Image ID")
    ),
    request_body = UpdateImageRequest,
    responses(
        (status = 200, description = "Image updated", body = MessageResponse),
        (status = 400, description = "Referenced record does not exist"),
        (status = 404, description = "Image not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Images"
)]
pub async fn update_image_metadata(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(image_id): Path<i32>,
    Json(payload): Json<UpdateImageRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let image = find_image(&state, image_id).await?;

    if let Some(entity_id) = payload.entity_id {
        catalog::ensure_entity_exists(&state.db, image.entity_type, entity_id).await?;
    }

    let mut image = image.into_active_model();
    if let Some(alt_text) = payload.alt_text {
        image.alt_text = Set(Some(alt_text));
    }
    if let Some(entity_id) = payload.entity_id {
        image.entity_id = Set(Some(entity_id));
    }
    if let Some(is_active) = payload.is_active {
        image.is_active = Set(is_active);
    }
    image.updated_at = Set(Some(Utc::now().naive_utc()));
    image.update(&state.db).await?;

    tracing::info!(image_id, user_id = auth_user.id, "Image metadata updated");
    Ok(MessageResponse::new("Image updated successfully"))
}

#[utoipa::path(
    delete,
    path = "/api/images/{image_id}",
    params(
        ("image_id" = i32, Path, description = "Image ID")
    ),
    responses(
        (status = 200, description = "Image deleted", body = MessageResponse),
        (status = 404, description = "Image not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Images"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(image_id): Path<i32>,
) -> Result<Json<MessageResponse>, AppError> {
    let image = find_image(&state, image_id).await?;

    let result = Image::delete_by_id(image.id).exec(&state.db).await?;
    if result.rows_affected == 0 {
        return Err(image_not_found());
    }

    state
        .images
        .schedule_removal(vec![image.file_path.into(), image.thumbnail_path.into()]);

    tracing::info!(image_id, filename = %image.filename, user_id = auth_user.id, "Image deleted");
    Ok(MessageResponse::new("Image deleted successfully"))
}

#[utoipa::path(
    get,
    path = "/api/images/list/{entity_type}",
    params(
        ("entity_type" = EntityType, Path, description = "Owning record type"),
        ListImagesQuery
    ),
    responses(
        (status = 200, description = "Active images, paginated", body = ImageListResponse),
        (status = 400, description = "Invalid entity type")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Images"
)]
pub async fn list_images(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
    Query(query): Query<ListImagesQuery>,
) -> Result<Json<ImageListResponse>, AppError> {
    let entity_type = parse_entity_type(&entity_type)?;

    let mut select = Image::find()
        .filter(image::Column::EntityType.eq(entity_type))
        .filter(image::Column::IsActive.eq(true));
    if let Some(entity_id) = query.entity_id {
        select = select.filter(image::Column::EntityId.eq(entity_id));
    }

    let total = select.clone().count(&state.db).await?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, crate::pagination::MAX_PAGE_SIZE);
    let images = select
        .order_by_asc(image::Column::Id)
        .offset(query.skip.unwrap_or(0))
        .limit(limit)
        .all(&state.db)
        .await?;

    Ok(Json(ImageListResponse {
        total,
        images: images.into_iter().map(ImageSummary::from).collect(),
    }))
}
