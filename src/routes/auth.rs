use axum::{
    extract::State,
    response::Json,
    Extension,
};
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};

use crate::entities::user::{self, Entity as User};
use crate::error::{is_unique_violation, AppError};
use crate::middleware::auth::{AuthUser, CREDENTIALS_ERROR};
use crate::services::password::{hash_password, verify_password};
use crate::services::token::LOGIN_TTL_MINUTES;
use crate::state::AppState;

const LOGIN_FAILED: &str = "Incorrect username or password";
const TOO_MANY_ATTEMPTS: &str = "Too many login attempts. Please try again later.";

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct LoginResponse {
    access_token: String,
    token_type: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    username: String,
    email: String,
    password: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserResponse {
    id: i32,
    username: String,
    email: String,
    is_active: bool,
    created_at: chrono::NaiveDateTime,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        UserResponse {
            id: user.id,
            username: user.username,
            email: user.email,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = super::home::ErrorResponse),
        (status = 429, description = "Too many failed attempts", body = super::home::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let LoginRequest { username, password } = payload;

    // Counts this attempt up front; a successful login clears the history below.
    if !state.login_limiter.try_acquire(&username).await {
        tracing::warn!(username = %username, "Login rate limit exceeded");
        return Err(AppError::TooManyRequests(TOO_MANY_ATTEMPTS.to_string()));
    }

    let user = User::find()
        .filter(user::Column::Username.eq(&username))
        .one(&state.db)
        .await?;

    let user = match user {
        Some(user) if !user.is_active => {
            tracing::info!(username = %username, "Login rejected: account inactive");
            None
        }
        Some(user) => {
            let hash = user.hashed_password.clone();
            let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
                .await
                .map_err(|e| {
                    AppError::InternalServerError(format!("Password verification failed: {}", e))
                })?;
            if verified {
                Some(user)
            } else {
                tracing::info!(username = %username, "Login rejected: wrong password");
                None
            }
        }
        None => {
            tracing::info!(username = %username, "Login rejected: unknown user");
            None
        }
    };

    let Some(user) = user else {
        return Err(AppError::Unauthorized(LOGIN_FAILED.to_string()));
    };

    state.login_limiter.reset(&username).await;

    let access_token = state
        .tokens
        .issue_token(&user.username, Some(Duration::minutes(LOGIN_TTL_MINUTES)))
        .map_err(|e| AppError::InternalServerError(format!("Token encode error: {}", e)))?;

    tracing::info!(user_id = user.id, "Login successful");
    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "User registered", body = UserResponse),
        (status = 400, description = "Invalid input or duplicate username/email", body = super::home::ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<UserResponse>, AppError> {
    let username = payload.username.trim();
    let email = payload.email.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("Username must not be empty".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::BadRequest("Invalid email address".to_string()));
    }
    if payload.password.is_empty() {
        return Err(AppError::BadRequest("Password must not be empty".to_string()));
    }

    let hashed_password = hash_password(&payload.password)
        .map_err(|e| AppError::InternalServerError(format!("Password hashing failed: {}", e)))?;

    let user = user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(email.to_string()),
        hashed_password: Set(hashed_password),
        is_active: Set(true),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    };

    let created = user.insert(&state.db).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::BadRequest("Username or email already registered".to_string())
        } else {
            AppError::DatabaseError(e)
        }
    })?;

    tracing::info!(user_id = created.id, username = %created.username, "User registered");
    Ok(Json(UserResponse::from(created)))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current user profile", body = UserResponse),
        (status = 401, description = "Missing or invalid token", body = super::home::ErrorResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Authentication"
)]
pub async fn me(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<UserResponse>, AppError> {
    let user = User::find_by_id(auth_user.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized(CREDENTIALS_ERROR.to_string()))?;

    Ok(Json(UserResponse::from(user)))
}
