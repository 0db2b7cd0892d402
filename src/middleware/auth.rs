use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

use crate::entities::user::{self, Entity as User};
use crate::error::AppError;
use crate::state::AppState;

pub const CREDENTIALS_ERROR: &str = "Could not validate credentials";

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i32,
    pub username: String,
}

fn bearer_token(req: &Request) -> Option<&str> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let unauthorized = || AppError::Unauthorized(CREDENTIALS_ERROR.to_string());

    let token = bearer_token(&req).ok_or_else(unauthorized)?;
    let username = state.tokens.verify_token(token).ok_or_else(unauthorized)?;

    let user = User::find()
        .filter(user::Column::Username.eq(&username))
        .one(&state.db)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| {
            tracing::debug!(username = %username, "Token subject is missing or inactive");
            unauthorized()
        })?;

    req.extensions_mut().insert(AuthUser {
        id: user.id,
        username: user.username,
    });

    Ok(next.run(req).await)
}
