use std::sync::Arc;

use axum::extract::FromRef;
use sea_orm::DatabaseConnection;

use crate::models::settings::ImageSettings;
use crate::services::image_store::ImageStore;
use crate::services::rate_limit::LoginRateLimiter;
use crate::services::token::TokenService;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub tokens: TokenService,
    pub login_limiter: LoginRateLimiter,
    pub images: ImageStore,
    pub image_settings: Arc<ImageSettings>,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        jwt_secret: &str,
        images: ImageStore,
        image_settings: ImageSettings,
    ) -> Self {
        Self {
            db,
            tokens: TokenService::new(jwt_secret),
            login_limiter: LoginRateLimiter::default(),
            images,
            image_settings: Arc::new(image_settings),
        }
    }
}

impl FromRef<AppState> for DatabaseConnection {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}
