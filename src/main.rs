use migration::{Migrator, MigratorTrait};
use sea_orm::Database;

use storefront_cms::config::Config;
use storefront_cms::routes::create_routes;
use storefront_cms::services::cleanup::CleanupService;
use storefront_cms::services::image_store::ImageStore;
use storefront_cms::state::AppState;
use storefront_cms::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();

    let config = Config::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    Migrator::up(&db, None).await?;
    tracing::info!("Database migrations applied");

    let images = ImageStore::new(&config.upload_dir);
    images.ensure_directories().await?;
    tracing::info!(upload_dir = %config.upload_dir.display(), "Upload directories ready");

    let state = AppState::new(db, &config.jwt_secret, images, config.images.clone());
    tokio::spawn(CleanupService::new(state.login_limiter.clone()).run_scheduler());

    let app = create_routes(state, &config.cors_origins);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
