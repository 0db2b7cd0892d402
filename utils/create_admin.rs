use chrono::Utc;
use clap::Parser;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ColumnTrait, Database, EntityTrait, QueryFilter, Set};
use std::env;

use storefront_cms::entities::user::{self, Entity as User};
use storefront_cms::services::password::hash_password;
use storefront_cms::telemetry;

#[derive(Parser, Debug)]
#[command(name = "create_admin")]
#[command(about = "Apply migrations and create the initial admin account")]
struct Args {
    #[arg(long, default_value = "admin")]
    username: String,

    #[arg(long, default_value = "admin@example.com")]
    email: String,

    /// Prompted for interactively when omitted
    #[arg(long)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    telemetry::init_tracing();
    let args = Args::parse();

    let database_url = env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?;
    let db = Database::connect(database_url).await?;
    Migrator::up(&db, None).await?;

    let existing = User::find()
        .filter(user::Column::Username.eq(&args.username))
        .one(&db)
        .await?;
    if existing.is_some() {
        println!("User '{}' already exists", args.username);
        return Ok(());
    }

    let password = match args.password {
        Some(password) => password,
        None => {
            let password = rpassword::prompt_password("Password: ")?;
            let confirm = rpassword::prompt_password("Confirm password: ")?;
            if password != confirm {
                return Err("Passwords do not match".into());
            }
            password
        }
    };
    if password.is_empty() {
        return Err("Password must not be empty".into());
    }

    let hashed_password = hash_password(&password).map_err(|e| e.to_string())?;
    let admin = user::ActiveModel {
        username: Set(args.username.clone()),
        email: Set(args.email.clone()),
        hashed_password: Set(hashed_password),
        is_active: Set(true),
        created_at: Set(Utc::now().naive_utc()),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    println!("Created user '{}' ({}) with id {}", admin.username, admin.email, admin.id);
    Ok(())
}
