use std::env;
use std::path::PathBuf;

use base64::{engine::general_purpose, Engine as _};
use rand::RngCore;

use crate::models::settings::ImageSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be between 1 and {max}, got {value}")]
    OutOfRange {
        name: &'static str,
        value: u32,
        max: u32,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub upload_dir: PathBuf,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
    pub images: ImageSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                tracing::warn!("JWT_SECRET not set, generating an ephemeral secret; tokens will not survive a restart");
                generate_secret()
            }
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
        let upload_dir = env::var("UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("uploads"));
        let cors_origins = parse_origins(&env::var("CORS_ORIGINS").unwrap_or_default());

        let mut images = ImageSettings::default();
        if let Some(width) = read_dimension("MAX_IMAGE_WIDTH")? {
            images.max_width = width;
        }
        if let Some(height) = read_dimension("MAX_IMAGE_HEIGHT")? {
            images.max_height = height;
        }

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            upload_dir,
            cors_origins,
            images,
        })
    }
}

/// Largest accepted image bound; the raw-upload limit is twice this.
const MAX_DIMENSION: u32 = u32::MAX / 2;

fn read_dimension(name: &'static str) -> Result<Option<u32>, ConfigError> {
    match env::var(name) {
        Ok(value) => parse_dimension(name, value).map(Some),
        Err(_) => Ok(None),
    }
}

fn parse_dimension(name: &'static str, value: String) -> Result<u32, ConfigError> {
    let parsed: u32 = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidNumber { name, value })?;
    if parsed == 0 || parsed > MAX_DIMENSION {
        return Err(ConfigError::OutOfRange {
            name,
            value: parsed,
            max: MAX_DIMENSION,
        });
    }
    Ok(parsed)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "*")
        .map(str::to_string)
        .collect()
}

pub fn generate_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
