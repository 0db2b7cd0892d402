#![allow(dead_code)]

use std::io::Cursor;

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use chrono::Utc;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, RgbImage};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, Set};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use storefront_cms::entities::user;
use storefront_cms::models::settings::ImageSettings;
use storefront_cms::routes::create_routes;
use storefront_cms::services::image_store::ImageStore;
use storefront_cms::services::password::hash_password;
use storefront_cms::state::AppState;

pub const BOUNDARY: &str = "storefront-test-boundary";
pub const PASSWORD: &str = "correct horse battery staple";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub upload_dir: TempDir,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn error(&self) -> String {
        self.json()["error"].as_str().unwrap().to_string()
    }
}

pub async fn spawn_app() -> TestApp {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await.unwrap();
    Migrator::up(&db, None).await.unwrap();

    let upload_dir = tempfile::tempdir().unwrap();
    let images = ImageStore::new(upload_dir.path());
    images.ensure_directories().await.unwrap();

    let state = AppState::new(db, "test-secret", images, ImageSettings::default());
    let router = create_routes(state.clone(), &[]);

    TestApp {
        router,
        state,
        upload_dir,
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn create_user(&self, username: &str) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{}@example.com", username)),
            hashed_password: Set(hash_password(PASSWORD).unwrap()),
            is_active: Set(true),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        }
        .insert(&self.state.db)
        .await
        .unwrap()
    }

    pub fn token_for(&self, username: &str) -> String {
        self.state.tokens.issue_token(username, None).unwrap()
    }

    /// A fresh user and a bearer token for it.
    pub async fn login_as(&self, username: &str) -> String {
        self.create_user(username).await;
        self.token_for(username)
    }

    pub fn files_in(&self, entity_type: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.upload_dir.path().join(entity_type))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("DELETE").uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// One multipart part: field name, optional filename, content.
pub struct Part<'a> {
    pub name: &'a str,
    pub filename: Option<&'a str>,
    pub data: &'a [u8],
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part.filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                    part.name, filename
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", part.name).as_bytes(),
            ),
        }
        body.extend_from_slice(part.data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(uri: &str, token: Option<&str>, parts: &[Part<'_>]) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(multipart_body(parts))).unwrap()
}

/// Upload of a single file field.
pub fn upload_file(uri: &str, token: &str, filename: &str, data: &[u8]) -> Request<Body> {
    upload_request(
        uri,
        Some(token),
        &[Part {
            name: "file",
            filename: Some(filename),
            data,
        }],
    )
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}
