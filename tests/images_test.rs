mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use image::GenericImageView;
use sea_orm::ConnectionTrait;
use serde_json::json;

use common::{delete, get, json_request, png, spawn_app, upload_file, upload_request, Part};

#[tokio::test]
async fn tiny_upload_is_not_an_image() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let res = app
        .send(upload_file("/api/images/upload/products", &token, "x.jpg", b"hello"))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Invalid or unsupported image file");
    assert!(app.files_in("products").is_empty());
}

#[tokio::test]
async fn empty_and_oversized_uploads_are_rejected() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let res = app
        .send(upload_file("/api/images/upload/products", &token, "x.png", b""))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Empty file");

    let big = vec![0u8; 10 * 1024 * 1024 + 1];
    let res = app
        .send(upload_file("/api/images/upload/products", &token, "x.png", &big))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "File too large. Maximum size: 10MB");
}

#[tokio::test]
async fn unknown_entity_type_is_rejected_before_processing() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let res = app
        .send(upload_file("/api/images/upload/users", &token, "a.png", &png(10, 10)))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.error(),
        "Invalid entity type. Allowed: products, categories, banners"
    );

    let res = app.send(get("/api/images/list/users", Some(&token))).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upload_requires_a_token() {
    let app = spawn_app().await;

    let res = app
        .send(upload_request(
            "/api/images/upload/products",
            None,
            &[Part { name: "file", filename: Some("a.png"), data: &png(10, 10) }],
        ))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn large_png_is_downscaled_and_reencoded() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let res = app
        .send(upload_file(
            "/api/images/upload/products",
            &token,
            "Huge.PNG",
            &png(3000, 3000),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    let body = res.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["mime_type"], "image/jpeg");
    assert_eq!(body["width"], 2000);
    assert_eq!(body["height"], 2000);

    let filename = body["filename"].as_str().unwrap();
    assert!(filename.ends_with(".png"));
    assert_eq!(body["url"], format!("/api/images/products/{}", filename));
    assert_eq!(
        body["thumbnail_url"],
        format!("/api/images/products/thumb_{}", filename)
    );

    let stored = std::fs::read(app.upload_dir.path().join("products").join(filename)).unwrap();
    assert_eq!(image::guess_format(&stored).unwrap(), image::ImageFormat::Jpeg);
    assert_eq!(body["size"], stored.len() as u64);

    let thumb = std::fs::read(
        app.upload_dir
            .path()
            .join("products")
            .join(format!("thumb_{}", filename)),
    )
    .unwrap();
    assert_eq!(image::load_from_memory(&thumb).unwrap().dimensions(), (300, 300));
}

#[tokio::test]
async fn images_beyond_twice_the_limit_are_refused_without_writing() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let res = app
        .send(upload_file("/api/images/upload/banners", &token, "wide.png", &png(4001, 2)))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Image dimensions too large. Max: 4000x4000");
    assert!(app.files_in("banners").is_empty());
}

#[tokio::test]
async fn one_pixel_strip_gets_a_square_thumbnail() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let res = app
        .send(upload_file("/api/images/upload/products", &token, "strip.png", &png(4000, 1)))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    let body = res.json();
    assert_eq!(body["width"], 2000);
    assert_eq!(body["height"], 1);

    let res = app
        .send(get(body["thumbnail_url"].as_str().unwrap(), None))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(image::load_from_memory(&res.body).unwrap().dimensions(), (300, 300));
}

#[tokio::test]
async fn failed_record_insert_removes_written_files() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;
    app.state
        .db
        .execute_unprepared("DROP TABLE images")
        .await
        .unwrap();

    let res = app
        .send(upload_file("/api/images/upload/banners", &token, "b.png", &png(16, 16)))
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(res.error().starts_with("Image processing failed: "), "{}", res.error());
    assert!(app.files_in("banners").is_empty());
}

#[tokio::test]
async fn serving_sets_cache_headers_and_honours_etag() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let res = app
        .send(upload_file("/api/images/upload/categories", &token, "c.png", &png(64, 32)))
        .await;
    let body = res.json();
    let url = body["url"].as_str().unwrap().to_string();
    let thumbnail_url = body["thumbnail_url"].as_str().unwrap().to_string();

    let res = app.send(get(&url, None)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers.get(header::CONTENT_TYPE).unwrap(), "image/jpeg");
    assert_eq!(
        res.headers.get(header::CACHE_CONTROL).unwrap(),
        "public, max-age=31536000"
    );
    let etag = res.headers.get(header::ETAG).unwrap().clone();
    assert_eq!(image::load_from_memory(&res.body).unwrap().dimensions(), (64, 32));

    let res = app
        .send(
            Request::builder()
                .uri(&url)
                .header(header::IF_NONE_MATCH, etag.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_MODIFIED);
    assert!(res.body.is_empty());
    assert_eq!(res.headers.get(header::ETAG).unwrap(), &etag);

    let res = app.send(get(&thumbnail_url, None)).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(image::load_from_memory(&res.body).unwrap().dimensions(), (300, 300));
}

#[tokio::test]
async fn serving_unknown_files_is_not_found() {
    let app = spawn_app().await;

    for uri in [
        "/api/images/products/missing.jpg",
        "/api/images/widgets/missing.jpg",
        "/api/images/temp/anything.jpg",
    ] {
        let res = app.send(get(uri, None)).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(res.error(), "Image not found");
    }
}

#[tokio::test]
async fn metadata_update_and_listing() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let mut ids = Vec::new();
    for name in ["a.png", "b.png", "c.png"] {
        let res = app
            .send(upload_file("/api/images/upload/banners", &token, name, &png(16, 16)))
            .await;
        ids.push(res.json()["id"].as_i64().unwrap());
    }

    let res = app
        .send(get(&format!("/api/images/{}", ids[0]), Some(&token)))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let meta = res.json();
    assert_eq!(meta["original_filename"], "a.png");
    assert_eq!(meta["entity_type"], "banners");
    assert_eq!(meta["entity_id"], json!(null));
    assert_eq!(meta["mime_type"], "image/jpeg");
    assert_eq!(meta["is_active"], true);
    assert!(meta["updated_at"].is_null());

    let res = app
        .send(json_request(
            "PUT",
            &format!("/api/images/{}", ids[0]),
            Some(&token),
            json!({"alt_text": "Summer sale", "entity_id": 7}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["message"], "Image updated successfully");

    let meta = app
        .send(get(&format!("/api/images/{}", ids[0]), Some(&token)))
        .await
        .json();
    assert_eq!(meta["alt_text"], "Summer sale");
    assert_eq!(meta["entity_id"], 7);
    assert_eq!(meta["is_active"], true);
    assert!(!meta["updated_at"].is_null());

    app.send(json_request(
        "PUT",
        &format!("/api/images/{}", ids[1]),
        Some(&token),
        json!({"is_active": false}),
    ))
    .await;

    let res = app
        .send(get("/api/images/list/banners?limit=1", Some(&token)))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let listing = res.json();
    assert_eq!(listing["total"], 2);
    assert_eq!(listing["images"].as_array().unwrap().len(), 1);
    assert_eq!(listing["images"][0]["id"], ids[0]);

    let listing = app
        .send(get("/api/images/list/banners?entity_id=7", Some(&token)))
        .await
        .json();
    assert_eq!(listing["total"], 1);

    let listing = app
        .send(get("/api/images/list/banners?skip=1", Some(&token)))
        .await
        .json();
    assert_eq!(listing["images"][0]["id"], ids[2]);

    let res = app.send(get("/api/images/list/banners", None)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn deleting_twice_is_not_found_and_files_are_removed() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let res = app
        .send(upload_file("/api/images/upload/products", &token, "p.png", &png(16, 16)))
        .await;
    let id = res.json()["id"].as_i64().unwrap();
    assert_eq!(app.files_in("products").len(), 2);

    let res = app
        .send(delete(&format!("/api/images/{}", id), Some(&token)))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["message"], "Image deleted successfully");

    let res = app
        .send(delete(&format!("/api/images/{}", id), Some(&token)))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error(), "Image not found");

    // Removal happens in the background.
    for _ in 0..50 {
        if app.files_in("products").is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(app.files_in("products").is_empty());
}

#[tokio::test]
async fn uploads_of_identical_content_get_distinct_names() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;
    let data = png(8, 8);

    let first = app
        .send(upload_file("/api/images/upload/products", &token, "same.png", &data))
        .await
        .json();
    let second = app
        .send(upload_file("/api/images/upload/products", &token, "same.png", &data))
        .await
        .json();

    assert_ne!(first["filename"], second["filename"]);
    let hash = |v: &serde_json::Value| {
        v["filename"].as_str().unwrap().split('_').nth(1).unwrap().to_string()
    };
    assert_eq!(hash(&first), hash(&second));
    assert_eq!(app.files_in("products").len(), 4);
}
