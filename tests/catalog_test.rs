mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{delete, get, json_request, png, spawn_app, upload_request, Part, TestApp};

async fn create_category(app: &TestApp, token: &str, name: &str) -> common::TestResponse {
    app.send(json_request(
        "POST",
        "/api/categories",
        Some(token),
        json!({"name": name, "description": "Small devices"}),
    ))
    .await
}

async fn create_product(app: &TestApp, token: &str, body: Value) -> Value {
    let res = app
        .send(json_request("POST", "/api/products", Some(token), body))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    res.json()
}

#[tokio::test]
async fn duplicate_category_name_is_rejected() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let first = create_category(&app, &token, "Pods").await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.json()["name"], "Pods");

    let second = create_category(&app, &token, "Pods").await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(second.error(), "Category name already exists");

    let res = app.send(get("/api/categories", None)).await;
    assert_eq!(res.json().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn category_update_checks_names_against_other_rows_only() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let pods = create_category(&app, &token, "Pods").await.json();
    create_category(&app, &token, "Coils").await;
    let id = pods["id"].as_i64().unwrap();

    let res = app
        .send(json_request(
            "PUT",
            &format!("/api/categories/{}", id),
            Some(&token),
            json!({"name": "Pods", "description": "Refillable"}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let updated = res.json();
    assert_eq!(updated["description"], "Refillable");
    assert!(!updated["updated_at"].is_null());

    let res = app
        .send(json_request(
            "PUT",
            &format!("/api/categories/{}", id),
            Some(&token),
            json!({"name": "Coils"}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Category name already exists");
}

#[tokio::test]
async fn category_reads_are_public_and_writes_need_a_token() {
    let app = spawn_app().await;

    let res = app
        .send(json_request(
            "POST",
            "/api/categories",
            None,
            json!({"name": "Pods"}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app.send(get("/api/categories", None)).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.send(get("/api/categories/42", None)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error(), "Category not found");
}

#[tokio::test]
async fn product_crud_round() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let product = create_product(
        &app,
        &token,
        json!({"name": "Starter kit", "description": "All in one", "price": 24.5, "category": "Kits"}),
    )
    .await;
    let id = product["id"].as_i64().unwrap();
    assert_eq!(product["price"], 24.5);
    assert_eq!(product["images"], json!([]));

    let res = app
        .send(json_request(
            "PUT",
            &format!("/api/products/{}", id),
            Some(&token),
            json!({"price": 19.0}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let updated = res.json();
    assert_eq!(updated["price"], 19.0);
    assert_eq!(updated["name"], "Starter kit");

    let res = app
        .send(json_request(
            "PUT",
            &format!("/api/products/{}", id),
            Some(&token),
            json!({"price": -1.0}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .send(delete(&format!("/api/products/{}", id), Some(&token)))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["message"], "Product deleted");

    let res = app.send(get(&format!("/api/products/{}", id), None)).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.error(), "Product not found");

    let res = app
        .send(delete(&format!("/api/products/{}", id), Some(&token)))
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn negative_price_is_rejected_on_create() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let res = app
        .send(json_request(
            "POST",
            "/api/products",
            Some(&token),
            json!({"name": "Broken", "price": -3.0}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn product_listing_attaches_active_images() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let first = create_product(&app, &token, json!({"name": "Kit", "price": 10.0})).await;
    let second = create_product(&app, &token, json!({"name": "Coil", "price": 2.0})).await;
    let first_id = first["id"].as_i64().unwrap().to_string();

    let data = png(40, 30);
    let res = app
        .send(upload_request(
            "/api/images/upload/products",
            Some(&token),
            &[
                Part { name: "file", filename: Some("kit.png"), data: &data },
                Part { name: "entity_id", filename: None, data: first_id.as_bytes() },
                Part { name: "alt_text", filename: None, data: b"Front view" },
            ],
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK, "{:?}", res.body);
    let uploaded = res.json();

    let res = app.send(get("/api/products", None)).await;
    let products = res.json();
    let products = products.as_array().unwrap();
    assert_eq!(products.len(), 2);

    let images = products[0]["images"].as_array().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0]["id"], uploaded["id"]);
    assert_eq!(images[0]["url"], uploaded["url"]);
    assert_eq!(images[0]["thumbnail_url"], uploaded["thumbnail_url"]);
    assert_eq!(images[0]["alt_text"], "Front view");
    assert_eq!(products[1]["id"], second["id"]);
    assert_eq!(products[1]["images"], json!([]));

    // Deactivated images drop out of product responses.
    let image_id = uploaded["id"].as_i64().unwrap();
    let res = app
        .send(json_request(
            "PUT",
            &format!("/api/images/{}", image_id),
            Some(&token),
            json!({"is_active": false}),
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app.send(get(&format!("/api/products/{}", first_id), None)).await;
    assert_eq!(res.json()["images"], json!([]));
}

#[tokio::test]
async fn deleting_a_product_deactivates_its_images() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let product = create_product(&app, &token, json!({"name": "Kit", "price": 10.0})).await;
    let product_id = product["id"].as_i64().unwrap().to_string();

    let data = png(20, 20);
    let res = app
        .send(upload_request(
            "/api/images/upload/products",
            Some(&token),
            &[
                Part { name: "file", filename: Some("kit.png"), data: &data },
                Part { name: "entity_id", filename: None, data: product_id.as_bytes() },
            ],
        ))
        .await;
    let image_id = res.json()["id"].as_i64().unwrap();

    let res = app
        .send(delete(&format!("/api/products/{}", product_id), Some(&token)))
        .await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .send(get(&format!("/api/images/{}", image_id), Some(&token)))
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.json()["is_active"], false);
}

#[tokio::test]
async fn images_cannot_reference_missing_records() {
    let app = spawn_app().await;
    let token = app.login_as("admin").await;

    let data = png(20, 20);
    let res = app
        .send(upload_request(
            "/api/images/upload/categories",
            Some(&token),
            &[
                Part { name: "file", filename: Some("c.png"), data: &data },
                Part { name: "entity_id", filename: None, data: b"999" },
            ],
        ))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(app.files_in("categories").is_empty());

    // Banners have no backing table.
    let res = app
        .send(upload_request(
            "/api/images/upload/banners",
            Some(&token),
            &[
                Part { name: "file", filename: Some("b.png"), data: &data },
                Part { name: "entity_id", filename: None, data: b"999" },
            ],
        ))
        .await;
    assert_eq!(res.status, StatusCode::OK);
}
