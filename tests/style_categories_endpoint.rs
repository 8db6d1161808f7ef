use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use fashion_backend::features::catalog::LocalAssetStore;
use fashion_backend::storage::Repositories;
use fashion_backend::{AppConfig, AppState, build_router};

const BOUNDARY: &str = "----fashion-style-boundary";

enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a str, &'a [u8]),
}

fn multipart_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Text(name, value) => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n")
                    .as_bytes(),
            ),
            Part::File(name, file_name, content_type, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn build_app(dir: &TempDir) -> Router {
    let mut config = AppConfig::default();
    config.uploads.dir = dir.path().to_string_lossy().to_string();
    let repos = Repositories::in_memory();
    let assets = LocalAssetStore::new(config.uploads_path());
    let state = AppState::new(&repos, Arc::new(assets), &config);
    build_router(state, &config)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, req).await;
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn count_files(dir: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let path = e.path();
            if path.is_dir() { count_files(&path) } else { 1 }
        })
        .sum()
}

#[tokio::test]
async fn create_list_and_fetch_images_of_style_category() {
    let dir = TempDir::new().unwrap();
    let app = build_app(&dir);

    let (status, created) = send_json(
        &app,
        multipart_request(
            "/api/style-categories",
            &[
                Part::Text("name", "Street"),
                Part::Text("description", "oversized fits"),
                Part::File("images", "a.png", "image/png", b"png-a"),
                Part::File("images", "b.jpg", "image/jpeg", b"jpeg-b"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["success"], true);
    let id = created["categoryId"].as_i64().unwrap();
    assert_eq!(created["category"]["name"], "Street");
    assert_eq!(created["images"].as_array().unwrap().len(), 2);

    let (status, _) = send_json(
        &app,
        multipart_request(
            "/api/style-categories",
            &[
                Part::Text("name", "Formal"),
                Part::File("images", "c.webp", "image/webp", b"webp-c"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, list) = send_json(&app, get("/api/style-categories")).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Formal", "Street"]);

    let (status, images) = send_json(&app, get(&format!("/api/style-category-images/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    let images = images.as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["categoryId"], id);
    let path = images[0]["imagePath"].as_str().unwrap();
    assert!(path.starts_with("style-categories/"), "{path}");

    let (status, bytes) = send(&app, get(&format!("/uploads/{path}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"png-a");

    let (status, swipe) = send_json(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/swipes")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({"userId": "u1", "categoryId": id, "imagePath": path, "action": "like"})
                    .to_string(),
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(swipe["categoryId"], id);
}

#[tokio::test]
async fn missing_name_or_images_is_rejected_without_files() {
    let dir = TempDir::new().unwrap();
    let app = build_app(&dir);

    let (status, v) = send_json(
        &app,
        multipart_request(
            "/api/style-categories",
            &[Part::File("images", "a.png", "image/png", b"png-a")],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["code"], "VALIDATION_FAILED");

    let (status, _) = send_json(
        &app,
        multipart_request("/api/style-categories", &[Part::Text("name", "Street")]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send_json(
        &app,
        multipart_request(
            "/api/style-categories",
            &[
                Part::Text("name", "Street"),
                Part::File("images", "ok.png", "image/png", b"png"),
                Part::File("images", "run.exe", "application/octet-stream", b"MZ"),
            ],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(count_files(dir.path()), 0);
    let (_, list) = send_json(&app, get("/api/style-categories")).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn more_than_ten_images_is_rejected() {
    let dir = TempDir::new().unwrap();
    let app = build_app(&dir);
    let mut parts = vec![Part::Text("name", "Street")];
    for _ in 0..11 {
        parts.push(Part::File("images", "a.png", "image/png", b"png"));
    }
    let (status, _) = send_json(&app, multipart_request("/api/style-categories", &parts)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(count_files(dir.path()), 0);
}

#[tokio::test]
async fn images_of_unknown_category_are_empty_and_bad_id_is_400() {
    let dir = TempDir::new().unwrap();
    let app = build_app(&dir);

    let (status, v) = send_json(&app, get("/api/style-category-images/42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v, json!([]));

    let (status, v) = send_json(&app, get("/api/style-category-images/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["code"], "BAD_REQUEST");
}
