use axum::{
    http::{StatusCode, header},
    response::IntoResponse,
};

use fashion_backend::AppError;
use fashion_backend::features::catalog::models::{DeleteResponse, Product};

async fn problem_of(err: AppError) -> (StatusCode, String, serde_json::Value) {
    let resp = err.into_response();
    let status = resp.status();
    let content_type = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .expect("missing Content-Type")
        .to_str()
        .expect("invalid Content-Type")
        .to_string();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    (
        status,
        content_type,
        serde_json::from_slice(&bytes).expect("parse json"),
    )
}

/// 全局错误必须为 RFC7807 ProblemDetails（application/problem+json）。
#[tokio::test]
async fn app_error_into_response_is_problem_details() {
    let (status, content_type, v) =
        problem_of(AppError::Validation("缺少主图 mainImage".to_string())).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(content_type, "application/problem+json");
    assert_eq!(v["status"], 400);
    assert_eq!(v["code"], "VALIDATION_FAILED");
    assert_eq!(v["type"], "about:blank");
    assert!(v.get("title").is_some());
    assert!(v["detail"].as_str().unwrap().contains("mainImage"));
}

#[tokio::test]
async fn error_kinds_map_to_stable_status_and_code() {
    let cases = [
        (AppError::BadRequest("x".into()), 400, "BAD_REQUEST"),
        (AppError::product_not_found(7), 404, "NOT_FOUND"),
        (AppError::Storage("x".into()), 500, "STORAGE_ERROR"),
        (AppError::Database("x".into()), 500, "DATABASE_ERROR"),
        (AppError::Internal("x".into()), 500, "INTERNAL_ERROR"),
    ];
    for (err, status, code) in cases {
        let (s, _, v) = problem_of(err).await;
        assert_eq!(s.as_u16(), status);
        assert_eq!(v["code"], code);
    }
}

/// 对外 JSON 字段命名统一 camelCase。
#[test]
fn product_serializes_as_camel_case() {
    let now = chrono::Utc::now();
    let product = Product {
        id: 1,
        name: "Tee".into(),
        category: "top".into(),
        price: 0.0,
        description: None,
        brand: None,
        sizes: None,
        occasion: None,
        tags: None,
        main_image: "top/a.png".into(),
        gallery_images: vec![],
        created_at: now,
        updated_at: now,
    };
    let v = serde_json::to_value(product).expect("serialize json");

    assert!(v.get("mainImage").is_some());
    assert!(v.get("galleryImages").is_some());
    assert!(v.get("createdAt").is_some());
    assert!(v.get("main_image").is_none());
    assert!(v.get("brand").is_some_and(|b| b.is_null()));

    let v = serde_json::to_value(DeleteResponse { deleted_count: 1 }).expect("serialize json");
    assert_eq!(v["deletedCount"], 1);
}
