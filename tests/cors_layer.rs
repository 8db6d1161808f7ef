use axum::{
    Router,
    body::Body,
    http::{Request, header},
    routing::get,
};
use tower::ServiceExt;

use fashion_backend::config::CorsConfig;
use fashion_backend::cors::build_cors_layer;

#[tokio::test]
async fn cors_layer_echoes_configured_origin() {
    let cors = CorsConfig {
        enabled: true,
        allowed_origins: vec!["http://localhost:3000".to_string()],
    };

    let layer = build_cors_layer(&cors).expect("cors layer");
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .layer(layer);

    let req = Request::builder()
        .method("GET")
        .uri("/")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("call app");

    let allow_origin = resp
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .expect("missing allow origin")
        .to_str()
        .expect("invalid allow origin");
    assert_eq!(allow_origin, "http://localhost:3000");
}

#[tokio::test]
async fn cors_preflight_allows_product_mutations() {
    let layer = build_cors_layer(&CorsConfig::default()).expect("cors layer");
    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .layer(layer);

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/")
        .header(header::ORIGIN, "https://shop.example")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("call app");

    let allow_origin = resp
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .expect("missing allow origin");
    assert_eq!(allow_origin, "*");
    let allow_methods = resp
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .expect("missing allow methods")
        .to_str()
        .expect("invalid allow methods");
    assert!(allow_methods.contains("DELETE"));
    assert!(allow_methods.contains("PUT"));
}
