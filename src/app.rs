use axum::{Router, extract::DefaultBodyLimit, routing::get};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::cors::build_cors_layer;
use crate::features::{catalog, health, styling};
use crate::openapi::ApiDoc;
use crate::state::AppState;

pub(crate) fn compression_predicate() -> impl tower_http::compression::predicate::Predicate {
    use tower_http::compression::predicate::{NotForContentType, Predicate, SizeAbove};

    // 商品图片本身已压缩，JSON 与文档页面才值得压缩
    SizeAbove::default()
        .and(NotForContentType::IMAGES)
        .and(NotForContentType::SSE)
        .and(NotForContentType::const_new("application/octet-stream"))
}

/// 组装完整路由：业务接口、上传图片静态目录、文档与中间件
pub fn build_router(state: AppState, config: &AppConfig) -> Router {
    let api_router = Router::<AppState>::new()
        .merge(catalog::create_catalog_router())
        .merge(styling::create_styling_router());

    let mut app = Router::<AppState>::new()
        .route("/health", get(health::health_check))
        .nest(&config.api.prefix, api_router)
        .nest_service(
            &config.uploads.public_prefix,
            ServeDir::new(config.uploads_path()),
        )
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(config.uploads.max_request_bytes))
        .with_state(state);

    if let Some(cors) = build_cors_layer(&config.cors) {
        app = app.layer(cors);
    }

    app.layer(CompressionLayer::new().compress_when(compression_predicate()))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod compression_predicate_tests {
    use super::compression_predicate;
    use axum::body::Body;
    use axum::http::{Response as HttpResponse, header};
    use tower_http::compression::predicate::Predicate;

    fn should_compress_for(ct: &str) -> bool {
        let body_bytes = vec![b'x'; 2048];
        let resp = HttpResponse::builder()
            .header(header::CONTENT_TYPE, ct)
            .body(Body::from(body_bytes))
            .unwrap();
        compression_predicate().should_compress(&resp)
    }

    #[test]
    fn product_images_are_not_compressed() {
        assert!(!should_compress_for("image/jpeg"));
        assert!(!should_compress_for("image/webp"));
    }

    #[test]
    fn json_is_compressed() {
        assert!(should_compress_for("application/json"));
        assert!(should_compress_for("application/problem+json"));
    }
}
