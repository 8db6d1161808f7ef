use axum::http::{HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::config::CorsConfig;

/// 根据配置构建 CORS 中间件
pub fn build_cors_layer(cors: &CorsConfig) -> Option<CorsLayer> {
    if !cors.enabled {
        return None;
    }

    let (any_origin, origins) = parse_allowed_origins(&cors.allowed_origins);
    if !any_origin && origins.is_empty() {
        tracing::warn!("CORS 已启用但 allowed_origins 为空，已跳过启用");
        return None;
    }

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Some(if any_origin {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    })
}

fn parse_allowed_origins(values: &[String]) -> (bool, Vec<HeaderValue>) {
    let mut any = false;
    let mut origins = Vec::new();
    for raw in values {
        let value = raw.trim();
        if value.is_empty() {
            continue;
        }
        if value == "*" {
            any = true;
            continue;
        }
        match HeaderValue::from_str(value) {
            Ok(v) => origins.push(v),
            Err(_) => tracing::warn!("CORS allowed_origins 含无效值: {}", value),
        }
    }
    (any, origins)
}
