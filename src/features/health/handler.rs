use axum::response::Json;
use serde::Serialize;

const SERVICE_NAME: &str = "fashion-backend";

/// 探活响应
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: &'static str,
    #[schema(example = "fashion-backend")]
    pub service: &'static str,
    /// Cargo package version
    #[schema(example = "0.1.0")]
    pub version: &'static str,
}

impl HealthResponse {
    fn current() -> Self {
        Self {
            status: "healthy",
            service: SERVICE_NAME,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    summary = "健康检查",
    description = "不经过业务前缀、不访问存储，仅用于负载均衡探活。",
    responses((status = 200, description = "服务存活", body = HealthResponse)),
    tag = "Health"
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::current())
}
