use utoipa::OpenApi;
use utoipa::openapi::server::{ServerBuilder, ServerVariableBuilder};
use utoipa::Modify;

/// 业务接口挂载在 `config.api.prefix` 下，`/health` 不带前缀。
struct ApiServers;

impl Modify for ApiServers {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let api = ServerBuilder::new()
            .url("{api_prefix}")
            .description(Some("业务接口（默认 /api）"))
            .parameter(
                "api_prefix",
                ServerVariableBuilder::new()
                    .default_value("/api")
                    .description(Some(
                        "业务接口前缀：对应 config.api.prefix（可通过 APP_API__PREFIX 覆盖）",
                    )),
            )
            .build();

        let root = ServerBuilder::new()
            .url("/")
            .description(Some("根路径（用于 /health）"))
            .build();

        openapi.servers = Some(vec![api, root]);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::features::health::handler::health_check,
        crate::features::catalog::handler::create_product,
        crate::features::catalog::handler::list_products,
        crate::features::catalog::handler::get_product,
        crate::features::catalog::handler::update_product,
        crate::features::catalog::handler::delete_product,
        crate::features::catalog::handler::list_categories,
        crate::features::styling::handler::post_swipe,
        crate::features::styling::handler::get_preferences,
        crate::features::styling::handler::post_preferences,
        crate::features::styling::handler::post_recommendation,
        crate::features::styling::handler::create_style_category,
        crate::features::styling::handler::list_style_categories,
        crate::features::styling::handler::list_style_category_images,
    ),
    components(schemas(crate::error::ProblemDetails)),
    modifiers(&ApiServers),
    tags(
        (
            name = "Catalog",
            description = "商品目录：商品 CRUD、主图/图集上传与分类。"
        ),
        (
            name = "Styling",
            description = "穿搭：风格分类、滑动记录、用户偏好与随机搭配推荐。"
        ),
        (name = "Health", description = "健康检查：服务探活。"),
    ),
    info(
        title = "Fashion Backend API",
        version = env!("CARGO_PKG_VERSION"),
        description = "服装推荐演示后端（Axum + utoipa）。除 /health 外，业务接口实际挂载在 `config.api.prefix`（默认 /api）下，OpenAPI 的 paths 不包含该前缀。上传的图片通过 `config.uploads.public_prefix`（默认 /uploads）静态访问。"
    )
)]
pub struct ApiDoc;
