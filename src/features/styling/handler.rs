use axum::{
    Router,
    extract::{
        Multipart, Path, State,
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::Json,
    routing::{get, post},
};

use crate::features::catalog::ImageUpload;
use crate::{error::AppError, state::AppState};

use super::models::{
    AckResponse, PreferenceSnapshot, PreferencesRequest, Recommendation, RecommendationRequest,
    StyleCategory, StyleCategoryCreated, StyleCategoryFormDoc, StyleCategoryImage, Swipe,
    SwipeRequest,
};

/// 风格分类图片的表单字段名
pub const STYLE_IMAGES_FIELD: &str = "images";

#[derive(Debug, Default)]
struct StyleCategoryForm {
    name: Option<String>,
    description: Option<String>,
    images: Vec<ImageUpload>,
}

impl StyleCategoryForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = StyleCategoryForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                STYLE_IMAGES_FIELD => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.images
                        .push(ImageUpload::new(&name, file_name, content_type.as_deref(), bytes));
                }
                "name" => form.name = Some(field.text().await?),
                "description" => form.description = Some(field.text().await?),
                _ if field.file_name().is_some() => {
                    return Err(AppError::Validation(format!("不支持的文件字段 {name}")));
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

#[utoipa::path(
    post,
    path = "/style-categories",
    summary = "创建风格分类",
    description = "multipart 表单：`name`（必填）、`description`，以及 1 到 10 张图片 `images`。",
    request_body(content = StyleCategoryFormDoc, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "创建成功", body = StyleCategoryCreated),
        (status = 400, description = "校验失败", body = AppError),
        (status = 500, description = "存储失败", body = AppError)
    ),
    tag = "Styling"
)]
pub async fn create_style_category(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<StyleCategoryCreated>), AppError> {
    let form = StyleCategoryForm::read(multipart?).await?;
    let created = state
        .styling
        .create_style_category(form.name, form.description, form.images)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/style-categories",
    summary = "风格分类列表",
    responses((status = 200, description = "按创建时间倒序", body = Vec<StyleCategory>)),
    tag = "Styling"
)]
pub async fn list_style_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<StyleCategory>>, AppError> {
    Ok(Json(state.styling.list_style_categories().await?))
}

#[utoipa::path(
    get,
    path = "/style-category-images/{category_id}",
    summary = "风格分类图片",
    description = "按上传顺序返回；分类不存在时返回空数组。",
    params(("category_id" = i64, Path, description = "风格分类 ID")),
    responses(
        (status = 200, description = "图片列表", body = Vec<StyleCategoryImage>),
        (status = 400, description = "ID 非法", body = AppError)
    ),
    tag = "Styling"
)]
pub async fn list_style_category_images(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Vec<StyleCategoryImage>>, AppError> {
    let Path(category_id) = path?;
    Ok(Json(state.styling.style_category_images(category_id).await?))
}

#[utoipa::path(
    post,
    path = "/swipes",
    summary = "记录滑动",
    request_body = SwipeRequest,
    responses(
        (status = 201, description = "已记录", body = Swipe),
        (status = 400, description = "缺少必填字段、风格分类不存在或 JSON 格式错误", body = AppError)
    ),
    tag = "Styling"
)]
pub async fn post_swipe(
    State(state): State<AppState>,
    payload: Result<Json<SwipeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Swipe>), AppError> {
    let Json(req) = payload?;
    let swipe = state.styling.record_swipe(req).await?;
    Ok((StatusCode::CREATED, Json(swipe)))
}

#[utoipa::path(
    get,
    path = "/preferences/{user_id}",
    summary = "查询用户偏好",
    description = "返回最新一次保存的偏好；从未保存时 preferences 为空对象。",
    params(("user_id" = String, Path, description = "用户 ID")),
    responses((status = 200, description = "最新偏好", body = PreferenceSnapshot)),
    tag = "Styling"
)]
pub async fn get_preferences(
    State(state): State<AppState>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<PreferenceSnapshot>, AppError> {
    let Path(user_id) = path?;
    Ok(Json(state.styling.latest_preferences(&user_id).await?))
}

#[utoipa::path(
    post,
    path = "/preferences",
    summary = "保存用户偏好",
    request_body = PreferencesRequest,
    responses(
        (status = 200, description = "已保存", body = AckResponse),
        (status = 400, description = "userId 为空或 preferences 不是对象", body = AppError)
    ),
    tag = "Styling"
)]
pub async fn post_preferences(
    State(state): State<AppState>,
    payload: Result<Json<PreferencesRequest>, JsonRejection>,
) -> Result<Json<AckResponse>, AppError> {
    let Json(req) = payload?;
    state.styling.save_preferences(req).await?;
    Ok(Json(AckResponse {
        success: true,
        message: "Preferences updated successfully".to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/recommendations",
    summary = "搭配推荐",
    description = "从上装与下装分类中各随机挑选一件商品（非模型推理）。",
    request_body = RecommendationRequest,
    responses((status = 200, description = "推荐结果", body = Recommendation)),
    tag = "Styling"
)]
pub async fn post_recommendation(
    State(state): State<AppState>,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<Json<Recommendation>, AppError> {
    let Json(req) = payload?;
    Ok(Json(state.styling.recommend(req).await?))
}

pub fn create_styling_router() -> Router<AppState> {
    Router::new()
        .route("/swipes", post(post_swipe))
        .route("/preferences", post(post_preferences))
        .route("/preferences/:user_id", get(get_preferences))
        .route("/recommendations", post(post_recommendation))
        .route(
            "/style-categories",
            get(list_style_categories).post(create_style_category),
        )
        .route(
            "/style-category-images/:category_id",
            get(list_style_category_images),
        )
}
