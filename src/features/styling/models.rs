use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::features::catalog::models::Product;

/// 记录滑动操作的请求体
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({"userId": "u-1", "categoryId": 2, "imagePath": "top/mainImage-1.jpg", "action": "like"}))]
pub struct SwipeRequest {
    pub user_id: Option<String>,
    pub category_id: Option<i64>,
    pub image_path: Option<String>,
    /// 操作（如 like/dislike）
    pub action: Option<String>,
}

/// 待插入的滑动记录
#[derive(Debug, Clone)]
pub struct NewSwipe {
    pub user_id: String,
    pub category_id: Option<i64>,
    pub image_path: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Swipe {
    pub id: i64,
    pub user_id: String,
    pub category_id: Option<i64>,
    pub image_path: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
}

impl NewSwipe {
    pub fn into_swipe(self, id: i64) -> Swipe {
        Swipe {
            id,
            user_id: self.user_id,
            category_id: self.category_id,
            image_path: self.image_path,
            action: self.action,
            created_at: self.created_at,
        }
    }
}

/// 风格分类（滑动浏览的图片分组）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StyleCategory {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StyleCategoryImage {
    pub id: i64,
    pub category_id: i64,
    /// 相对上传根目录的存储键
    pub image_path: String,
    pub created_at: DateTime<Utc>,
}

/// 待插入的风格分类及其图片
#[derive(Debug, Clone)]
pub struct NewStyleCategory {
    pub name: String,
    pub description: Option<String>,
    pub image_paths: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl NewStyleCategory {
    /// 按分配好的分类 id 与首个图片 id 展开为持久化后的形态。
    pub fn into_parts(self, id: i64, first_image_id: i64) -> (StyleCategory, Vec<StyleCategoryImage>) {
        let images = self
            .image_paths
            .into_iter()
            .enumerate()
            .map(|(i, image_path)| StyleCategoryImage {
                id: first_image_id + i as i64,
                category_id: id,
                image_path,
                created_at: self.created_at,
            })
            .collect();
        let category = StyleCategory {
            id,
            name: self.name,
            description: self.description,
            created_at: self.created_at,
        };
        (category, images)
    }
}

/// 创建风格分类的响应
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StyleCategoryCreated {
    pub success: bool,
    pub message: String,
    pub category_id: i64,
    pub category: StyleCategory,
    pub images: Vec<StyleCategoryImage>,
}

/// 风格分类上传表单（仅用于 OpenAPI 文档）
#[allow(dead_code)]
#[derive(utoipa::ToSchema)]
pub struct StyleCategoryFormDoc {
    /// 分类名称（必填）
    name: String,
    description: Option<String>,
    /// 1 到 10 张图片（jpeg/png/gif/webp）
    #[schema(value_type = Vec<String>)]
    images: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({"userId": "u-1", "preferences": {"colors": ["black"], "fit": "relaxed"}}))]
pub struct PreferencesRequest {
    pub user_id: Option<String>,
    /// 任意 JSON 对象
    #[schema(value_type = Option<Object>)]
    pub preferences: Option<serde_json::Value>,
}

/// 用户偏好快照（按时间追加，取最新一条）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSnapshot {
    pub user_id: String,
    #[schema(value_type = Object)]
    pub preferences: serde_json::Value,
    /// 尚无记录时为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl PreferenceSnapshot {
    /// 尚无偏好记录时返回的空快照
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            preferences: serde_json::Value::Object(Default::default()),
            created_at: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({"occasion": "date night", "userId": "u-1"}))]
pub struct RecommendationRequest {
    pub occasion: Option<String>,
    pub user_id: Option<String>,
}

/// 搭配推荐结果（随机挑选，非模型推理）
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub top: Option<Product>,
    pub bottom: Option<Product>,
    pub occasion: String,
    pub reasoning: String,
}

/// 写操作确认
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}
