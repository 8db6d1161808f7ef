use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use rand::seq::SliceRandom;

use crate::config::RecommendationConfig;
use crate::error::AppError;
use crate::features::catalog::assets::{AssetStore, remove_best_effort, store_uploads};
use crate::features::catalog::models::Product;
use crate::features::catalog::{ImageUpload, UploadPolicy};
use crate::storage::{CatalogRepository, StylingRepository};

use super::models::{
    NewStyleCategory, NewSwipe, PreferenceSnapshot, PreferencesRequest, Recommendation,
    RecommendationRequest, StyleCategory, StyleCategoryCreated, StyleCategoryImage, Swipe,
    SwipeRequest,
};

const DEFAULT_OCCASION: &str = "everyday";
/// 风格分类图片的存放目录
pub const STYLE_CATEGORY_DIR: &str = "style-categories";
/// 单个风格分类最多上传的图片数
pub const MAX_STYLE_IMAGES: usize = 10;

fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("{field} 不能为空"))),
    }
}

#[derive(Clone)]
pub struct StylingService {
    repo: Arc<dyn StylingRepository>,
    catalog: Arc<dyn CatalogRepository>,
    assets: Arc<dyn AssetStore>,
    policy: UploadPolicy,
    config: RecommendationConfig,
}

impl StylingService {
    pub fn new(
        repo: Arc<dyn StylingRepository>,
        catalog: Arc<dyn CatalogRepository>,
        assets: Arc<dyn AssetStore>,
        policy: UploadPolicy,
        config: RecommendationConfig,
    ) -> Self {
        Self {
            repo,
            catalog,
            assets,
            policy,
            config,
        }
    }

    /// 创建风格分类：先校验全部图片，再落盘，最后写入数据行。
    ///
    /// 写文件或插入数据行失败时，删除本次已写入的文件。
    pub async fn create_style_category(
        &self,
        name: Option<String>,
        description: Option<String>,
        images: Vec<ImageUpload>,
    ) -> Result<StyleCategoryCreated, AppError> {
        let name = required("name", name)?;
        if images.is_empty() {
            return Err(AppError::Validation("至少需要一张图片 images".into()));
        }
        if images.len() > MAX_STYLE_IMAGES {
            return Err(AppError::Validation(format!(
                "images 最多 {MAX_STYLE_IMAGES} 张，收到 {} 张",
                images.len()
            )));
        }
        let exts = images
            .iter()
            .map(|u| self.policy.check(u))
            .collect::<Result<Vec<_>, _>>()?;

        let mut written: Vec<String> = Vec::with_capacity(images.len());
        if let Err(e) = store_uploads(
            self.assets.as_ref(),
            STYLE_CATEGORY_DIR,
            images.iter().zip(exts),
            &mut written,
        )
        .await
        {
            tracing::error!(name = %name, "保存风格分类图片失败，回滚已写入文件: {e}");
            remove_best_effort(self.assets.as_ref(), None, &written, "rollback").await;
            return Err(e);
        }

        let new = NewStyleCategory {
            name,
            description: description
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty()),
            image_paths: written.clone(),
            created_at: Utc::now().trunc_subsecs(6),
        };
        let (category, images) = match self.repo.insert_style_category(new).await {
            Ok(v) => v,
            Err(e) => {
                tracing::error!("插入风格分类失败，回滚已写入文件: {e}");
                remove_best_effort(self.assets.as_ref(), None, &written, "rollback").await;
                return Err(e);
            }
        };
        tracing::info!(
            category_id = category.id,
            images = images.len(),
            "风格分类已创建"
        );
        Ok(StyleCategoryCreated {
            success: true,
            message: "Style category created successfully".to_string(),
            category_id: category.id,
            category,
            images,
        })
    }

    pub async fn list_style_categories(&self) -> Result<Vec<StyleCategory>, AppError> {
        self.repo.list_style_categories().await
    }

    /// 分类不存在时返回空列表。
    pub async fn style_category_images(
        &self,
        category_id: i64,
    ) -> Result<Vec<StyleCategoryImage>, AppError> {
        self.repo.list_style_category_images(category_id).await
    }

    pub async fn record_swipe(&self, req: SwipeRequest) -> Result<Swipe, AppError> {
        if let Some(category_id) = req.category_id
            && !self.repo.style_category_exists(category_id).await?
        {
            return Err(AppError::Validation(format!(
                "categoryId {category_id} 对应的风格分类不存在"
            )));
        }
        let new = NewSwipe {
            user_id: required("userId", req.user_id)?,
            category_id: req.category_id,
            image_path: required("imagePath", req.image_path)?,
            action: required("action", req.action)?,
            created_at: Utc::now().trunc_subsecs(6),
        };
        let swipe = self.repo.insert_swipe(new).await?;
        tracing::debug!(user_id = %swipe.user_id, action = %swipe.action, "记录滑动");
        Ok(swipe)
    }

    pub async fn save_preferences(&self, req: PreferencesRequest) -> Result<(), AppError> {
        let user_id = required("userId", req.user_id)?;
        let preferences = match req.preferences {
            Some(v @ serde_json::Value::Object(_)) => v,
            _ => return Err(AppError::Validation("preferences 必须为 JSON 对象".into())),
        };
        self.repo
            .insert_preferences(PreferenceSnapshot {
                user_id,
                preferences,
                created_at: Some(Utc::now().trunc_subsecs(6)),
            })
            .await
    }

    /// 最新一条偏好；没有记录时返回空对象。
    pub async fn latest_preferences(&self, user_id: &str) -> Result<PreferenceSnapshot, AppError> {
        Ok(self
            .repo
            .latest_preferences(user_id)
            .await?
            .unwrap_or_else(|| PreferenceSnapshot::empty(user_id)))
    }

    /// 从上装、下装分类中各随机挑一件。
    pub async fn recommend(&self, req: RecommendationRequest) -> Result<Recommendation, AppError> {
        let occasion = req
            .occasion
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| DEFAULT_OCCASION.to_string());

        let tops = self
            .catalog
            .list_products(Some(&self.config.top_category))
            .await?;
        let bottoms = self
            .catalog
            .list_products(Some(&self.config.bottom_category))
            .await?;

        let (top, bottom) = pick_pair(&tops, &bottoms);
        tracing::debug!(
            user_id = ?req.user_id,
            occasion = %occasion,
            top = ?top.as_ref().map(|p| p.id),
            bottom = ?bottom.as_ref().map(|p| p.id),
            "生成搭配推荐"
        );
        Ok(Recommendation {
            top,
            bottom,
            reasoning: format!(
                "Perfect for {occasion}! This combination balances style and comfort."
            ),
            occasion,
        })
    }
}

fn pick_pair(tops: &[Product], bottoms: &[Product]) -> (Option<Product>, Option<Product>) {
    let mut rng = rand::thread_rng();
    (
        tops.choose(&mut rng).cloned(),
        bottoms.choose(&mut rng).cloned(),
    )
}
