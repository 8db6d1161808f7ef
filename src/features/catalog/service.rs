use std::sync::Arc;

use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::error::AppError;
use crate::storage::CatalogRepository;

use super::assets::{AssetStore, remove_best_effort, store_uploads};
use super::models::{Category, NewProduct, Product, ProductFields};
use super::upload::{ImageUpload, UploadPolicy, category_dir};

/// 存储层时间精度为微秒，服务层统一截断，保证各后端返回值一致。
fn now_micros() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// 必填文本：去除首尾空白后不得为空
fn required_text(field: &str, value: Option<String>) -> Result<String, AppError> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("{field} 不能为空"))),
    }
}

/// 可选文本：空白视为未填写
fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_price(price: f64) -> Result<f64, AppError> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(AppError::Validation(format!("price 必须为非负数，收到 {price}")))
    }
}

/// 商品目录服务：负责商品行与图片文件的一致性。
///
/// 写入顺序固定为“先落文件，再写库”；写库失败时回滚已落盘的文件。
/// 被替换或被删除的旧文件只在写库成功之后才删除，删除失败仅记录日志。
///
/// 同一 id 上的并发更新/删除不做串行化：存储层后写者胜出，
/// 两个并发的主图替换可能使其中一张新图成为孤儿文件。
#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn CatalogRepository>,
    assets: Arc<dyn AssetStore>,
    policy: UploadPolicy,
}

impl CatalogService {
    pub fn new(
        repo: Arc<dyn CatalogRepository>,
        assets: Arc<dyn AssetStore>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            repo,
            assets,
            policy,
        }
    }

    pub async fn create_product(
        &self,
        fields: ProductFields,
        main_image: Option<ImageUpload>,
        gallery_images: Vec<ImageUpload>,
    ) -> Result<Product, AppError> {
        let name = required_text("name", fields.name)?;
        let category = required_text("category", fields.category)?;
        let price = check_price(fields.price.unwrap_or(0.0))?;
        let main_image =
            main_image.ok_or_else(|| AppError::Validation("缺少主图 mainImage".into()))?;
        let main_ext = self.policy.check(&main_image)?;
        let gallery_exts = self.policy.check_gallery(&gallery_images)?;

        let dir = category_dir(&category);
        let mut written: Vec<String> = Vec::with_capacity(1 + gallery_images.len());
        let stored = store_uploads(
            self.assets.as_ref(),
            &dir,
            std::iter::once((&main_image, main_ext)).chain(gallery_images.iter().zip(gallery_exts)),
            &mut written,
        )
        .await;
        if let Err(e) = stored {
            tracing::error!(category = %category, "保存商品图片失败，回滚已写入文件: {e}");
            remove_best_effort(self.assets.as_ref(), None, &written, "rollback").await;
            return Err(e);
        }

        let new = NewProduct {
            name,
            category,
            price,
            description: optional_text(fields.description),
            brand: optional_text(fields.brand),
            sizes: optional_text(fields.sizes),
            occasion: optional_text(fields.occasion),
            tags: optional_text(fields.tags),
            main_image: written[0].clone(),
            gallery_images: written[1..].to_vec(),
            created_at: now_micros(),
        };

        match self.repo.insert_product(new).await {
            Ok(product) => {
                tracing::info!(
                    product_id = product.id,
                    category = %product.category,
                    gallery = product.gallery_images.len(),
                    "商品已创建"
                );
                Ok(product)
            }
            Err(e) => {
                tracing::error!("写入商品失败，回滚已写入文件: {e}");
                remove_best_effort(self.assets.as_ref(), None, &written, "rollback").await;
                Err(e)
            }
        }
    }

    pub async fn list_products(&self, category: Option<&str>) -> Result<Vec<Product>, AppError> {
        self.repo.list_products(category).await
    }

    pub async fn get_product(&self, id: i64) -> Result<Product, AppError> {
        self.repo
            .find_product(id)
            .await?
            .ok_or_else(|| AppError::product_not_found(id))
    }

    pub async fn update_product(
        &self,
        id: i64,
        fields: ProductFields,
        main_image: Option<ImageUpload>,
        gallery_images: Option<Vec<ImageUpload>>,
    ) -> Result<Product, AppError> {
        let existing = self.get_product(id).await?;

        let mut next = existing.clone();
        if fields.name.is_some() {
            next.name = required_text("name", fields.name)?;
        }
        if fields.category.is_some() {
            next.category = required_text("category", fields.category)?;
        }
        if let Some(price) = fields.price {
            next.price = check_price(price)?;
        }
        // 提供了空值即清空
        if fields.description.is_some() {
            next.description = optional_text(fields.description);
        }
        if fields.brand.is_some() {
            next.brand = optional_text(fields.brand);
        }
        if fields.sizes.is_some() {
            next.sizes = optional_text(fields.sizes);
        }
        if fields.occasion.is_some() {
            next.occasion = optional_text(fields.occasion);
        }
        if fields.tags.is_some() {
            next.tags = optional_text(fields.tags);
        }

        let main_ext = main_image
            .as_ref()
            .map(|u| self.policy.check(u))
            .transpose()?;
        let gallery_images = gallery_images.filter(|g| !g.is_empty());
        let gallery_exts = gallery_images
            .as_deref()
            .map(|g| self.policy.check_gallery(g))
            .transpose()?;

        // 新文件先落盘
        let dir = category_dir(&next.category);
        let mut written: Vec<String> = Vec::new();
        let mut replaced: Vec<String> = Vec::new();
        if let (Some(upload), Some(ext)) = (&main_image, main_ext)
            && let Err(e) = store_uploads(
                self.assets.as_ref(),
                &dir,
                std::iter::once((upload, ext)),
                &mut written,
            )
            .await
        {
            tracing::error!(product_id = id, "保存新主图失败: {e}");
            remove_best_effort(self.assets.as_ref(), Some(id), &written, "rollback").await;
            return Err(e);
        }
        if let Some(key) = written.first() {
            next.main_image = key.clone();
            replaced.push(existing.main_image.clone());
        }

        if let (Some(uploads), Some(exts)) = (&gallery_images, gallery_exts) {
            let start = written.len();
            if let Err(e) =
                store_uploads(self.assets.as_ref(), &dir, uploads.iter().zip(exts), &mut written)
                    .await
            {
                tracing::error!(product_id = id, "保存新图集失败: {e}");
                remove_best_effort(self.assets.as_ref(), Some(id), &written, "rollback").await;
                return Err(e);
            }
            next.gallery_images = written[start..].to_vec();
            replaced.extend(existing.gallery_images.iter().cloned());
        }

        // updated_at 必须严格前进
        let now = now_micros();
        next.updated_at = if now > existing.updated_at {
            now
        } else {
            existing.updated_at + Duration::microseconds(1)
        };

        match self.repo.update_product(&next).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(product_id = id, "更新时商品已被删除");
                remove_best_effort(self.assets.as_ref(), Some(id), &written, "rollback").await;
                return Err(AppError::product_not_found(id));
            }
            Err(e) => {
                tracing::error!(product_id = id, "更新商品失败，回滚新文件: {e}");
                remove_best_effort(self.assets.as_ref(), Some(id), &written, "rollback").await;
                return Err(e);
            }
        }

        // 提交成功后才删除被替换的旧文件
        remove_best_effort(self.assets.as_ref(), Some(id), &replaced, "replaced").await;
        tracing::info!(
            product_id = id,
            new_files = written.len(),
            removed_files = replaced.len(),
            "商品已更新"
        );
        Ok(next)
    }

    /// 删除商品；不存在时返回 NotFound。
    pub async fn delete_product(&self, id: i64) -> Result<u64, AppError> {
        let existing = self.get_product(id).await?;
        let deleted = self.repo.delete_product(id).await?;
        if deleted == 0 {
            return Err(AppError::product_not_found(id));
        }
        remove_best_effort(
            self.assets.as_ref(),
            Some(id),
            &existing.image_keys(),
            "deleted",
        )
        .await;
        tracing::info!(product_id = id, "商品已删除");
        Ok(deleted)
    }

    pub async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        self.repo.list_categories().await
    }
}
