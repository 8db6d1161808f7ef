/// 进程内存实现
pub mod memory;
/// SQLite 实现
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::AppError;
use crate::features::catalog::models::{Category, NewProduct, Product};
use crate::features::styling::models::{
    NewStyleCategory, NewSwipe, PreferenceSnapshot, StyleCategory, StyleCategoryImage, Swipe,
};

pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

/// 启动时预置的分类
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("top", "Upper body clothing items"),
    ("bottom", "Lower body clothing items"),
];

/// 商品目录持久化接口
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// 插入商品及其图集，返回分配 id 后的商品；同时登记其分类。
    async fn insert_product(&self, new: NewProduct) -> Result<Product, AppError>;

    /// 按创建时间倒序列出商品（同一时间按 id 倒序）。
    async fn list_products(&self, category: Option<&str>) -> Result<Vec<Product>, AppError>;

    async fn find_product(&self, id: i64) -> Result<Option<Product>, AppError>;

    /// 以 `product` 整体覆盖同 id 的行（含图集）。行不存在时返回 `false`。
    async fn update_product(&self, product: &Product) -> Result<bool, AppError>;

    /// 删除商品行及其图集行，返回删除的商品行数。
    async fn delete_product(&self, id: i64) -> Result<u64, AppError>;

    async fn list_categories(&self) -> Result<Vec<Category>, AppError>;
}

/// 滑动记录与偏好持久化接口
#[async_trait]
pub trait StylingRepository: Send + Sync {
    async fn insert_swipe(&self, new: NewSwipe) -> Result<Swipe, AppError>;

    /// 某用户的滑动记录（新到旧）
    async fn list_swipes(&self, user_id: &str) -> Result<Vec<Swipe>, AppError>;

    async fn insert_preferences(&self, snapshot: PreferenceSnapshot) -> Result<(), AppError>;

    async fn latest_preferences(
        &self,
        user_id: &str,
    ) -> Result<Option<PreferenceSnapshot>, AppError>;

    /// 在同一事务内插入风格分类及其图片行。
    async fn insert_style_category(
        &self,
        new: NewStyleCategory,
    ) -> Result<(StyleCategory, Vec<StyleCategoryImage>), AppError>;

    /// 按创建时间倒序（同一时间按 id 倒序）
    async fn list_style_categories(&self) -> Result<Vec<StyleCategory>, AppError>;

    /// 某分类的图片，按上传顺序；分类不存在时为空。
    async fn list_style_category_images(
        &self,
        category_id: i64,
    ) -> Result<Vec<StyleCategoryImage>, AppError>;

    async fn style_category_exists(&self, category_id: i64) -> Result<bool, AppError>;
}

/// 按配置构造出的存储句柄
#[derive(Clone)]
pub struct Repositories {
    pub catalog: Arc<dyn CatalogRepository>,
    pub styling: Arc<dyn StylingRepository>,
    sqlite: Option<SqliteStorage>,
}

impl Repositories {
    /// 进程内存存储（测试/演示）
    pub fn in_memory() -> Self {
        let storage = Arc::new(MemoryStorage::new());
        Self {
            catalog: storage.clone(),
            styling: storage,
            sqlite: None,
        }
    }

    pub fn from_sqlite(storage: SqliteStorage) -> Self {
        let shared = Arc::new(storage.clone());
        Self {
            catalog: shared.clone(),
            styling: shared,
            sqlite: Some(storage),
        }
    }

    /// 按 `storage.backend` 选择实现并完成初始化
    pub async fn open(cfg: &StorageConfig) -> Result<Self, AppError> {
        match cfg.backend {
            StorageBackend::Memory => {
                tracing::warn!("使用内存存储：数据不会持久化");
                Ok(Self::in_memory())
            }
            StorageBackend::Sqlite => {
                let storage = SqliteStorage::connect_sqlite(&cfg.sqlite_path, cfg.sqlite_wal).await?;
                storage.init_schema().await?;
                tracing::info!("SQLite 存储已就绪: {}", cfg.sqlite_path);
                Ok(Self::from_sqlite(storage))
            }
        }
    }

    /// 关闭底层连接池（内存存储无操作）
    pub async fn close(&self) {
        if let Some(storage) = &self.sqlite {
            storage.pool.close().await;
        }
    }
}
