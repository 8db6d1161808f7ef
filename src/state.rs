use std::sync::Arc;

use crate::config::AppConfig;
use crate::features::catalog::{AssetStore, CatalogService, UploadPolicy};
use crate::features::styling::StylingService;
use crate::storage::Repositories;

/// 聚合的应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub styling: StylingService,
}

impl AppState {
    /// 由存储句柄、图片存储与配置组装服务
    pub fn new(repos: &Repositories, assets: Arc<dyn AssetStore>, config: &AppConfig) -> Self {
        let policy = UploadPolicy::from(&config.uploads);
        Self {
            catalog: CatalogService::new(repos.catalog.clone(), assets.clone(), policy),
            styling: StylingService::new(
                repos.styling.clone(),
                repos.catalog.clone(),
                assets,
                policy,
                config.recommendation.clone(),
            ),
        }
    }
}
