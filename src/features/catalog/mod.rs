/// 图片文件存储
pub mod assets;
pub mod handler;
pub mod models;
/// 商品目录服务（文件与数据行的一致性）
pub mod service;
/// 上传校验与命名
pub mod upload;

pub use assets::{AssetStore, LocalAssetStore};
pub use handler::create_catalog_router;
pub use service::CatalogService;
pub use upload::{ImageUpload, UploadPolicy};
