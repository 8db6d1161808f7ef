use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

use super::upload::{ImageUpload, generate_file_name};

/// 图片字节的存放位置。
///
/// 存储键形如 `top/mainImage-1718000000000-42.jpg`，由目录与文件名拼接而成。
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// 写入新文件并返回存储键；同名文件已存在时报错，不覆盖。
    async fn save(&self, dir: &str, file_name: &str, bytes: &[u8]) -> Result<String, AppError>;

    /// 删除存储键对应的文件；文件本就不存在视为成功。
    async fn remove(&self, key: &str) -> Result<(), AppError>;
}

/// 本地磁盘实现
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    root: PathBuf,
}

impl LocalAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 启动时确保根目录存在
    pub async fn ensure_root(&self) -> Result<(), AppError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::Storage(format!("创建上传目录 {:?} 失败: {e}", self.root))
        })
    }

    /// 将存储键解析为磁盘路径；拒绝绝对路径与 `..`。
    pub fn resolve(&self, key: &str) -> Result<PathBuf, AppError> {
        let rel = Path::new(key);
        if key.is_empty() || !rel.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(AppError::Storage(format!("非法的存储键 {key:?}")));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl AssetStore for LocalAssetStore {
    async fn save(&self, dir: &str, file_name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let key = format!("{dir}/{file_name}");
        let path = self.resolve(&key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("创建目录 {parent:?} 失败: {e}")))?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| AppError::Storage(format!("创建文件 {path:?} 失败: {e}")))?;
        let written = match file.write_all(bytes).await {
            Ok(()) => file.sync_all().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            drop(file);
            let _ = tokio::fs::remove_file(&path).await;
            return Err(AppError::Storage(format!("写入文件 {path:?} 失败: {e}")));
        }

        tracing::debug!(key = %key, size = bytes.len(), "图片已写入");
        Ok(key)
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!(key = %key, "图片已删除");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(key = %key, "图片不存在，跳过删除");
                Ok(())
            }
            Err(e) => Err(AppError::Storage(format!("删除文件 {path:?} 失败: {e}"))),
        }
    }
}

/// 依次写入已校验的上传文件，成功的存储键追加到 `written`；遇错即停。
///
/// 失败时 `written` 中保留已落盘的部分，由调用方回滚。
pub async fn store_uploads<'a>(
    assets: &dyn AssetStore,
    dir: &str,
    uploads: impl Iterator<Item = (&'a ImageUpload, String)>,
    written: &mut Vec<String>,
) -> Result<(), AppError> {
    for (upload, ext) in uploads {
        let file_name = generate_file_name(&upload.field, &ext);
        let key = assets.save(dir, &file_name, &upload.bytes).await?;
        written.push(key);
    }
    Ok(())
}

/// 逐个删除文件，单个失败只记录日志，不影响其余文件。
pub async fn remove_best_effort(
    assets: &dyn AssetStore,
    owner_id: Option<i64>,
    keys: &[String],
    reason: &str,
) {
    for key in keys {
        if let Err(e) = assets.remove(key).await {
            tracing::warn!(
                owner_id = ?owner_id,
                path = %key,
                reason,
                "删除图片失败（已忽略）: {e}"
            );
        }
    }
}
