use std::path::Path;

use axum::body::Bytes;
use chrono::Utc;
use rand::Rng;

use crate::config::UploadsConfig;
use crate::error::AppError;

/// 主图表单字段名
pub const MAIN_IMAGE_FIELD: &str = "mainImage";
/// 图集表单字段名
pub const GALLERY_IMAGES_FIELD: &str = "galleryImages";

/// 允许的扩展名
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
/// 允许的声明类型
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

/// 一个已接收但尚未落盘的上传文件
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// 表单字段名（mainImage/galleryImages）
    pub field: String,
    /// 客户端提供的原始文件名
    pub file_name: String,
    /// 客户端声明的 Content-Type
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl ImageUpload {
    pub fn new(
        field: impl Into<String>,
        file_name: impl Into<String>,
        content_type: Option<&str>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            field: field.into(),
            file_name: file_name.into(),
            content_type: content_type.map(str::to_string),
            bytes: bytes.into(),
        }
    }
}

/// 上传校验策略
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_file_bytes: u64,
    pub max_gallery_images: usize,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from(&UploadsConfig::default())
    }
}

impl From<&UploadsConfig> for UploadPolicy {
    fn from(cfg: &UploadsConfig) -> Self {
        Self {
            max_file_bytes: cfg.max_file_bytes,
            max_gallery_images: cfg.max_gallery_images,
        }
    }
}

impl UploadPolicy {
    /// 校验单个文件，返回规范化后的扩展名（小写）。
    ///
    /// 扩展名与声明类型都必须命中白名单，且两者互相一致。
    pub fn check(&self, upload: &ImageUpload) -> Result<String, AppError> {
        let ext = Path::new(&upload.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| {
                AppError::Validation(format!("文件 {:?} 缺少扩展名", upload.file_name))
            })?;
        if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
            return Err(AppError::Validation(format!(
                "不支持的文件类型 .{ext}，仅允许 jpeg/png/gif/webp"
            )));
        }

        let declared = upload
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
            .ok_or_else(|| {
                AppError::Validation(format!("文件 {:?} 缺少 Content-Type", upload.file_name))
            })?;
        if !ALLOWED_CONTENT_TYPES.contains(&declared.as_str()) {
            return Err(AppError::Validation(format!(
                "不支持的 Content-Type {declared}，仅允许 jpeg/png/gif/webp"
            )));
        }
        if !mime_guess::from_ext(&ext)
            .iter()
            .any(|m| m.essence_str() == declared)
        {
            return Err(AppError::Validation(format!(
                "扩展名 .{ext} 与 Content-Type {declared} 不一致"
            )));
        }

        let size = upload.bytes.len() as u64;
        if size == 0 {
            return Err(AppError::Validation(format!(
                "文件 {:?} 为空",
                upload.file_name
            )));
        }
        if size > self.max_file_bytes {
            return Err(AppError::Validation(format!(
                "文件 {:?} 过大（{size} 字节，上限 {} 字节）",
                upload.file_name, self.max_file_bytes
            )));
        }
        Ok(ext)
    }

    /// 校验图集数量与其中每个文件。
    pub fn check_gallery(&self, uploads: &[ImageUpload]) -> Result<Vec<String>, AppError> {
        if uploads.len() > self.max_gallery_images {
            return Err(AppError::Validation(format!(
                "图集最多 {} 张，收到 {} 张",
                self.max_gallery_images,
                uploads.len()
            )));
        }
        uploads.iter().map(|u| self.check(u)).collect()
    }
}

/// 由分类得到存放目录名：仅保留 `[A-Za-z0-9_-]`，其余替换为 `_`，空值回落为 `general`。
pub fn category_dir(category: &str) -> String {
    let cleaned: String = category
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '_') {
        "general".to_string()
    } else {
        cleaned
    }
}

/// 生成防冲突文件名：`<field>-<毫秒时间戳>-<随机数>.<ext>`
pub fn generate_file_name(field: &str, ext: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let field = category_dir(field);
    format!("{field}-{}-{suffix}.{ext}", Utc::now().timestamp_millis())
}
