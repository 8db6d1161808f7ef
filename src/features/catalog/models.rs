use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
  "id": 3,
  "name": "Linen Shirt",
  "category": "top",
  "price": 49.9,
  "description": "Relaxed fit",
  "brand": "atyr",
  "sizes": "S,M,L",
  "occasion": "casual",
  "tags": "summer,linen",
  "mainImage": "top/mainImage-1718000000000-123456789.jpg",
  "galleryImages": ["top/galleryImages-1718000000001-987654321.png"],
  "createdAt": "2025-06-10T08:00:00.000000Z",
  "updatedAt": "2025-06-10T08:00:00.000000Z"
}))]
pub struct Product {
    /// 商品 ID（创建时分配）
    pub id: i64,
    /// 商品名称
    pub name: String,
    /// 分类标签（如 top/bottom）
    pub category: String,
    /// 价格（非负）
    pub price: f64,
    pub description: Option<String>,
    pub brand: Option<String>,
    /// 尺码（逗号分隔）
    pub sizes: Option<String>,
    /// 适用场合
    pub occasion: Option<String>,
    /// 标签（逗号分隔）
    pub tags: Option<String>,
    /// 主图存储键（相对上传根目录）
    pub main_image: String,
    /// 图集存储键（有序）
    pub gallery_images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// 商品持有的全部图片存储键（主图在前）。
    pub fn image_keys(&self) -> Vec<String> {
        std::iter::once(self.main_image.clone())
            .chain(self.gallery_images.iter().cloned())
            .collect()
    }
}

/// 待插入的商品行（尚未分配 id）
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub category: String,
    pub price: f64,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub sizes: Option<String>,
    pub occasion: Option<String>,
    pub tags: Option<String>,
    pub main_image: String,
    pub gallery_images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl NewProduct {
    pub fn into_product(self, id: i64) -> Product {
        Product {
            id,
            name: self.name,
            category: self.category,
            price: self.price,
            description: self.description,
            brand: self.brand,
            sizes: self.sizes,
            occasion: self.occasion,
            tags: self.tags,
            main_image: self.main_image,
            gallery_images: self.gallery_images,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// 表单中的文本字段。创建时 name/category 必填；更新时缺省字段保持原值。
#[derive(Debug, Clone, Default)]
pub struct ProductFields {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub sizes: Option<String>,
    pub occasion: Option<String>,
    pub tags: Option<String>,
}

/// 商品分类
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListProductsQuery {
    /// 按分类精确过滤
    pub category: Option<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({"deletedCount": 1}))]
pub struct DeleteResponse {
    pub deleted_count: u64,
}

/// multipart 表单结构（仅用于 OpenAPI 文档）
#[allow(dead_code)]
#[derive(utoipa::ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct ProductFormDoc {
    /// 商品名称（创建时必填）
    name: Option<String>,
    /// 分类（创建时必填）
    category: Option<String>,
    /// 价格（十进制字符串，默认 0）
    price: Option<String>,
    description: Option<String>,
    brand: Option<String>,
    sizes: Option<String>,
    occasion: Option<String>,
    tags: Option<String>,
    /// 主图（jpeg/png/gif/webp），创建时必填
    #[schema(value_type = Option<String>, format = Binary)]
    main_image: Option<Vec<u8>>,
    /// 图集（可多个），更新时提供则整体替换
    #[schema(value_type = Option<Vec<String>>)]
    gallery_images: Option<Vec<Vec<u8>>>,
}
