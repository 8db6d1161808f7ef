use axum::{
    Router,
    extract::{
        Multipart, Path, Query, State,
        multipart::MultipartRejection,
        rejection::{PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
    routing::get,
};
use std::collections::HashMap;

use crate::{error::AppError, state::AppState};

use super::models::{
    Category, DeleteResponse, ListProductsQuery, Product, ProductFields, ProductFormDoc,
};
use super::upload::{GALLERY_IMAGES_FIELD, ImageUpload, MAIN_IMAGE_FIELD};

/// 解析后的 multipart 表单
#[derive(Debug, Default)]
struct ProductForm {
    fields: HashMap<String, String>,
    main_images: Vec<ImageUpload>,
    gallery_images: Vec<ImageUpload>,
}

impl ProductForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = ProductForm::default();
        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            match name.as_str() {
                MAIN_IMAGE_FIELD | GALLERY_IMAGES_FIELD => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await?;
                    // 浏览器在未选择文件时仍会提交空的文件段
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    let upload = ImageUpload::new(&name, file_name, content_type.as_deref(), bytes);
                    if name == MAIN_IMAGE_FIELD {
                        form.main_images.push(upload);
                    } else {
                        form.gallery_images.push(upload);
                    }
                }
                _ => {
                    if field.file_name().is_some() {
                        return Err(AppError::Validation(format!("不支持的文件字段 {name}")));
                    }
                    let text = field.text().await?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }

    fn product_fields(&mut self) -> Result<ProductFields, AppError> {
        let price = match self.fields.remove("price") {
            Some(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse::<f64>()
                    .map_err(|_| AppError::Validation(format!("price 不是合法数字: {raw:?}")))?,
            ),
            _ => None,
        };
        Ok(ProductFields {
            name: self.fields.remove("name"),
            category: self.fields.remove("category"),
            price,
            description: self.fields.remove("description"),
            brand: self.fields.remove("brand"),
            sizes: self.fields.remove("sizes"),
            occasion: self.fields.remove("occasion"),
            tags: self.fields.remove("tags"),
        })
    }

    fn single_main_image(&mut self) -> Result<Option<ImageUpload>, AppError> {
        if self.main_images.len() > 1 {
            return Err(AppError::Validation("mainImage 只能上传一张".into()));
        }
        Ok(self.main_images.pop())
    }
}

#[utoipa::path(
    post,
    path = "/products",
    summary = "创建商品",
    description = "multipart 表单：文本字段 + 主图 `mainImage`（必填，一张）+ 图集 `galleryImages`（可多张）。图片仅允许 jpeg/png/gif/webp。",
    request_body(content = ProductFormDoc, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "创建成功", body = Product),
        (status = 400, description = "校验失败", body = AppError),
        (status = 500, description = "存储失败", body = AppError)
    ),
    tag = "Catalog"
)]
pub async fn create_product(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let mut form = ProductForm::read(multipart?).await?;
    let fields = form.product_fields()?;
    let main_image = form.single_main_image()?;
    let product = state
        .catalog
        .create_product(fields, main_image, form.gallery_images)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

#[utoipa::path(
    get,
    path = "/products",
    summary = "商品列表",
    description = "按创建时间倒序返回全部商品，可按分类精确过滤。",
    params(ListProductsQuery),
    responses((status = 200, description = "商品列表", body = Vec<Product>)),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    query: Result<Query<ListProductsQuery>, QueryRejection>,
) -> Result<Json<Vec<Product>>, AppError> {
    let Query(q) = query?;
    let category = q.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    Ok(Json(state.catalog.list_products(category).await?))
}

#[utoipa::path(
    get,
    path = "/products/{id}",
    summary = "商品详情",
    params(("id" = i64, Path, description = "商品 ID")),
    responses(
        (status = 200, description = "商品", body = Product),
        (status = 404, description = "商品不存在", body = AppError)
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<Product>, AppError> {
    let Path(id) = path?;
    Ok(Json(state.catalog.get_product(id).await?))
}

#[utoipa::path(
    put,
    path = "/products/{id}",
    summary = "更新商品",
    description = "部分更新：未提交的字段保持原值。提交 `mainImage` 替换主图；提交 `galleryImages` 整体替换图集。旧图片在更新成功后删除。",
    params(("id" = i64, Path, description = "商品 ID")),
    request_body(content = ProductFormDoc, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "更新后的商品", body = Product),
        (status = 400, description = "校验失败", body = AppError),
        (status = 404, description = "商品不存在", body = AppError)
    ),
    tag = "Catalog"
)]
pub async fn update_product(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Product>, AppError> {
    let Path(id) = path?;
    let mut form = ProductForm::read(multipart?).await?;
    let fields = form.product_fields()?;
    let main_image = form.single_main_image()?;
    let gallery = (!form.gallery_images.is_empty()).then_some(form.gallery_images);
    let product = state
        .catalog
        .update_product(id, fields, main_image, gallery)
        .await?;
    Ok(Json(product))
}

#[utoipa::path(
    delete,
    path = "/products/{id}",
    summary = "删除商品",
    description = "删除商品行及其全部图片文件。文件删除为尽力而为，失败仅记录日志。",
    params(("id" = i64, Path, description = "商品 ID")),
    responses(
        (status = 200, description = "删除成功", body = DeleteResponse),
        (status = 404, description = "商品不存在", body = AppError)
    ),
    tag = "Catalog"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let Path(id) = path?;
    let deleted_count = state.catalog.delete_product(id).await?;
    Ok(Json(DeleteResponse { deleted_count }))
}

#[utoipa::path(
    get,
    path = "/categories",
    summary = "分类列表",
    responses((status = 200, description = "按名称排序的分类", body = Vec<Category>)),
    tag = "Catalog"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.catalog.list_categories().await?))
}

pub fn create_catalog_router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/:id",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/categories", get(list_categories))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn product_fields_parse_price_and_keep_missing_as_none() {
        let mut form = ProductForm::default();
        form.fields.insert("name".into(), "Tee".into());
        form.fields.insert("price".into(), " 19.5 ".into());
        let fields = form.product_fields().unwrap();
        assert_eq!(fields.name.as_deref(), Some("Tee"));
        assert_eq!(fields.price, Some(19.5));
        assert!(fields.category.is_none());
    }

    #[test]
    fn invalid_price_is_validation_error() {
        let mut form = ProductForm::default();
        form.fields.insert("price".into(), "cheap".into());
        assert!(matches!(
            form.product_fields(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn more_than_one_main_image_is_rejected() {
        let mut form = ProductForm::default();
        let img = ImageUpload::new(MAIN_IMAGE_FIELD, "a.png", Some("image/png"), vec![1u8]);
        form.main_images = vec![img.clone(), img];
        assert!(form.single_main_image().is_err());
    }
}
