use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteRow, SqliteSynchronous};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::error::AppError;
use crate::features::catalog::models::{Category, NewProduct, Product};
use crate::features::styling::models::{
    NewStyleCategory, NewSwipe, PreferenceSnapshot, StyleCategory, StyleCategoryImage, Swipe,
};

use super::{CatalogRepository, DEFAULT_CATEGORIES, StylingRepository};

const PRODUCT_COLUMNS: &str = "id, name, category, price, description, brand, sizes, occasion, tags, main_image, created_at, updated_at";

/// 时间统一存为定长 RFC3339（微秒 + Z），保证字典序即时间序。
fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|v| v.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("非法时间戳 {raw:?}: {e}")))
}

fn product_from_row(r: &SqliteRow) -> Result<Product, AppError> {
    let created: String = r.try_get("created_at")?;
    let updated: String = r.try_get("updated_at")?;
    Ok(Product {
        id: r.try_get("id")?,
        name: r.try_get("name")?,
        category: r.try_get("category")?,
        price: r.try_get("price")?,
        description: r.try_get("description")?,
        brand: r.try_get("brand")?,
        sizes: r.try_get("sizes")?,
        occasion: r.try_get("occasion")?,
        tags: r.try_get("tags")?,
        main_image: r.try_get("main_image")?,
        gallery_images: Vec::new(),
        created_at: parse_ts(&created)?,
        updated_at: parse_ts(&updated)?,
    })
}

#[derive(Clone)]
pub struct SqliteStorage {
    pub pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn connect_sqlite(path: &str, wal: bool) -> Result<Self, AppError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Storage(format!("创建数据库目录 {parent:?} 失败: {e}")))?;
        }
        let journal = if wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        };
        let opt = SqliteConnectOptions::new()
            .filename(Path::new(path))
            .create_if_missing(true)
            .journal_mode(journal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);
        let pool = SqlitePool::connect_with(opt)
            .await
            .map_err(|e| AppError::Database(format!("sqlite connect: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> Result<(), AppError> {
        let ddl = r#"
        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            price REAL NOT NULL DEFAULT 0,
            description TEXT,
            brand TEXT,
            sizes TEXT,
            occasion TEXT,
            tags TEXT,
            main_image TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_products_created ON products(created_at DESC, id DESC);
        CREATE INDEX IF NOT EXISTS idx_products_category_created ON products(category, created_at DESC, id DESC);

        CREATE TABLE IF NOT EXISTS product_gallery (
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            position INTEGER NOT NULL,
            image_path TEXT NOT NULL,
            PRIMARY KEY(product_id, position)
        );

        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT UNIQUE NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS style_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_style_categories_created ON style_categories(created_at DESC, id DESC);

        CREATE TABLE IF NOT EXISTS style_category_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category_id INTEGER NOT NULL REFERENCES style_categories(id) ON DELETE CASCADE,
            image_path TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_style_images_category ON style_category_images(category_id, id);

        CREATE TABLE IF NOT EXISTS user_swipes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            category_id INTEGER,
            image_path TEXT NOT NULL,
            action TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_swipes_user ON user_swipes(user_id, id DESC);

        CREATE TABLE IF NOT EXISTS user_preferences (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            preferences TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_preferences_user ON user_preferences(user_id, id DESC);
        "#;
        sqlx::query(ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("init schema: {e}")))?;

        let now = ts(&Utc::now());
        for (name, description) in DEFAULT_CATEGORIES {
            sqlx::query(
                "INSERT OR IGNORE INTO categories(name, description, created_at) VALUES(?,?,?)",
            )
            .bind(*name)
            .bind(*description)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("seed categories: {e}")))?;
        }
        Ok(())
    }

    /// 批量加载图集，避免 N+1 查询。
    async fn fetch_gallery_map(&self, ids: &[i64]) -> Result<HashMap<i64, Vec<String>>, AppError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT product_id, image_path FROM product_gallery WHERE product_id IN (",
        );
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY product_id, position");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("query gallery: {e}")))?;

        let mut map: HashMap<i64, Vec<String>> = HashMap::with_capacity(ids.len());
        for r in rows {
            let pid: i64 = r.try_get("product_id")?;
            let path: String = r.try_get("image_path")?;
            map.entry(pid).or_default().push(path);
        }
        Ok(map)
    }

    async fn attach_gallery(&self, mut products: Vec<Product>) -> Result<Vec<Product>, AppError> {
        let ids: Vec<i64> = products.iter().map(|p| p.id).collect();
        let mut map = self.fetch_gallery_map(&ids).await?;
        for p in products.iter_mut() {
            p.gallery_images = map.remove(&p.id).unwrap_or_default();
        }
        Ok(products)
    }
}

async fn insert_gallery_rows(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    product_id: i64,
    images: &[String],
) -> Result<(), AppError> {
    if images.is_empty() {
        return Ok(());
    }
    let mut qb =
        QueryBuilder::<Sqlite>::new("INSERT INTO product_gallery(product_id, position, image_path) ");
    qb.push_values(images.iter().enumerate(), |mut b, (pos, path)| {
        b.push_bind(product_id).push_bind(pos as i64).push_bind(path);
    });
    qb.build()
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Database(format!("insert gallery: {e}")))?;
    Ok(())
}

async fn register_category(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    name: &str,
    now: &str,
) -> Result<(), AppError> {
    sqlx::query("INSERT OR IGNORE INTO categories(name, description, created_at) VALUES(?,NULL,?)")
        .bind(name)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::Database(format!("register category: {e}")))?;
    Ok(())
}

#[async_trait]
impl CatalogRepository for SqliteStorage {
    async fn insert_product(&self, new: NewProduct) -> Result<Product, AppError> {
        let created = ts(&new.created_at);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("begin tx: {e}")))?;

        let res = sqlx::query(
            "INSERT INTO products(name, category, price, description, brand, sizes, occasion, tags, main_image, created_at, updated_at)
             VALUES(?,?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(&new.name)
        .bind(&new.category)
        .bind(new.price)
        .bind(&new.description)
        .bind(&new.brand)
        .bind(&new.sizes)
        .bind(&new.occasion)
        .bind(&new.tags)
        .bind(&new.main_image)
        .bind(&created)
        .bind(&created)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(format!("insert product: {e}")))?;
        let id = res.last_insert_rowid();

        insert_gallery_rows(&mut tx, id, &new.gallery_images).await?;
        register_category(&mut tx, &new.category, &created).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("commit tx: {e}")))?;
        Ok(new.into_product(id))
    }

    async fn list_products(&self, category: Option<&str>) -> Result<Vec<Product>, AppError> {
        let rows = match category {
            Some(c) => sqlx::query(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products WHERE category = ? ORDER BY created_at DESC, id DESC"
            ))
            .bind(c)
            .fetch_all(&self.pool)
            .await,
            None => sqlx::query(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at DESC, id DESC"
            ))
            .fetch_all(&self.pool)
            .await,
        }
        .map_err(|e| AppError::Database(format!("list products: {e}")))?;

        let products = rows
            .iter()
            .map(product_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.attach_gallery(products).await
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>, AppError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("find product {id}: {e}")))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let product = product_from_row(&row)?;
        Ok(self.attach_gallery(vec![product]).await?.pop())
    }

    async fn update_product(&self, product: &Product) -> Result<bool, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("begin tx: {e}")))?;

        let updated = ts(&product.updated_at);
        let res = sqlx::query(
            "UPDATE products SET name=?, category=?, price=?, description=?, brand=?, sizes=?, occasion=?, tags=?, main_image=?, updated_at=?
             WHERE id=?",
        )
        .bind(&product.name)
        .bind(&product.category)
        .bind(product.price)
        .bind(&product.description)
        .bind(&product.brand)
        .bind(&product.sizes)
        .bind(&product.occasion)
        .bind(&product.tags)
        .bind(&product.main_image)
        .bind(&updated)
        .bind(product.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(format!("update product {}: {e}", product.id)))?;
        if res.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        sqlx::query("DELETE FROM product_gallery WHERE product_id = ?")
            .bind(product.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("clear gallery {}: {e}", product.id)))?;
        insert_gallery_rows(&mut tx, product.id, &product.gallery_images).await?;
        register_category(&mut tx, &product.category, &updated).await?;

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("commit tx: {e}")))?;
        Ok(true)
    }

    async fn delete_product(&self, id: i64) -> Result<u64, AppError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("begin tx: {e}")))?;
        sqlx::query("DELETE FROM product_gallery WHERE product_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("delete gallery {id}: {e}")))?;
        let res = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("delete product {id}: {e}")))?;
        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("commit tx: {e}")))?;
        Ok(res.rows_affected())
    }

    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        let rows = sqlx::query("SELECT id, name, description, created_at FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("list categories: {e}")))?;
        rows.iter()
            .map(|r| -> Result<Category, AppError> {
                let created: String = r.try_get("created_at")?;
                Ok(Category {
                    id: r.try_get("id")?,
                    name: r.try_get("name")?,
                    description: r.try_get("description")?,
                    created_at: parse_ts(&created)?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl StylingRepository for SqliteStorage {
    async fn insert_swipe(&self, new: NewSwipe) -> Result<Swipe, AppError> {
        let res = sqlx::query(
            "INSERT INTO user_swipes(user_id, category_id, image_path, action, created_at) VALUES(?,?,?,?,?)",
        )
        .bind(&new.user_id)
        .bind(new.category_id)
        .bind(&new.image_path)
        .bind(&new.action)
        .bind(ts(&new.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("insert swipe: {e}")))?;
        Ok(new.into_swipe(res.last_insert_rowid()))
    }

    async fn list_swipes(&self, user_id: &str) -> Result<Vec<Swipe>, AppError> {
        let rows = sqlx::query(
            "SELECT id, user_id, category_id, image_path, action, created_at FROM user_swipes
             WHERE user_id = ? ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("list swipes: {e}")))?;
        rows.iter()
            .map(|r| -> Result<Swipe, AppError> {
                let created: String = r.try_get("created_at")?;
                Ok(Swipe {
                    id: r.try_get("id")?,
                    user_id: r.try_get("user_id")?,
                    category_id: r.try_get("category_id")?,
                    image_path: r.try_get("image_path")?,
                    action: r.try_get("action")?,
                    created_at: parse_ts(&created)?,
                })
            })
            .collect()
    }

    async fn insert_preferences(&self, snapshot: PreferenceSnapshot) -> Result<(), AppError> {
        let created = snapshot.created_at.unwrap_or_else(Utc::now);
        sqlx::query("INSERT INTO user_preferences(user_id, preferences, created_at) VALUES(?,?,?)")
            .bind(&snapshot.user_id)
            .bind(serde_json::to_string(&snapshot.preferences)?)
            .bind(ts(&created))
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("insert preferences: {e}")))?;
        Ok(())
    }

    async fn latest_preferences(
        &self,
        user_id: &str,
    ) -> Result<Option<PreferenceSnapshot>, AppError> {
        let row = sqlx::query(
            "SELECT user_id, preferences, created_at FROM user_preferences
             WHERE user_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("latest preferences: {e}")))?;
        let Some(r) = row else {
            return Ok(None);
        };
        let raw: String = r.try_get("preferences")?;
        let created: String = r.try_get("created_at")?;
        Ok(Some(PreferenceSnapshot {
            user_id: r.try_get("user_id")?,
            preferences: serde_json::from_str(&raw)
                .map_err(|e| AppError::Database(format!("非法的偏好 JSON: {e}")))?,
            created_at: Some(parse_ts(&created)?),
        }))
    }

    async fn insert_style_category(
        &self,
        new: NewStyleCategory,
    ) -> Result<(StyleCategory, Vec<StyleCategoryImage>), AppError> {
        let created = ts(&new.created_at);
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::Database(format!("begin tx: {e}")))?;

        let res = sqlx::query(
            "INSERT INTO style_categories(name, description, created_at) VALUES(?,?,?)",
        )
        .bind(&new.name)
        .bind(&new.description)
        .bind(&created)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::Database(format!("insert style category: {e}")))?;
        let id = res.last_insert_rowid();

        let mut image_ids = Vec::with_capacity(new.image_paths.len());
        for path in &new.image_paths {
            let res = sqlx::query(
                "INSERT INTO style_category_images(category_id, image_path, created_at) VALUES(?,?,?)",
            )
            .bind(id)
            .bind(path)
            .bind(&created)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::Database(format!("insert style image: {e}")))?;
            image_ids.push(res.last_insert_rowid());
        }

        tx.commit()
            .await
            .map_err(|e| AppError::Database(format!("commit tx: {e}")))?;

        let (category, mut images) = new.into_parts(id, 0);
        for (img, image_id) in images.iter_mut().zip(image_ids) {
            img.id = image_id;
        }
        Ok((category, images))
    }

    async fn list_style_categories(&self) -> Result<Vec<StyleCategory>, AppError> {
        let rows = sqlx::query(
            "SELECT id, name, description, created_at FROM style_categories
             ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("list style categories: {e}")))?;
        rows.iter()
            .map(|r| -> Result<StyleCategory, AppError> {
                let created: String = r.try_get("created_at")?;
                Ok(StyleCategory {
                    id: r.try_get("id")?,
                    name: r.try_get("name")?,
                    description: r.try_get("description")?,
                    created_at: parse_ts(&created)?,
                })
            })
            .collect()
    }

    async fn list_style_category_images(
        &self,
        category_id: i64,
    ) -> Result<Vec<StyleCategoryImage>, AppError> {
        let rows = sqlx::query(
            "SELECT id, category_id, image_path, created_at FROM style_category_images
             WHERE category_id = ? ORDER BY id",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::Database(format!("list style images {category_id}: {e}")))?;
        rows.iter()
            .map(|r| -> Result<StyleCategoryImage, AppError> {
                let created: String = r.try_get("created_at")?;
                Ok(StyleCategoryImage {
                    id: r.try_get("id")?,
                    category_id: r.try_get("category_id")?,
                    image_path: r.try_get("image_path")?,
                    created_at: parse_ts(&created)?,
                })
            })
            .collect()
    }

    async fn style_category_exists(&self, category_id: i64) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT 1 FROM style_categories WHERE id = ?")
            .bind(category_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::Database(format!("find style category {category_id}: {e}")))?;
        Ok(row.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let a = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(ts(&a), "2025-01-01T00:00:00.000000Z");
        assert!(ts(&a) < ts(&b));
        assert_eq!(parse_ts(&ts(&b)).unwrap(), b);
    }
}
