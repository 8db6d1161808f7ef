use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::AppError;
use crate::features::catalog::models::{Category, NewProduct, Product};
use crate::features::styling::models::{
    NewStyleCategory, NewSwipe, PreferenceSnapshot, StyleCategory, StyleCategoryImage, Swipe,
};

use super::{CatalogRepository, DEFAULT_CATEGORIES, StylingRepository};

#[derive(Default)]
struct MemoryState {
    products: BTreeMap<i64, Product>,
    next_product_id: i64,
    categories: BTreeMap<String, Category>,
    next_category_id: i64,
    swipes: Vec<Swipe>,
    preferences: Vec<PreferenceSnapshot>,
    style_categories: Vec<StyleCategory>,
    style_images: Vec<StyleCategoryImage>,
}

impl MemoryState {
    fn register_category(&mut self, name: &str, description: Option<&str>) {
        if self.categories.contains_key(name) {
            return;
        }
        self.next_category_id += 1;
        self.categories.insert(
            name.to_string(),
            Category {
                id: self.next_category_id,
                name: name.to_string(),
                description: description.map(str::to_string),
                created_at: Utc::now(),
            },
        );
    }
}

/// 进程内存存储，行为与 SQLite 实现保持一致，用于测试与无盘演示。
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        for (name, description) in DEFAULT_CATEGORIES {
            state.register_category(name, Some(*description));
        }
        Self {
            state: RwLock::new(state),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogRepository for MemoryStorage {
    async fn insert_product(&self, new: NewProduct) -> Result<Product, AppError> {
        let mut state = self.state.write().await;
        state.next_product_id += 1;
        let product = new.into_product(state.next_product_id);
        state.register_category(&product.category, None);
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn list_products(&self, category: Option<&str>) -> Result<Vec<Product>, AppError> {
        let state = self.state.read().await;
        let mut items: Vec<Product> = state
            .products
            .values()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn find_product(&self, id: i64) -> Result<Option<Product>, AppError> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn update_product(&self, product: &Product) -> Result<bool, AppError> {
        let mut state = self.state.write().await;
        let Some(slot) = state.products.get_mut(&product.id) else {
            return Ok(false);
        };
        *slot = product.clone();
        state.register_category(&product.category, None);
        Ok(true)
    }

    async fn delete_product(&self, id: i64) -> Result<u64, AppError> {
        let removed = self.state.write().await.products.remove(&id);
        Ok(u64::from(removed.is_some()))
    }

    async fn list_categories(&self) -> Result<Vec<Category>, AppError> {
        // BTreeMap 按名称有序
        Ok(self.state.read().await.categories.values().cloned().collect())
    }
}

#[async_trait]
impl StylingRepository for MemoryStorage {
    async fn insert_swipe(&self, new: NewSwipe) -> Result<Swipe, AppError> {
        let mut state = self.state.write().await;
        let swipe = new.into_swipe(state.swipes.len() as i64 + 1);
        state.swipes.push(swipe.clone());
        Ok(swipe)
    }

    async fn list_swipes(&self, user_id: &str) -> Result<Vec<Swipe>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .swipes
            .iter()
            .rev()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_preferences(&self, mut snapshot: PreferenceSnapshot) -> Result<(), AppError> {
        snapshot.created_at.get_or_insert_with(Utc::now);
        self.state.write().await.preferences.push(snapshot);
        Ok(())
    }

    async fn latest_preferences(
        &self,
        user_id: &str,
    ) -> Result<Option<PreferenceSnapshot>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .preferences
            .iter()
            .rev()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn insert_style_category(
        &self,
        new: NewStyleCategory,
    ) -> Result<(StyleCategory, Vec<StyleCategoryImage>), AppError> {
        let mut state = self.state.write().await;
        let id = state.style_categories.len() as i64 + 1;
        let first_image_id = state.style_images.len() as i64 + 1;
        let (category, images) = new.into_parts(id, first_image_id);
        state.style_categories.push(category.clone());
        state.style_images.extend(images.iter().cloned());
        Ok((category, images))
    }

    async fn list_style_categories(&self) -> Result<Vec<StyleCategory>, AppError> {
        let mut items = self.state.read().await.style_categories.clone();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn list_style_category_images(
        &self,
        category_id: i64,
    ) -> Result<Vec<StyleCategoryImage>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .style_images
            .iter()
            .filter(|img| img.category_id == category_id)
            .cloned()
            .collect())
    }

    async fn style_category_exists(&self, category_id: i64) -> Result<bool, AppError> {
        let state = self.state.read().await;
        Ok(state.style_categories.iter().any(|c| c.id == category_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(name: &str, category: &str) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            category: category.to_string(),
            price: 1.0,
            description: None,
            brand: None,
            sizes: None,
            occasion: None,
            tags: None,
            main_image: format!("{category}/{name}.png"),
            gallery_images: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_and_categories_registered() {
        let store = MemoryStorage::new();
        let a = store.insert_product(new_product("a", "shoes")).await.unwrap();
        let b = store.insert_product(new_product("b", "top")).await.unwrap();
        assert_eq!((a.id, b.id), (1, 2));

        let names: Vec<String> = store
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["bottom", "shoes", "top"]);
    }

    #[tokio::test]
    async fn style_categories_list_newest_first_with_their_images() {
        let store = MemoryStorage::new();
        let t0 = Utc::now();
        for (i, name) in ["street", "formal"].into_iter().enumerate() {
            store
                .insert_style_category(NewStyleCategory {
                    name: name.to_string(),
                    description: None,
                    image_paths: vec![format!("style/{name}-1.png"), format!("style/{name}-2.png")],
                    created_at: t0 + chrono::Duration::seconds(i as i64),
                })
                .await
                .unwrap();
        }
        let names: Vec<String> = store
            .list_style_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["formal", "street"]);

        let images = store.list_style_category_images(1).await.unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].image_path, "style/street-1.png");
        assert_eq!(store.list_style_category_images(2).await.unwrap()[0].id, 3);
        assert!(store.list_style_category_images(9).await.unwrap().is_empty());
        assert!(store.style_category_exists(2).await.unwrap());
        assert!(!store.style_category_exists(3).await.unwrap());
    }

    #[tokio::test]
    async fn delete_reports_count() {
        let store = MemoryStorage::new();
        let a = store.insert_product(new_product("a", "top")).await.unwrap();
        assert_eq!(store.delete_product(a.id).await.unwrap(), 1);
        assert_eq!(store.delete_product(a.id).await.unwrap(), 0);
        assert!(!store.update_product(&a).await.unwrap());
    }
}
