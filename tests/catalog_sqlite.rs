use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde_json::json;
use tempfile::TempDir;

use fashion_backend::config::{StorageBackend, StorageConfig};
use fashion_backend::features::catalog::models::{NewProduct, ProductFields};
use fashion_backend::features::catalog::{
    CatalogService, ImageUpload, LocalAssetStore, UploadPolicy,
};
use fashion_backend::features::styling::models::{NewStyleCategory, NewSwipe, PreferenceSnapshot};
use fashion_backend::storage::{Repositories, SqliteStorage};

async fn open_repos(dir: &TempDir) -> Repositories {
    let cfg = StorageConfig {
        backend: StorageBackend::Sqlite,
        sqlite_path: dir.path().join("db/catalog.db").to_string_lossy().to_string(),
        sqlite_wal: true,
    };
    Repositories::open(&cfg).await.unwrap()
}

fn new_product(name: &str, category: &str, gallery: &[&str]) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        category: category.to_string(),
        price: 10.0,
        description: Some("desc".into()),
        brand: None,
        sizes: Some("S,M".into()),
        occasion: None,
        tags: None,
        main_image: format!("{category}/{name}-main.png"),
        gallery_images: gallery.iter().map(|s| s.to_string()).collect(),
        created_at: Utc::now().trunc_subsecs(6),
    }
}

#[tokio::test]
async fn sqlite_round_trips_product_with_ordered_gallery() {
    let dir = TempDir::new().unwrap();
    let repos = open_repos(&dir).await;

    let inserted = repos
        .catalog
        .insert_product(new_product("a", "top", &["top/g2.png", "top/g1.png", "top/g3.png"]))
        .await
        .unwrap();
    let found = repos.catalog.find_product(inserted.id).await.unwrap().unwrap();

    assert_eq!(found, inserted);
    assert_eq!(found.gallery_images, vec!["top/g2.png", "top/g1.png", "top/g3.png"]);
    assert!(repos.catalog.find_product(inserted.id + 100).await.unwrap().is_none());
    repos.close().await;
}

#[tokio::test]
async fn sqlite_update_replaces_gallery_and_delete_cascades() {
    let dir = TempDir::new().unwrap();
    let repos = open_repos(&dir).await;

    let mut product = repos
        .catalog
        .insert_product(new_product("a", "top", &["top/g1.png"]))
        .await
        .unwrap();
    product.name = "renamed".into();
    product.category = "outer".into();
    product.gallery_images = vec!["outer/x.png".into(), "outer/y.png".into()];
    product.updated_at = product.updated_at + chrono::Duration::microseconds(5);

    assert!(repos.catalog.update_product(&product).await.unwrap());
    let found = repos.catalog.find_product(product.id).await.unwrap().unwrap();
    assert_eq!(found, product);

    let categories: Vec<String> = repos
        .catalog
        .list_categories()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(categories, vec!["bottom", "outer", "top"]);

    assert_eq!(repos.catalog.delete_product(product.id).await.unwrap(), 1);
    assert_eq!(repos.catalog.delete_product(product.id).await.unwrap(), 0);
    assert!(!repos.catalog.update_product(&product).await.unwrap());

    let SqliteStorage { pool } = SqliteStorage::connect_sqlite(
        &dir.path().join("db/catalog.db").to_string_lossy(),
        true,
    )
    .await
    .unwrap();
    let orphans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_gallery")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orphans, 0);
    pool.close().await;
    repos.close().await;
}

#[tokio::test]
async fn sqlite_lists_newest_first_with_category_filter() {
    let dir = TempDir::new().unwrap();
    let repos = open_repos(&dir).await;
    for (name, category) in [("A", "bottom"), ("B", "top"), ("C", "top")] {
        repos
            .catalog
            .insert_product(new_product(name, category, &[]))
            .await
            .unwrap();
    }

    let tops: Vec<String> = repos
        .catalog
        .list_products(Some("top"))
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(tops, vec!["C", "B"]);
    assert_eq!(repos.catalog.list_products(None).await.unwrap().len(), 3);
    repos.close().await;
}

#[tokio::test]
async fn sqlite_reopen_keeps_data_and_seeds_categories_once() {
    let dir = TempDir::new().unwrap();
    let repos = open_repos(&dir).await;
    let inserted = repos
        .catalog
        .insert_product(new_product("a", "top", &[]))
        .await
        .unwrap();
    repos.close().await;

    let reopened = open_repos(&dir).await;
    assert_eq!(
        reopened.catalog.find_product(inserted.id).await.unwrap(),
        Some(inserted)
    );
    assert_eq!(reopened.catalog.list_categories().await.unwrap().len(), 2);
    reopened.close().await;
}

#[tokio::test]
async fn sqlite_styling_log_and_latest_preferences() {
    let dir = TempDir::new().unwrap();
    let repos = open_repos(&dir).await;

    for action in ["like", "dislike"] {
        repos
            .styling
            .insert_swipe(NewSwipe {
                user_id: "u1".into(),
                category_id: Some(1),
                image_path: "top/a.png".into(),
                action: action.into(),
                created_at: Utc::now().trunc_subsecs(6),
            })
            .await
            .unwrap();
    }
    let swipes = repos.styling.list_swipes("u1").await.unwrap();
    assert_eq!(swipes.len(), 2);
    assert_eq!(swipes[0].action, "dislike");
    assert!(repos.styling.list_swipes("u2").await.unwrap().is_empty());

    assert!(repos.styling.latest_preferences("u1").await.unwrap().is_none());
    for fit in ["slim", "relaxed"] {
        repos
            .styling
            .insert_preferences(PreferenceSnapshot {
                user_id: "u1".into(),
                preferences: json!({ "fit": fit }),
                created_at: Some(Utc::now().trunc_subsecs(6)),
            })
            .await
            .unwrap();
    }
    let latest = repos.styling.latest_preferences("u1").await.unwrap().unwrap();
    assert_eq!(latest.preferences, json!({ "fit": "relaxed" }));
    repos.close().await;
}

#[tokio::test]
async fn catalog_service_on_sqlite_replaces_main_image() {
    let dir = TempDir::new().unwrap();
    let repos = open_repos(&dir).await;
    let uploads = dir.path().join("uploads");
    let service = CatalogService::new(
        repos.catalog.clone(),
        Arc::new(LocalAssetStore::new(&uploads)),
        UploadPolicy::default(),
    );
    let png = |name: &str| ImageUpload::new("mainImage", name, Some("image/png"), b"png".to_vec());

    let created = service
        .create_product(
            ProductFields {
                name: Some("Tee".into()),
                category: Some("top".into()),
                ..ProductFields::default()
            },
            Some(png("a.png")),
            vec![],
        )
        .await
        .unwrap();
    assert_eq!(created.price, 0.0);

    let updated = service
        .update_product(created.id, ProductFields::default(), Some(png("b.png")), None)
        .await
        .unwrap();
    assert!(updated.updated_at > created.updated_at);
    assert!(uploads.join(&updated.main_image).is_file());
    assert!(!uploads.join(&created.main_image).exists());
    assert_eq!(service.get_product(created.id).await.unwrap(), updated);
    repos.close().await;
}

#[tokio::test]
async fn sqlite_style_categories_keep_images_and_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let repos = open_repos(&dir).await;
    let t0 = Utc::now().trunc_subsecs(6);

    let (street, street_images) = repos
        .styling
        .insert_style_category(NewStyleCategory {
            name: "Street".into(),
            description: Some("oversized".into()),
            image_paths: vec!["style-categories/a.png".into(), "style-categories/b.png".into()],
            created_at: t0,
        })
        .await
        .unwrap();
    let (formal, _) = repos
        .styling
        .insert_style_category(NewStyleCategory {
            name: "Formal".into(),
            description: None,
            image_paths: vec!["style-categories/c.png".into()],
            created_at: t0 + chrono::Duration::seconds(1),
        })
        .await
        .unwrap();
    assert_eq!(street_images.len(), 2);
    assert!(street_images.iter().all(|img| img.category_id == street.id));
    repos.close().await;

    let repos = open_repos(&dir).await;
    let listed = repos.styling.list_style_categories().await.unwrap();
    assert_eq!(listed, vec![formal.clone(), street.clone()]);
    assert_eq!(
        repos.styling.list_style_category_images(street.id).await.unwrap(),
        street_images
    );
    assert!(repos.styling.list_style_category_images(formal.id + 10).await.unwrap().is_empty());
    assert!(repos.styling.style_category_exists(formal.id).await.unwrap());
    assert!(!repos.styling.style_category_exists(formal.id + 10).await.unwrap());
    repos.close().await;
}
