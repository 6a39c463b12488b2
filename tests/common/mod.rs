//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which builds a [`GalleryStore`] over either an
//! in-memory database or, for tests needing several real connections, a
//! SQLite file in a temporary directory.

#![allow(dead_code)]

use puzzlegallery::config::GalleryConfig;
use puzzlegallery::images::{GalleryImage, GalleryService, GalleryStore, ImageData, StoreSettings};
use puzzlegallery::{GalleryId, ImageId, RequestContext, UserId};
use puzzlegallery_db::collection::Connector;
use puzzlegallery_db::pool::init_memory_pool;
use puzzlegallery_db::sqlite::{SqliteCollection, SqliteConnector};
use puzzlegallery_db::IMAGES_COLLECTION;
use tempfile::TempDir;

/// Test harness wrapping a [`GalleryStore`] and a default request context.
pub struct TestHarness {
    pub store: GalleryStore,
    pub ctx: RequestContext,
    // keeps the on-disk database alive for file-backed harnesses
    _dir: Option<TempDir>,
}

impl TestHarness {
    /// Create a harness over an in-memory database.
    pub fn new() -> Self {
        let pool = init_memory_pool().expect("failed to create in-memory pool");
        let connector = SqliteConnector::new(pool, IMAGES_COLLECTION).expect("valid collection");
        Self {
            store: GalleryStore::new(connector, StoreSettings::default()),
            ctx: RequestContext::default(),
            _dir: None,
        }
    }

    /// Create a harness over a database file with `pool_size` connections,
    /// opened through the same path production uses.
    pub fn on_disk(pool_size: u32) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let mut config = GalleryConfig::default();
        config.database.path = dir.path().join("gallery.db");
        config.database.pool_size = pool_size;

        Self {
            store: GalleryStore::open(&config).expect("failed to open store"),
            ctx: RequestContext::default(),
            _dir: Some(dir),
        }
    }

    /// A raw collection handle, for arranging data the store cannot write.
    pub fn collection(&self) -> SqliteCollection {
        self.store.connector().connect().expect("failed to connect")
    }

    /// Create an image through the store and return its id.
    pub async fn create_image(&self, gallery: u64, title: &str, payload: &[u8]) -> ImageId {
        self.store
            .update_image(
                &self.ctx,
                GalleryId::new(gallery),
                new_image(title),
                ImageData::Replace(payload.to_vec()),
            )
            .await
            .expect("failed to create image")
    }
}

/// An unsaved image owned by user 1.
pub fn new_image(title: &str) -> GalleryImage {
    GalleryImage {
        user_id: UserId::new(1),
        title: title.to_string(),
        desc: format!("{title} description"),
        ..GalleryImage::default()
    }
}
