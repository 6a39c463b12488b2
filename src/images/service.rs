//! The gallery image store behind its async service interface.
//!
//! Request handlers talk to [`GalleryService`]. [`GalleryStore`] implements
//! it over any [`Connector`], running each operation on the blocking pool
//! with a collection handle acquired for that call alone.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use puzzlegallery_common::{GalleryId, ImageId, Result};
use puzzlegallery_db::collection::{Collection, Connector};
use puzzlegallery_db::pool::{init_pool_with, PoolOptions};
use puzzlegallery_db::sqlite::SqliteConnector;
use puzzlegallery_db::IMAGES_COLLECTION;

use super::model::{GalleryImage, ImageData};
use super::ops::{self, AllocationPolicy};
use crate::config::GalleryConfig;
use crate::context::{Interrupt, RequestContext};

/// Operations request handlers need from the image store.
#[async_trait]
pub trait GalleryService: Send + Sync {
    /// One page of a gallery, newest first, plus the gallery's total.
    /// `start`/`end` are offsets; see [`crate::pagination`].
    async fn get_images(
        &self,
        ctx: &RequestContext,
        gallery_id: GalleryId,
        start: u64,
        end: u64,
    ) -> Result<(u64, Vec<GalleryImage>)>;

    /// Metadata of one image; `NotFound` if it does not exist.
    async fn get_image(&self, ctx: &RequestContext, image_id: ImageId) -> Result<GalleryImage>;

    /// Payload of one image; `NotFound` if it does not exist.
    async fn get_image_data(&self, ctx: &RequestContext, image_id: ImageId) -> Result<Vec<u8>>;

    /// Create (unassigned id) or upsert an image and return its id.
    ///
    /// New ids are above the gallery's current max but may skip values
    /// already held by images of other galleries.
    ///
    /// A request cancelled or timed out mid-write fails only if nothing was
    /// committed; otherwise the committed id is returned.
    async fn update_image(
        &self,
        ctx: &RequestContext,
        gallery_id: GalleryId,
        info: GalleryImage,
        data: ImageData,
    ) -> Result<ImageId>;

    /// Delete an image. Deleting a missing image succeeds. Like
    /// `update_image`, an interrupted delete either rolls back and fails or
    /// reports success.
    async fn delete_image(&self, ctx: &RequestContext, image_id: ImageId) -> Result<()>;
}

/// Store-wide behaviour not tied to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSettings {
    /// Deadline for requests whose context carries none.
    pub request_timeout: Option<Duration>,
    pub allocation: AllocationPolicy,
}

impl StoreSettings {
    pub fn from_config(config: &GalleryConfig) -> Self {
        Self {
            request_timeout: config.store.request_timeout_secs.map(Duration::from_secs),
            allocation: AllocationPolicy {
                max_attempts: config.store.max_allocation_attempts,
                warn_every: config.store.contention_warn_after,
            },
        }
    }
}

/// Image store over a document-collection [`Connector`].
///
/// Holds no state besides the connector and settings, so clones share
/// the same backend.
pub struct GalleryStore<C: Connector = SqliteConnector> {
    connector: Arc<C>,
    settings: StoreSettings,
}

impl<C: Connector> Clone for GalleryStore<C> {
    fn clone(&self) -> Self {
        Self {
            connector: Arc::clone(&self.connector),
            settings: self.settings,
        }
    }
}

impl GalleryStore<SqliteConnector> {
    /// Open the SQLite database named by `config` and build a store on it.
    pub fn open(config: &GalleryConfig) -> Result<Self> {
        let options = PoolOptions {
            max_size: config.database.pool_size,
            connection_timeout: Duration::from_secs(config.database.connection_timeout_secs),
            busy_timeout: Duration::from_millis(config.database.busy_timeout_ms),
        };
        let path = config.database.path.to_string_lossy();
        let pool = init_pool_with(&path, options)?;

        tracing::info!(path = %path, pool_size = options.max_size, "opened gallery store");
        Ok(Self::new(
            SqliteConnector::new(pool, IMAGES_COLLECTION)?,
            StoreSettings::from_config(config),
        ))
    }
}

impl<C: Connector> GalleryStore<C> {
    pub fn new(connector: C, settings: StoreSettings) -> Self {
        Self {
            connector: Arc::new(connector),
            settings,
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    fn scoped(&self, ctx: &RequestContext) -> RequestContext {
        match (ctx.deadline(), self.settings.request_timeout) {
            (None, Some(timeout)) => ctx.clone().with_timeout(timeout),
            _ => ctx.clone(),
        }
    }
}

/// A handle whose writes roll back instead of committing once the request
/// is cancelled or past its deadline.
fn connect_for_write<C: Connector>(connector: &C, interrupt: &Interrupt) -> Result<C::Handle> {
    let mut images = connector.connect()?;
    let interrupt = interrupt.clone();
    images.set_write_guard(Box::new(move || interrupt.check()));
    Ok(images)
}

#[async_trait]
impl<C: Connector> GalleryService for GalleryStore<C> {
    async fn get_images(
        &self,
        ctx: &RequestContext,
        gallery_id: GalleryId,
        start: u64,
        end: u64,
    ) -> Result<(u64, Vec<GalleryImage>)> {
        let connector = Arc::clone(&self.connector);
        self.scoped(ctx)
            .run_blocking(move |interrupt| {
                let images = connector.connect()?;
                ops::list_images(&images, interrupt, gallery_id, start, end)
            })
            .await
    }

    async fn get_image(&self, ctx: &RequestContext, image_id: ImageId) -> Result<GalleryImage> {
        let connector = Arc::clone(&self.connector);
        self.scoped(ctx)
            .run_blocking(move |_| {
                let images = connector.connect()?;
                ops::find_image(&images, image_id)
            })
            .await
    }

    async fn get_image_data(&self, ctx: &RequestContext, image_id: ImageId) -> Result<Vec<u8>> {
        let connector = Arc::clone(&self.connector);
        self.scoped(ctx)
            .run_blocking(move |_| {
                let images = connector.connect()?;
                ops::find_image_data(&images, image_id)
            })
            .await
    }

    async fn update_image(
        &self,
        ctx: &RequestContext,
        gallery_id: GalleryId,
        info: GalleryImage,
        data: ImageData,
    ) -> Result<ImageId> {
        let connector = Arc::clone(&self.connector);
        let policy = self.settings.allocation;
        self.scoped(ctx)
            .run_to_completion(move |interrupt| {
                let images = connect_for_write(connector.as_ref(), interrupt)?;
                ops::save_image(&images, interrupt, policy, gallery_id, &info, data)
            })
            .await
    }

    async fn delete_image(&self, ctx: &RequestContext, image_id: ImageId) -> Result<()> {
        let connector = Arc::clone(&self.connector);
        self.scoped(ctx)
            .run_to_completion(move |interrupt| {
                let images = connect_for_write(connector.as_ref(), interrupt)?;
                ops::delete_image(&images, image_id)
            })
            .await
    }
}
