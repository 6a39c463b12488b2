//! Puzzlegallery - gallery image store
//!
//! This library crate exposes the image store, its configuration and the
//! request context handlers pass into every store call.

pub mod config;
pub mod context;
pub mod images;
pub mod pagination;
pub mod telemetry;

pub use context::{Interrupt, RequestContext};
pub use images::{GalleryImage, GalleryService, GalleryStore, ImageData};
pub use puzzlegallery_common::{Error, GalleryId, ImageId, Result, UserId};
