//! Gallery image store.
//!
//! Images live in the `images` collection, one document per image with its
//! metadata and binary payload side by side. Listings and metadata reads
//! never load the payload. New images get the next id of their gallery,
//! allocated without a sequence table by retrying on unique-key conflicts.

pub mod convert;
mod model;
mod ops;
mod service;

pub use model::{validate_title, GalleryImage, ImageData, NEW_IMAGE_TITLE};
pub use ops::AllocationPolicy;
pub use service::{GalleryService, GalleryStore, StoreSettings};
