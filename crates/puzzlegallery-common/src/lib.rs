//! Puzzlegallery-Common: Shared types and error handling.
//!
//! This crate provides functionality used across puzzlegallery:
//!
//! - **Typed IDs**: `u64` newtypes for galleries, images and users
//! - **Error Handling**: Common error type and result alias
//!
//! # Examples
//!
//! ```
//! use puzzlegallery_common::{Error, GalleryId, ImageId, Result};
//!
//! let gallery_id = GalleryId::new(7);
//! assert_eq!(gallery_id.get(), 7);
//! assert!(ImageId::UNASSIGNED.is_unassigned());
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("image 42"))
//! }
//! assert!(example().unwrap_err().is_not_found());
//! ```

pub mod error;
pub mod ids;

pub use error::{Error, Result};
pub use ids::*;
