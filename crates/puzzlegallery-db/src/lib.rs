//! Puzzlegallery-DB: Document collections, SQLite backend and migrations
//!
//! This crate provides the storage capability the gallery store drives: a
//! small document-collection interface (filter, projection, sort,
//! skip/limit, insert with duplicate-key detection, upsert, delete) and its
//! SQLite implementation over an r2d2 connection pool.
//!
//! # Modules
//!
//! - `document` - Field values and documents
//! - `options` - Filters, projections, sorting and pagination options
//! - `collection` - The `Collection` and `Connector` traits
//! - `sqlite` - SQLite-backed collections
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//!
//! # Example
//!
//! ```
//! use puzzlegallery_db::collection::{Collection, Connector};
//! use puzzlegallery_db::document::Document;
//! use puzzlegallery_db::options::Filter;
//! use puzzlegallery_db::pool::init_memory_pool;
//! use puzzlegallery_db::sqlite::SqliteConnector;
//! use puzzlegallery_db::IMAGES_COLLECTION;
//!
//! let pool = init_memory_pool().unwrap();
//! let connector = SqliteConnector::new(pool, IMAGES_COLLECTION).unwrap();
//! let images = connector.connect().unwrap();
//!
//! let doc = Document::new().with("imageId", 1).with("galleryId", 3);
//! images.insert_one(&doc).unwrap();
//! assert_eq!(images.count(&Filter::eq("galleryId", 3)).unwrap(), 1);
//! ```

pub mod collection;
pub mod document;
pub mod migrations;
pub mod options;
pub mod pool;
pub mod sqlite;

/// Name of the collection holding gallery images.
pub const IMAGES_COLLECTION: &str = "images";
