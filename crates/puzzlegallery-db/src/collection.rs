//! The document-collection capability.
//!
//! [`Connector`] hands out one [`Collection`] handle per operation. Handles
//! own their underlying connection and release it when dropped, so every
//! exit path of a caller gives the connection back.

use puzzlegallery_common::Result;

use crate::document::Document;
use crate::options::{Filter, FindOptions};

/// Check run by a handle right before a write commits. An error aborts the
/// write, rolls it back, and is returned from the write call.
pub type WriteGuard = Box<dyn Fn() -> Result<()> + Send>;

/// Result of an `update_one` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents matched by the filter (0 or 1).
    pub matched: u64,
    /// Whether a new document was inserted because nothing matched.
    pub upserted: bool,
}

/// Operations on a connected document collection.
pub trait Collection {
    /// Count documents matching `filter`, ignoring any pagination.
    fn count(&self, filter: &Filter) -> Result<u64>;

    /// Documents matching `filter`, shaped by `options`.
    fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>>;

    /// First document matching `filter` under `options`, if any.
    fn find_one(&self, filter: &Filter, options: &FindOptions) -> Result<Option<Document>> {
        let options = options.clone().limit(1);
        Ok(self.find(filter, &options)?.into_iter().next())
    }

    /// Insert a document.
    ///
    /// Fails with `Error::Conflict` when a unique key already exists.
    fn insert_one(&self, document: &Document) -> Result<()>;

    /// Set the fields of `set` on the first document matching `filter`.
    ///
    /// With `upsert`, a missing document is created from the filter's
    /// equality fields merged with `set`. Fields absent from `set` are left
    /// untouched on an existing document.
    fn update_one(&self, filter: &Filter, set: &Document, upsert: bool) -> Result<UpdateOutcome>;

    /// Delete every document matching `filter`, returning how many went.
    /// Zero is not an error.
    fn delete_many(&self, filter: &Filter) -> Result<u64>;

    /// Install a check every later write must pass before it commits.
    /// Backends without transactions may ignore it.
    fn set_write_guard(&mut self, _guard: WriteGuard) {}
}

/// Source of connected collection handles.
pub trait Connector: Send + Sync + 'static {
    type Handle: Collection;

    /// Acquire a handle. Fails with `Error::Connection` when the backend is
    /// unreachable.
    fn connect(&self) -> Result<Self::Handle>;
}
