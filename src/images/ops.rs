//! Store operations against a connected image collection.
//!
//! These run on the blocking pool with one collection handle each. The
//! async [`GalleryStore`](super::GalleryStore) acquires the handle and hands
//! it in here.

use puzzlegallery_common::{Error, GalleryId, ImageId, Result};
use puzzlegallery_db::collection::Collection;
use puzzlegallery_db::document::{Document, Value};
use puzzlegallery_db::options::{Filter, FindOptions, Projection, Sort};

use super::convert::{self, fields};
use super::model::{GalleryImage, ImageData};
use crate::context::Interrupt;

/// How hard id allocation tries before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationPolicy {
    /// Attempts before failing with `Conflict`; `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Log a warning every this many lost races (0 disables).
    pub warn_every: u32,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: None,
            warn_every: 8,
        }
    }
}

fn image_filter(image_id: ImageId) -> Result<Filter> {
    Ok(Filter::eq(fields::IMAGE_ID, Value::from_u64(image_id.get())?))
}

fn gallery_filter(gallery_id: GalleryId) -> Result<Filter> {
    Ok(Filter::eq(fields::GALLERY_ID, Value::from_u64(gallery_id.get())?))
}

fn without_payload() -> Projection {
    Projection::exclude([fields::IMAGE_DATA])
}

/// One page of a gallery, newest id first, plus the gallery's total.
///
/// `start` and `end` are offsets into the sorted listing; a window with
/// `end <= start` is empty.
pub(crate) fn list_images<C: Collection>(
    images: &C,
    interrupt: &Interrupt,
    gallery_id: GalleryId,
    start: u64,
    end: u64,
) -> Result<(u64, Vec<GalleryImage>)> {
    let filter = gallery_filter(gallery_id)?;

    let total = images.count(&filter)?;
    interrupt.check()?;

    let options = FindOptions::new()
        .projection(without_payload())
        .sort(Sort::descending(fields::IMAGE_ID))
        .skip(start)
        .limit(end.saturating_sub(start));
    let docs = images.find(&filter, &options)?;

    tracing::debug!(%gallery_id, start, end, total, returned = docs.len(), "listed gallery images");
    Ok((total, docs.iter().map(convert::to_image).collect()))
}

/// Metadata of one image.
pub(crate) fn find_image<C: Collection>(images: &C, image_id: ImageId) -> Result<GalleryImage> {
    let options = FindOptions::new().projection(without_payload());
    images
        .find_one(&image_filter(image_id)?, &options)?
        .map(|doc| convert::to_image(&doc))
        .ok_or_else(|| Error::not_found(format!("image {image_id}")))
}

/// Payload of one image, exactly as stored. A record without payload
/// yields an empty vector.
pub(crate) fn find_image_data<C: Collection>(images: &C, image_id: ImageId) -> Result<Vec<u8>> {
    let options = FindOptions::new().projection(Projection::include([fields::IMAGE_DATA]));
    images
        .find_one(&image_filter(image_id)?, &options)?
        .map(|doc| convert::extract_bytes(doc.get(fields::IMAGE_DATA)))
        .ok_or_else(|| Error::not_found(format!("image {image_id}")))
}

/// Create or upsert an image, returning its id.
///
/// An unassigned `info.image_id` allocates a new id in `gallery_id`;
/// otherwise the record at `info.image_id` is created or overwritten.
pub(crate) fn save_image<C: Collection>(
    images: &C,
    interrupt: &Interrupt,
    policy: AllocationPolicy,
    gallery_id: GalleryId,
    info: &GalleryImage,
    data: ImageData,
) -> Result<ImageId> {
    let record = convert::to_document(gallery_id, info, data)?;

    if info.image_id.is_unassigned() {
        return create_image(images, interrupt, policy, gallery_id, record);
    }

    let outcome = images.update_one(&image_filter(info.image_id)?, &record, true)?;
    tracing::debug!(
        image_id = %info.image_id,
        %gallery_id,
        upserted = outcome.upserted,
        "saved image"
    );
    Ok(info.image_id)
}

/// Allocate the next id of `gallery_id` and insert `record` under it.
///
/// The max-then-insert pair is racy; the unique index on `imageId` turns a
/// lost race into `Conflict`, and the loop re-reads the max before every new
/// candidate. A candidate is always above the last one that conflicted, so
/// an id held by another gallery cannot stall the loop.
fn create_image<C: Collection>(
    images: &C,
    interrupt: &Interrupt,
    policy: AllocationPolicy,
    gallery_id: GalleryId,
    mut record: Document,
) -> Result<ImageId> {
    let filter = gallery_filter(gallery_id)?;
    let max_id = FindOptions::new()
        .projection(Projection::include([fields::IMAGE_ID]))
        .sort(Sort::descending(fields::IMAGE_ID));

    let mut attempts: u32 = 0;
    let mut lost = ImageId::UNASSIGNED;
    loop {
        interrupt.check()?;
        attempts += 1;

        let fresh = match images.find_one(&filter, &max_id)? {
            Some(doc) => ImageId::new(convert::extract_u64(doc.get(fields::IMAGE_ID))).next(),
            None => ImageId::new(1),
        };
        let candidate = fresh.max(lost.next());
        record.insert(fields::IMAGE_ID, Value::from_u64(candidate.get())?);

        interrupt.check()?;

        match images.insert_one(&record) {
            Ok(()) => {
                tracing::info!(image_id = %candidate, %gallery_id, attempts, "created image");
                return Ok(candidate);
            }
            Err(e) if e.is_conflict() => {
                lost = candidate;
                if policy.max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(Error::conflict(format!(
                        "no free image id in gallery {gallery_id} after {attempts} attempts"
                    )));
                }
                if policy.warn_every > 0 && attempts % policy.warn_every == 0 {
                    tracing::warn!(%gallery_id, attempts, "heavy contention allocating image id");
                } else {
                    tracing::debug!(%gallery_id, candidate = %candidate, attempts, "image id taken, retrying");
                }
            }
            Err(e) => return Err(e),
        }
    }
}

/// Delete every record with `image_id`. Deleting nothing is fine.
pub(crate) fn delete_image<C: Collection>(images: &C, image_id: ImageId) -> Result<()> {
    let deleted = images.delete_many(&image_filter(image_id)?)?;
    if deleted > 0 {
        tracing::info!(%image_id, deleted, "deleted image");
    } else {
        tracing::debug!(%image_id, "delete matched nothing");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use puzzlegallery_common::UserId;
    use puzzlegallery_db::collection::{Connector, UpdateOutcome};
    use puzzlegallery_db::pool::init_memory_pool;
    use puzzlegallery_db::sqlite::{SqliteCollection, SqliteConnector};
    use puzzlegallery_db::IMAGES_COLLECTION;

    use crate::context::RequestContext;

    fn collection() -> SqliteCollection {
        let pool = init_memory_pool().unwrap();
        SqliteConnector::new(pool, IMAGES_COLLECTION)
            .unwrap()
            .connect()
            .unwrap()
    }

    fn info(title: &str) -> GalleryImage {
        GalleryImage {
            user_id: UserId::new(7),
            title: title.to_string(),
            ..GalleryImage::default()
        }
    }

    fn create(images: &impl Collection, gallery: u64, title: &str) -> ImageId {
        save_image(
            images,
            &Interrupt::none(),
            AllocationPolicy::default(),
            GalleryId::new(gallery),
            &info(title),
            ImageData::Replace(title.as_bytes().to_vec()),
        )
        .unwrap()
    }

    /// Lets a rival writer take the candidate id right before each of the
    /// first `rivals` inserts, and counts what the allocator does.
    struct Contended<C> {
        inner: C,
        rivals: Cell<u32>,
        inserts: Cell<u32>,
        max_reads: Cell<u32>,
        on_conflict: Option<Box<dyn Fn()>>,
    }

    impl<C> Contended<C> {
        fn new(inner: C, rivals: u32) -> Self {
            Self {
                inner,
                rivals: Cell::new(rivals),
                inserts: Cell::new(0),
                max_reads: Cell::new(0),
                on_conflict: None,
            }
        }
    }

    impl<C: Collection> Collection for Contended<C> {
        fn count(&self, filter: &Filter) -> Result<u64> {
            self.inner.count(filter)
        }

        fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>> {
            if options.projection == Projection::include([fields::IMAGE_ID]) {
                self.max_reads.set(self.max_reads.get() + 1);
            }
            self.inner.find(filter, options)
        }

        fn insert_one(&self, document: &Document) -> Result<()> {
            self.inserts.set(self.inserts.get() + 1);
            if self.rivals.get() > 0 {
                self.rivals.set(self.rivals.get() - 1);
                let rival = Document::new()
                    .with(fields::IMAGE_ID, document.get(fields::IMAGE_ID).cloned().unwrap())
                    .with(fields::GALLERY_ID, document.get(fields::GALLERY_ID).cloned().unwrap())
                    .with(fields::TITLE, "rival");
                self.inner.insert_one(&rival)?;
            }
            let result = self.inner.insert_one(document);
            if let (Err(e), Some(hook)) = (&result, &self.on_conflict) {
                if e.is_conflict() {
                    hook();
                }
            }
            result
        }

        fn update_one(&self, filter: &Filter, set: &Document, upsert: bool) -> Result<UpdateOutcome> {
            self.inner.update_one(filter, set, upsert)
        }

        fn delete_many(&self, filter: &Filter) -> Result<u64> {
            self.inner.delete_many(filter)
        }
    }

    /// Every insert fails with a non-conflict error.
    struct BrokenInserts<C> {
        inner: C,
        inserts: Cell<u32>,
    }

    impl<C: Collection> Collection for BrokenInserts<C> {
        fn count(&self, filter: &Filter) -> Result<u64> {
            self.inner.count(filter)
        }

        fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>> {
            self.inner.find(filter, options)
        }

        fn insert_one(&self, _document: &Document) -> Result<()> {
            self.inserts.set(self.inserts.get() + 1);
            Err(Error::database("disk I/O error"))
        }

        fn update_one(&self, filter: &Filter, set: &Document, upsert: bool) -> Result<UpdateOutcome> {
            self.inner.update_one(filter, set, upsert)
        }

        fn delete_many(&self, filter: &Filter) -> Result<u64> {
            self.inner.delete_many(filter)
        }
    }

    /// Reads fail on demand with a storage error.
    struct BrokenReads<C> {
        inner: C,
        fail_count: bool,
        fail_find: bool,
    }

    impl<C> BrokenReads<C> {
        fn new(inner: C, fail_count: bool, fail_find: bool) -> Self {
            Self {
                inner,
                fail_count,
                fail_find,
            }
        }
    }

    impl<C: Collection> Collection for BrokenReads<C> {
        fn count(&self, filter: &Filter) -> Result<u64> {
            if self.fail_count {
                return Err(Error::database("count failed"));
            }
            self.inner.count(filter)
        }

        fn find(&self, filter: &Filter, options: &FindOptions) -> Result<Vec<Document>> {
            if self.fail_find {
                return Err(Error::database("find failed"));
            }
            self.inner.find(filter, options)
        }

        fn insert_one(&self, document: &Document) -> Result<()> {
            self.inner.insert_one(document)
        }

        fn update_one(&self, filter: &Filter, set: &Document, upsert: bool) -> Result<UpdateOutcome> {
            self.inner.update_one(filter, set, upsert)
        }

        fn delete_many(&self, filter: &Filter) -> Result<u64> {
            self.inner.delete_many(filter)
        }
    }

    #[test]
    fn test_list_images_count_failure_is_an_error() {
        let inner = collection();
        create(&inner, 1, "a");
        let images = BrokenReads::new(inner, true, false);

        let err = list_images(&images, &Interrupt::none(), GalleryId::new(1), 0, 10).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[test]
    fn test_list_images_fetch_failure_is_an_error() {
        let inner = collection();
        create(&inner, 1, "a");
        let images = BrokenReads::new(inner, false, true);

        let err = list_images(&images, &Interrupt::none(), GalleryId::new(1), 0, 10).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[test]
    fn test_lookup_failure_is_not_not_found() {
        let inner = collection();
        let id = create(&inner, 1, "a");
        let images = BrokenReads::new(inner, false, true);

        let err = find_image(&images, id).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_not_found());

        let err = find_image_data(&images, id).unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_first_image_of_gallery_gets_id_one() {
        let images = collection();
        assert_eq!(create(&images, 1, "a"), ImageId::new(1));
    }

    #[test]
    fn test_allocation_is_sequential_per_gallery() {
        let images = collection();
        assert_eq!(create(&images, 1, "a"), ImageId::new(1));
        assert_eq!(create(&images, 1, "b"), ImageId::new(2));
        assert_eq!(create(&images, 1, "c"), ImageId::new(3));
    }

    #[test]
    fn test_allocation_skips_ids_taken_by_other_galleries() {
        let images = collection();
        // gallery 2 owns id 1, so gallery 1's first candidate collides
        assert_eq!(create(&images, 2, "other"), ImageId::new(1));
        let id = create(&images, 1, "mine");
        assert_eq!(id, ImageId::new(2));
        assert_eq!(find_image(&images, id).unwrap().gallery_id, GalleryId::new(1));
    }

    #[test]
    fn test_lost_races_are_retried_with_fresh_max() {
        let images = Contended::new(collection(), 0);
        create(&images, 1, "seed");
        images.rivals.set(3);
        images.inserts.set(0);
        images.max_reads.set(0);

        // seed holds 1, rivals take 2, 3 and 4
        let id = create(&images, 1, "winner");
        assert_eq!(id, ImageId::new(5));
        assert_eq!(images.inserts.get(), 4);
        assert_eq!(images.max_reads.get(), 4);
    }

    #[test]
    fn test_allocation_cap_surfaces_conflict() {
        let images = Contended::new(collection(), 10);
        let policy = AllocationPolicy {
            max_attempts: Some(3),
            warn_every: 0,
        };

        let err = save_image(
            &images,
            &Interrupt::none(),
            policy,
            GalleryId::new(1),
            &info("capped"),
            ImageData::Unchanged,
        )
        .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(images.inserts.get(), 3);
    }

    #[test]
    fn test_other_insert_errors_are_not_retried() {
        let images = BrokenInserts {
            inner: collection(),
            inserts: Cell::new(0),
        };

        let err = save_image(
            &images,
            &Interrupt::none(),
            AllocationPolicy::default(),
            GalleryId::new(1),
            &info("doomed"),
            ImageData::Unchanged,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
        assert_eq!(images.inserts.get(), 1);
    }

    #[test]
    fn test_cancellation_stops_retrying() {
        let ctx = RequestContext::default();
        let token = ctx.cancellation_token().clone();
        let mut images = Contended::new(collection(), u32::MAX);
        images.on_conflict = Some(Box::new(move || token.cancel()));

        let err = save_image(
            &images,
            &ctx.interrupt(),
            AllocationPolicy::default(),
            GalleryId::new(1),
            &info("cancelled"),
            ImageData::Unchanged,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(images.inserts.get(), 1);
    }

    #[test]
    fn test_update_path_keeps_id_and_payload() {
        let images = collection();
        let id = create(&images, 1, "before");

        let mut changed = info("after");
        changed.image_id = id;
        changed.desc = "edited".into();
        let saved = save_image(
            &images,
            &Interrupt::none(),
            AllocationPolicy::default(),
            GalleryId::new(1),
            &changed,
            ImageData::Unchanged,
        )
        .unwrap();
        assert_eq!(saved, id);

        let image = find_image(&images, id).unwrap();
        assert_eq!(image.title, "after");
        assert_eq!(image.desc, "edited");
        assert_eq!(find_image_data(&images, id).unwrap(), b"before".to_vec());
    }

    #[test]
    fn test_update_path_creates_missing_record() {
        let images = collection();
        let mut orphan = info("orphan");
        orphan.image_id = ImageId::new(77);

        let saved = save_image(
            &images,
            &Interrupt::none(),
            AllocationPolicy::default(),
            GalleryId::new(5),
            &orphan,
            ImageData::Unchanged,
        )
        .unwrap();
        assert_eq!(saved, ImageId::new(77));

        let image = find_image(&images, saved).unwrap();
        assert_eq!(image.gallery_id, GalleryId::new(5));
        assert!(find_image_data(&images, saved).unwrap().is_empty());
    }

    #[test]
    fn test_list_images_window_and_total() {
        let images = collection();
        for n in 0..10 {
            create(&images, 1, &format!("img{n}"));
        }
        create(&images, 2, "elsewhere");

        let (total, page) = list_images(&images, &Interrupt::none(), GalleryId::new(1), 2, 5).unwrap();
        assert_eq!(total, 10);
        let ids: Vec<u64> = page.iter().map(|i| i.image_id.get()).collect();
        assert_eq!(ids, vec![8, 7, 6]);
    }

    #[test]
    fn test_list_images_inverted_window_is_empty() {
        let images = collection();
        create(&images, 1, "only");

        let (total, page) = list_images(&images, &Interrupt::none(), GalleryId::new(1), 5, 2).unwrap();
        assert_eq!(total, 1);
        assert!(page.is_empty());
    }

    #[test]
    fn test_find_missing_image_is_not_found() {
        let images = collection();
        assert!(find_image(&images, ImageId::new(3)).unwrap_err().is_not_found());
        assert!(find_image_data(&images, ImageId::new(3)).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let images = collection();
        let id = create(&images, 1, "gone");

        delete_image(&images, id).unwrap();
        delete_image(&images, id).unwrap();
        assert!(find_image(&images, id).unwrap_err().is_not_found());
    }
}
