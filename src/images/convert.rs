//! Conversion between stored documents and [`GalleryImage`].
//!
//! Reads are lossy on malformed legacy data: a field that is missing or
//! stored with an unexpected type decodes to its zero value instead of
//! failing the read, so one bad record never breaks a whole listing.

use puzzlegallery_common::{GalleryId, ImageId, Result, UserId};
use puzzlegallery_db::document::{Document, Value};

use super::model::{GalleryImage, ImageData};

/// Stored field names.
pub mod fields {
    pub const GALLERY_ID: &str = "galleryId";
    pub const IMAGE_ID: &str = "imageId";
    pub const USER_ID: &str = "userId";
    pub const TITLE: &str = "title";
    pub const DESC: &str = "desc";
    pub const IMAGE_DATA: &str = "imageData";
}

/// Decode an unsigned number from whatever numeric shape was stored.
///
/// Integers, finite non-negative reals (truncated) and numeric text are
/// accepted; negatives and anything else decode to 0.
pub fn extract_u64(value: Option<&Value>) -> u64 {
    match value {
        Some(Value::Integer(i)) => u64::try_from(*i).unwrap_or(0),
        Some(Value::Real(f)) if f.is_finite() && *f >= 0.0 => *f as u64,
        Some(Value::Text(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Decode text, defaulting to empty.
pub fn extract_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::Text(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Decode a payload. Text is taken as its UTF-8 bytes; anything else,
/// including an absent payload, is empty.
pub fn extract_bytes(value: Option<&Value>) -> Vec<u8> {
    match value {
        Some(Value::Blob(b)) => b.clone(),
        Some(Value::Text(s)) => s.as_bytes().to_vec(),
        _ => Vec::new(),
    }
}

/// Build a [`GalleryImage`] from a stored document. Never fails.
pub fn to_image(doc: &Document) -> GalleryImage {
    GalleryImage {
        image_id: ImageId::new(extract_u64(doc.get(fields::IMAGE_ID))),
        gallery_id: GalleryId::new(extract_u64(doc.get(fields::GALLERY_ID))),
        user_id: UserId::new(extract_u64(doc.get(fields::USER_ID))),
        title: extract_string(doc.get(fields::TITLE)),
        desc: extract_string(doc.get(fields::DESC)),
    }
}

/// Fields written by every save: gallery, user, title and description,
/// plus the payload only when it is replaced. The image id is left to the
/// caller since create and update address it differently.
pub fn to_document(gallery_id: GalleryId, info: &GalleryImage, data: ImageData) -> Result<Document> {
    let mut doc = Document::new()
        .with(fields::GALLERY_ID, Value::from_u64(gallery_id.get())?)
        .with(fields::USER_ID, Value::from_u64(info.user_id.get())?)
        .with(fields::TITLE, info.title.as_str())
        .with(fields::DESC, info.desc.as_str());
    if let ImageData::Replace(bytes) = data {
        doc.insert(fields::IMAGE_DATA, bytes);
    }
    Ok(doc)
}
