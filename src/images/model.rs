//! Gallery image records as seen by callers.

use puzzlegallery_common::{Error, GalleryId, ImageId, Result, UserId};
use serde::{Deserialize, Serialize};

/// Title the creation form starts with; never a valid stored title.
pub const NEW_IMAGE_TITLE: &str = "new";

/// Metadata of a stored image. The payload is never part of it.
///
/// Serializes with the PascalCase keys the gallery templates use
/// (`ImageId`, `GalleryId`, `UserId`, `Title`, `Desc`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GalleryImage {
    /// `ImageId::UNASSIGNED` until the store allocates one.
    pub image_id: ImageId,
    pub gallery_id: GalleryId,
    pub user_id: UserId,
    pub title: String,
    #[serde(default)]
    pub desc: String,
}

impl GalleryImage {
    /// The blank record a creation form is filled from.
    pub fn placeholder() -> Self {
        Self {
            title: NEW_IMAGE_TITLE.to_string(),
            ..Self::default()
        }
    }
}

/// Payload part of an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImageData {
    /// Leave whatever payload is stored untouched.
    #[default]
    Unchanged,
    /// Store these bytes, even if empty.
    Replace(Vec<u8>),
}

impl ImageData {
    /// Map an uploaded file to a payload change: an empty upload means the
    /// user did not pick a file, so nothing changes.
    pub fn from_upload(bytes: Vec<u8>) -> Self {
        if bytes.is_empty() {
            Self::Unchanged
        } else {
            Self::Replace(bytes)
        }
    }
}

/// Reject titles a save must not accept: empty, or the untouched
/// placeholder of the creation form.
///
/// The store itself does not call this; request handlers do before saving.
pub fn validate_title(title: &str) -> Result<()> {
    if title.is_empty() || title == NEW_IMAGE_TITLE {
        return Err(Error::invalid_input(format!("bad image title: {title:?}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_is_unassigned_new() {
        let image = GalleryImage::placeholder();
        assert!(image.image_id.is_unassigned());
        assert_eq!(image.title, NEW_IMAGE_TITLE);
        assert!(image.desc.is_empty());
    }

    #[test]
    fn test_validate_title() {
        assert!(validate_title("Sunset over the bay").is_ok());
        assert!(validate_title("New").is_ok());
        assert!(matches!(validate_title(""), Err(Error::InvalidInput(_))));
        assert!(matches!(validate_title("new"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_image_data_from_upload() {
        assert_eq!(ImageData::from_upload(Vec::new()), ImageData::Unchanged);
        assert_eq!(
            ImageData::from_upload(vec![0xFF, 0xD8]),
            ImageData::Replace(vec![0xFF, 0xD8])
        );
    }

    #[test]
    fn test_serializes_with_template_keys() {
        let image = GalleryImage {
            image_id: ImageId::new(3),
            gallery_id: GalleryId::new(1),
            user_id: UserId::new(9),
            title: "Cat".into(),
            desc: "on a mat".into(),
        };

        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ImageId": 3,
                "GalleryId": 1,
                "UserId": 9,
                "Title": "Cat",
                "Desc": "on a mat",
            })
        );
    }

    #[test]
    fn test_deserializes_without_desc() {
        let image: GalleryImage = serde_json::from_str(
            r#"{"ImageId": 0, "GalleryId": 2, "UserId": 4, "Title": "Dog"}"#,
        )
        .unwrap();
        assert_eq!(image.title, "Dog");
        assert!(image.desc.is_empty());
    }
}
