//! Typed ID wrappers for type safety across puzzlegallery.
//!
//! Galleries, images and users are all addressed by plain `u64` values in
//! storage. These newtypes keep an image id from being passed where a
//! gallery id is expected.

use serde::{Deserialize, Serialize};

macro_rules! u64_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// Wrap a raw identifier.
            #[must_use]
            pub const fn new(id: u64) -> Self {
                Self(id)
            }

            /// The raw identifier.
            #[must_use]
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                s.parse::<u64>().map(Self)
            }
        }
    };
}

u64_id!(
    /// Identifier of a gallery. Scopes listings and image id allocation.
    GalleryId
);

u64_id!(
    /// Identifier of an image, unique across the whole store.
    ImageId
);

u64_id!(
    /// Identifier of the user who uploaded an image.
    UserId
);

impl ImageId {
    /// Placeholder id of an image that has not been stored yet.
    pub const UNASSIGNED: Self = Self(0);

    /// Whether this id still has to be allocated.
    #[must_use]
    pub const fn is_unassigned(self) -> bool {
        self.0 == 0
    }

    /// The id following this one in a gallery's allocation sequence.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}
