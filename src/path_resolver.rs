use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

use crate::thumbnail_types::ThumbnailFormat;

pub const ORIGINALS_DIR: &str = "originals";
pub const THUMBNAILS_DIR: &str = "thumbnails";
pub const ORIGINAL_EXTENSION: &str = "jpg";

/// On-disk arrangement of originals and thumbnails below the storage root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageLayout {
    /// `<root>/originals/<id>.jpg` and `<root>/thumbnails/<id>.<ext>`
    #[default]
    Nested,
    /// `<root>/<id>.jpg` and `<root>/<id>.thumb.<ext>`
    Flat,
}

impl StorageLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageLayout::Nested => "nested",
            StorageLayout::Flat => "flat",
        }
    }
}

impl FromStr for StorageLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nested" => Ok(StorageLayout::Nested),
            "flat" => Ok(StorageLayout::Flat),
            other => Err(format!("unknown storage layout '{}'", other)),
        }
    }
}

impl fmt::Display for StorageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps photo ids to file locations. Holds no state besides configuration, so
/// every path is a pure function of `(root, layout, format, id)`.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
    layout: StorageLayout,
    thumbnail_format: ThumbnailFormat,
}

impl PathResolver {
    pub fn new(
        root: impl Into<PathBuf>,
        layout: StorageLayout,
        thumbnail_format: ThumbnailFormat,
    ) -> Self {
        Self {
            root: root.into(),
            layout,
            thumbnail_format,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn layout(&self) -> StorageLayout {
        self.layout
    }

    pub fn thumbnail_format(&self) -> ThumbnailFormat {
        self.thumbnail_format
    }

    pub fn originals_dir(&self) -> PathBuf {
        match self.layout {
            StorageLayout::Nested => self.root.join(ORIGINALS_DIR),
            StorageLayout::Flat => self.root.clone(),
        }
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        match self.layout {
            StorageLayout::Nested => self.root.join(THUMBNAILS_DIR),
            StorageLayout::Flat => self.root.clone(),
        }
    }

    pub fn original_path(&self, photo_id: Uuid) -> PathBuf {
        self.originals_dir()
            .join(format!("{}.{}", photo_id, ORIGINAL_EXTENSION))
    }

    pub fn thumbnail_path(&self, photo_id: Uuid) -> PathBuf {
        let file_name = match self.layout {
            StorageLayout::Nested => {
                format!("{}.{}", photo_id, self.thumbnail_format.extension())
            }
            StorageLayout::Flat => {
                format!("{}.thumb.{}", photo_id, self.thumbnail_format.extension())
            }
        };
        self.thumbnails_dir().join(file_name)
    }

    /// Recovers the photo id from an original's file name, if it is one.
    pub fn original_id_from_file_name(&self, file_name: &str) -> Option<Uuid> {
        let stem = file_name.strip_suffix(&format!(".{}", ORIGINAL_EXTENSION))?;
        Uuid::parse_str(stem).ok()
    }

    /// Recovers the photo id from a thumbnail's file name, if it is one.
    pub fn thumbnail_id_from_file_name(&self, file_name: &str) -> Option<Uuid> {
        let stem = match self.layout {
            StorageLayout::Nested => {
                file_name.strip_suffix(&format!(".{}", self.thumbnail_format.extension()))?
            }
            StorageLayout::Flat => file_name
                .strip_suffix(&format!(".thumb.{}", self.thumbnail_format.extension()))?,
        };
        Uuid::parse_str(stem).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(layout: StorageLayout) -> PathResolver {
        PathResolver::new("/srv/photos", layout, ThumbnailFormat::Jpeg)
    }

    #[test]
    fn test_nested_layout_paths() {
        let resolver = resolver(StorageLayout::Nested);
        let id = Uuid::parse_str("6f1c2a3e-8d5b-4c1a-9e3f-2b7d8a9c0e1f").unwrap();

        assert_eq!(
            resolver.original_path(id),
            PathBuf::from("/srv/photos/originals/6f1c2a3e-8d5b-4c1a-9e3f-2b7d8a9c0e1f.jpg")
        );
        assert_eq!(
            resolver.thumbnail_path(id),
            PathBuf::from("/srv/photos/thumbnails/6f1c2a3e-8d5b-4c1a-9e3f-2b7d8a9c0e1f.jpg")
        );
    }

    #[test]
    fn test_flat_layout_keeps_original_and_thumbnail_apart() {
        let resolver = resolver(StorageLayout::Flat);
        let id = Uuid::new_v4();

        assert_eq!(
            resolver.original_path(id),
            PathBuf::from(format!("/srv/photos/{}.jpg", id))
        );
        assert_eq!(
            resolver.thumbnail_path(id),
            PathBuf::from(format!("/srv/photos/{}.thumb.jpg", id))
        );
        assert_ne!(resolver.original_path(id), resolver.thumbnail_path(id));
    }

    #[test]
    fn test_paths_are_stable_and_injective() {
        let resolver = resolver(StorageLayout::Nested);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        assert_eq!(resolver.original_path(a), resolver.original_path(a));
        assert_eq!(resolver.thumbnail_path(a), resolver.thumbnail_path(a));
        assert_ne!(resolver.original_path(a), resolver.original_path(b));
        assert_ne!(resolver.thumbnail_path(a), resolver.thumbnail_path(b));
    }

    #[test]
    fn test_thumbnail_extension_follows_format() {
        let resolver = PathResolver::new("/data", StorageLayout::Nested, ThumbnailFormat::Webp);
        let id = Uuid::new_v4();

        assert_eq!(
            resolver.thumbnail_path(id).extension().unwrap(),
            "webp"
        );
        assert_eq!(resolver.original_path(id).extension().unwrap(), "jpg");
    }

    #[test]
    fn test_id_from_file_name_inverts_paths() {
        for layout in [StorageLayout::Nested, StorageLayout::Flat] {
            let resolver = resolver(layout);
            let id = Uuid::new_v4();

            let original = resolver.original_path(id);
            let thumbnail = resolver.thumbnail_path(id);
            let original_name = original.file_name().unwrap().to_str().unwrap();
            let thumbnail_name = thumbnail.file_name().unwrap().to_str().unwrap();

            assert_eq!(resolver.original_id_from_file_name(original_name), Some(id));
            assert_eq!(resolver.thumbnail_id_from_file_name(thumbnail_name), Some(id));
        }

        let resolver = resolver(StorageLayout::Flat);
        let id = Uuid::new_v4();
        // A flat thumbnail is never mistaken for an original
        assert_eq!(
            resolver.original_id_from_file_name(&format!("{}.thumb.jpg", id)),
            None
        );
        assert_eq!(resolver.original_id_from_file_name("notes.txt"), None);
    }

    #[test]
    fn test_layout_parsing() {
        assert_eq!("nested".parse::<StorageLayout>(), Ok(StorageLayout::Nested));
        assert_eq!("FLAT".parse::<StorageLayout>(), Ok(StorageLayout::Flat));
        assert!("sharded".parse::<StorageLayout>().is_err());
    }
}
