use log::{info, warn};
use std::io;
use std::path::Path;
use tokio::fs;

use crate::blob_store::BlobStore;
use crate::path_resolver::{PathResolver, StorageLayout};
use crate::thumbnail_types::ThumbnailFormat;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub moved_originals: usize,
    pub moved_thumbnails: usize,
    /// Files left in place because the nested location was already taken.
    pub skipped: usize,
}

/// Moves files stored in the flat layout below `root` into the nested
/// `originals/` and `thumbnails/` directories. Safe to run repeatedly.
pub async fn migrate_flat_to_nested(
    root: &Path,
    thumbnail_format: ThumbnailFormat,
) -> io::Result<MigrationReport> {
    let flat = BlobStore::new(PathResolver::new(
        root,
        StorageLayout::Flat,
        thumbnail_format,
    ));
    let nested = PathResolver::new(root, StorageLayout::Nested, thumbnail_format);
    let mut report = MigrationReport::default();

    for id in flat.list_original_ids().await? {
        if move_file(&flat.original_path(id), &nested.original_path(id)).await? {
            report.moved_originals += 1;
        } else {
            report.skipped += 1;
        }
    }

    for id in flat.list_thumbnail_ids().await? {
        if move_file(&flat.thumbnail_path(id), &nested.thumbnail_path(id)).await? {
            report.moved_thumbnails += 1;
        } else {
            report.skipped += 1;
        }
    }

    if report != MigrationReport::default() {
        info!(
            "Storage layout migration moved {} originals and {} thumbnails ({} skipped)",
            report.moved_originals, report.moved_thumbnails, report.skipped
        );
    }

    Ok(report)
}

async fn move_file(from: &Path, to: &Path) -> io::Result<bool> {
    if fs::try_exists(to).await? {
        warn!("Not migrating {:?}: {:?} already exists", from, to);
        return Ok(false);
    }

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::rename(from, to).await?;
    Ok(true)
}
