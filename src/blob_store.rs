use log::debug;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::path_resolver::PathResolver;

/// Writes `data` next to `path` under a temporary name and renames it into
/// place, so readers only ever see the previous file or the complete new one.
pub async fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        )
    })?;
    fs::create_dir_all(parent).await?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("blob");
    let temp_path = parent.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    let result = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await
    }
    .await;

    if result.is_err() {
        // Temp file may not exist if creation itself failed
        let _ = fs::remove_file(&temp_path).await;
    }

    result
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|metadata| metadata.is_file())
        .unwrap_or(false)
}

async fn read_if_present(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path).await {
        Ok(data) => Ok(Some(data)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// File storage for originals and thumbnails, addressed by photo id.
#[derive(Debug, Clone)]
pub struct BlobStore {
    resolver: PathResolver,
}

impl BlobStore {
    pub fn new(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn original_path(&self, photo_id: Uuid) -> PathBuf {
        self.resolver.original_path(photo_id)
    }

    pub fn thumbnail_path(&self, photo_id: Uuid) -> PathBuf {
        self.resolver.thumbnail_path(photo_id)
    }

    /// Persists an original, replacing whatever was stored for this id.
    pub async fn store_original(&self, photo_id: Uuid, data: &[u8]) -> io::Result<()> {
        let path = self.original_path(photo_id);
        write_atomic(&path, data).await?;
        debug!("Stored original for {} ({} bytes)", photo_id, data.len());
        Ok(())
    }

    pub async fn store_thumbnail(&self, photo_id: Uuid, data: &[u8]) -> io::Result<()> {
        let path = self.thumbnail_path(photo_id);
        write_atomic(&path, data).await
    }

    pub async fn original_exists(&self, photo_id: Uuid) -> bool {
        is_file(&self.original_path(photo_id)).await
    }

    pub async fn thumbnail_exists(&self, photo_id: Uuid) -> bool {
        is_file(&self.thumbnail_path(photo_id)).await
    }

    pub async fn read_original(&self, photo_id: Uuid) -> io::Result<Option<Vec<u8>>> {
        read_if_present(&self.original_path(photo_id)).await
    }

    pub async fn read_thumbnail(&self, photo_id: Uuid) -> io::Result<Option<Vec<u8>>> {
        read_if_present(&self.thumbnail_path(photo_id)).await
    }

    /// Removes the original. Absent files are not an error.
    pub async fn delete_original(&self, photo_id: Uuid) -> io::Result<()> {
        remove_if_present(&self.original_path(photo_id)).await
    }

    /// Removes the thumbnail. Absent files are not an error.
    pub async fn delete_thumbnail(&self, photo_id: Uuid) -> io::Result<()> {
        remove_if_present(&self.thumbnail_path(photo_id)).await
    }

    pub async fn list_original_ids(&self) -> io::Result<Vec<Uuid>> {
        let resolver = &self.resolver;
        list_ids(&resolver.originals_dir(), |name| {
            resolver.original_id_from_file_name(name)
        })
        .await
    }

    pub async fn list_thumbnail_ids(&self) -> io::Result<Vec<Uuid>> {
        let resolver = &self.resolver;
        list_ids(&resolver.thumbnails_dir(), |name| {
            resolver.thumbnail_id_from_file_name(name)
        })
        .await
    }
}

async fn list_ids<F>(dir: &Path, parse: F) -> io::Result<Vec<Uuid>>
where
    F: Fn(&str) -> Option<Uuid>,
{
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(id) = entry.file_name().to_str().and_then(|name| parse(name)) {
            ids.push(id);
        }
    }

    ids.sort();
    Ok(ids)
}
