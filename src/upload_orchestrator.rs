//! Upload pipeline for photo originals.
//!
//! One upload moves through these steps, each a precondition for the next:
//! 1. validate the payload
//! 2. take the per-photo lock and locate the metadata record
//! 3. persist the original (atomic replace)
//! 4. derive the thumbnail from the stored original
//! 5. commit `has_original` / `has_thumbnail` in a single update
//!
//! A failed original write aborts with metadata untouched. A failed thumbnail
//! never rolls back the original. A failed commit leaves the written files in
//! place as orphans for the reconciliation pass.

use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::blob_store::BlobStore;
use crate::metadata_store::{MetadataStore, StoreError};
use crate::thumbnail_generator::ThumbnailGenerator;
use crate::thumbnail_types::{ThumbnailError, ThumbnailFailurePolicy, ThumbnailInfo};
use crate::upload_locks::UploadLocks;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("Photo {0} not found")]
    NotFound(Uuid),
    #[error("File storage failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Thumbnail generation failed: {0}")]
    Image(ThumbnailError),
    #[error("Files were written but the metadata update failed: {0}")]
    Conflict(StoreError),
    #[error("Metadata store unavailable: {0}")]
    Store(StoreError),
}

impl UploadError {
    /// Stable identifier for clients to branch on.
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::InvalidInput(_) => "INVALID_INPUT",
            UploadError::NotFound(_) => "NOT_FOUND",
            UploadError::Io(_) => "IO_ERROR",
            UploadError::Image(_) => "IMAGE_ERROR",
            UploadError::Conflict(_) => "CONFLICT",
            UploadError::Store(_) => "STORE_UNAVAILABLE",
        }
    }
}

/// Reading the source back counts as a storage failure, everything else as
/// an image failure.
fn thumbnail_error_kind(err: &ThumbnailError) -> &'static str {
    match err {
        ThumbnailError::Io(_) => "IO_ERROR",
        ThumbnailError::Image(_) | ThumbnailError::Task(_) => "IMAGE_ERROR",
    }
}

fn thumbnail_failure_to_error(err: ThumbnailError) -> UploadError {
    match err {
        ThumbnailError::Io(io_err) => UploadError::Io(io_err),
        other => UploadError::Image(other),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThumbnailFailure {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub photo_id: Uuid,
    pub has_original: bool,
    pub has_thumbnail: bool,
    pub thumbnail: Option<ThumbnailInfo>,
    pub thumbnail_error: Option<ThumbnailFailure>,
}

#[derive(Clone)]
pub struct UploadOrchestrator {
    store: Arc<dyn MetadataStore>,
    blobs: BlobStore,
    thumbnails: ThumbnailGenerator,
    locks: UploadLocks,
    failure_policy: ThumbnailFailurePolicy,
}

impl UploadOrchestrator {
    pub fn new(
        store: Arc<dyn MetadataStore>,
        blobs: BlobStore,
        thumbnails: ThumbnailGenerator,
        failure_policy: ThumbnailFailurePolicy,
    ) -> Self {
        Self {
            store,
            blobs,
            thumbnails,
            locks: UploadLocks::new(),
            failure_policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn MetadataStore> {
        &self.store
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn locks(&self) -> &UploadLocks {
        &self.locks
    }

    pub fn failure_policy(&self) -> ThumbnailFailurePolicy {
        self.failure_policy
    }

    pub async fn upload(&self, photo_id: Uuid, data: &[u8]) -> Result<UploadOutcome, UploadError> {
        if data.is_empty() {
            return Err(UploadError::InvalidInput("File is required.".to_string()));
        }

        let _guard = self.locks.acquire(photo_id).await;

        let photo = self
            .store
            .find_photo_by_id(photo_id)
            .await
            .map_err(UploadError::Store)?
            .ok_or(UploadError::NotFound(photo_id))?;

        debug!(
            "Uploading {} bytes for photo {} (had original: {}, had thumbnail: {})",
            data.len(),
            photo_id,
            photo.has_original,
            photo.has_thumbnail
        );

        if let Err(e) = self.blobs.store_original(photo_id, data).await {
            error!("Failed to store original for photo {}: {}", photo_id, e);
            return Err(UploadError::Io(e));
        }
        let has_original = true;

        let (has_thumbnail, thumbnail, thumbnail_error) = match self.derive_thumbnail(photo_id).await
        {
            Ok(info) => (true, Some(info), None),
            Err(e) => {
                warn!("Thumbnail generation failed for photo {}: {}", photo_id, e);
                // Never leave a thumbnail of an older original behind
                if let Err(remove_err) = self.blobs.delete_thumbnail(photo_id).await {
                    warn!(
                        "Failed to remove stale thumbnail for photo {}: {}",
                        photo_id, remove_err
                    );
                }
                (false, None, Some(e))
            }
        };

        if let Err(e) = self
            .store
            .update_photo_flags(photo_id, has_original, has_thumbnail)
            .await
        {
            error!(
                "Photo {}: files written but metadata commit failed, needs reconciliation: {}",
                photo_id, e
            );
            return Err(UploadError::Conflict(e));
        }

        info!(
            "Upload for photo {} committed (thumbnail: {})",
            photo_id, has_thumbnail
        );

        match thumbnail_error {
            Some(e) if self.failure_policy == ThumbnailFailurePolicy::Strict => {
                Err(thumbnail_failure_to_error(e))
            }
            Some(e) => Ok(UploadOutcome {
                photo_id,
                has_original,
                has_thumbnail,
                thumbnail,
                thumbnail_error: Some(ThumbnailFailure {
                    kind: thumbnail_error_kind(&e),
                    message: e.to_string(),
                }),
            }),
            None => Ok(UploadOutcome {
                photo_id,
                has_original,
                has_thumbnail,
                thumbnail,
                thumbnail_error: None,
            }),
        }
    }

    /// Deletes the metadata record and, when `remove_files` is set, its files.
    /// Returns false if there was no record. File removal failures are logged
    /// and left to the orphan sweep.
    pub async fn delete_photo(&self, photo_id: Uuid, remove_files: bool) -> Result<bool, UploadError> {
        let _guard = self.locks.acquire(photo_id).await;

        if !self
            .store
            .delete_photo(photo_id)
            .await
            .map_err(UploadError::Store)?
        {
            return Ok(false);
        }

        if remove_files {
            if let Err(e) = self.blobs.delete_original(photo_id).await {
                warn!("Failed to remove original of deleted photo {}: {}", photo_id, e);
            }
            if let Err(e) = self.blobs.delete_thumbnail(photo_id).await {
                warn!("Failed to remove thumbnail of deleted photo {}: {}", photo_id, e);
            }
        }

        info!("Deleted photo {} (files removed: {})", photo_id, remove_files);
        Ok(true)
    }

    /// Caller must hold the photo's upload lock.
    pub(crate) async fn derive_thumbnail(&self, photo_id: Uuid) -> Result<ThumbnailInfo, ThumbnailError> {
        let source = self.blobs.original_path(photo_id);
        let dest = self.blobs.thumbnail_path(photo_id);
        self.thumbnails.generate(&source, &dest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_in_memory_pool, DbPool, Gallery, Photo};
    use crate::metadata_store::SqliteMetadataStore;
    use crate::path_resolver::{PathResolver, StorageLayout};
    use crate::thumbnail_types::ThumbnailFormat;
    use async_trait::async_trait;
    use image::{DynamicImage, GenericImageView, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use tempfile::TempDir;

    struct TestContext {
        pool: DbPool,
        orchestrator: UploadOrchestrator,
        _temp_dir: TempDir,
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 239) as u8])
        });
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageFormat::Jpeg)
            .unwrap();
        buffer.into_inner()
    }

    fn blob_store(temp_dir: &TempDir) -> BlobStore {
        BlobStore::new(PathResolver::new(
            temp_dir.path().join("photos"),
            StorageLayout::Nested,
            ThumbnailFormat::Jpeg,
        ))
    }

    async fn create_context_with_store<F>(
        policy: ThumbnailFailurePolicy,
        wrap: F,
    ) -> TestContext
    where
        F: FnOnce(SqliteMetadataStore) -> Arc<dyn MetadataStore>,
    {
        let temp_dir = TempDir::new().unwrap();
        let pool = create_in_memory_pool().await.unwrap();
        let store = wrap(SqliteMetadataStore::new(pool.clone()));
        let orchestrator = UploadOrchestrator::new(
            store,
            blob_store(&temp_dir),
            ThumbnailGenerator::new(300, ThumbnailFormat::Jpeg),
            policy,
        );

        TestContext {
            pool,
            orchestrator,
            _temp_dir: temp_dir,
        }
    }

    async fn create_context(policy: ThumbnailFailurePolicy) -> TestContext {
        create_context_with_store(policy, |store| Arc::new(store)).await
    }

    async fn create_photo(pool: &DbPool) -> Photo {
        let gallery = Gallery::new("Gallery", None);
        gallery.insert(pool).await.unwrap();
        let photo = Photo::new(gallery.id, "Photo", None, None);
        photo.insert(pool).await.unwrap();
        photo
    }

    async fn reload(pool: &DbPool, id: Uuid) -> Photo {
        Photo::find_by_id(pool, id).await.unwrap().unwrap()
    }

    /// Delegates reads to SQLite but refuses every flag update.
    struct FailingCommitStore {
        inner: SqliteMetadataStore,
    }

    #[async_trait]
    impl MetadataStore for FailingCommitStore {
        async fn find_photo_by_id(&self, id: Uuid) -> Result<Option<Photo>, StoreError> {
            self.inner.find_photo_by_id(id).await
        }

        async fn update_photo_flags(
            &self,
            _id: Uuid,
            _has_original: bool,
            _has_thumbnail: bool,
        ) -> Result<(), StoreError> {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        }

        async fn gallery_exists(&self, id: Uuid) -> Result<bool, StoreError> {
            self.inner.gallery_exists(id).await
        }

        async fn delete_photo(&self, id: Uuid) -> Result<bool, StoreError> {
            self.inner.delete_photo(id).await
        }

        async fn list_photos(&self) -> Result<Vec<Photo>, StoreError> {
            self.inner.list_photos().await
        }
    }

    #[tokio::test]
    async fn test_upload_stores_original_and_thumbnail() {
        let ctx = create_context(ThumbnailFailurePolicy::Lenient).await;
        let photo = create_photo(&ctx.pool).await;
        let payload = jpeg_bytes(1200, 800);

        let outcome = ctx.orchestrator.upload(photo.id, &payload).await.unwrap();

        assert!(outcome.has_original);
        assert!(outcome.has_thumbnail);
        assert_eq!(outcome.thumbnail, Some(ThumbnailInfo { width: 300, height: 200 }));
        assert_eq!(outcome.thumbnail_error, None);

        let blobs = ctx.orchestrator.blobs();
        assert!(blobs.original_exists(photo.id).await);
        assert_eq!(blobs.read_original(photo.id).await.unwrap(), Some(payload));
        let thumbnail = image::open(blobs.thumbnail_path(photo.id)).unwrap();
        assert_eq!(thumbnail.dimensions(), (300, 200));

        let stored = reload(&ctx.pool, photo.id).await;
        assert!(stored.has_original);
        assert!(stored.has_thumbnail);
    }

    #[tokio::test]
    async fn test_upload_twice_is_idempotent() {
        let ctx = create_context(ThumbnailFailurePolicy::Lenient).await;
        let photo = create_photo(&ctx.pool).await;
        let payload = jpeg_bytes(640, 480);
        let blobs = ctx.orchestrator.blobs();

        ctx.orchestrator.upload(photo.id, &payload).await.unwrap();
        let first_thumbnail = blobs.read_thumbnail(photo.id).await.unwrap();
        ctx.orchestrator.upload(photo.id, &payload).await.unwrap();

        assert_eq!(blobs.read_original(photo.id).await.unwrap(), Some(payload));
        assert_eq!(blobs.read_thumbnail(photo.id).await.unwrap(), first_thumbnail);
        let stored = reload(&ctx.pool, photo.id).await;
        assert!(stored.has_original && stored.has_thumbnail);
    }

    #[tokio::test]
    async fn test_empty_payload_is_rejected_before_lookup() {
        let ctx = create_context(ThumbnailFailurePolicy::Lenient).await;

        // Unknown id: validation must win over the lookup
        let result = ctx.orchestrator.upload(Uuid::new_v4(), &[]).await;

        assert!(matches!(result, Err(UploadError::InvalidInput(_))));
        assert!(!ctx.orchestrator.blobs().resolver().root().exists());
    }

    #[tokio::test]
    async fn test_unknown_photo_writes_nothing() {
        let ctx = create_context(ThumbnailFailurePolicy::Lenient).await;
        let id = Uuid::new_v4();

        let result = ctx.orchestrator.upload(id, &jpeg_bytes(10, 10)).await;

        assert!(matches!(result, Err(UploadError::NotFound(missing)) if missing == id));
        assert!(!ctx.orchestrator.blobs().resolver().root().exists());
    }

    #[tokio::test]
    async fn test_write_failure_leaves_flags_untouched() {
        let ctx = create_context(ThumbnailFailurePolicy::Lenient).await;
        let photo = create_photo(&ctx.pool).await;
        let root = ctx.orchestrator.blobs().resolver().root().to_path_buf();
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("originals"), b"not a directory").unwrap();

        let result = ctx.orchestrator.upload(photo.id, &jpeg_bytes(50, 50)).await;

        assert!(matches!(result, Err(UploadError::Io(_))));
        let stored = reload(&ctx.pool, photo.id).await;
        assert!(!stored.has_original);
        assert!(!stored.has_thumbnail);
        assert!(!ctx.orchestrator.blobs().thumbnail_exists(photo.id).await);
    }

    #[tokio::test]
    async fn test_lenient_policy_keeps_original_when_thumbnail_fails() {
        let ctx = create_context(ThumbnailFailurePolicy::Lenient).await;
        let photo = create_photo(&ctx.pool).await;
        let payload = b"definitely not an image".to_vec();

        let outcome = ctx.orchestrator.upload(photo.id, &payload).await.unwrap();

        assert!(outcome.has_original);
        assert!(!outcome.has_thumbnail);
        assert_eq!(outcome.thumbnail, None);
        assert_eq!(outcome.thumbnail_error.as_ref().unwrap().kind, "IMAGE_ERROR");

        let stored = reload(&ctx.pool, photo.id).await;
        assert!(stored.has_original);
        assert!(!stored.has_thumbnail);
        assert_eq!(
            ctx.orchestrator.blobs().read_original(photo.id).await.unwrap(),
            Some(payload)
        );
    }

    #[tokio::test]
    async fn test_failed_reupload_removes_stale_thumbnail() {
        let ctx = create_context(ThumbnailFailurePolicy::Lenient).await;
        let photo = create_photo(&ctx.pool).await;
        let blobs = ctx.orchestrator.blobs();

        ctx.orchestrator
            .upload(photo.id, &jpeg_bytes(400, 400))
            .await
            .unwrap();
        assert!(blobs.thumbnail_exists(photo.id).await);

        ctx.orchestrator
            .upload(photo.id, b"corrupt replacement")
            .await
            .unwrap();

        assert!(!blobs.thumbnail_exists(photo.id).await);
        assert!(!reload(&ctx.pool, photo.id).await.has_thumbnail);
    }

    #[tokio::test]
    async fn test_strict_policy_fails_request_but_commits_original() {
        let ctx = create_context(ThumbnailFailurePolicy::Strict).await;
        let photo = create_photo(&ctx.pool).await;

        let result = ctx.orchestrator.upload(photo.id, b"garbage").await;

        assert!(matches!(result, Err(UploadError::Image(_))));
        let stored = reload(&ctx.pool, photo.id).await;
        assert!(stored.has_original);
        assert!(!stored.has_thumbnail);
        assert!(ctx.orchestrator.blobs().original_exists(photo.id).await);
    }

    #[tokio::test]
    async fn test_commit_failure_is_conflict_and_keeps_files() {
        let ctx = create_context_with_store(ThumbnailFailurePolicy::Lenient, |inner| {
            Arc::new(FailingCommitStore { inner })
        })
        .await;
        let photo = create_photo(&ctx.pool).await;

        let result = ctx.orchestrator.upload(photo.id, &jpeg_bytes(320, 240)).await;

        assert!(matches!(result, Err(UploadError::Conflict(_))));
        assert_eq!(result.unwrap_err().kind(), "CONFLICT");
        let stored = reload(&ctx.pool, photo.id).await;
        assert!(!stored.has_original);
        assert!(!stored.has_thumbnail);
        // Orphaned until reconciliation
        assert!(ctx.orchestrator.blobs().original_exists(photo.id).await);
        assert!(ctx.orchestrator.blobs().thumbnail_exists(photo.id).await);
    }

    #[tokio::test]
    async fn test_concurrent_uploads_keep_original_and_thumbnail_paired() {
        let ctx = create_context(ThumbnailFailurePolicy::Lenient).await;
        let photo = create_photo(&ctx.pool).await;
        let landscape = jpeg_bytes(900, 600);
        let portrait = jpeg_bytes(600, 900);

        let id = photo.id;
        let mut handles = Vec::new();
        for i in 0..6 {
            let orchestrator = ctx.orchestrator.clone();
            let payload = if i % 2 == 0 {
                landscape.clone()
            } else {
                portrait.clone()
            };
            handles.push(tokio::spawn(async move {
                orchestrator.upload(id, &payload).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let blobs = ctx.orchestrator.blobs();
        let original = image::open(blobs.original_path(photo.id)).unwrap();
        let thumbnail = image::open(blobs.thumbnail_path(photo.id)).unwrap();
        let original_landscape = original.width() > original.height();
        let thumbnail_landscape = thumbnail.width() > thumbnail.height();
        assert_eq!(original_landscape, thumbnail_landscape);
    }

    #[tokio::test]
    async fn test_delete_photo_removes_files_when_requested() {
        let ctx = create_context(ThumbnailFailurePolicy::Lenient).await;
        let kept_files = create_photo(&ctx.pool).await;
        let removed_files = create_photo(&ctx.pool).await;
        let blobs = ctx.orchestrator.blobs();
        for id in [kept_files.id, removed_files.id] {
            ctx.orchestrator.upload(id, &jpeg_bytes(64, 64)).await.unwrap();
        }

        assert!(ctx.orchestrator.delete_photo(removed_files.id, true).await.unwrap());
        assert!(ctx.orchestrator.delete_photo(kept_files.id, false).await.unwrap());

        assert!(!blobs.original_exists(removed_files.id).await);
        assert!(!blobs.thumbnail_exists(removed_files.id).await);
        assert!(blobs.original_exists(kept_files.id).await);
        assert!(Photo::find_by_id(&ctx.pool, removed_files.id)
            .await
            .unwrap()
            .is_none());

        assert!(!ctx.orchestrator.delete_photo(removed_files.id, true).await.unwrap());
    }

    #[test]
    fn test_error_kinds() {
        let id = Uuid::new_v4();
        assert_eq!(UploadError::InvalidInput("x".into()).kind(), "INVALID_INPUT");
        assert_eq!(UploadError::NotFound(id).kind(), "NOT_FOUND");
        assert_eq!(
            UploadError::Io(std::io::Error::other("disk full")).kind(),
            "IO_ERROR"
        );
        assert_eq!(
            UploadError::Store(StoreError::PhotoMissing(id)).kind(),
            "STORE_UNAVAILABLE"
        );
        assert_eq!(
            thumbnail_error_kind(&ThumbnailError::Io(std::io::Error::other("gone"))),
            "IO_ERROR"
        );
    }
}
