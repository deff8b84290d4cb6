use async_trait::async_trait;
use uuid::Uuid;

use crate::db::{DbPool, Gallery, Photo};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Photo {0} no longer exists")]
    PhotoMissing(Uuid),
}

/// The slice of the metadata database the upload pipeline depends on.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    async fn find_photo_by_id(&self, id: Uuid) -> Result<Option<Photo>, StoreError>;

    /// Persists both file flags at once. Fails with `PhotoMissing` if the
    /// record was removed in the meantime.
    async fn update_photo_flags(
        &self,
        id: Uuid,
        has_original: bool,
        has_thumbnail: bool,
    ) -> Result<(), StoreError>;

    async fn gallery_exists(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Removes the record. Returns false if it did not exist.
    async fn delete_photo(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_photos(&self) -> Result<Vec<Photo>, StoreError>;
}

#[derive(Clone)]
pub struct SqliteMetadataStore {
    pool: DbPool,
}

impl SqliteMetadataStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn find_photo_by_id(&self, id: Uuid) -> Result<Option<Photo>, StoreError> {
        Ok(Photo::find_by_id(&self.pool, id).await?)
    }

    async fn update_photo_flags(
        &self,
        id: Uuid,
        has_original: bool,
        has_thumbnail: bool,
    ) -> Result<(), StoreError> {
        if Photo::update_flags(&self.pool, id, has_original, has_thumbnail).await? {
            Ok(())
        } else {
            Err(StoreError::PhotoMissing(id))
        }
    }

    async fn gallery_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(Gallery::exists(&self.pool, id).await?)
    }

    async fn delete_photo(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(Photo::delete(&self.pool, id).await?)
    }

    async fn list_photos(&self) -> Result<Vec<Photo>, StoreError> {
        Ok(Photo::list_all(&self.pool).await?)
    }
}
