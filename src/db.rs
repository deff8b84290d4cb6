use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use crate::db_pool::{create_db_pool, create_in_memory_pool, DbPool};

/// A user-created group of photos. Deletion only sets `is_deleted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Gallery {
    pub id: Uuid,
    pub title: String,
    pub owner_id: Option<String>,
    pub is_deleted: bool,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl Gallery {
    pub fn new(title: impl Into<String>, owner_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            owner_id,
            is_deleted: false,
            created_at_utc: now,
            updated_at_utc: now,
        }
    }

    pub async fn insert(&self, pool: &DbPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO galleries (id, title, owner_id, is_deleted, created_at_utc, updated_at_utc)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(self.id)
        .bind(&self.title)
        .bind(&self.owner_id)
        .bind(self.is_deleted)
        .bind(self.created_at_utc)
        .bind(self.updated_at_utc)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Non-deleted galleries of an owner, oldest first. `None` matches galleries
    /// created without an owner.
    pub async fn list_for_owner(
        pool: &DbPool,
        owner_id: Option<&str>,
    ) -> Result<Vec<Gallery>, sqlx::Error> {
        sqlx::query_as::<_, Gallery>(
            "SELECT * FROM galleries
             WHERE owner_id IS ? AND is_deleted = FALSE
             ORDER BY created_at_utc ASC",
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_active(
        pool: &DbPool,
        id: Uuid,
        owner_id: Option<&str>,
    ) -> Result<Option<Gallery>, sqlx::Error> {
        sqlx::query_as::<_, Gallery>(
            "SELECT * FROM galleries WHERE id = ? AND owner_id IS ? AND is_deleted = FALSE",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn exists(pool: &DbPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM galleries WHERE id = ? AND is_deleted = FALSE",
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(count > 0)
    }

    /// Returns false when the gallery is missing or already deleted.
    pub async fn soft_delete(pool: &DbPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE galleries SET is_deleted = TRUE, updated_at_utc = ?
             WHERE id = ? AND is_deleted = FALSE",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Photo metadata. The image bytes live on disk, keyed by `id`; the two
/// flags record which of the files the upload pipeline has committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Photo {
    pub id: Uuid,
    pub gallery_id: Uuid,
    pub client_temp_id: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub has_original: bool,
    pub has_thumbnail: bool,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl Photo {
    pub fn new(
        gallery_id: Uuid,
        title: impl Into<String>,
        description: Option<String>,
        client_temp_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            gallery_id,
            client_temp_id,
            title: title.into(),
            description,
            has_original: false,
            has_thumbnail: false,
            created_at_utc: now,
            updated_at_utc: now,
        }
    }

    pub async fn insert(&self, pool: &DbPool) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO photos (id, gallery_id, client_temp_id, title, description,
                                 has_original, has_thumbnail, created_at_utc, updated_at_utc)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(self.id)
        .bind(self.gallery_id)
        .bind(&self.client_temp_id)
        .bind(&self.title)
        .bind(&self.description)
        .bind(self.has_original)
        .bind(self.has_thumbnail)
        .bind(self.created_at_utc)
        .bind(self.updated_at_utc)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(pool: &DbPool, id: Uuid) -> Result<Option<Photo>, sqlx::Error> {
        sqlx::query_as::<_, Photo>("SELECT * FROM photos WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_gallery(pool: &DbPool, gallery_id: Uuid) -> Result<Vec<Photo>, sqlx::Error> {
        sqlx::query_as::<_, Photo>(
            "SELECT * FROM photos WHERE gallery_id = ? ORDER BY created_at_utc ASC",
        )
        .bind(gallery_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list_all(pool: &DbPool) -> Result<Vec<Photo>, sqlx::Error> {
        sqlx::query_as::<_, Photo>("SELECT * FROM photos ORDER BY created_at_utc ASC")
            .fetch_all(pool)
            .await
    }

    pub async fn update_details(
        pool: &DbPool,
        id: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE photos SET title = ?, description = ?, updated_at_utc = ? WHERE id = ?",
        )
        .bind(title)
        .bind(description)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Writes both file flags in one statement. Returns false if the row is gone.
    pub async fn update_flags(
        pool: &DbPool,
        id: Uuid,
        has_original: bool,
        has_thumbnail: bool,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE photos SET has_original = ?, has_thumbnail = ?, updated_at_utc = ? WHERE id = ?",
        )
        .bind(has_original)
        .bind(has_thumbnail)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(pool: &DbPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM photos WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
