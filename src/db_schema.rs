use sqlx::SqlitePool;

pub const GALLERIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS galleries (
    id BLOB PRIMARY KEY NOT NULL,
    title TEXT NOT NULL,
    -- Stays NULL until requests carry an authenticated owner
    owner_id TEXT,
    is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
    created_at_utc DATETIME NOT NULL,
    updated_at_utc DATETIME NOT NULL
)
"#;

pub const PHOTOS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    id BLOB PRIMARY KEY NOT NULL,
    gallery_id BLOB NOT NULL REFERENCES galleries(id),
    client_temp_id TEXT,
    title TEXT NOT NULL,
    description TEXT,

    -- File state, written by the upload pipeline only
    has_original BOOLEAN NOT NULL DEFAULT FALSE,
    has_thumbnail BOOLEAN NOT NULL DEFAULT FALSE,

    created_at_utc DATETIME NOT NULL,
    updated_at_utc DATETIME NOT NULL
)
"#;

pub const SCHEMA_SQL: &[&str] = &[
    GALLERIES_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_galleries_owner_id ON galleries(owner_id);",
    PHOTOS_TABLE,
    "CREATE INDEX IF NOT EXISTS idx_photos_gallery_id ON photos(gallery_id);",
    "CREATE INDEX IF NOT EXISTS idx_photos_client_temp_id ON photos(id, client_temp_id);",
];

pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for sql in SCHEMA_SQL {
        sqlx::query(sql).execute(pool).await?;
    }
    Ok(())
}
