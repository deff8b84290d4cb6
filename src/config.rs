use std::env;

use crate::path_resolver::StorageLayout;
use crate::thumbnail_types::{ThumbnailFailurePolicy, ThumbnailFormat, DEFAULT_MAX_DIMENSION};

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root_path: String,
    pub layout: StorageLayout,
    /// Move files of a flat layout into the nested directories on startup.
    pub migrate_flat_layout: bool,
    pub delete_files_with_photo: bool,
}

#[derive(Debug, Clone)]
pub struct ThumbnailConfig {
    pub max_dimension: u32,
    pub format: ThumbnailFormat,
    pub failure_policy: ThumbnailFailurePolicy,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
    pub db_path: String,
    pub max_connections: u32,
    pub storage: StorageConfig,
    pub thumbnails: ThumbnailConfig,
    pub max_upload_mb: u64,
    pub cors_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            port: env::var("PHOTOLIB_PORT")
                .unwrap_or_else(|_| "5080".to_string())
                .parse()?,
            host: env::var("PHOTOLIB_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            db_path: env::var("PHOTOLIB_DB_PATH")
                .unwrap_or_else(|_| "./data/database/photolib.db".to_string()),
            max_connections: env::var("PHOTOLIB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            storage: StorageConfig {
                root_path: env::var("PHOTOLIB_STORAGE_PATH")
                    .unwrap_or_else(|_| "./data/photos".to_string()),
                layout: env::var("PHOTOLIB_STORAGE_LAYOUT")
                    .unwrap_or_else(|_| "nested".to_string())
                    .parse()?,
                migrate_flat_layout: env::var("PHOTOLIB_MIGRATE_FLAT_LAYOUT")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()?,
                delete_files_with_photo: env::var("PHOTOLIB_DELETE_FILES_WITH_PHOTO")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()?,
            },
            thumbnails: ThumbnailConfig {
                max_dimension: env::var("PHOTOLIB_THUMBNAIL_MAX_DIMENSION")
                    .unwrap_or_else(|_| DEFAULT_MAX_DIMENSION.to_string())
                    .parse()?,
                format: env::var("PHOTOLIB_THUMBNAIL_FORMAT")
                    .unwrap_or_else(|_| "jpeg".to_string())
                    .parse()?,
                failure_policy: env::var("PHOTOLIB_THUMBNAIL_FAILURE_POLICY")
                    .unwrap_or_else(|_| "lenient".to_string())
                    .parse()?,
            },
            max_upload_mb: env::var("PHOTOLIB_MAX_UPLOAD_MB")
                .unwrap_or_else(|_| "50".to_string())
                .parse()?,
            cors_origin: env::var("PHOTOLIB_CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:4200".to_string()),
        })
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
