pub mod blob_store;
pub mod config;
pub mod db;
pub mod db_pool;
pub mod db_schema;
pub mod handlers_gallery;
pub mod handlers_health;
pub mod handlers_maintenance;
pub mod handlers_photo;
pub mod layout_migration;
pub mod metadata_store;
pub mod mimetype_detector;
pub mod path_resolver;
pub mod reconcile;
pub mod thumbnail_generator;
pub mod thumbnail_types;
pub mod upload_locks;
pub mod upload_orchestrator;
pub mod warp_helpers;
