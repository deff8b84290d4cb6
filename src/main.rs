use log::{error, info};
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::sync::Arc;
use warp::Filter;

use photolib::blob_store::BlobStore;
use photolib::config::Config;
use photolib::db::{create_db_pool, DbPool};
use photolib::handlers_gallery::build_gallery_routes;
use photolib::handlers_health::build_health_routes;
use photolib::handlers_maintenance::build_maintenance_routes;
use photolib::handlers_photo::{build_photo_routes, PhotoRouteOptions};
use photolib::layout_migration::migrate_flat_to_nested;
use photolib::metadata_store::SqliteMetadataStore;
use photolib::path_resolver::{PathResolver, StorageLayout};
use photolib::thumbnail_generator::ThumbnailGenerator;
use photolib::upload_orchestrator::UploadOrchestrator;
use photolib::warp_helpers::{cors, handle_rejection};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config =
        Config::from_env().map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!("Starting photolib server on {}", addr);
    info!("Database: {}", config.db_path);
    info!(
        "Photo storage: {} ({} layout)",
        config.storage.root_path, config.storage.layout
    );
    info!(
        "Thumbnails: {} px, {}, {:?} failure policy",
        config.thumbnails.max_dimension, config.thumbnails.format, config.thumbnails.failure_policy
    );

    if !is_port_available(addr) {
        error!(
            "Port {} is already in use. Stop the other process or set PHOTOLIB_PORT.",
            config.port
        );
        return Err(anyhow::anyhow!("Port {} is already in use", config.port));
    }

    let (db_pool, orchestrator) = initialize_services(&config).await?;

    let photo_options = PhotoRouteOptions {
        delete_files_with_photo: config.storage.delete_files_with_photo,
        max_upload_bytes: config.max_upload_bytes(),
    };

    let routes = build_health_routes(db_pool.clone(), orchestrator.clone())
        .or(build_gallery_routes(db_pool.clone()))
        .or(build_photo_routes(
            db_pool,
            orchestrator.clone(),
            photo_options,
        ))
        .or(build_maintenance_routes(orchestrator))
        .with(cors(&config.cors_origin))
        .with(warp::log("photolib"))
        .recover(handle_rejection);

    info!("Server started successfully, listening on http://{}", addr);

    warp::serve(routes).run(addr).await;

    Ok(())
}

fn is_port_available(addr: SocketAddr) -> bool {
    TcpListener::bind(addr).is_ok()
}

async fn initialize_services(config: &Config) -> anyhow::Result<(DbPool, UploadOrchestrator)> {
    let db_pool = create_db_pool(&config.db_path, config.max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database: {}", e))?;
    info!("Database initialized successfully");

    let root = Path::new(&config.storage.root_path);
    if config.storage.migrate_flat_layout {
        if config.storage.layout == StorageLayout::Nested {
            migrate_flat_to_nested(root, config.thumbnails.format).await?;
        } else {
            log::warn!("Flat layout migration requested but the flat layout is still configured, skipping");
        }
    }

    let blobs = BlobStore::new(PathResolver::new(
        root,
        config.storage.layout,
        config.thumbnails.format,
    ));
    let thumbnails =
        ThumbnailGenerator::new(config.thumbnails.max_dimension, config.thumbnails.format);
    let orchestrator = UploadOrchestrator::new(
        Arc::new(SqliteMetadataStore::new(db_pool.clone())),
        blobs,
        thumbnails,
        config.thumbnails.failure_policy,
    );
    info!("Upload pipeline initialized");

    Ok((db_pool, orchestrator))
}
