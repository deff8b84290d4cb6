use serde_json::json;
use std::convert::Infallible;
use warp::{reject, Filter, Rejection, Reply};

use crate::db::DbPool;
use crate::upload_orchestrator::UploadOrchestrator;
use crate::warp_helpers::{with_db, with_orchestrator, DatabaseError, StorageUnavailable};

pub async fn health_check() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Ready once the database hands out connections and the storage root exists.
pub async fn ready_check(
    db_pool: DbPool,
    orchestrator: UploadOrchestrator,
) -> Result<impl Reply, Rejection> {
    if let Err(e) = db_pool.acquire().await {
        log::error!("Database connection failed: {}", e);
        return Err(reject::custom(DatabaseError {
            message: "Database connection failed".to_string(),
        }));
    }

    let root = orchestrator.blobs().resolver().root().to_path_buf();
    if let Err(e) = tokio::fs::create_dir_all(&root).await {
        log::error!("Storage root {:?} unavailable: {}", root, e);
        return Err(reject::custom(StorageUnavailable {
            message: "Photo storage unavailable".to_string(),
        }));
    }

    Ok(warp::reply::json(&json!({
        "status": "ready",
        "database": "connected",
        "storage": "available",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

pub fn build_health_routes(
    db_pool: DbPool,
    orchestrator: UploadOrchestrator,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let ready = warp::path("ready")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_db(db_pool))
        .and(with_orchestrator(orchestrator))
        .and_then(ready_check);

    health.or(ready)
}
