use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::db::{DbPool, Gallery};
use crate::warp_helpers::{database_error, not_found, validation_error, with_db};

// Galleries are created without an authenticated owner for now
const CURRENT_OWNER: Option<&str> = None;

#[derive(Debug, Deserialize)]
pub struct CreateGalleryRequest {
    pub title: Option<String>,
}

/// Gallery as returned by the single-gallery endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GallerySummary {
    pub id: Uuid,
    pub title: String,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
}

impl From<Gallery> for GallerySummary {
    fn from(gallery: Gallery) -> Self {
        Self {
            id: gallery.id,
            title: gallery.title,
            created_at_utc: gallery.created_at_utc,
            updated_at_utc: gallery.updated_at_utc,
        }
    }
}

pub async fn list_galleries(db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let galleries = Gallery::list_for_owner(&db_pool, CURRENT_OWNER)
        .await
        .map_err(database_error)?;

    Ok(warp::reply::json(&galleries))
}

pub async fn get_gallery(id: Uuid, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    match Gallery::find_active(&db_pool, id, CURRENT_OWNER).await {
        Ok(Some(gallery)) => Ok(warp::reply::json(&GallerySummary::from(gallery))),
        Ok(None) => Err(not_found("Gallery not found")),
        Err(e) => Err(database_error(e)),
    }
}

pub async fn create_gallery(
    request: CreateGalleryRequest,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    let title = request
        .title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .ok_or_else(|| validation_error("Title is required."))?;

    let gallery = Gallery::new(title, CURRENT_OWNER.map(str::to_string));
    gallery.insert(&db_pool).await.map_err(database_error)?;
    log::info!("Created gallery {} '{}'", gallery.id, gallery.title);

    Ok(warp::reply::with_status(
        warp::reply::json(&gallery),
        StatusCode::CREATED,
    ))
}

pub async fn delete_gallery(id: Uuid, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    if !Gallery::soft_delete(&db_pool, id)
        .await
        .map_err(database_error)?
    {
        return Err(not_found("Gallery not found"));
    }

    log::info!("Soft-deleted gallery {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub fn build_gallery_routes(
    db_pool: DbPool,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api_galleries_list = warp::path("api")
        .and(warp::path("galleries"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(list_galleries);

    let api_gallery_get = warp::path("api")
        .and(warp::path("galleries"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(get_gallery);

    let api_gallery_create = warp::path("api")
        .and(warp::path("galleries"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json::<CreateGalleryRequest>())
        .and(with_db(db_pool.clone()))
        .and_then(create_gallery);

    let api_gallery_delete = warp::path("api")
        .and(warp::path("galleries"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_db(db_pool))
        .and_then(delete_gallery);

    api_galleries_list
        .or(api_gallery_get)
        .or(api_gallery_create)
        .or(api_gallery_delete)
}
