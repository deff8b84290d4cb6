use bytes::Buf;
use futures_util::TryStreamExt;
use serde::Deserialize;
use std::convert::Infallible;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::multipart::FormData;
use warp::{reject, Filter, Rejection, Reply};

use crate::db::{DbPool, Photo};
use crate::metadata_store::MetadataStore;
use crate::mimetype_detector;
use crate::upload_orchestrator::{UploadError, UploadOrchestrator};
use crate::warp_helpers::{
    database_error, not_found, validation_error, with_db, with_orchestrator,
};

/// Name of the multipart field carrying the image.
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Clone, Copy)]
pub struct PhotoRouteOptions {
    pub delete_files_with_photo: bool,
    pub max_upload_bytes: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePhotoRequest {
    pub gallery_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub client_temp_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhotoRequest {
    pub title: Option<String>,
    pub description: Option<String>,
}

fn required_title(title: Option<String>) -> Result<String, Rejection> {
    title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .ok_or_else(|| validation_error("Title is required."))
}

async fn find_photo(db_pool: &DbPool, id: Uuid) -> Result<Photo, Rejection> {
    match Photo::find_by_id(db_pool, id).await {
        Ok(Some(photo)) => Ok(photo),
        Ok(None) => Err(not_found("Photo not found")),
        Err(e) => Err(database_error(e)),
    }
}

pub async fn list_photos_by_gallery(
    gallery_id: Uuid,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    let photos = Photo::list_by_gallery(&db_pool, gallery_id)
        .await
        .map_err(database_error)?;

    Ok(warp::reply::json(&photos))
}

pub async fn get_photo(id: Uuid, db_pool: DbPool) -> Result<impl Reply, Rejection> {
    let photo = find_photo(&db_pool, id).await?;
    Ok(warp::reply::json(&photo))
}

pub async fn create_photo(
    request: CreatePhotoRequest,
    orchestrator: UploadOrchestrator,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    let gallery_id = match request.gallery_id {
        Some(id) if !id.is_nil() => id,
        _ => return Err(validation_error("GalleryId must not be empty.")),
    };
    let title = required_title(request.title)?;

    if !orchestrator
        .store()
        .gallery_exists(gallery_id)
        .await
        .map_err(database_error)?
    {
        return Err(not_found(format!(
            "Gallery with id '{}' not found.",
            gallery_id
        )));
    }

    let photo = Photo::new(gallery_id, title, request.description, request.client_temp_id);
    photo.insert(&db_pool).await.map_err(database_error)?;
    log::info!("Created photo {} in gallery {}", photo.id, gallery_id);

    Ok(warp::reply::with_status(
        warp::reply::json(&photo),
        StatusCode::CREATED,
    ))
}

pub async fn update_photo(
    id: Uuid,
    request: UpdatePhotoRequest,
    db_pool: DbPool,
) -> Result<impl Reply, Rejection> {
    let title = required_title(request.title)?;

    if !Photo::update_details(&db_pool, id, &title, request.description.as_deref())
        .await
        .map_err(database_error)?
    {
        return Err(not_found("Photo not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_photo(
    id: Uuid,
    orchestrator: UploadOrchestrator,
    delete_files: bool,
) -> Result<impl Reply, Rejection> {
    if !orchestrator
        .delete_photo(id, delete_files)
        .await
        .map_err(reject::custom)?
    {
        return Err(not_found("Photo not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Collects the bytes of the `file` field. Other fields are ignored; a missing
/// field yields an empty payload, which the upload pipeline rejects.
async fn read_file_field(form: FormData) -> Result<Vec<u8>, Rejection> {
    futures_util::pin_mut!(form);
    let mut data = Vec::new();

    while let Some(part) = form
        .try_next()
        .await
        .map_err(|e| validation_error(format!("Invalid multipart body: {}", e)))?
    {
        if part.name() != FILE_FIELD {
            continue;
        }
        data = part
            .stream()
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(chunk.chunk());
                Ok::<_, warp::Error>(acc)
            })
            .await
            .map_err(|e| validation_error(format!("Failed to read upload: {}", e)))?;
    }

    Ok(data)
}

pub async fn upload_photo(
    id: Uuid,
    form: FormData,
    orchestrator: UploadOrchestrator,
) -> Result<Box<dyn Reply>, Rejection> {
    let data = read_file_field(form).await?;
    store_upload(id, data, orchestrator).await
}

/// Runs the upload pipeline. Full success answers 204; a thumbnail failure
/// tolerated by the lenient policy answers 200 with the outcome.
pub async fn store_upload(
    id: Uuid,
    data: Vec<u8>,
    orchestrator: UploadOrchestrator,
) -> Result<Box<dyn Reply>, Rejection> {
    let outcome = orchestrator
        .upload(id, &data)
        .await
        .map_err(reject::custom)?;

    if outcome.thumbnail_error.is_some() {
        return Ok(Box::new(warp::reply::with_status(
            warp::reply::json(&outcome),
            StatusCode::OK,
        )));
    }

    Ok(Box::new(StatusCode::NO_CONTENT))
}

pub async fn get_photo_file(
    id: Uuid,
    orchestrator: UploadOrchestrator,
    db_pool: DbPool,
) -> Result<Box<dyn Reply>, Rejection> {
    let photo = find_photo(&db_pool, id).await?;
    if !photo.has_original {
        return Err(not_found("Photo has no original"));
    }

    let blobs = orchestrator.blobs();
    match blobs.read_original(id).await {
        Ok(Some(data)) => {
            let content_type = mimetype_detector::content_type_for(&data, &blobs.original_path(id));
            let reply = warp::reply::with_header(data, "content-type", content_type);
            let reply = warp::reply::with_header(reply, "cache-control", "no-cache");
            Ok(Box::new(reply))
        }
        Ok(None) => {
            log::warn!("Photo {} is flagged with an original but the file is missing", id);
            Err(not_found("Photo file not found"))
        }
        Err(e) => Err(reject::custom(UploadError::Io(e))),
    }
}

pub async fn get_photo_thumbnail(
    id: Uuid,
    orchestrator: UploadOrchestrator,
    db_pool: DbPool,
) -> Result<Box<dyn Reply>, Rejection> {
    let photo = find_photo(&db_pool, id).await?;
    if !photo.has_thumbnail {
        return Err(not_found("Photo has no thumbnail"));
    }

    let blobs = orchestrator.blobs();
    match blobs.read_thumbnail(id).await {
        Ok(Some(data)) => {
            let content_type = blobs.resolver().thumbnail_format().content_type();
            let reply = warp::reply::with_header(data, "content-type", content_type);
            let reply = warp::reply::with_header(reply, "cache-control", "no-cache");
            Ok(Box::new(reply))
        }
        Ok(None) => {
            log::warn!("Photo {} is flagged with a thumbnail but the file is missing", id);
            Err(not_found("Thumbnail not found"))
        }
        Err(e) => Err(reject::custom(UploadError::Io(e))),
    }
}

fn with_flag(flag: bool) -> impl Filter<Extract = (bool,), Error = Infallible> + Clone {
    warp::any().map(move || flag)
}

pub fn build_photo_routes(
    db_pool: DbPool,
    orchestrator: UploadOrchestrator,
    options: PhotoRouteOptions,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api_photos_by_gallery = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path("by-gallery"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(list_photos_by_gallery);

    let api_photo_get = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end())
        .and(warp::get())
        .and(with_db(db_pool.clone()))
        .and_then(get_photo);

    let api_photo_create = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json::<CreatePhotoRequest>())
        .and(with_orchestrator(orchestrator.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(create_photo);

    let api_photo_update = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end())
        .and(warp::put())
        .and(warp::body::json::<UpdatePhotoRequest>())
        .and(with_db(db_pool.clone()))
        .and_then(update_photo);

    let api_photo_delete = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path::end())
        .and(warp::delete())
        .and(with_orchestrator(orchestrator.clone()))
        .and(with_flag(options.delete_files_with_photo))
        .and_then(delete_photo);

    let api_photo_upload = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path("upload"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(options.max_upload_bytes))
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(upload_photo);

    let api_photo_file = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path("file"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_orchestrator(orchestrator.clone()))
        .and(with_db(db_pool.clone()))
        .and_then(get_photo_file);

    let api_photo_thumbnail = warp::path("api")
        .and(warp::path("photos"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path("thumbnail"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_orchestrator(orchestrator))
        .and(with_db(db_pool))
        .and_then(get_photo_thumbnail);

    api_photos_by_gallery
        .or(api_photo_get)
        .or(api_photo_create)
        .or(api_photo_update)
        .or(api_photo_delete)
        .or(api_photo_upload)
        .or(api_photo_file)
        .or(api_photo_thumbnail)
}
