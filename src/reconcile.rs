//! Maintenance passes that bring metadata flags and files on disk back in line
//! after failed commits or manual tampering with the storage directory.

use log::{info, warn};
use serde::Serialize;
use std::collections::HashSet;
use uuid::Uuid;

use crate::upload_orchestrator::{UploadError, UploadOrchestrator};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairFailure {
    pub photo_id: Uuid,
    pub error: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub checked: usize,
    /// Flag set, file absent.
    pub missing_original: Vec<Uuid>,
    pub missing_thumbnail: Vec<Uuid>,
    /// File present, flag not set.
    pub unflagged_original: Vec<Uuid>,
    pub unflagged_thumbnail: Vec<Uuid>,
    pub regenerated_thumbnails: Vec<Uuid>,
    pub repaired: Vec<Uuid>,
    pub failures: Vec<RepairFailure>,
}

impl ReconcileReport {
    pub fn is_consistent(&self) -> bool {
        self.missing_original.is_empty()
            && self.missing_thumbnail.is_empty()
            && self.unflagged_original.is_empty()
            && self.unflagged_thumbnail.is_empty()
    }
}

/// Compares every photo's flags with the files on disk. With `repair`, missing
/// thumbnails are derived again from existing originals, thumbnails without
/// an original are removed, and flags are rewritten to match the disk.
pub async fn reconcile(
    orchestrator: &UploadOrchestrator,
    repair: bool,
) -> Result<ReconcileReport, UploadError> {
    let store = orchestrator.store();
    let blobs = orchestrator.blobs();
    let photos = store.list_photos().await.map_err(UploadError::Store)?;
    let mut report = ReconcileReport::default();

    info!(
        "Reconciling {} photos against storage (repair: {})",
        photos.len(),
        repair
    );

    for listed in photos {
        let id = listed.id;
        let _guard = orchestrator.locks().acquire(id).await;

        // Re-read under the lock, an upload may have committed since the listing
        let photo = match store.find_photo_by_id(id).await.map_err(UploadError::Store)? {
            Some(photo) => photo,
            None => continue,
        };
        report.checked += 1;

        let original = blobs.original_exists(id).await;
        let mut thumbnail = blobs.thumbnail_exists(id).await;

        if photo.has_original && !original {
            report.missing_original.push(id);
        }
        if photo.has_thumbnail && !thumbnail {
            report.missing_thumbnail.push(id);
        }
        if !photo.has_original && original {
            report.unflagged_original.push(id);
        }
        if !photo.has_thumbnail && thumbnail {
            report.unflagged_thumbnail.push(id);
        }

        let consistent = photo.has_original == original
            && photo.has_thumbnail == thumbnail
            && (original || !thumbnail)
            && (!original || thumbnail);
        if !repair || consistent {
            continue;
        }

        let mut changed = false;

        if original && !thumbnail {
            match orchestrator.derive_thumbnail(id).await {
                Ok(_) => {
                    thumbnail = true;
                    changed = true;
                    report.regenerated_thumbnails.push(id);
                }
                Err(e) => {
                    warn!("Could not regenerate thumbnail for photo {}: {}", id, e);
                    report.failures.push(RepairFailure {
                        photo_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if !original && thumbnail {
            match blobs.delete_thumbnail(id).await {
                Ok(()) => {
                    thumbnail = false;
                    changed = true;
                }
                Err(e) => {
                    warn!("Could not remove thumbnail without original for {}: {}", id, e);
                    report.failures.push(RepairFailure {
                        photo_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if photo.has_original != original || photo.has_thumbnail != thumbnail {
            match store.update_photo_flags(id, original, thumbnail).await {
                Ok(()) => changed = true,
                Err(e) => {
                    warn!("Could not rewrite flags for photo {}: {}", id, e);
                    report.failures.push(RepairFailure {
                        photo_id: id,
                        error: e.to_string(),
                    });
                }
            }
        }

        if changed {
            report.repaired.push(id);
        }
    }

    info!(
        "Reconciliation checked {} photos: {} missing originals, {} missing thumbnails, {} unflagged originals, {} unflagged thumbnails, {} repaired",
        report.checked,
        report.missing_original.len(),
        report.missing_thumbnail.len(),
        report.unflagged_original.len(),
        report.unflagged_thumbnail.len(),
        report.repaired.len()
    );

    Ok(report)
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrphanSweepReport {
    pub dry_run: bool,
    pub orphan_originals: Vec<Uuid>,
    pub orphan_thumbnails: Vec<Uuid>,
    pub deleted: usize,
    pub failures: Vec<RepairFailure>,
}

/// Finds files whose id has no metadata record and deletes them unless
/// `dry_run` is set. Temporary files of in-flight writes never match an id
/// and are left alone.
pub async fn sweep_orphans(
    orchestrator: &UploadOrchestrator,
    dry_run: bool,
) -> Result<OrphanSweepReport, UploadError> {
    let store = orchestrator.store();
    let blobs = orchestrator.blobs();

    let known: HashSet<Uuid> = store
        .list_photos()
        .await
        .map_err(UploadError::Store)?
        .into_iter()
        .map(|photo| photo.id)
        .collect();

    let mut report = OrphanSweepReport {
        dry_run,
        ..Default::default()
    };

    let candidates: Vec<Uuid> = blobs
        .list_original_ids()
        .await?
        .into_iter()
        .chain(blobs.list_thumbnail_ids().await?)
        .filter(|id| !known.contains(id))
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    for id in candidates {
        let _guard = orchestrator.locks().acquire(id).await;

        if store
            .find_photo_by_id(id)
            .await
            .map_err(UploadError::Store)?
            .is_some()
        {
            continue;
        }

        let original = blobs.original_exists(id).await;
        let thumbnail = blobs.thumbnail_exists(id).await;
        if original {
            report.orphan_originals.push(id);
        }
        if thumbnail {
            report.orphan_thumbnails.push(id);
        }

        if dry_run {
            continue;
        }

        if original {
            match blobs.delete_original(id).await {
                Ok(()) => report.deleted += 1,
                Err(e) => report.failures.push(RepairFailure {
                    photo_id: id,
                    error: e.to_string(),
                }),
            }
        }
        if thumbnail {
            match blobs.delete_thumbnail(id).await {
                Ok(()) => report.deleted += 1,
                Err(e) => report.failures.push(RepairFailure {
                    photo_id: id,
                    error: e.to_string(),
                }),
            }
        }
    }

    info!(
        "Orphan sweep found {} originals and {} thumbnails, deleted {} files (dry run: {})",
        report.orphan_originals.len(),
        report.orphan_thumbnails.len(),
        report.deleted,
        dry_run
    );

    Ok(report)
}
