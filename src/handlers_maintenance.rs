use serde::Deserialize;
use warp::{reject, Filter, Rejection, Reply};

use crate::reconcile::{reconcile, sweep_orphans};
use crate::upload_orchestrator::UploadOrchestrator;
use crate::warp_helpers::with_orchestrator;

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileQuery {
    pub repair: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepQuery {
    pub dry_run: Option<bool>,
}

pub async fn run_reconcile(
    query: ReconcileQuery,
    orchestrator: UploadOrchestrator,
) -> Result<impl Reply, Rejection> {
    let report = reconcile(&orchestrator, query.repair.unwrap_or(false))
        .await
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&report))
}

/// Without an explicit `dryRun=false` the sweep only lists what it would delete.
pub async fn run_orphan_sweep(
    query: SweepQuery,
    orchestrator: UploadOrchestrator,
) -> Result<impl Reply, Rejection> {
    let report = sweep_orphans(&orchestrator, query.dry_run.unwrap_or(true))
        .await
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&report))
}

pub fn build_maintenance_routes(
    orchestrator: UploadOrchestrator,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api_reconcile = warp::path("api")
        .and(warp::path("maintenance"))
        .and(warp::path("reconcile"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::query::<ReconcileQuery>())
        .and(with_orchestrator(orchestrator.clone()))
        .and_then(run_reconcile);

    let api_sweep = warp::path("api")
        .and(warp::path("maintenance"))
        .and(warp::path("sweep-orphans"))
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::query::<SweepQuery>())
        .and(with_orchestrator(orchestrator))
        .and_then(run_orphan_sweep);

    api_reconcile.or(api_sweep)
}
