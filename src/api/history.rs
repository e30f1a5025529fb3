/// Version history endpoints: snapshots, rollback, changelog and diff
use crate::{
    api::extract::{Json, Path, Query},
    auth::AuthContext,
    context::AppContext,
    error::AppResult,
    events::{ChangelogEntry, DiffMode, Event, EventDiff, VersionView},
};
use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/events/:id/history/:version_id", get(get_version))
        .route("/api/events/:id/rollback/:version_id", post(rollback))
        .route("/api/events/:id/changelog", get(changelog))
        .route("/api/events/:id/diff/:v1/:v2", get(diff))
}

#[derive(Debug, Deserialize)]
struct DiffParams {
    #[serde(default)]
    mode: DiffMode,
}

async fn get_version(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((event_id, version_id)): Path<(i64, i64)>,
) -> AppResult<Json<VersionView>> {
    let version = ctx
        .event_store
        .get_version(event_id, version_id, auth.user_id)
        .await?;
    Ok(Json(version))
}

async fn rollback(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((event_id, version_id)): Path<(i64, i64)>,
) -> AppResult<Json<Event>> {
    let event = ctx
        .event_store
        .rollback(event_id, version_id, auth.user_id)
        .await?;
    Ok(Json(event))
}

async fn changelog(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(event_id): Path<i64>,
) -> AppResult<Json<Vec<ChangelogEntry>>> {
    let entries = ctx.event_store.changelog(event_id, auth.user_id).await?;
    Ok(Json(entries))
}

/// Field-level diff; `?mode=symmetric` also reports keys only in the second version
async fn diff(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((event_id, v1, v2)): Path<(i64, i64, i64)>,
    Query(params): Query<DiffParams>,
) -> AppResult<Json<EventDiff>> {
    let diff = ctx
        .event_store
        .diff(event_id, v1, v2, auth.user_id, params.mode)
        .await?;
    Ok(Json(diff))
}
