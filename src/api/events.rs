/// /api/events CRUD endpoints
use crate::{
    api::{
        extract::{Json, Path, Query},
        MessageResponse,
    },
    auth::AuthContext,
    context::AppContext,
    error::AppResult,
    events::{Event, EventFields},
};
use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Deserialize;

/// Build event routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/events", post(create_event).get(list_events))
        .route("/api/events/batch", post(create_batch))
        .route(
            "/api/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    10
}

async fn create_event(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(fields): Json<EventFields>,
) -> AppResult<Json<Event>> {
    let event = ctx.event_store.create(auth.user_id, fields).await?;
    Ok(Json(event))
}

async fn list_events(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Vec<Event>>> {
    let events = ctx
        .event_store
        .list(auth.user_id, params.skip, params.limit)
        .await?;
    Ok(Json(events))
}

/// Create several events; none are kept if any fails
async fn create_batch(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(items): Json<Vec<EventFields>>,
) -> AppResult<Json<Vec<Event>>> {
    let events = ctx.event_store.create_batch(auth.user_id, items).await?;
    Ok(Json(events))
}

async fn get_event(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(event_id): Path<i64>,
) -> AppResult<Json<Event>> {
    let event = ctx.event_store.get(event_id, auth.user_id).await?;
    Ok(Json(event))
}

async fn update_event(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(event_id): Path<i64>,
    Json(fields): Json<EventFields>,
) -> AppResult<Json<Event>> {
    let event = ctx.event_store.update(event_id, auth.user_id, fields).await?;
    Ok(Json(event))
}

async fn delete_event(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(event_id): Path<i64>,
) -> AppResult<Json<MessageResponse>> {
    ctx.event_store.delete(event_id, auth.user_id).await?;
    Ok(Json(MessageResponse::new("Event deleted successfully")))
}
