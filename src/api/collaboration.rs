/// Sharing and permission endpoints
use crate::{
    api::{
        extract::{Json, Path},
        MessageResponse,
    },
    auth::AuthContext,
    collaboration::RemovalOutcome,
    context::AppContext,
    error::AppResult,
    permissions::{PermissionEntry, Role, RoleGrant},
};
use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/events/:id/share", post(share_event))
        .route("/api/events/:id/permissions", get(list_permissions))
        .route(
            "/api/events/:id/permissions/:user_id",
            put(update_permission).delete(remove_permission),
        )
}

#[derive(Debug, Deserialize)]
struct ShareRequest {
    users: Vec<RoleGrant>,
}

#[derive(Debug, Deserialize)]
struct UpdatePermissionRequest {
    role: Role,
}

async fn share_event(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(event_id): Path<i64>,
    Json(req): Json<ShareRequest>,
) -> AppResult<Json<MessageResponse>> {
    ctx.collaboration
        .share(event_id, auth.user_id, &req.users)
        .await?;
    Ok(Json(MessageResponse::new("Permissions updated")))
}

async fn list_permissions(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(event_id): Path<i64>,
) -> AppResult<Json<Vec<PermissionEntry>>> {
    let entries = ctx
        .collaboration
        .list_permissions(event_id, auth.user_id)
        .await?;
    Ok(Json(entries))
}

async fn update_permission(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((event_id, user_id)): Path<(i64, i64)>,
    Json(req): Json<UpdatePermissionRequest>,
) -> AppResult<Json<MessageResponse>> {
    ctx.collaboration
        .update_permission(event_id, auth.user_id, user_id, req.role)
        .await?;
    Ok(Json(MessageResponse::new("Permission updated")))
}

async fn remove_permission(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path((event_id, user_id)): Path<(i64, i64)>,
) -> AppResult<Json<MessageResponse>> {
    let outcome = ctx
        .collaboration
        .remove_permission(event_id, auth.user_id, user_id)
        .await?;

    Ok(Json(MessageResponse::new(match outcome {
        RemovalOutcome::Removed => "Permission removed",
        RemovalOutcome::NotPresent => "Permission not found",
    })))
}
