/// /api/auth/* endpoints
use crate::{
    account::{LoginRequest, RegisterRequest, RegisterResponse, TokenResponse},
    api::{extract::Json, MessageResponse},
    auth::BearerToken,
    context::AppContext,
    error::AppResult,
};
use axum::{extract::State, routing::post, Router};

/// Build auth routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/auth/logout", post(logout))
}

async fn register(
    State(ctx): State<AppContext>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<RegisterResponse>> {
    let user = ctx.account_manager.register(&req.username, &req.password).await?;

    Ok(Json(RegisterResponse {
        message: "User registered".to_string(),
        user_id: user.id,
        username: user.username,
        created_at: user.created_at,
    }))
}

async fn login(
    State(ctx): State<AppContext>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let pair = ctx.account_manager.login(&req.username, &req.password).await?;
    Ok(Json(pair.into()))
}

/// Rotate the refresh token sent as the bearer credential
async fn refresh(
    State(ctx): State<AppContext>,
    BearerToken(refresh_token): BearerToken,
) -> AppResult<Json<TokenResponse>> {
    let pair = ctx.account_manager.refresh(&refresh_token).await?;
    Ok(Json(pair.into()))
}

async fn logout(
    State(ctx): State<AppContext>,
    BearerToken(refresh_token): BearerToken,
) -> AppResult<Json<MessageResponse>> {
    ctx.account_manager.logout(&refresh_token).await?;
    Ok(Json(MessageResponse::new("Logged out")))
}
