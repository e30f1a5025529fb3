/// Authentication extractors
use crate::{
    account::UserIdentity, api::middleware::extract_bearer_token, context::AppContext, error::AppError,
};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

/// Authenticated caller, resolved from the bearer access token
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: i64,
    pub username: String,
}

impl From<UserIdentity> for AuthContext {
    fn from(identity: UserIdentity) -> Self {
        Self {
            user_id: identity.user_id,
            username: identity.username,
        }
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppContext) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)
            .ok_or_else(|| AppError::Unauthorized("Missing or invalid token".to_string()))?;

        let identity = state.session_authority.authenticate(&token)?;

        Ok(identity.into())
    }
}

/// Raw bearer credential, used where the header carries a refresh token
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_bearer_token(&parts.headers)
            .map(BearerToken)
            .ok_or_else(|| AppError::Unauthorized("Missing or invalid token".to_string()))
    }
}
