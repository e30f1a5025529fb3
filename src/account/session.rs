/// Session authority: JWT access/refresh pairs with single-use refresh rotation
use super::{TokenPair, UserIdentity};
use crate::{
    clock::Clock,
    config::ServerConfig,
    db::models::User,
    error::{AppError, AppResult},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    name: String,
    iat: i64,
    exp: i64,
    jti: String,
}

#[derive(Debug, Clone, Copy)]
enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Issues, verifies, rotates and revokes session tokens
pub struct SessionAuthority {
    db: SqlitePool,
    config: Arc<ServerConfig>,
    clock: Arc<dyn Clock>,
}

impl SessionAuthority {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>, clock: Arc<dyn Clock>) -> Self {
        Self { db, config, clock }
    }

    /// Mint a token pair for a user and persist the refresh token
    pub async fn issue_session(&self, user: &User) -> AppResult<TokenPair> {
        let mut conn = self.db.acquire().await?;
        let pair = self.mint_pair_in(&mut conn, user.id, &user.username).await?;

        tracing::info!(user_id = user.id, "Session issued");
        Ok(pair)
    }

    /// Resolve the caller behind an access token
    ///
    /// Stateless: only the signature and expiry are checked.
    pub fn authenticate(&self, access_token: &str) -> AppResult<UserIdentity> {
        let claims = self.verify(access_token, TokenKind::Access)?;
        identity_from(&claims)
    }

    /// Exchange a refresh token for a new pair
    ///
    /// The presented token's row is deleted in the same transaction that
    /// inserts its successor. A token that no longer has a row (already
    /// rotated, revoked or never issued) is rejected.
    pub async fn rotate_refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        let claims = self.verify(refresh_token, TokenKind::Refresh)?;
        let identity = identity_from(&claims)?;

        let mut tx = self.db.begin().await?;

        // Single conditional delete: of two concurrent rotations exactly one sees a row
        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?1 AND user_id = ?2")
            .bind(refresh_token)
            .bind(identity.user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let username: Option<String> = sqlx::query_scalar("SELECT username FROM users WHERE id = ?1")
            .bind(identity.user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let username = match (deleted, username) {
            (_, None) => return Err(AppError::NotFound("User not found".to_string())),
            (0, Some(_)) => {
                tracing::warn!(user_id = identity.user_id, "Refresh token replayed or revoked");
                return Err(AppError::Unauthorized(
                    "Refresh token expired or already used".to_string(),
                ));
            }
            (_, Some(username)) => username,
        };

        let pair = self.mint_pair_in(&mut tx, identity.user_id, &username).await?;
        tx.commit().await?;

        tracing::info!(user_id = identity.user_id, "Refresh token rotated");
        Ok(pair)
    }

    /// Delete a persisted refresh token
    pub async fn revoke(&self, refresh_token: &str) -> AppResult<()> {
        let deleted = sqlx::query("DELETE FROM refresh_tokens WHERE token = ?1")
            .bind(refresh_token)
            .execute(&self.db)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(AppError::InvalidOperation(
                "Token already invalidated or not found".to_string(),
            ));
        }

        tracing::info!("Refresh token revoked");
        Ok(())
    }

    /// Delete refresh token rows past their expiry
    pub async fn purge_expired(&self) -> AppResult<u64> {
        let purged = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < ?1")
            .bind(self.clock.now())
            .execute(&self.db)
            .await?
            .rows_affected();

        if purged > 0 {
            tracing::info!(purged, "Purged expired refresh tokens");
        } else {
            tracing::debug!("Refresh token purge: nothing expired");
        }

        Ok(purged)
    }

    async fn mint_pair_in(
        &self,
        conn: &mut SqliteConnection,
        user_id: i64,
        username: &str,
    ) -> AppResult<TokenPair> {
        let now = self.clock.now();
        let auth = &self.config.authentication;

        let access_expires = now + Duration::minutes(auth.access_token_ttl_minutes);
        let refresh_expires = now + Duration::minutes(auth.refresh_token_ttl_minutes);

        let access_token = self.sign(user_id, username, now, access_expires, TokenKind::Access)?;
        let refresh_token = self.sign(user_id, username, now, refresh_expires, TokenKind::Refresh)?;

        sqlx::query(
            "INSERT INTO refresh_tokens (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&refresh_token)
        .bind(user_id)
        .bind(now)
        .bind(refresh_expires)
        .execute(&mut *conn)
        .await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    fn secret(&self, kind: TokenKind) -> &[u8] {
        match kind {
            TokenKind::Access => self.config.authentication.access_token_secret.as_bytes(),
            TokenKind::Refresh => self.config.authentication.refresh_token_secret.as_bytes(),
        }
    }

    fn sign(
        &self,
        user_id: i64,
        username: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        kind: TokenKind,
    ) -> AppResult<String> {
        let claims = Claims {
            sub: user_id.to_string(),
            name: username.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::new(self.config.authentication.algorithm),
            &claims,
            &EncodingKey::from_secret(self.secret(kind)),
        )
        .map_err(|e| AppError::Jwt(format!("Failed to generate {} token: {}", kind.as_str(), e)))
    }

    fn verify(&self, token: &str, kind: TokenKind) -> AppResult<Claims> {
        // Expiry is checked against the injected clock below
        let mut validation = Validation::new(self.config.authentication.algorithm);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = decode::<Claims>(token, &DecodingKey::from_secret(self.secret(kind)), &validation)
            .map_err(|e| {
                tracing::warn!(kind = kind.as_str(), error = %e, "Rejected token");
                AppError::Unauthorized(format!("Invalid {} token", kind.as_str()))
            })?
            .claims;

        if claims.exp <= self.clock.now().timestamp() {
            tracing::warn!(kind = kind.as_str(), sub = %claims.sub, "Expired token");
            return Err(AppError::Unauthorized(format!("{} token expired", kind.as_str())));
        }

        Ok(claims)
    }
}

fn identity_from(claims: &Claims) -> AppResult<UserIdentity> {
    let user_id = claims
        .sub
        .parse()
        .map_err(|_| AppError::Unauthorized("Malformed token subject".to_string()))?;

    Ok(UserIdentity {
        user_id,
        username: claims.name.clone(),
    })
}
