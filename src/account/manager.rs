/// Account manager: registration, login and session lifecycle
use super::{PasswordHasher, SessionAuthority, TokenPair};
use crate::{
    clock::Clock,
    db::{conflict_on_unique, models::User},
    error::{AppError, AppResult},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::OnceCell;

const MAX_USERNAME_LEN: usize = 64;
const MIN_PASSWORD_LEN: usize = 8;

/// Account manager service
pub struct AccountManager {
    db: SqlitePool,
    sessions: Arc<SessionAuthority>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
    /// Verified against for unknown usernames so both login failures cost one hash
    decoy_hash: OnceCell<String>,
}

impl AccountManager {
    pub fn new(
        db: SqlitePool,
        sessions: Arc<SessionAuthority>,
        hasher: PasswordHasher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            sessions,
            hasher,
            clock,
            decoy_hash: OnceCell::new(),
        }
    }

    /// Create a new user
    pub async fn register(&self, username: &str, password: &str) -> AppResult<User> {
        validate_username(username)?;
        validate_password(password)?;

        if self.get_user_by_username(username).await?.is_some() {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }

        let password_hash = self.hasher.hash(password).await?;
        let now = self.clock.now();

        // The UNIQUE constraint covers a concurrent registration of the same name
        let id = sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)")
            .bind(username)
            .bind(&password_hash)
            .bind(now)
            .execute(&self.db)
            .await
            .map_err(|e| conflict_on_unique(e, "Username already exists"))?
            .last_insert_rowid();

        tracing::info!(user_id = id, username, "User registered");

        Ok(User {
            id,
            username: username.to_string(),
            password_hash,
            created_at: now,
        })
    }

    /// Check credentials and open a session
    ///
    /// Unknown users and wrong passwords fail identically.
    pub async fn login(&self, username: &str, password: &str) -> AppResult<TokenPair> {
        let Some(user) = self.get_user_by_username(username).await? else {
            let decoy = self
                .decoy_hash
                .get_or_try_init(|| self.hasher.hash("unused-decoy-password"))
                .await?;
            self.hasher.verify(password, decoy).await?;

            tracing::warn!(username, "Login for unknown user");
            return Err(invalid_credentials());
        };

        if !self.hasher.verify(password, &user.password_hash).await? {
            tracing::warn!(user_id = user.id, "Login with wrong password");
            return Err(invalid_credentials());
        }

        self.sessions.issue_session(&user).await
    }

    pub async fn refresh(&self, refresh_token: &str) -> AppResult<TokenPair> {
        self.sessions.rotate_refresh(refresh_token).await
    }

    pub async fn logout(&self, refresh_token: &str) -> AppResult<()> {
        self.sessions.revoke(refresh_token).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized("Invalid credentials".to_string())
}

fn validate_username(username: &str) -> AppResult<()> {
    if username.is_empty() || username.chars().count() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be 1-{} characters",
            MAX_USERNAME_LEN
        )));
    }

    if username.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(AppError::Validation(
            "Username cannot contain whitespace or control characters".to_string(),
        ));
    }

    Ok(())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    Ok(())
}
