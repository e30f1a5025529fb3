/// Application context and dependency injection
use crate::{
    account::{AccountManager, PasswordHasher, SessionAuthority},
    clock::{Clock, SystemClock},
    collaboration::CollaborationCoordinator,
    config::ServerConfig,
    db,
    error::AppResult,
    events::EventStore,
    permissions::PermissionTable,
    rate_limit::RateLimiter,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub db: SqlitePool,
    pub session_authority: Arc<SessionAuthority>,
    pub account_manager: Arc<AccountManager>,
    pub event_store: Arc<EventStore>,
    pub collaboration: Arc<CollaborationCoordinator>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> AppResult<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.storage.data_directory).await?;

        let db = db::create_pool(&config.storage.database, db::DatabaseOptions::default()).await?;
        db::run_migrations(&db).await?;
        db::test_connection(&db).await?;

        tracing::info!(database = %config.storage.database.display(), "Database ready");

        Ok(Self::assemble(
            config,
            db,
            Arc::new(SystemClock),
            PasswordHasher::default(),
        ))
    }

    /// Wire services over an existing pool
    pub fn assemble(
        config: ServerConfig,
        db: SqlitePool,
        clock: Arc<dyn Clock>,
        hasher: PasswordHasher,
    ) -> Self {
        let config = Arc::new(config);

        let session_authority = Arc::new(SessionAuthority::new(db.clone(), config.clone(), clock.clone()));
        let account_manager = Arc::new(AccountManager::new(
            db.clone(),
            session_authority.clone(),
            hasher,
            clock.clone(),
        ));
        let permissions = Arc::new(PermissionTable::new(db.clone()));
        let event_store = Arc::new(EventStore::new(db.clone(), clock));
        let collaboration = Arc::new(CollaborationCoordinator::new(permissions));
        let rate_limiter = Arc::new(RateLimiter::new(&config.rate_limit));

        Self {
            config,
            db,
            session_authority,
            account_manager,
            event_store,
            collaboration,
            rate_limiter,
        }
    }

    /// Context over a fresh in-memory database
    #[cfg(test)]
    pub async fn for_tests() -> Self {
        Self::assemble(
            crate::config::test_config(),
            db::test_pool().await,
            Arc::new(SystemClock),
            PasswordHasher::fast(),
        )
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}",
            self.config.service.hostname, self.config.service.port
        )
    }
}
