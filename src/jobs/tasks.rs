/// Background task implementations
use crate::{context::AppContext, db, error::AppResult};

/// Delete refresh tokens past their expiry
pub async fn purge_expired_refresh_tokens(ctx: &AppContext) -> AppResult<u64> {
    ctx.session_authority.purge_expired().await
}

/// Health check - verify the database answers
pub async fn health_check(ctx: &AppContext) -> AppResult<()> {
    db::test_connection(&ctx.db).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_purge_removes_only_expired_rows() {
        let ctx = AppContext::for_tests().await;
        let user_id = db::insert_test_user(&ctx.db, "alice").await;
        let now = Utc::now();

        for (token, expires_at) in [
            ("stale", now - Duration::hours(1)),
            ("fresh", now + Duration::hours(1)),
        ] {
            sqlx::query(
                "INSERT INTO refresh_tokens (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(token)
            .bind(user_id)
            .bind(now - Duration::days(1))
            .bind(expires_at)
            .execute(&ctx.db)
            .await
            .unwrap();
        }

        assert_eq!(purge_expired_refresh_tokens(&ctx).await.unwrap(), 1);

        let remaining: Vec<String> = sqlx::query_scalar("SELECT token FROM refresh_tokens")
            .fetch_all(&ctx.db)
            .await
            .unwrap();
        assert_eq!(remaining, vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_health_check() {
        let ctx = AppContext::for_tests().await;
        assert!(health_check(&ctx).await.is_ok());
    }
}
