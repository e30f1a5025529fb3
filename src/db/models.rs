/// Database records
use crate::permissions::Role;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// User record in the database
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Persisted refresh token; the row is deleted when the token is used
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Live event record
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub is_recurring: bool,
    pub recurrence_pattern: Option<String>,
    pub owner_id: i64,
}

/// Role assignment of one user on one event
#[derive(Debug, Clone, FromRow)]
pub struct EventPermission {
    pub id: i64,
    pub event_id: i64,
    pub user_id: i64,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

/// Immutable snapshot of an event's full field set
#[derive(Debug, Clone, FromRow)]
pub struct EventVersion {
    pub id: i64,
    pub event_id: i64,
    /// JSON-serialized field set
    pub data: String,
    pub timestamp: DateTime<Utc>,
}
