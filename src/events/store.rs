/// Event store with append-only version history
use super::{diff_snapshots, ChangelogEntry, DiffMode, Event, EventDiff, EventFields, VersionView, MAX_PAGE_SIZE};
use crate::{
    clock::Clock,
    db::models::EventVersion,
    error::{AppError, AppResult},
    permissions::{insert_owner_in, require_in, Role},
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;

const EVENT_COLUMNS: &str =
    "id, title, description, start_time, end_time, location, is_recurring, recurrence_pattern, owner_id";

/// Versioned event store
#[derive(Clone)]
pub struct EventStore {
    db: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl EventStore {
    pub fn new(db: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Create an event with its Owner permission and initial version
    pub async fn create(&self, owner_id: i64, fields: EventFields) -> AppResult<Event> {
        fields.validate()?;

        let mut tx = self.db.begin().await?;
        let event = insert_event_in(&mut tx, owner_id, &fields, self.clock.now()).await?;
        tx.commit().await?;

        tracing::info!(event_id = event.id, owner_id, "Event created");
        Ok(event)
    }

    /// Create several events in one transaction
    ///
    /// The batch is all-or-nothing: if any item fails, none are kept.
    pub async fn create_batch(&self, owner_id: i64, items: Vec<EventFields>) -> AppResult<Vec<Event>> {
        for (index, fields) in items.iter().enumerate() {
            fields.validate().map_err(|e| match e {
                AppError::Validation(msg) => AppError::Validation(format!("Event {}: {}", index, msg)),
                other => other,
            })?;
        }

        let now = self.clock.now();
        let mut tx = self.db.begin().await?;
        let mut events = Vec::with_capacity(items.len());
        for fields in &items {
            events.push(insert_event_in(&mut tx, owner_id, fields, now).await?);
        }
        tx.commit().await?;

        tracing::info!(owner_id, count = events.len(), "Event batch created");
        Ok(events)
    }

    /// Get an event the caller holds any role on
    pub async fn get(&self, event_id: i64, caller_id: i64) -> AppResult<Event> {
        let mut conn = self.db.acquire().await?;

        require_in(&mut conn, event_id, caller_id, Role::Viewer, "Access denied").await?;
        fetch_event_in(&mut conn, event_id).await
    }

    /// List events the caller holds any role on, in creation order
    pub async fn list(&self, caller_id: i64, skip: i64, limit: i64) -> AppResult<Vec<Event>> {
        let limit = limit.clamp(0, MAX_PAGE_SIZE);
        let skip = skip.max(0);

        let events = sqlx::query_as::<_, Event>(
            r#"
            SELECT e.id, e.title, e.description, e.start_time, e.end_time, e.location,
                   e.is_recurring, e.recurrence_pattern, e.owner_id
            FROM events e
            JOIN event_permissions p ON p.event_id = e.id
            WHERE p.user_id = ?1
            ORDER BY e.id
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(caller_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.db)
        .await?;

        tracing::debug!(caller_id, skip, limit, returned = events.len(), "Listed events");
        Ok(events)
    }

    /// Replace every field of an event and record the new state
    pub async fn update(&self, event_id: i64, caller_id: i64, fields: EventFields) -> AppResult<Event> {
        fields.validate()?;

        let mut tx = self.db.begin().await?;

        require_in(&mut tx, event_id, caller_id, Role::Editor, "Insufficient permissions").await?;
        let existing = fetch_event_in(&mut tx, event_id).await?;

        write_fields_in(&mut tx, event_id, &fields).await?;
        let version_id = append_version_in(&mut tx, event_id, &fields, self.clock.now()).await?;

        tx.commit().await?;

        tracing::info!(event_id, caller_id, version_id, "Event updated");
        Ok(with_fields(existing, fields))
    }

    /// Delete an event together with its permissions and versions
    pub async fn delete(&self, event_id: i64, caller_id: i64) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        require_in(&mut tx, event_id, caller_id, Role::Owner, "Only owner can delete the event").await?;
        fetch_event_in(&mut tx, event_id).await?;

        sqlx::query("DELETE FROM event_versions WHERE event_id = ?1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM event_permissions WHERE event_id = ?1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM events WHERE id = ?1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(event_id, caller_id, "Event deleted");
        Ok(())
    }

    /// Get one stored snapshot of an event
    pub async fn get_version(&self, event_id: i64, version_id: i64, caller_id: i64) -> AppResult<VersionView> {
        let mut conn = self.db.acquire().await?;

        require_in(&mut conn, event_id, caller_id, Role::Viewer, "Access denied").await?;
        let version = fetch_version_in(&mut conn, event_id, version_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Version not found".to_string()))?;

        Ok(VersionView {
            version_id: version.id,
            event_id: version.event_id,
            data: Value::Object(parse_snapshot(&version)?),
            timestamp: version.timestamp,
        })
    }

    /// Restore an event to a stored snapshot
    ///
    /// The restore is appended as a new version; history is never truncated.
    pub async fn rollback(&self, event_id: i64, version_id: i64, caller_id: i64) -> AppResult<Event> {
        let mut tx = self.db.begin().await?;

        require_in(&mut tx, event_id, caller_id, Role::Owner, "Only owners can rollback").await?;

        let version = fetch_version_in(&mut tx, event_id, version_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Version not found".to_string()))?;
        let existing = fetch_event_in(&mut tx, event_id).await?;

        let restored: EventFields = serde_json::from_str(&version.data).map_err(|e| {
            AppError::Internal(format!("Corrupt snapshot {} for event {}: {}", version.id, event_id, e))
        })?;

        write_fields_in(&mut tx, event_id, &restored).await?;
        let new_version_id = append_version_in(&mut tx, event_id, &restored, self.clock.now()).await?;

        tx.commit().await?;

        tracing::info!(
            event_id,
            caller_id,
            restored_from = version_id,
            version_id = new_version_id,
            "Event rolled back"
        );
        Ok(with_fields(existing, restored))
    }

    /// List all versions of an event, newest first
    pub async fn changelog(&self, event_id: i64, caller_id: i64) -> AppResult<Vec<ChangelogEntry>> {
        let mut conn = self.db.acquire().await?;

        require_in(&mut conn, event_id, caller_id, Role::Viewer, "Access denied").await?;

        let rows: Vec<(i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT id, timestamp
            FROM event_versions
            WHERE event_id = ?1
            ORDER BY timestamp DESC, id DESC
            "#,
        )
        .bind(event_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(version_id, timestamp)| ChangelogEntry { version_id, timestamp })
            .collect())
    }

    /// Field-level diff between two versions of one event
    pub async fn diff(
        &self,
        event_id: i64,
        first_version_id: i64,
        second_version_id: i64,
        caller_id: i64,
        mode: DiffMode,
    ) -> AppResult<EventDiff> {
        let mut conn = self.db.acquire().await?;

        require_in(&mut conn, event_id, caller_id, Role::Viewer, "Access denied").await?;

        let first = fetch_version_in(&mut conn, event_id, first_version_id).await?;
        let second = fetch_version_in(&mut conn, event_id, second_version_id).await?;
        let (first, second) = match (first, second) {
            (Some(first), Some(second)) => (first, second),
            _ => return Err(AppError::NotFound("One or both versions not found".to_string())),
        };

        Ok(diff_snapshots(&parse_snapshot(&first)?, &parse_snapshot(&second)?, mode))
    }
}

async fn insert_event_in(
    conn: &mut SqliteConnection,
    owner_id: i64,
    fields: &EventFields,
    now: DateTime<Utc>,
) -> AppResult<Event> {
    let event_id = sqlx::query(
        r#"
        INSERT INTO events (title, description, start_time, end_time, location, is_recurring, recurrence_pattern, owner_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.start_time)
    .bind(fields.end_time)
    .bind(&fields.location)
    .bind(fields.is_recurring)
    .bind(&fields.recurrence_pattern)
    .bind(owner_id)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    insert_owner_in(conn, event_id, owner_id).await?;
    append_version_in(conn, event_id, fields, now).await?;

    Ok(Event {
        id: event_id,
        title: fields.title.clone(),
        description: fields.description.clone(),
        start_time: fields.start_time,
        end_time: fields.end_time,
        location: fields.location.clone(),
        is_recurring: fields.is_recurring,
        recurrence_pattern: fields.recurrence_pattern.clone(),
        owner_id,
    })
}

async fn write_fields_in(conn: &mut SqliteConnection, event_id: i64, fields: &EventFields) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE events
        SET title = ?1, description = ?2, start_time = ?3, end_time = ?4,
            location = ?5, is_recurring = ?6, recurrence_pattern = ?7
        WHERE id = ?8
        "#,
    )
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.start_time)
    .bind(fields.end_time)
    .bind(&fields.location)
    .bind(fields.is_recurring)
    .bind(&fields.recurrence_pattern)
    .bind(event_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn append_version_in(
    conn: &mut SqliteConnection,
    event_id: i64,
    fields: &EventFields,
    timestamp: DateTime<Utc>,
) -> AppResult<i64> {
    let data = serde_json::to_string(fields)
        .map_err(|e| AppError::Internal(format!("Failed to serialize snapshot: {}", e)))?;

    let version_id = sqlx::query("INSERT INTO event_versions (event_id, data, timestamp) VALUES (?1, ?2, ?3)")
        .bind(event_id)
        .bind(data)
        .bind(timestamp)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    Ok(version_id)
}

async fn fetch_event_in(conn: &mut SqliteConnection, event_id: i64) -> AppResult<Event> {
    sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = ?1", EVENT_COLUMNS))
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

async fn fetch_version_in(
    conn: &mut SqliteConnection,
    event_id: i64,
    version_id: i64,
) -> AppResult<Option<EventVersion>> {
    let version = sqlx::query_as::<_, EventVersion>(
        "SELECT id, event_id, data, timestamp FROM event_versions WHERE event_id = ?1 AND id = ?2",
    )
    .bind(event_id)
    .bind(version_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(version)
}

fn parse_snapshot(version: &EventVersion) -> AppResult<Map<String, Value>> {
    serde_json::from_str(&version.data)
        .map_err(|e| AppError::Internal(format!("Corrupt snapshot {}: {}", version.id, e)))
}

/// Live record with `fields` applied; id and owner are kept
fn with_fields(event: Event, fields: EventFields) -> Event {
    Event {
        id: event.id,
        title: fields.title,
        description: fields.description,
        start_time: fields.start_time,
        end_time: fields.end_time,
        location: fields.location,
        is_recurring: fields.is_recurring,
        recurrence_pattern: fields.recurrence_pattern,
        owner_id: event.owner_id,
    }
}
