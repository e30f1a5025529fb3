/// Permission table: the authorization oracle for event operations
use super::{PermissionEntry, Role, RoleGrant};
use crate::{
    db::models::EventPermission,
    error::{AppError, AppResult},
};
use sqlx::{SqliteConnection, SqlitePool};

/// Permission table manager
#[derive(Clone)]
pub struct PermissionTable {
    db: SqlitePool,
}

impl PermissionTable {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Grant or update roles for a batch of users
    ///
    /// The actor must be an Owner. All targets are written in one transaction,
    /// so an invalid target leaves the table untouched.
    pub async fn grant_or_update(
        &self,
        event_id: i64,
        actor_id: i64,
        grants: &[RoleGrant],
    ) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        require_in(&mut tx, event_id, actor_id, Role::Owner, "Only owners can share the event").await?;
        let creator_id = event_owner_in(&mut tx, event_id).await?;

        for grant in grants {
            ensure_user_exists_in(&mut tx, grant.user_id).await?;
            guard_creator_role(creator_id, grant.user_id, grant.role)?;

            sqlx::query(
                r#"
                INSERT INTO event_permissions (event_id, user_id, role)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(event_id, user_id) DO UPDATE SET role = excluded.role
                "#,
            )
            .bind(event_id)
            .bind(grant.user_id)
            .bind(grant.role.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(event_id, actor_id, grants = grants.len(), "Permissions updated");
        Ok(())
    }

    /// Get the role a user holds on an event
    pub async fn lookup(&self, event_id: i64, user_id: i64) -> AppResult<Option<Role>> {
        let mut conn = self.db.acquire().await?;
        lookup_in(&mut conn, event_id, user_id).await
    }

    /// List every role assignment on an event
    ///
    /// The requester must hold some role on the event.
    pub async fn list_for_event(
        &self,
        event_id: i64,
        requester_id: i64,
    ) -> AppResult<Vec<PermissionEntry>> {
        let mut conn = self.db.acquire().await?;

        require_in(&mut conn, event_id, requester_id, Role::Viewer, "Permission denied").await?;

        let rows: Vec<EventPermission> = sqlx::query_as(
            r#"
            SELECT id, event_id, user_id, role
            FROM event_permissions
            WHERE event_id = ?1
            ORDER BY id
            "#,
        )
        .bind(event_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|p| PermissionEntry {
                user_id: p.user_id,
                role: p.role,
            })
            .collect())
    }

    /// Change the role of an existing permission
    pub async fn update_role(
        &self,
        event_id: i64,
        actor_id: i64,
        target_user_id: i64,
        role: Role,
    ) -> AppResult<()> {
        let mut tx = self.db.begin().await?;

        require_in(&mut tx, event_id, actor_id, Role::Owner, "Only owners can update permissions").await?;

        if lookup_in(&mut tx, event_id, target_user_id).await?.is_none() {
            return Err(AppError::NotFound("Permission not found".to_string()));
        }

        let creator_id = event_owner_in(&mut tx, event_id).await?;
        guard_creator_role(creator_id, target_user_id, role)?;

        sqlx::query("UPDATE event_permissions SET role = ?1 WHERE event_id = ?2 AND user_id = ?3")
            .bind(role.as_str())
            .bind(event_id)
            .bind(target_user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(event_id, actor_id, target_user_id, role = %role, "Permission updated");
        Ok(())
    }

    /// Remove a user's permission
    ///
    /// Returns whether a row was actually removed.
    pub async fn remove(&self, event_id: i64, actor_id: i64, target_user_id: i64) -> AppResult<bool> {
        let mut tx = self.db.begin().await?;

        require_in(&mut tx, event_id, actor_id, Role::Owner, "Only owners can remove permissions").await?;

        let creator_id = event_owner_in(&mut tx, event_id).await?;
        if target_user_id == creator_id {
            return Err(AppError::InvalidOperation(
                "The event creator's Owner permission cannot be removed".to_string(),
            ));
        }

        let result = sqlx::query("DELETE FROM event_permissions WHERE event_id = ?1 AND user_id = ?2")
            .bind(event_id)
            .bind(target_user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let removed = result.rows_affected() > 0;
        tracing::info!(event_id, actor_id, target_user_id, removed, "Permission removal processed");
        Ok(removed)
    }
}

pub(crate) async fn lookup_in(
    conn: &mut SqliteConnection,
    event_id: i64,
    user_id: i64,
) -> AppResult<Option<Role>> {
    let role: Option<String> =
        sqlx::query_scalar("SELECT role FROM event_permissions WHERE event_id = ?1 AND user_id = ?2")
            .bind(event_id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

    role.map(|r| r.parse()).transpose()
}

/// Fail with Forbidden unless the user holds at least `required` on the event
pub(crate) async fn require_in(
    conn: &mut SqliteConnection,
    event_id: i64,
    user_id: i64,
    required: Role,
    denial: &str,
) -> AppResult<Role> {
    match lookup_in(conn, event_id, user_id).await? {
        Some(role) if role.can_act_as(required) => Ok(role),
        held => {
            tracing::warn!(
                event_id,
                user_id,
                required = %required,
                held = ?held,
                "Access denied"
            );
            Err(AppError::Forbidden(denial.to_string()))
        }
    }
}

pub(crate) async fn insert_owner_in(
    conn: &mut SqliteConnection,
    event_id: i64,
    user_id: i64,
) -> AppResult<()> {
    sqlx::query("INSERT INTO event_permissions (event_id, user_id, role) VALUES (?1, ?2, ?3)")
        .bind(event_id)
        .bind(user_id)
        .bind(Role::Owner.as_str())
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn event_owner_in(conn: &mut SqliteConnection, event_id: i64) -> AppResult<i64> {
    sqlx::query_scalar("SELECT owner_id FROM events WHERE id = ?1")
        .bind(event_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

async fn ensure_user_exists_in(conn: &mut SqliteConnection, user_id: i64) -> AppResult<()> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = ?1")
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

    match exists {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("User {} not found", user_id))),
    }
}

/// The creator keeps Owner for the lifetime of the event
fn guard_creator_role(creator_id: i64, target_user_id: i64, role: Role) -> AppResult<()> {
    if target_user_id == creator_id && role != Role::Owner {
        return Err(AppError::InvalidOperation(
            "The event creator must remain an Owner".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{insert_test_user, test_pool};

    async fn insert_event(db: &SqlitePool, owner_id: i64) -> i64 {
        let now = chrono::Utc::now();
        let id = sqlx::query(
            "INSERT INTO events (title, description, start_time, end_time, is_recurring, owner_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind("Standup")
        .bind("Daily")
        .bind(now)
        .bind(now)
        .bind(false)
        .bind(owner_id)
        .execute(db)
        .await
        .unwrap()
        .last_insert_rowid();

        let mut conn = db.acquire().await.unwrap();
        insert_owner_in(&mut conn, id, owner_id).await.unwrap();
        id
    }

    async fn setup() -> (PermissionTable, i64, i64, i64, i64) {
        let db = test_pool().await;
        let alice = insert_test_user(&db, "alice").await;
        let bob = insert_test_user(&db, "bob").await;
        let carol = insert_test_user(&db, "carol").await;
        let event = insert_event(&db, alice).await;
        (PermissionTable::new(db), event, alice, bob, carol)
    }

    #[tokio::test]
    async fn test_grant_and_lookup() {
        let (table, event, alice, bob, carol) = setup().await;

        table
            .grant_or_update(
                event,
                alice,
                &[
                    RoleGrant { user_id: bob, role: Role::Viewer },
                    RoleGrant { user_id: carol, role: Role::Editor },
                ],
            )
            .await
            .unwrap();

        assert_eq!(table.lookup(event, alice).await.unwrap(), Some(Role::Owner));
        assert_eq!(table.lookup(event, bob).await.unwrap(), Some(Role::Viewer));
        assert_eq!(table.lookup(event, carol).await.unwrap(), Some(Role::Editor));

        // Re-granting updates in place instead of adding a second row
        table
            .grant_or_update(event, alice, &[RoleGrant { user_id: bob, role: Role::Editor }])
            .await
            .unwrap();
        let entries = table.list_for_event(event, alice).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(table.lookup(event, bob).await.unwrap(), Some(Role::Editor));
    }

    #[tokio::test]
    async fn test_only_owner_can_grant() {
        let (table, event, alice, bob, carol) = setup().await;
        table
            .grant_or_update(event, alice, &[RoleGrant { user_id: bob, role: Role::Editor }])
            .await
            .unwrap();

        let err = table
            .grant_or_update(event, bob, &[RoleGrant { user_id: carol, role: Role::Viewer }])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = table
            .grant_or_update(event, carol, &[RoleGrant { user_id: carol, role: Role::Owner }])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert_eq!(table.lookup(event, carol).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_batch_grant_rolls_back_on_unknown_user() {
        let (table, event, alice, bob, _carol) = setup().await;

        let err = table
            .grant_or_update(
                event,
                alice,
                &[
                    RoleGrant { user_id: bob, role: Role::Viewer },
                    RoleGrant { user_id: 999, role: Role::Viewer },
                ],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(table.lookup(event, bob).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_creator_cannot_be_demoted_or_removed() {
        let (table, event, alice, bob, _carol) = setup().await;
        table
            .grant_or_update(event, alice, &[RoleGrant { user_id: bob, role: Role::Owner }])
            .await
            .unwrap();

        let err = table
            .grant_or_update(event, bob, &[RoleGrant { user_id: alice, role: Role::Viewer }])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));

        let err = table.update_role(event, bob, alice, Role::Editor).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));

        let err = table.remove(event, bob, alice).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidOperation(_)));

        assert_eq!(table.lookup(event, alice).await.unwrap(), Some(Role::Owner));
    }

    #[tokio::test]
    async fn test_update_role() {
        let (table, event, alice, bob, carol) = setup().await;

        let err = table.update_role(event, alice, bob, Role::Editor).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        table
            .grant_or_update(event, alice, &[RoleGrant { user_id: bob, role: Role::Viewer }])
            .await
            .unwrap();

        let err = table.update_role(event, bob, bob, Role::Owner).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = table.update_role(event, carol, bob, Role::Owner).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        table.update_role(event, alice, bob, Role::Editor).await.unwrap();
        assert_eq!(table.lookup(event, bob).await.unwrap(), Some(Role::Editor));
    }

    #[tokio::test]
    async fn test_remove_reports_whether_row_existed() {
        let (table, event, alice, bob, carol) = setup().await;
        table
            .grant_or_update(event, alice, &[RoleGrant { user_id: bob, role: Role::Viewer }])
            .await
            .unwrap();

        let err = table.remove(event, bob, bob).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        assert!(table.remove(event, alice, bob).await.unwrap());
        assert!(!table.remove(event, alice, bob).await.unwrap());
        assert!(!table.remove(event, alice, carol).await.unwrap());
        assert_eq!(table.lookup(event, bob).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_requires_some_role() {
        let (table, event, alice, bob, carol) = setup().await;
        table
            .grant_or_update(event, alice, &[RoleGrant { user_id: bob, role: Role::Viewer }])
            .await
            .unwrap();

        let first = table.list_for_event(event, bob).await.unwrap();
        let second = table.list_for_event(event, bob).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            vec![
                PermissionEntry { user_id: alice, role: Role::Owner },
                PermissionEntry { user_id: bob, role: Role::Viewer },
            ]
        );

        let err = table.list_for_event(event, carol).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
