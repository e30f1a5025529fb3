/// Collaboration coordinator
///
/// Sharing and permission management for events. Holds no state of its own;
/// every decision and write is delegated to the permission table.
use crate::{
    error::AppResult,
    permissions::{PermissionEntry, PermissionTable, Role, RoleGrant},
};
use serde::Serialize;
use std::sync::Arc;

/// Result of a permission removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemovalOutcome {
    Removed,
    NotPresent,
}

#[derive(Clone)]
pub struct CollaborationCoordinator {
    permissions: Arc<PermissionTable>,
}

impl CollaborationCoordinator {
    pub fn new(permissions: Arc<PermissionTable>) -> Self {
        Self { permissions }
    }

    /// Share an event with a batch of users
    pub async fn share(&self, event_id: i64, actor_id: i64, grants: &[RoleGrant]) -> AppResult<()> {
        self.permissions.grant_or_update(event_id, actor_id, grants).await
    }

    pub async fn list_permissions(&self, event_id: i64, actor_id: i64) -> AppResult<Vec<PermissionEntry>> {
        self.permissions.list_for_event(event_id, actor_id).await
    }

    pub async fn update_permission(
        &self,
        event_id: i64,
        actor_id: i64,
        target_user_id: i64,
        role: Role,
    ) -> AppResult<()> {
        self.permissions
            .update_role(event_id, actor_id, target_user_id, role)
            .await
    }

    /// Remove a user's access to an event
    pub async fn remove_permission(
        &self,
        event_id: i64,
        actor_id: i64,
        target_user_id: i64,
    ) -> AppResult<RemovalOutcome> {
        let removed = self
            .permissions
            .remove(event_id, actor_id, target_user_id)
            .await?;

        Ok(if removed {
            RemovalOutcome::Removed
        } else {
            RemovalOutcome::NotPresent
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::SystemClock,
        db::{insert_test_user, test_pool},
        error::AppError,
        events::{EventFields, EventStore},
    };
    use chrono::{TimeZone, Utc};

    async fn setup() -> (CollaborationCoordinator, EventStore, i64, i64, i64) {
        let db = test_pool().await;
        let alice = insert_test_user(&db, "alice").await;
        let bob = insert_test_user(&db, "bob").await;
        let carol = insert_test_user(&db, "carol").await;

        let coordinator = CollaborationCoordinator::new(Arc::new(PermissionTable::new(db.clone())));
        let store = EventStore::new(db, Arc::new(SystemClock));
        (coordinator, store, alice, bob, carol)
    }

    async fn create_event(store: &EventStore, owner: i64) -> i64 {
        store
            .create(
                owner,
                EventFields {
                    title: "Standup".to_string(),
                    description: String::new(),
                    start_time: Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap(),
                    end_time: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
                    location: None,
                    is_recurring: false,
                    recurrence_pattern: None,
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_share_then_list() {
        let (coordinator, store, alice, bob, carol) = setup().await;
        let event_id = create_event(&store, alice).await;

        coordinator
            .share(
                event_id,
                alice,
                &[
                    RoleGrant { user_id: bob, role: Role::Editor },
                    RoleGrant { user_id: carol, role: Role::Viewer },
                ],
            )
            .await
            .unwrap();

        let entries = coordinator.list_permissions(event_id, carol).await.unwrap();
        assert_eq!(
            entries,
            vec![
                PermissionEntry { user_id: alice, role: Role::Owner },
                PermissionEntry { user_id: bob, role: Role::Editor },
                PermissionEntry { user_id: carol, role: Role::Viewer },
            ]
        );
    }

    #[tokio::test]
    async fn test_editor_cannot_share() {
        let (coordinator, store, alice, bob, carol) = setup().await;
        let event_id = create_event(&store, alice).await;
        coordinator
            .share(event_id, alice, &[RoleGrant { user_id: bob, role: Role::Editor }])
            .await
            .unwrap();

        let err = coordinator
            .share(event_id, bob, &[RoleGrant { user_id: carol, role: Role::Viewer }])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_update_and_remove_permission() {
        let (coordinator, store, alice, bob, carol) = setup().await;
        let event_id = create_event(&store, alice).await;
        coordinator
            .share(event_id, alice, &[RoleGrant { user_id: bob, role: Role::Viewer }])
            .await
            .unwrap();

        coordinator
            .update_permission(event_id, alice, bob, Role::Owner)
            .await
            .unwrap();

        // A promoted Owner can manage others
        assert_eq!(
            coordinator.remove_permission(event_id, bob, carol).await.unwrap(),
            RemovalOutcome::NotPresent
        );

        assert_eq!(
            coordinator.remove_permission(event_id, alice, bob).await.unwrap(),
            RemovalOutcome::Removed
        );
        let err = coordinator.list_permissions(event_id, bob).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
