/// Event permission roles and the per-event permission table
mod table;

pub use table::PermissionTable;
pub(crate) use table::{insert_owner_in, require_in};

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Role a user holds on a single event
///
/// Declaration order is capability order: an Owner can do everything an
/// Editor can, and an Editor everything a Viewer can.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum Role {
    /// Read-only access
    Viewer,
    /// Can modify event fields
    Editor,
    /// Can delete, share, roll back and manage permissions
    Owner,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "Viewer",
            Role::Editor => "Editor",
            Role::Owner => "Owner",
        }
    }

    /// Check if this role can perform actions requiring another role
    pub fn can_act_as(&self, required: Role) -> bool {
        self >= &required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "editor" => Ok(Role::Editor),
            "owner" => Ok(Role::Owner),
            _ => Err(AppError::Validation(format!("Invalid role: {}", s))),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One (user, role) target of a share request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
    pub user_id: i64,
    pub role: Role,
}

/// Permission listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionEntry {
    pub user_id: i64,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_hierarchy() {
        assert!(Role::Owner > Role::Editor);
        assert!(Role::Editor > Role::Viewer);

        assert!(Role::Owner.can_act_as(Role::Editor));
        assert!(Role::Owner.can_act_as(Role::Viewer));
        assert!(Role::Editor.can_act_as(Role::Viewer));
        assert!(Role::Editor.can_act_as(Role::Editor));

        assert!(!Role::Viewer.can_act_as(Role::Editor));
        assert!(!Role::Editor.can_act_as(Role::Owner));
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Owner".parse::<Role>().unwrap(), Role::Owner);
        assert_eq!("editor".parse::<Role>().unwrap(), Role::Editor);
        assert_eq!("VIEWER".parse::<Role>().unwrap(), Role::Viewer);

        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_capitalized() {
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"Editor\"");
        let grant: RoleGrant = serde_json::from_str(r#"{"user_id": 2, "role": "Viewer"}"#).unwrap();
        assert_eq!(grant.role, Role::Viewer);
    }

    #[test]
    fn test_role_deserializes_like_from_str() {
        let grant: RoleGrant = serde_json::from_str(r#"{"user_id": 2, "role": "owner"}"#).unwrap();
        assert_eq!(grant.role, Role::Owner);

        let err = serde_json::from_str::<RoleGrant>(r#"{"user_id": 2, "role": "admin"}"#).unwrap_err();
        assert!(err.to_string().contains("Invalid role: admin"));
    }
}
