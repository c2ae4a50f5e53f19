use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role assigned to a user on a single protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Owner,
    Admin,
    Editor,
    Viewer,
    Guest,
}

impl Role {
    /// Permissions implied by the role. Exhaustive over all roles, so a new
    /// role without a defined permission set fails to compile.
    pub fn permissions(self) -> &'static [Permission] {
        use Permission::*;
        match self {
            Role::Owner => &[Read, Write, Execute, Share, Delete, Analytics, Export],
            Role::Admin => &[Read, Write, Execute, Share, Analytics, Export],
            Role::Editor => &[Read, Write, Execute],
            Role::Viewer => &[Read],
            Role::Guest => &[Read],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Admin => "ADMIN",
            Role::Editor => "EDITOR",
            Role::Viewer => "VIEWER",
            Role::Guest => "GUEST",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OWNER" => Ok(Role::Owner),
            "ADMIN" => Ok(Role::Admin),
            "EDITOR" => Ok(Role::Editor),
            "VIEWER" => Ok(Role::Viewer),
            "GUEST" => Ok(Role::Guest),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// A single grantable capability on a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    Read,
    Write,
    Execute,
    Share,
    Delete,
    Analytics,
    Export,
}

impl Permission {
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::Read => "READ",
            Permission::Write => "WRITE",
            Permission::Execute => "EXECUTE",
            Permission::Share => "SHARE",
            Permission::Delete => "DELETE",
            Permission::Analytics => "ANALYTICS",
            Permission::Export => "EXPORT",
        }
    }
}

impl std::str::FromStr for Permission {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READ" => Ok(Permission::Read),
            "WRITE" => Ok(Permission::Write),
            "EXECUTE" => Ok(Permission::Execute),
            "SHARE" => Ok(Permission::Share),
            "DELETE" => Ok(Permission::Delete),
            "ANALYTICS" => Ok(Permission::Analytics),
            "EXPORT" => Ok(Permission::Export),
            other => Err(format!("unknown permission: {}", other)),
        }
    }
}

/// Stored role/permission assignment for one user on one protocol.
/// Unique per (resource_id, user_id); granting again overwrites in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grant {
    pub resource_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
    /// Explicit permissions on top of the role matrix.
    pub permissions: Vec<Permission>,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Grant {
    /// A grant counts only while active and unexpired; anything else is
    /// treated the same as no grant at all.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp > now)
    }

    /// True if either the role matrix or the explicit set carries the
    /// permission. Does not consider effectiveness.
    pub fn allows(&self, permission: Permission) -> bool {
        self.role.permissions().contains(&permission) || self.permissions.contains(&permission)
    }
}

/// Introspection view of an effective grant, as returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantView {
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&Grant> for GrantView {
    fn from(grant: &Grant) -> Self {
        Self {
            role: grant.role,
            permissions: grant.permissions.clone(),
            is_active: grant.is_active,
            expires_at: grant.expires_at,
        }
    }
}
