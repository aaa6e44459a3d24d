use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Account role. Variant order is the privilege order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Citizen,
    Moderator,
    Admin,
    SuperAdmin,
}

/// Capability granted by a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SubmitReport,
    ViewOwnReports,
    PostCommunity,
    ViewAllReports,
    ReviewReports,
    ModerateCommunity,
    ResolveReports,
    ManageUsers,
    ViewAuditLog,
    ViewSystemHealth,
    Broadcast,
    ManageRoles,
}

const CITIZEN_PERMISSIONS: &[Permission] = &[
    Permission::SubmitReport,
    Permission::ViewOwnReports,
    Permission::PostCommunity,
];

const MODERATOR_PERMISSIONS: &[Permission] = &[
    Permission::ViewAllReports,
    Permission::ReviewReports,
    Permission::ModerateCommunity,
];

const ADMIN_PERMISSIONS: &[Permission] = &[
    Permission::ResolveReports,
    Permission::ManageUsers,
    Permission::ViewAuditLog,
    Permission::ViewSystemHealth,
    Permission::Broadcast,
];

const SUPER_ADMIN_PERMISSIONS: &[Permission] = &[Permission::ManageRoles];

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Citizen => "citizen",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    /// Every permission this role holds, including those inherited from lower roles.
    pub fn permissions(&self) -> Vec<Permission> {
        let tiers = [
            (Role::Citizen, CITIZEN_PERMISSIONS),
            (Role::Moderator, MODERATOR_PERMISSIONS),
            (Role::Admin, ADMIN_PERMISSIONS),
            (Role::SuperAdmin, SUPER_ADMIN_PERMISSIONS),
        ];
        tiers
            .iter()
            .filter(|(tier, _)| tier <= self)
            .flat_map(|(_, perms)| perms.iter().copied())
            .collect()
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Check if this role can perform actions requiring another role
    pub fn can_act_as(&self, required: Role) -> bool {
        *self >= required
    }

    /// Staff may only act on accounts strictly below them.
    pub fn outranks(&self, other: Role) -> bool {
        *self > other
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "citizen" | "user" | "authenticated" => Ok(Role::Citizen),
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            "super_admin" | "superadmin" => Ok(Role::SuperAdmin),
            other => Err(format!("Invalid role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Provider session the token belongs to; falls back to the user id
    pub session_id: String,
    pub role: Role,
}

impl AuthenticatedUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn is_staff(&self) -> bool {
        self.role.can_act_as(Role::Moderator)
    }
}

/// Provider-managed metadata embedded in access tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_ordered_by_privilege() {
        assert!(Role::Citizen < Role::Moderator);
        assert!(Role::Moderator < Role::Admin);
        assert!(Role::Admin < Role::SuperAdmin);
        assert!(Role::Admin.can_act_as(Role::Moderator));
        assert!(!Role::Moderator.can_act_as(Role::Admin));
    }

    #[test]
    fn permissions_accumulate_up_the_hierarchy() {
        assert!(Role::Citizen.has_permission(Permission::SubmitReport));
        assert!(!Role::Citizen.has_permission(Permission::ViewAllReports));

        assert!(Role::Moderator.has_permission(Permission::SubmitReport));
        assert!(Role::Moderator.has_permission(Permission::ReviewReports));
        assert!(!Role::Moderator.has_permission(Permission::ManageUsers));

        assert!(Role::Admin.has_permission(Permission::Broadcast));
        assert!(!Role::Admin.has_permission(Permission::ManageRoles));

        assert_eq!(Role::SuperAdmin.permissions().len(), 12);
    }

    #[test]
    fn outranks_is_strict() {
        assert!(Role::Admin.outranks(Role::Moderator));
        assert!(!Role::Admin.outranks(Role::Admin));
    }

    #[test]
    fn role_round_trips_through_snake_case() {
        assert_eq!("super_admin".parse::<Role>(), Ok(Role::SuperAdmin));
        assert_eq!(Role::SuperAdmin.to_string(), "super_admin");
        assert_eq!(
            serde_json::to_string(&Role::SuperAdmin).unwrap(),
            "\"super_admin\""
        );
    }
}
