//! Role-based authorization guards.
//!
//! Each guard reads the `AuthenticatedUser` placed in the request extensions by
//! the auth middleware and checks it against the role hierarchy
//! (`citizen < moderator < admin < super_admin`). Higher roles pass every guard
//! a lower role passes.

use crate::core::error::AppError;
use crate::features::auth::model::{AuthenticatedUser, Role};
use axum::{extract::FromRequestParts, http::request::Parts};

fn require_role(parts: &Parts, required: Role) -> Result<AuthenticatedUser, AppError> {
    let user = parts
        .extensions
        .get::<AuthenticatedUser>()
        .ok_or_else(|| AppError::Unauthorized("User not authenticated".to_string()))?;

    if !user.role.can_act_as(required) {
        return Err(AppError::Forbidden(format!(
            "{} access required",
            required
        )));
    }

    Ok(user.clone())
}

/// Moderator or above: report review and community moderation.
pub struct RequireModerator(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireModerator
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, Role::Moderator).map(RequireModerator)
    }
}

/// Admin or above: user management, audit log, system health, broadcasts.
///
/// # Example
/// ```ignore
/// pub async fn handler(RequireAdmin(user): RequireAdmin) { ... }
/// ```
pub struct RequireAdmin(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, Role::Admin).map(RequireAdmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use uuid::Uuid;

    fn parts_with(role: Option<Role>) -> Parts {
        let (mut parts, _) = Request::builder().body(()).unwrap().into_parts();
        if let Some(role) = role {
            parts.extensions.insert(AuthenticatedUser {
                user_id: Uuid::new_v4(),
                email: None,
                session_id: "s".to_string(),
                role,
            });
        }
        parts
    }

    #[tokio::test]
    async fn moderator_guard_admits_higher_roles() {
        let mut parts = parts_with(Some(Role::Admin));
        assert!(RequireModerator::from_request_parts(&mut parts, &()).await.is_ok());

        let mut parts = parts_with(Some(Role::Citizen));
        assert!(matches!(
            RequireModerator::from_request_parts(&mut parts, &()).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn admin_guard_requires_authentication() {
        let mut parts = parts_with(None);
        assert!(matches!(
            RequireAdmin::from_request_parts(&mut parts, &()).await,
            Err(AppError::Unauthorized(_))
        ));

        let mut parts = parts_with(Some(Role::Moderator));
        assert!(RequireAdmin::from_request_parts(&mut parts, &()).await.is_err());
    }
}
