use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::users::dtos::{UpdateProfileDto, UserFilters};
use crate::features::users::models::{UserProfile, UserStatus};
use crate::modules::backend::{decode_row, select_one, Backend, Filter, SelectQuery};
use crate::shared::constants::TABLE_PROFILES;
use crate::shared::types::PaginationQuery;

pub struct UserService {
    backend: Arc<dyn Backend>,
}

impl UserService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    async fn find(&self, user_id: Uuid) -> Result<Option<UserProfile>> {
        let row = select_one(
            self.backend.as_ref(),
            SelectQuery::from(TABLE_PROFILES).eq("id", user_id),
        )
        .await?;
        row.map(decode_row).transpose()
    }

    async fn patch(&self, user_id: Uuid, mut patch: Map<String, Value>) -> Result<UserProfile> {
        patch.insert("updated_at".to_string(), json!(Utc::now()));
        let mut rows = self
            .backend
            .update(TABLE_PROFILES, vec![Filter::eq("id", user_id)], Value::Object(patch))
            .await?;
        let row = rows
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;
        decode_row(row)
    }

    /// Fetch the caller's profile, creating it on first sight.
    pub async fn ensure_profile(&self, user: &AuthenticatedUser) -> Result<UserProfile> {
        if let Some(profile) = self.find(user.user_id).await? {
            return Ok(profile);
        }

        let row = json!({
            "id": user.user_id,
            "email": user.email,
            "role": user.role.as_str(),
            "status": UserStatus::Active.as_str(),
            "login_count": 0,
        });

        match self.backend.insert(TABLE_PROFILES, row).await {
            Ok(row) => {
                tracing::info!("Created profile for user {}", user.user_id);
                decode_row(row)
            }
            // Another request created it first
            Err(AppError::Conflict(_)) => self
                .find(user.user_id)
                .await?
                .ok_or_else(|| AppError::Internal("Profile vanished after conflict".to_string())),
            Err(e) => {
                tracing::error!("Failed to create profile for {}: {:?}", user.user_id, e);
                Err(e)
            }
        }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<UserProfile> {
        self.find(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))
    }

    pub async fn update_profile(&self, user_id: Uuid, dto: UpdateProfileDto) -> Result<UserProfile> {
        let mut patch = Map::new();
        if let Some(full_name) = dto.full_name {
            patch.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(phone) = dto.phone {
            patch.insert("phone".to_string(), json!(phone));
        }
        if let Some(city) = dto.city {
            patch.insert("city".to_string(), json!(city.trim()));
        }
        if let Some(state) = dto.state {
            patch.insert("state".to_string(), json!(state.trim()));
        }
        if patch.is_empty() {
            return self.get_profile(user_id).await;
        }
        self.patch(user_id, patch).await
    }

    /// Count a sign-in and mark the user as seen.
    pub async fn record_login(&self, user_id: Uuid) -> Result<UserProfile> {
        // Read-modify-write; concurrent logins may undercount
        let current = self.get_profile(user_id).await?;
        let mut patch = Map::new();
        patch.insert("login_count".to_string(), json!(current.login_count + 1));
        patch.insert("last_seen_at".to_string(), json!(Utc::now()));
        self.patch(user_id, patch).await
    }

    pub async fn record_activity(&self, user_id: Uuid) -> Result<()> {
        let mut patch = Map::new();
        patch.insert("last_seen_at".to_string(), json!(Utc::now()));
        self.patch(user_id, patch).await.map(|_| ())
    }

    pub async fn list_users(
        &self,
        filters: &UserFilters,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<UserProfile>, i64)> {
        let (from, to) = PaginationQuery::new(page, limit).range();
        let result = self
            .backend
            .select(
                SelectQuery::from(TABLE_PROFILES)
                    .filters(filters.to_filters())
                    .order("created_at", false)
                    .range(from, to)
                    .with_count(),
            )
            .await?;

        let total = result.count.unwrap_or(0);
        Ok((result.rows()?, total))
    }

    /// Profiles of every active user, for broadcasts.
    pub async fn list_active_ids(&self) -> Result<Vec<Uuid>> {
        let result = self
            .backend
            .select(
                SelectQuery::from(TABLE_PROFILES)
                    .columns(&["id"])
                    .eq("status", UserStatus::Active.as_str()),
            )
            .await?;

        result
            .data
            .into_iter()
            .map(|row| {
                row.get("id")
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .ok_or_else(|| AppError::Internal("Profile row without id".to_string()))
            })
            .collect()
    }

    /// Load the target and check the actor may change its status.
    async fn target_for(&self, actor: &AuthenticatedUser, target_id: Uuid) -> Result<UserProfile> {
        if actor.user_id == target_id {
            return Err(AppError::Forbidden(
                "You cannot change your own account status".to_string(),
            ));
        }
        let target = self.get_profile(target_id).await?;
        if !actor.role.outranks(target.role) {
            return Err(AppError::Forbidden(format!(
                "A {} cannot manage a {} account",
                actor.role, target.role
            )));
        }
        Ok(target)
    }

    pub async fn suspend_user(
        &self,
        actor: &AuthenticatedUser,
        target_id: Uuid,
        reason: Option<String>,
    ) -> Result<UserProfile> {
        let target = self.target_for(actor, target_id).await?;
        if target.is_suspended() {
            return Err(AppError::Conflict("User is already suspended".to_string()));
        }

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(UserStatus::Suspended.as_str()));
        patch.insert("suspension_reason".to_string(), json!(reason));
        let profile = self.patch(target_id, patch).await?;

        tracing::info!("User {} suspended by {}", target_id, actor.user_id);
        Ok(profile)
    }

    pub async fn activate_user(
        &self,
        actor: &AuthenticatedUser,
        target_id: Uuid,
    ) -> Result<UserProfile> {
        let target = self.target_for(actor, target_id).await?;
        if target.status == UserStatus::Active {
            return Err(AppError::Conflict("User is already active".to_string()));
        }

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(UserStatus::Active.as_str()));
        patch.insert("suspension_reason".to_string(), Value::Null);
        let profile = self.patch(target_id, patch).await?;

        tracing::info!("User {} activated by {}", target_id, actor.user_id);
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::model::Role;
    use crate::shared::test_helpers::{auth_user, memory_backend};

    async fn service_with(users: &[&AuthenticatedUser]) -> UserService {
        let service = UserService::new(memory_backend());
        for user in users {
            service.ensure_profile(user).await.unwrap();
        }
        service
    }

    #[tokio::test]
    async fn ensure_profile_is_idempotent() {
        let citizen = auth_user(Role::Citizen);
        let service = service_with(&[]).await;

        let first = service.ensure_profile(&citizen).await.unwrap();
        let second = service.ensure_profile(&citizen).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(first.role, Role::Citizen);
        assert_eq!(first.status, UserStatus::Active);
    }

    #[tokio::test]
    async fn record_login_increments_count() {
        let citizen = auth_user(Role::Citizen);
        let service = service_with(&[&citizen]).await;

        service.record_login(citizen.user_id).await.unwrap();
        let profile = service.record_login(citizen.user_id).await.unwrap();
        assert_eq!(profile.login_count, 2);
        assert!(profile.last_seen_at.is_some());
    }

    #[tokio::test]
    async fn suspend_respects_hierarchy_and_state() {
        let admin = auth_user(Role::Admin);
        let moderator = auth_user(Role::Moderator);
        let other_admin = auth_user(Role::Admin);
        let citizen = auth_user(Role::Citizen);
        let service = service_with(&[&admin, &moderator, &other_admin, &citizen]).await;

        let suspended = service
            .suspend_user(&admin, citizen.user_id, Some("spam".to_string()))
            .await
            .unwrap();
        assert_eq!(suspended.status, UserStatus::Suspended);
        assert_eq!(suspended.suspension_reason.as_deref(), Some("spam"));

        assert!(matches!(
            service.suspend_user(&admin, citizen.user_id, None).await,
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            service.suspend_user(&admin, other_admin.user_id, None).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(matches!(
            service.suspend_user(&admin, admin.user_id, None).await,
            Err(AppError::Forbidden(_))
        ));
        assert!(service
            .suspend_user(&admin, moderator.user_id, None)
            .await
            .is_ok());

        let active = service.activate_user(&admin, citizen.user_id).await.unwrap();
        assert_eq!(active.status, UserStatus::Active);
        assert_eq!(active.suspension_reason, None);
    }

    #[tokio::test]
    async fn list_users_filters_by_role_and_search() {
        let admin = auth_user(Role::Admin);
        let citizen = auth_user(Role::Citizen);
        let service = service_with(&[&admin, &citizen]).await;
        service
            .update_profile(
                citizen.user_id,
                UpdateProfileDto {
                    full_name: Some("Asha Verma".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let filters = UserFilters {
            role: Some(Role::Citizen),
            ..Default::default()
        };
        let (users, total) = service.list_users(&filters, 1, 20).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(users[0].id, citizen.user_id);

        let filters = UserFilters {
            search: Some("verma".to_string()),
            ..Default::default()
        };
        let (users, _) = service.list_users(&filters, 1, 20).await.unwrap();
        assert_eq!(users.len(), 1);
        assert!(filters.matches(&users[0]));
    }
}
