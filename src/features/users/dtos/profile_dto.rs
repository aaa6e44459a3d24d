use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::features::auth::model::{Permission, Role};
use crate::features::users::models::{UserProfile, UserStatus};
use crate::modules::backend::Filter;
use crate::shared::validation::escape_like;

/// The caller's profile with the permissions its role grants
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MeResponseDto {
    pub profile: UserProfile,
    pub permissions: Vec<Permission>,
}

impl From<UserProfile> for MeResponseDto {
    fn from(profile: UserProfile) -> Self {
        let permissions = profile.permissions();
        Self {
            profile,
            permissions,
        }
    }
}

/// Request DTO for updating the caller's own profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileDto {
    #[validate(length(min = 1, max = 128, message = "Name must be 1-128 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[validate(regex(
        path = "*crate::shared::validation::PHONE_REGEX",
        message = "Phone must be a valid Indian mobile number"
    ))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[validate(length(max = 100, message = "City must not exceed 100 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,

    #[validate(length(max = 100, message = "State must not exceed 100 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

/// Filters for the admin user list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UserFilters {
    pub role: Option<Role>,
    pub status: Option<UserStatus>,
    /// Case-insensitive match on email or full name
    pub search: Option<String>,
}

impl UserFilters {
    pub fn to_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(role) = self.role {
            filters.push(Filter::eq("role", role.as_str()));
        }
        if let Some(status) = self.status {
            filters.push(Filter::eq("status", status.as_str()));
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            filters.push(Filter::Or(vec![
                Filter::ilike("email", pattern.clone()),
                Filter::ilike("full_name", pattern),
            ]));
        }
        filters
    }

    /// Whether a profile belongs in a list fetched with these filters.
    pub fn matches(&self, profile: &UserProfile) -> bool {
        if self.role.is_some_and(|r| r != profile.role) {
            return false;
        }
        if self.status.is_some_and(|s| s != profile.status) {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => true,
            Some(search) => {
                let needle = search.to_lowercase();
                [&profile.email, &profile.full_name]
                    .into_iter()
                    .flatten()
                    .any(|v| v.to_lowercase().contains(&needle))
            }
        }
    }
}

/// Request DTO for suspending a user
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct SuspendUserDto {
    #[validate(length(max = 500, message = "Reason must not exceed 500 characters"))]
    pub reason: Option<String>,
}
