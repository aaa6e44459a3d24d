use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::features::notifications::models::{NotificationPriority, NotificationType};
use crate::shared::types::{default_page, default_page_size, PaginationQuery};

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationListParams {
    #[serde(default = "default_page")]
    #[param(minimum = 1)]
    pub page: i64,

    #[serde(default = "default_page_size")]
    #[param(minimum = 1, maximum = 100)]
    pub page_size: i64,

    /// Only unread notifications
    #[serde(default)]
    pub unread_only: bool,
}

impl NotificationListParams {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery::new(self.page, self.page_size)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnreadCountDto {
    pub unread: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MarkAllReadDto {
    pub updated: usize,
}

/// Partial update of notification preferences; omitted toggles keep their value
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdatePreferencesDto {
    pub report_status: Option<bool>,
    pub community_alert: Option<bool>,
    pub system_announcement: Option<bool>,
    pub fraud_warning: Option<bool>,
}

/// Admin broadcast to every active user
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AnnouncementDto {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 2000, message = "Message must be 1-2000 characters"))]
    pub message: String,

    /// `system_announcement` (default) or `fraud_warning`
    pub notification_type: Option<NotificationType>,

    pub priority: Option<NotificationPriority>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BroadcastResultDto {
    pub delivered: usize,
}
