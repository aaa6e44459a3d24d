use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ReportStatus,
    CommunityAlert,
    SystemAnnouncement,
    FraudWarning,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::ReportStatus => "report_status",
            NotificationType::CommunityAlert => "community_alert",
            NotificationType::SystemAnnouncement => "system_announcement",
            NotificationType::FraudWarning => "fraud_warning",
        }
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Medium => "medium",
            NotificationPriority::High => "high",
            NotificationPriority::Urgent => "urgent",
        }
    }
}

/// A row of the `notifications` table. Owned by `user_id` alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub is_read: bool,
    pub related_report_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// Data for creating a notification
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub related_report_id: Option<Uuid>,
}

impl NewNotification {
    pub fn new(
        user_id: Uuid,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            notification_type,
            priority: NotificationPriority::Medium,
            title: title.into(),
            message: message.into(),
            related_report_id: None,
        }
    }

    pub fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn for_report(mut self, report_id: Uuid) -> Self {
        self.related_report_id = Some(report_id);
        self
    }
}

/// Per-user delivery toggles. A missing row means everything is enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    pub report_status: bool,
    pub community_alert: bool,
    pub system_announcement: bool,
    pub fraud_warning: bool,
}

impl NotificationPreferences {
    pub fn all_enabled(user_id: Uuid) -> Self {
        Self {
            user_id,
            report_status: true,
            community_alert: true,
            system_announcement: true,
            fraud_warning: true,
        }
    }

    pub fn allows(&self, notification_type: NotificationType) -> bool {
        match notification_type {
            NotificationType::ReportStatus => self.report_status,
            NotificationType::CommunityAlert => self.community_alert,
            NotificationType::SystemAnnouncement => self.system_announcement,
            NotificationType::FraudWarning => self.fraud_warning,
        }
    }
}
