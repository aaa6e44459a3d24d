use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::shared::types::{default_page, default_page_size, PaginationQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    ReportStatusChanged,
    UserSuspended,
    UserActivated,
    AnnouncementSent,
    CommunityPostRemoved,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::ReportStatusChanged => "report_status_changed",
            AuditAction::UserSuspended => "user_suspended",
            AuditAction::UserActivated => "user_activated",
            AuditAction::AnnouncementSent => "announcement_sent",
            AuditAction::CommunityPostRemoved => "community_post_removed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `audit_logs` table. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor_id: Uuid,
    pub action: AuditAction,
    /// `report`, `user`, `announcement` or `community_post`
    pub target_type: String,
    pub target_id: Option<Uuid>,
    #[serde(default)]
    pub details: Value,
    pub created_at: DateTime<Utc>,
}

/// One staff action to record
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Uuid,
    pub action: AuditAction,
    pub target_type: &'static str,
    pub target_id: Option<Uuid>,
    pub details: Value,
}

impl AuditEntry {
    pub fn new(actor_id: Uuid, action: AuditAction, target_type: &'static str) -> Self {
        Self {
            actor_id,
            action,
            target_type,
            target_id: None,
            details: Value::Object(Default::default()),
        }
    }

    pub fn target(mut self, id: Uuid) -> Self {
        self.target_id = Some(id);
        self
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AuditLogParams {
    #[serde(default = "default_page")]
    #[param(minimum = 1)]
    pub page: i64,

    #[serde(default = "default_page_size")]
    #[param(minimum = 1, maximum = 100)]
    pub page_size: i64,

    pub action: Option<AuditAction>,
    pub actor_id: Option<Uuid>,
}

impl Default for AuditLogParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
            action: None,
            actor_id: None,
        }
    }
}

impl AuditLogParams {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery::new(self.page, self.page_size)
    }
}
