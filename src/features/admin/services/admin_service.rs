use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::admin::dtos::{
    AdminStats, ComponentHealth, HealthStatus, ReportFilters, SystemHealth,
};
use crate::features::audit::models::{AuditAction, AuditEntry, AuditLog, AuditLogParams};
use crate::features::audit::AuditService;
use crate::features::auth::model::{AuthenticatedUser, Permission};
use crate::features::notifications::dtos::AnnouncementDto;
use crate::features::notifications::models::{
    NewNotification, NotificationPriority, NotificationType,
};
use crate::features::notifications::NotificationService;
use crate::features::reports::models::{Report, ReportStatus};
use crate::features::session::SessionRegistry;
use crate::features::users::dtos::UserFilters;
use crate::features::users::models::{UserProfile, UserStatus};
use crate::features::users::UserService;
use crate::modules::backend::{
    decode_row, select_one, Backend, Filter, RealtimeHub, SelectQuery,
};
use crate::modules::storage::ObjectStorage;
use crate::shared::constants::{TABLE_PROFILES, TABLE_REPORTS};
use crate::shared::types::PaginationQuery;

/// Staff operations behind the admin console.
pub struct AdminService {
    backend: Arc<dyn Backend>,
    storage: Arc<dyn ObjectStorage>,
    users: Arc<UserService>,
    notifications: Arc<NotificationService>,
    audit: Arc<AuditService>,
    sessions: Arc<SessionRegistry>,
}

fn require(actor: &AuthenticatedUser, permission: Permission) -> Result<()> {
    if actor.has_permission(permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "A {} may not perform this action",
            actor.role
        )))
    }
}

impl AdminService {
    pub fn new(
        backend: Arc<dyn Backend>,
        storage: Arc<dyn ObjectStorage>,
        users: Arc<UserService>,
        notifications: Arc<NotificationService>,
        audit: Arc<AuditService>,
        sessions: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            backend,
            storage,
            users,
            notifications,
            audit,
            sessions,
        }
    }

    /// Row-change feed the admin console merges from
    pub fn realtime(&self) -> &RealtimeHub {
        self.backend.realtime()
    }

    // =========================================================================
    // REPORTS
    // =========================================================================

    pub async fn list_reports(
        &self,
        filters: &ReportFilters,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<Report>, i64)> {
        let (from, to) = PaginationQuery::new(page, limit).range();
        let result = self
            .backend
            .select(
                SelectQuery::from(TABLE_REPORTS)
                    .filters(filters.to_filters())
                    .order("created_at", false)
                    .range(from, to)
                    .with_count(),
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to list reports: {:?}", e);
                e
            })?;

        let total = result.count.unwrap_or(0);
        Ok((result.rows()?, total))
    }

    pub async fn get_report(&self, id: Uuid) -> Result<Report> {
        let row = select_one(
            self.backend.as_ref(),
            SelectQuery::from(TABLE_REPORTS).eq("id", id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;
        decode_row(row)
    }

    /// Move a report along the staff transition table, then audit the change
    /// and tell the submitter. The side effects never fail the update.
    pub async fn update_report_status(
        &self,
        actor: &AuthenticatedUser,
        id: Uuid,
        status: ReportStatus,
        admin_notes: Option<String>,
    ) -> Result<Report> {
        require(actor, Permission::ReviewReports)?;
        if status.is_terminal() {
            require(actor, Permission::ResolveReports)?;
        }

        let current = self.get_report(id).await?;
        if !current.status.can_transition_to(status) {
            return Err(AppError::Validation(format!(
                "Cannot move a {} report to {}",
                current.status, status
            )));
        }

        // reviewed_by references the reviewer's profile
        self.users.ensure_profile(actor).await?;

        let now = Utc::now();
        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(status.as_str()));
        patch.insert("reviewed_by".to_string(), json!(actor.user_id));
        patch.insert("updated_at".to_string(), json!(now));
        if let Some(notes) = admin_notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            patch.insert("admin_notes".to_string(), json!(notes));
        }
        if status.is_terminal() {
            patch.insert("resolved_at".to_string(), json!(now));
        }

        let mut rows = self
            .backend
            .update(TABLE_REPORTS, vec![Filter::eq("id", id)], Value::Object(patch))
            .await
            .map_err(|e| {
                tracing::error!("Failed to update report {}: {:?}", id, e);
                e
            })?;
        let report: Report = decode_row(
            rows.pop()
                .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?,
        )?;

        tracing::info!(
            "Report {} moved {} -> {} by {}",
            report.reference_number,
            current.status,
            status,
            actor.user_id
        );

        self.audit
            .record(
                AuditEntry::new(actor.user_id, AuditAction::ReportStatusChanged, "report")
                    .target(id)
                    .details(json!({
                        "from": current.status,
                        "to": status,
                        "notes": report.admin_notes,
                    })),
            )
            .await;

        let priority = if status.is_terminal() {
            NotificationPriority::High
        } else {
            NotificationPriority::Medium
        };
        let notice = NewNotification::new(
            report.user_id,
            NotificationType::ReportStatus,
            "Report status updated",
            format!(
                "Your report {} is now {}.",
                report.reference_number,
                status.as_str().replace('_', " ")
            ),
        )
        .priority(priority)
        .for_report(report.id);
        if let Err(e) = self.notifications.notify(notice).await {
            tracing::warn!("Status notice for report {} failed: {:?}", id, e);
        }

        Ok(report)
    }

    // =========================================================================
    // STATS & HEALTH
    // =========================================================================

    async fn count(&self, table: &str, filters: Vec<Filter>) -> Result<i64> {
        let result = self
            .backend
            .select(SelectQuery::from(table).filters(filters).count_only())
            .await?;
        Ok(result.count.unwrap_or(0))
    }

    async fn count_reports(&self, status: ReportStatus) -> Result<i64> {
        self.count(TABLE_REPORTS, vec![Filter::eq("status", status.as_str())])
            .await
    }

    pub async fn get_stats(&self) -> Result<AdminStats> {
        let today = Utc::now().date_naive().and_time(chrono::NaiveTime::MIN).and_utc();

        let (total_reports, pending, under_review, resolved, rejected, escalated, reports_today) =
            tokio::try_join!(
                self.count(TABLE_REPORTS, Vec::new()),
                self.count_reports(ReportStatus::Pending),
                self.count_reports(ReportStatus::UnderReview),
                self.count_reports(ReportStatus::Resolved),
                self.count_reports(ReportStatus::Rejected),
                self.count_reports(ReportStatus::Escalated),
                self.count(TABLE_REPORTS, vec![Filter::gte("created_at", today)]),
            )?;
        let (total_users, suspended_users) = tokio::try_join!(
            self.count(TABLE_PROFILES, Vec::new()),
            self.count(
                TABLE_PROFILES,
                vec![Filter::eq("status", UserStatus::Suspended.as_str())]
            ),
        )?;

        Ok(AdminStats {
            total_reports,
            pending_reports: pending,
            under_review_reports: under_review,
            resolved_reports: resolved,
            rejected_reports: rejected,
            escalated_reports: escalated,
            reports_today,
            total_users,
            suspended_users,
            active_sessions: self.sessions.active_count().await as i64,
        })
    }

    fn component(name: &str, probe: Result<Duration>) -> ComponentHealth {
        match probe {
            Ok(latency) => {
                let latency_ms = latency.as_millis() as u64;
                ComponentHealth {
                    name: name.to_string(),
                    status: HealthStatus::from_latency_ms(latency_ms),
                    latency_ms: Some(latency_ms),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("Health probe for {} failed: {}", name, e);
                ComponentHealth {
                    name: name.to_string(),
                    status: HealthStatus::Down,
                    latency_ms: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Probe the store and object storage. Recomputed on every call.
    pub async fn system_health(&self) -> Result<SystemHealth> {
        let (db_probe, storage_probe) = tokio::join!(self.backend.ping(), self.storage.ping());
        let database = Self::component(self.backend.name(), db_probe);
        let storage = Self::component(self.storage.name(), storage_probe);

        // Backlog is informative only; an unreachable store already shows as down
        let pending_reports = if database.status == HealthStatus::Down {
            0
        } else {
            self.count_reports(ReportStatus::Pending).await.unwrap_or(0)
        };

        Ok(SystemHealth {
            status: database.status.max(storage.status),
            database,
            storage,
            active_sessions: self.sessions.active_count().await as i64,
            pending_reports,
            checked_at: Utc::now(),
        })
    }

    // =========================================================================
    // USERS
    // =========================================================================

    pub async fn list_users(
        &self,
        filters: &UserFilters,
        page: i64,
        limit: i64,
    ) -> Result<(Vec<UserProfile>, i64)> {
        self.users.list_users(filters, page, limit).await
    }

    pub async fn suspend_user(
        &self,
        actor: &AuthenticatedUser,
        target_id: Uuid,
        reason: Option<String>,
    ) -> Result<UserProfile> {
        require(actor, Permission::ManageUsers)?;
        let profile = self
            .users
            .suspend_user(actor, target_id, reason.clone())
            .await?;

        self.audit
            .record(
                AuditEntry::new(actor.user_id, AuditAction::UserSuspended, "user")
                    .target(target_id)
                    .details(json!({ "reason": reason })),
            )
            .await;
        Ok(profile)
    }

    pub async fn activate_user(
        &self,
        actor: &AuthenticatedUser,
        target_id: Uuid,
    ) -> Result<UserProfile> {
        require(actor, Permission::ManageUsers)?;
        let profile = self.users.activate_user(actor, target_id).await?;

        self.audit
            .record(
                AuditEntry::new(actor.user_id, AuditAction::UserActivated, "user")
                    .target(target_id),
            )
            .await;
        Ok(profile)
    }

    // =========================================================================
    // AUDIT & ANNOUNCEMENTS
    // =========================================================================

    pub async fn list_audit_logs(&self, params: &AuditLogParams) -> Result<(Vec<AuditLog>, i64)> {
        self.audit.list(params).await
    }

    pub async fn broadcast(
        &self,
        actor: &AuthenticatedUser,
        dto: AnnouncementDto,
    ) -> Result<usize> {
        require(actor, Permission::Broadcast)?;
        let notification_type = dto
            .notification_type
            .unwrap_or(NotificationType::SystemAnnouncement);
        if !matches!(
            notification_type,
            NotificationType::SystemAnnouncement | NotificationType::FraudWarning
        ) {
            return Err(AppError::Validation(
                "Announcements must be system_announcement or fraud_warning".to_string(),
            ));
        }

        let delivered = self
            .notifications
            .broadcast(
                notification_type,
                dto.priority.unwrap_or(NotificationPriority::High),
                dto.title.trim(),
                dto.message.trim(),
            )
            .await?;

        self.audit
            .record(
                AuditEntry::new(actor.user_id, AuditAction::AnnouncementSent, "announcement")
                    .details(json!({
                        "title": dto.title,
                        "type": notification_type,
                        "delivered": delivered,
                    })),
            )
            .await;
        Ok(delivered)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::model::Role;
    use crate::features::reports::dtos::SubmitReportDto;
    use crate::features::reports::models::FraudType;
    use crate::shared::test_helpers::{auth_user, TestContext};

    async fn pending_report(ctx: &TestContext) -> (AuthenticatedUser, Report) {
        let citizen = auth_user(Role::Citizen);
        let report = ctx
            .reports
            .submit_report(&citizen, SubmitReportDto::new("X", "Y", FraudType::Phishing))
            .await
            .unwrap();
        (citizen, report)
    }

    #[tokio::test]
    async fn out_of_range_pages_return_empty() {
        let ctx = TestContext::new();
        pending_report(&ctx).await;

        let (items, total) = ctx
            .admin
            .list_reports(&Default::default(), i64::MAX, 20)
            .await
            .unwrap();
        assert!(items.is_empty());
        assert_eq!(total, 1);

        let (users, _) = ctx
            .admin
            .list_users(&Default::default(), i64::MAX, 20)
            .await
            .unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn every_allowed_transition_succeeds_and_others_are_rejected() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let all = [
            ReportStatus::Pending,
            ReportStatus::UnderReview,
            ReportStatus::Resolved,
            ReportStatus::Rejected,
            ReportStatus::Withdrawn,
            ReportStatus::Escalated,
        ];

        for next in all {
            let (_, report) = pending_report(&ctx).await;
            let result = ctx
                .admin
                .update_report_status(&admin, report.id, next, None)
                .await;
            if ReportStatus::Pending.can_transition_to(next) {
                assert_eq!(result.unwrap().status, next);
            } else {
                assert!(matches!(result, Err(AppError::Validation(_))), "{}", next);
            }
        }
    }

    #[tokio::test]
    async fn resolving_sets_review_fields_and_notifies_owner() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let (citizen, report) = pending_report(&ctx).await;

        let resolved = ctx
            .admin
            .update_report_status(
                &admin,
                report.id,
                ReportStatus::Resolved,
                Some("done".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(resolved.status, ReportStatus::Resolved);
        assert_eq!(resolved.admin_notes.as_deref(), Some("done"));
        assert_eq!(resolved.reviewed_by, Some(admin.user_id));
        assert!(resolved.resolved_at.is_some());

        // Submission notice plus the status notice
        assert_eq!(ctx.notifications.unread_count(citizen.user_id).await.unwrap(), 2);

        let (logs, _) = ctx
            .admin
            .list_audit_logs(&AuditLogParams {
                page: 1,
                page_size: 20,
                action: Some(AuditAction::ReportStatusChanged),
                actor_id: Some(admin.user_id),
            })
            .await
            .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].details["to"], "resolved");
    }

    #[tokio::test]
    async fn moderators_review_but_do_not_conclude() {
        let ctx = TestContext::new();
        let moderator = auth_user(Role::Moderator);
        let (_, report) = pending_report(&ctx).await;

        assert!(matches!(
            ctx.admin
                .update_report_status(&moderator, report.id, ReportStatus::Resolved, None)
                .await,
            Err(AppError::Forbidden(_))
        ));
        assert!(ctx
            .admin
            .update_report_status(&moderator, report.id, ReportStatus::UnderReview, None)
            .await
            .is_ok());

        let citizen = auth_user(Role::Citizen);
        assert!(ctx
            .admin
            .update_report_status(&citizen, report.id, ReportStatus::UnderReview, None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn list_reports_applies_filters() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let (_, first) = pending_report(&ctx).await;
        pending_report(&ctx).await;
        ctx.admin
            .update_report_status(&admin, first.id, ReportStatus::UnderReview, None)
            .await
            .unwrap();

        let filters = ReportFilters {
            status: Some(ReportStatus::Pending),
            ..Default::default()
        };
        let (items, total) = ctx.admin.list_reports(&filters, 1, 20).await.unwrap();
        assert_eq!(total, 1);
        assert!(items.iter().all(|r| r.status == ReportStatus::Pending));
    }

    #[tokio::test]
    async fn stats_count_by_status() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let (_, first) = pending_report(&ctx).await;
        pending_report(&ctx).await;
        ctx.admin
            .update_report_status(&admin, first.id, ReportStatus::Rejected, None)
            .await
            .unwrap();

        let stats = ctx.admin.get_stats().await.unwrap();
        assert_eq!(stats.total_reports, 2);
        assert_eq!(stats.pending_reports, 1);
        assert_eq!(stats.rejected_reports, 1);
        assert_eq!(stats.reports_today, 2);
        // Two citizens and the admin
        assert_eq!(stats.total_users, 3);
    }

    #[tokio::test]
    async fn health_of_in_memory_stack_is_healthy() {
        let ctx = TestContext::new();
        pending_report(&ctx).await;

        let health = ctx.admin.system_health().await.unwrap();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.database.name, "memory");
        assert_eq!(health.pending_reports, 1);
    }

    #[tokio::test]
    async fn user_actions_require_manage_users_and_are_audited() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let moderator = auth_user(Role::Moderator);
        let citizen = auth_user(Role::Citizen);
        for user in [&admin, &moderator, &citizen] {
            ctx.users.ensure_profile(user).await.unwrap();
        }

        assert!(matches!(
            ctx.admin.suspend_user(&moderator, citizen.user_id, None).await,
            Err(AppError::Forbidden(_))
        ));

        ctx.admin
            .suspend_user(&admin, citizen.user_id, Some("abuse".to_string()))
            .await
            .unwrap();
        ctx.admin.activate_user(&admin, citizen.user_id).await.unwrap();

        let (_, total) = ctx
            .admin
            .list_audit_logs(&AuditLogParams {
                page: 1,
                page_size: 20,
                action: None,
                actor_id: Some(admin.user_id),
            })
            .await
            .unwrap();
        assert_eq!(total, 2);
    }

    #[tokio::test]
    async fn broadcast_rejects_personal_notification_types() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let citizen = auth_user(Role::Citizen);
        ctx.users.ensure_profile(&citizen).await.unwrap();

        let dto = AnnouncementDto {
            title: "Maintenance".to_string(),
            message: "Portal offline tonight".to_string(),
            notification_type: Some(NotificationType::ReportStatus),
            priority: None,
        };
        assert!(ctx.admin.broadcast(&admin, dto.clone()).await.is_err());

        let dto = AnnouncementDto {
            notification_type: None,
            ..dto
        };
        assert_eq!(ctx.admin.broadcast(&admin, dto).await.unwrap(), 1);
    }
}
