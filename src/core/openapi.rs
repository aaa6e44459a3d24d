use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::features::admin::{dtos as admin_dtos, handlers as admin_handlers};
use crate::features::audit::models as audit_models;
use crate::features::auth;
use crate::features::community::{
    dtos as community_dtos, handlers::community_handler, models as community_models,
};
use crate::features::notifications::{
    dtos as notifications_dtos, handlers::notification_handler, models as notifications_models,
};
use crate::features::reports::{
    dtos as reports_dtos, handlers::report_handler, models as reports_models,
};
use crate::features::session::{dtos as session_dtos, handlers::session_handler};
use crate::features::users::{dtos as users_dtos, handlers::profile_handler, models as users_models};
use crate::shared::types::{ApiResponse, Meta};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Users
        profile_handler::get_profile,
        profile_handler::update_profile,
        // Session
        session_handler::get_session,
        session_handler::record_activity,
        session_handler::cleanup_session,
        // Reports
        report_handler::submit_report,
        report_handler::list_my_reports,
        report_handler::get_report,
        report_handler::withdraw_report,
        report_handler::upload_evidence,
        report_handler::list_evidence,
        // Notifications
        notification_handler::list_notifications,
        notification_handler::unread_count,
        notification_handler::mark_read,
        notification_handler::mark_all_read,
        notification_handler::delete_notification,
        notification_handler::get_preferences,
        notification_handler::update_preferences,
        notification_handler::stream_notifications,
        // Community
        community_handler::list_posts,
        community_handler::create_post,
        community_handler::get_post,
        community_handler::add_comment,
        community_handler::delete_post,
        // Admin
        admin_handlers::list_reports,
        admin_handlers::get_report,
        admin_handlers::update_report_status,
        admin_handlers::get_stats,
        admin_handlers::system_health,
        admin_handlers::list_users,
        admin_handlers::suspend_user,
        admin_handlers::activate_user,
        admin_handlers::list_audit_logs,
        admin_handlers::send_announcement,
        admin_handlers::live::live_console,
    ),
    components(
        schemas(
            // Shared
            Meta,
            // Auth
            auth::model::Role,
            auth::model::Permission,
            // Users
            users_models::UserProfile,
            users_models::UserStatus,
            users_dtos::MeResponseDto,
            users_dtos::UpdateProfileDto,
            users_dtos::SuspendUserDto,
            ApiResponse<users_dtos::MeResponseDto>,
            ApiResponse<Vec<users_models::UserProfile>>,
            ApiResponse<users_models::UserProfile>,
            // Session
            session_dtos::SessionStatusDto,
            ApiResponse<session_dtos::SessionStatusDto>,
            // Reports
            reports_models::Report,
            reports_models::ReportStatus,
            reports_models::FraudType,
            reports_models::Priority,
            reports_models::ReportEvidence,
            reports_dtos::SubmitReportDto,
            reports_dtos::UploadEvidenceDto,
            reports_dtos::EvidenceResponseDto,
            ApiResponse<reports_models::Report>,
            ApiResponse<Vec<reports_models::Report>>,
            ApiResponse<reports_dtos::EvidenceResponseDto>,
            ApiResponse<Vec<reports_dtos::EvidenceResponseDto>>,
            // Notifications
            notifications_models::Notification,
            notifications_models::NotificationType,
            notifications_models::NotificationPriority,
            notifications_models::NotificationPreferences,
            notifications_dtos::UnreadCountDto,
            notifications_dtos::MarkAllReadDto,
            notifications_dtos::UpdatePreferencesDto,
            notifications_dtos::AnnouncementDto,
            notifications_dtos::BroadcastResultDto,
            ApiResponse<Vec<notifications_models::Notification>>,
            ApiResponse<notifications_models::Notification>,
            ApiResponse<notifications_models::NotificationPreferences>,
            ApiResponse<notifications_dtos::UnreadCountDto>,
            ApiResponse<notifications_dtos::MarkAllReadDto>,
            ApiResponse<notifications_dtos::BroadcastResultDto>,
            // Community
            community_models::CommunityPost,
            community_models::CommunityComment,
            community_dtos::CreatePostDto,
            community_dtos::CreateCommentDto,
            community_dtos::PostDetailDto,
            ApiResponse<Vec<community_models::CommunityPost>>,
            ApiResponse<community_models::CommunityPost>,
            ApiResponse<community_models::CommunityComment>,
            ApiResponse<community_dtos::PostDetailDto>,
            // Audit
            audit_models::AuditAction,
            audit_models::AuditLog,
            ApiResponse<Vec<audit_models::AuditLog>>,
            // Admin
            admin_dtos::ReportFilters,
            admin_dtos::UpdateReportStatusDto,
            admin_dtos::AdminStats,
            admin_dtos::HealthStatus,
            admin_dtos::ComponentHealth,
            admin_dtos::SystemHealth,
            ApiResponse<admin_dtos::AdminStats>,
            ApiResponse<admin_dtos::SystemHealth>,
        )
    ),
    tags(
        (name = "users", description = "User profiles"),
        (name = "session", description = "Session activity and idle sign-out"),
        (name = "reports", description = "Fraud reports and evidence"),
        (name = "notifications", description = "In-app notifications and live feed"),
        (name = "community", description = "Community discussion threads"),
        (name = "admin", description = "Staff console (moderator and above)"),
    ),
    modifiers(&SecurityAddon),
    info(
        title = "Chakshu API",
        version = "0.1.0",
        description = "API documentation for Chakshu, the citizen fraud-reporting portal",
    )
)]
pub struct ApiDoc;

/// Adds Bearer JWT security scheme to OpenAPI spec
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_admin_and_citizen_paths() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/reports"));
        assert!(paths.contains_key("/api/admin/reports/{id}/status"));
        assert!(paths.contains_key("/api/community/posts/{id}/comments"));
        assert!(paths.contains_key("/api/admin/live"));
        assert!(paths.contains_key("/api/notifications/stream"));
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("bearer_auth")));
    }
}
