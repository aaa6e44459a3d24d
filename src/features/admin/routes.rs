use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::core::config::AdminConfig;
use crate::features::admin::handlers::{self, LiveState};
use crate::features::admin::services::AdminService;
use crate::features::session::SessionRegistry;

/// Create admin routes (moderator or above; user management and system
/// endpoints require admin). Nested under `/api/admin`.
pub fn routes(
    admin_service: Arc<AdminService>,
    sessions: Arc<SessionRegistry>,
    config: AdminConfig,
) -> Router {
    let live = Router::new()
        .route("/live", get(handlers::live_console))
        .with_state(LiveState {
            service: admin_service.clone(),
            sessions,
            config,
        });

    Router::new()
        .route("/reports", get(handlers::list_reports))
        .route("/reports/{id}", get(handlers::get_report))
        .route("/reports/{id}/status", patch(handlers::update_report_status))
        .route("/stats", get(handlers::get_stats))
        .route("/health", get(handlers::system_health))
        .route("/users", get(handlers::list_users))
        .route("/users/{id}/suspend", post(handlers::suspend_user))
        .route("/users/{id}/activate", post(handlers::activate_user))
        .route("/audit-logs", get(handlers::list_audit_logs))
        .route("/announcements", post(handlers::send_announcement))
        .with_state(admin_service)
        .merge(live)
}
