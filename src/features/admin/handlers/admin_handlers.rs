use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::ValidatedJson;
use crate::features::admin::dtos::*;
use crate::features::admin::services::AdminService;
use crate::features::audit::models::{AuditLog, AuditLogParams};
use crate::features::auth::guards::{RequireAdmin, RequireModerator};
use crate::features::notifications::dtos::{AnnouncementDto, BroadcastResultDto};
use crate::features::reports::models::Report;
use crate::features::users::dtos::{SuspendUserDto, UserFilters};
use crate::features::users::models::UserProfile;
use crate::shared::types::{ApiResponse, Meta, PaginationQuery};

/// List reports for review (filtered, paginated)
#[utoipa::path(
    get,
    path = "/api/admin/reports",
    params(PaginationQuery, ReportFilters),
    responses(
        (status = 200, description = "Matching reports, newest first", body = ApiResponse<Vec<Report>>),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Moderator access required")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_reports(
    RequireModerator(_user): RequireModerator,
    State(service): State<Arc<AdminService>>,
    Query(params): Query<PaginationQuery>,
    Query(filters): Query<ReportFilters>,
) -> Result<Json<ApiResponse<Vec<Report>>>> {
    let (items, total) = service
        .list_reports(&filters, params.page, params.limit())
        .await?;

    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta { total }),
    )))
}

/// Get any report by ID
#[utoipa::path(
    get,
    path = "/api/admin/reports/{id}",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report found", body = ApiResponse<Report>),
        (status = 404, description = "Report not found")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_report(
    RequireModerator(_user): RequireModerator,
    State(service): State<Arc<AdminService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Report>>> {
    let report = service.get_report(id).await?;
    Ok(Json(ApiResponse::success(Some(report), None, None)))
}

/// Move a report through the review workflow
#[utoipa::path(
    patch,
    path = "/api/admin/reports/{id}/status",
    params(("id" = Uuid, Path, description = "Report ID")),
    request_body = UpdateReportStatusDto,
    responses(
        (status = 200, description = "Status changed", body = ApiResponse<Report>),
        (status = 400, description = "Transition not allowed"),
        (status = 403, description = "Missing permission for this transition"),
        (status = 404, description = "Report not found")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_report_status(
    RequireModerator(user): RequireModerator,
    State(service): State<Arc<AdminService>>,
    Path(id): Path<Uuid>,
    ValidatedJson(dto): ValidatedJson<UpdateReportStatusDto>,
) -> Result<Json<ApiResponse<Report>>> {
    let report = service
        .update_report_status(&user, id, dto.status, dto.admin_notes)
        .await?;

    Ok(Json(ApiResponse::success(
        Some(report),
        Some("Report status updated".to_string()),
        None,
    )))
}

/// Dashboard counters
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    responses(
        (status = 200, description = "Current counters", body = ApiResponse<AdminStats>),
        (status = 403, description = "Forbidden - Moderator access required")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_stats(
    RequireModerator(_user): RequireModerator,
    State(service): State<Arc<AdminService>>,
) -> Result<Json<ApiResponse<AdminStats>>> {
    let stats = service.get_stats().await?;
    Ok(Json(ApiResponse::success(Some(stats), None, None)))
}

/// Probe the database and object storage
#[utoipa::path(
    get,
    path = "/api/admin/health",
    responses(
        (status = 200, description = "Component health", body = ApiResponse<SystemHealth>),
        (status = 403, description = "Forbidden - Admin access required")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn system_health(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<AdminService>>,
) -> Result<Json<ApiResponse<SystemHealth>>> {
    let health = service.system_health().await?;
    Ok(Json(ApiResponse::success(Some(health), None, None)))
}

/// List user profiles (filtered, paginated)
#[utoipa::path(
    get,
    path = "/api/admin/users",
    params(PaginationQuery, UserFilters),
    responses(
        (status = 200, description = "Matching users", body = ApiResponse<Vec<UserProfile>>),
        (status = 403, description = "Forbidden - Admin access required")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_users(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<AdminService>>,
    Query(params): Query<PaginationQuery>,
    Query(filters): Query<UserFilters>,
) -> Result<Json<ApiResponse<Vec<UserProfile>>>> {
    let (items, total) = service
        .list_users(&filters, params.page, params.limit())
        .await?;

    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta { total }),
    )))
}

/// Suspend a user account
#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/suspend",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = SuspendUserDto,
    responses(
        (status = 200, description = "User suspended", body = ApiResponse<UserProfile>),
        (status = 403, description = "Cannot manage this account"),
        (status = 409, description = "Already suspended")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn suspend_user(
    RequireAdmin(user): RequireAdmin,
    State(service): State<Arc<AdminService>>,
    Path(id): Path<Uuid>,
    ValidatedJson(dto): ValidatedJson<SuspendUserDto>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let profile = service.suspend_user(&user, id, dto.reason).await?;
    Ok(Json(ApiResponse::success(
        Some(profile),
        Some("User suspended".to_string()),
        None,
    )))
}

/// Reactivate a suspended user
#[utoipa::path(
    post,
    path = "/api/admin/users/{id}/activate",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User activated", body = ApiResponse<UserProfile>),
        (status = 403, description = "Cannot manage this account"),
        (status = 409, description = "Already active")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn activate_user(
    RequireAdmin(user): RequireAdmin,
    State(service): State<Arc<AdminService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<UserProfile>>> {
    let profile = service.activate_user(&user, id).await?;
    Ok(Json(ApiResponse::success(
        Some(profile),
        Some("User activated".to_string()),
        None,
    )))
}

/// Staff action history (paginated)
#[utoipa::path(
    get,
    path = "/api/admin/audit-logs",
    params(AuditLogParams),
    responses(
        (status = 200, description = "Audit entries, newest first", body = ApiResponse<Vec<AuditLog>>),
        (status = 403, description = "Forbidden - Admin access required")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn list_audit_logs(
    RequireAdmin(_user): RequireAdmin,
    State(service): State<Arc<AdminService>>,
    Query(params): Query<AuditLogParams>,
) -> Result<Json<ApiResponse<Vec<AuditLog>>>> {
    let (items, total) = service.list_audit_logs(&params).await?;
    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta { total }),
    )))
}

/// Send an announcement to every active user
#[utoipa::path(
    post,
    path = "/api/admin/announcements",
    request_body = AnnouncementDto,
    responses(
        (status = 200, description = "Announcement delivered", body = ApiResponse<BroadcastResultDto>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Forbidden - Admin access required")
    ),
    tag = "admin",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn send_announcement(
    RequireAdmin(user): RequireAdmin,
    State(service): State<Arc<AdminService>>,
    ValidatedJson(dto): ValidatedJson<AnnouncementDto>,
) -> Result<Json<ApiResponse<BroadcastResultDto>>> {
    let delivered = service.broadcast(&user, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(BroadcastResultDto { delivered }),
        Some(format!("Delivered to {} user(s)", delivered)),
        None,
    )))
}
