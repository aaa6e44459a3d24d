use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::core::extractor::ValidatedJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::reports::dtos::{
    EvidenceResponseDto, MyReportsParams, SubmitReportDto, UploadEvidenceDto,
};
use crate::features::reports::models::Report;
use crate::features::reports::services::ReportService;
use crate::shared::types::{ApiResponse, Meta};

/// Submit a fraud report
#[utoipa::path(
    post,
    path = "/api/reports",
    request_body = SubmitReportDto,
    responses(
        (status = 201, description = "Report submitted", body = ApiResponse<Report>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Account suspended")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn submit_report(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    ValidatedJson(dto): ValidatedJson<SubmitReportDto>,
) -> Result<(StatusCode, Json<ApiResponse<Report>>)> {
    let report = service.submit_report(&user, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(report),
            Some("Report submitted".to_string()),
            None,
        )),
    ))
}

/// List the caller's own reports
#[utoipa::path(
    get,
    path = "/api/reports",
    params(MyReportsParams),
    responses(
        (status = 200, description = "The caller's reports", body = ApiResponse<Vec<Report>>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn list_my_reports(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    Query(params): Query<MyReportsParams>,
) -> Result<Json<ApiResponse<Vec<Report>>>> {
    let (reports, total) = service
        .list_for_user(user.user_id, params.status, &params.pagination())
        .await?;
    Ok(Json(ApiResponse::success(
        Some(reports),
        None,
        Some(Meta { total }),
    )))
}

/// Get a report (owner or staff)
#[utoipa::path(
    get,
    path = "/api/reports/{id}",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report found", body = ApiResponse<Report>),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn get_report(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Report>>> {
    let report = service.get_for_user(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(report), None, None)))
}

/// Withdraw one of the caller's open reports
#[utoipa::path(
    post,
    path = "/api/reports/{id}/withdraw",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Report withdrawn", body = ApiResponse<Report>),
        (status = 400, description = "Report can no longer be withdrawn"),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn withdraw_report(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Report>>> {
    let report = service.withdraw(&user, id).await?;
    Ok(Json(ApiResponse::success(
        Some(report),
        Some("Report withdrawn".to_string()),
        None,
    )))
}

/// Upload an evidence file for one of the caller's reports
///
/// Accepts multipart/form-data with a single `file` field.
#[utoipa::path(
    post,
    path = "/api/reports/{id}/evidence",
    params(("id" = Uuid, Path, description = "Report ID")),
    request_body(
        content = UploadEvidenceDto,
        content_type = "multipart/form-data",
        description = "Evidence file (image, PDF or text, max 10 MB)",
    ),
    responses(
        (status = 201, description = "Evidence stored", body = ApiResponse<EvidenceResponseDto>),
        (status = 400, description = "Invalid file"),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn upload_evidence(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<EvidenceResponseDto>>)> {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::debug!("Failed to read multipart field: {}", e);
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    })? {
        if field.name() != Some("file") {
            tracing::debug!("Ignoring unknown field: {:?}", field.name());
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unnamed".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read file data: {}", e)))?;

        upload = Some((file_name, content_type, data.to_vec()));
    }

    let (file_name, content_type, data) =
        upload.ok_or_else(|| AppError::BadRequest("File is required".to_string()))?;

    let evidence = service
        .attach_evidence(&user, id, &file_name, &content_type, data)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(evidence),
            Some("Evidence uploaded".to_string()),
            None,
        )),
    ))
}

/// List evidence for a report with fresh download URLs
#[utoipa::path(
    get,
    path = "/api/reports/{id}/evidence",
    params(("id" = Uuid, Path, description = "Report ID")),
    responses(
        (status = 200, description = "Evidence files", body = ApiResponse<Vec<EvidenceResponseDto>>),
        (status = 404, description = "Report not found")
    ),
    security(("bearer_auth" = [])),
    tag = "reports"
)]
pub async fn list_evidence(
    user: AuthenticatedUser,
    State(service): State<Arc<ReportService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<EvidenceResponseDto>>>> {
    let evidence = service.list_evidence(&user, id).await?;
    Ok(Json(ApiResponse::success(Some(evidence), None, None)))
}
