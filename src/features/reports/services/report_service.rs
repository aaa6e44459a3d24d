use chrono::Utc;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::auth::model::{AuthenticatedUser, Permission};
use crate::features::notifications::models::{NewNotification, NotificationType};
use crate::features::notifications::NotificationService;
use crate::features::reports::dtos::{EvidenceResponseDto, SubmitReportDto};
use crate::features::reports::models::{
    generate_reference_number, Priority, Report, ReportEvidence, ReportStatus,
};
use crate::features::users::UserService;
use crate::modules::backend::{decode_row, select_one, Backend, Filter, SelectQuery};
use crate::modules::storage::ObjectStorage;
use crate::shared::constants::{
    ALLOWED_EVIDENCE_TYPES, MAX_EVIDENCE_SIZE, TABLE_REPORTS, TABLE_REPORT_EVIDENCE,
};
use crate::shared::types::PaginationQuery;

/// Attempts at drawing an unused reference number
const REFERENCE_ATTEMPTS: usize = 3;

pub struct ReportService {
    backend: Arc<dyn Backend>,
    users: Arc<UserService>,
    notifications: Arc<NotificationService>,
    storage: Arc<dyn ObjectStorage>,
}

impl ReportService {
    pub fn new(
        backend: Arc<dyn Backend>,
        users: Arc<UserService>,
        notifications: Arc<NotificationService>,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        Self {
            backend,
            users,
            notifications,
            storage,
        }
    }

    /// File a new report as `pending` and confirm it to the submitter.
    pub async fn submit_report(
        &self,
        user: &AuthenticatedUser,
        dto: SubmitReportDto,
    ) -> Result<Report> {
        let profile = self.users.ensure_profile(user).await?;
        if profile.is_suspended() {
            return Err(AppError::Forbidden(
                "Suspended accounts cannot submit reports".to_string(),
            ));
        }

        let today = Utc::now().date_naive();
        if dto.incident_date.is_some_and(|d| d > today) {
            return Err(AppError::Validation(
                "Incident date cannot be in the future".to_string(),
            ));
        }

        let priority = Priority::derive(dto.amount_involved, dto.fraud_type);
        let mut attempt = 0;
        let report: Report = loop {
            attempt += 1;
            let row = json!({
                "reference_number": generate_reference_number(Utc::now()),
                "user_id": user.user_id,
                "title": dto.title.trim(),
                "description": dto.description.trim(),
                "fraud_type": dto.fraud_type.as_str(),
                "status": ReportStatus::Pending.as_str(),
                "priority": priority.as_str(),
                "amount_involved": dto.amount_involved,
                "city": dto.city,
                "state": dto.state,
                "suspect_identifier": dto.suspect_identifier,
                "incident_date": dto.incident_date,
            });

            match self.backend.insert(TABLE_REPORTS, row).await {
                Ok(row) => break decode_row(row)?,
                Err(AppError::Conflict(_)) if attempt < REFERENCE_ATTEMPTS => {
                    tracing::warn!("Reference number collision, retrying");
                }
                Err(e) => {
                    tracing::error!("Failed to submit report for {}: {:?}", user.user_id, e);
                    return Err(e);
                }
            }
        };

        tracing::info!(
            "Report {} ({}) submitted by {}",
            report.reference_number,
            report.fraud_type,
            user.user_id
        );

        let confirmation = NewNotification::new(
            user.user_id,
            NotificationType::ReportStatus,
            "Report received",
            format!(
                "Your report {} has been submitted and is pending review.",
                report.reference_number
            ),
        )
        .for_report(report.id);
        if let Err(e) = self.notifications.notify(confirmation).await {
            tracing::warn!("Submission notice for {} failed: {:?}", report.id, e);
        }

        Ok(report)
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        status: Option<ReportStatus>,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Report>, i64)> {
        let (from, to) = pagination.range();
        let mut query = SelectQuery::from(TABLE_REPORTS)
            .eq("user_id", user_id)
            .order("created_at", false)
            .range(from, to)
            .with_count();
        if let Some(status) = status {
            query = query.eq("status", status.as_str());
        }

        let result = self.backend.select(query).await?;
        let total = result.count.unwrap_or(0);
        Ok((result.rows()?, total))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Report> {
        let row = select_one(
            self.backend.as_ref(),
            SelectQuery::from(TABLE_REPORTS).eq("id", id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;
        decode_row(row)
    }

    /// Owners see their own reports; staff see all. Others get `NotFound`.
    pub async fn get_for_user(&self, user: &AuthenticatedUser, id: Uuid) -> Result<Report> {
        let report = self.get_by_id(id).await?;
        if report.user_id != user.user_id && !user.has_permission(Permission::ViewAllReports) {
            return Err(AppError::NotFound(format!("Report {} not found", id)));
        }
        Ok(report)
    }

    /// Owner withdrawal of a report nobody has concluded yet.
    pub async fn withdraw(&self, user: &AuthenticatedUser, id: Uuid) -> Result<Report> {
        let report = self.get_by_id(id).await?;
        if report.user_id != user.user_id {
            return Err(AppError::NotFound(format!("Report {} not found", id)));
        }
        if !report.status.can_withdraw() {
            return Err(AppError::Validation(format!(
                "A {} report cannot be withdrawn",
                report.status
            )));
        }

        let mut rows = self
            .backend
            .update(
                TABLE_REPORTS,
                vec![Filter::eq("id", id), Filter::eq("user_id", user.user_id)],
                json!({
                    "status": ReportStatus::Withdrawn.as_str(),
                    "updated_at": Utc::now(),
                }),
            )
            .await?;
        let row = rows
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Report {} not found", id)))?;

        tracing::info!("Report {} withdrawn by its owner", report.reference_number);
        decode_row(row)
    }

    /// Store an evidence file for the caller's own open report.
    pub async fn attach_evidence(
        &self,
        user: &AuthenticatedUser,
        report_id: Uuid,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<EvidenceResponseDto> {
        let report = self.get_by_id(report_id).await?;
        if report.user_id != user.user_id {
            return Err(AppError::NotFound(format!("Report {} not found", report_id)));
        }
        if report.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "Cannot add evidence to a {} report",
                report.status
            )));
        }

        if data.is_empty() {
            return Err(AppError::BadRequest("Evidence file is empty".to_string()));
        }
        if data.len() > MAX_EVIDENCE_SIZE {
            return Err(AppError::BadRequest(format!(
                "File size exceeds maximum of {} MB",
                MAX_EVIDENCE_SIZE / 1024 / 1024
            )));
        }
        if !ALLOWED_EVIDENCE_TYPES.contains(&content_type) {
            return Err(AppError::BadRequest(format!(
                "File type '{}' is not allowed. Allowed: {}",
                content_type,
                ALLOWED_EVIDENCE_TYPES.join(", ")
            )));
        }

        let sha256 = hex::encode(Sha256::digest(&data));
        let file_size = data.len() as i64;
        let object_key = format!(
            "evidence/{}/{}-{}",
            report_id,
            Uuid::new_v4(),
            sanitize_filename(filename)
        );

        self.storage.upload(&object_key, data, content_type).await?;

        let row = json!({
            "report_id": report_id,
            "uploaded_by": user.user_id,
            "object_key": object_key,
            "original_filename": filename,
            "content_type": content_type,
            "file_size": file_size,
            "sha256": sha256,
        });
        let evidence: ReportEvidence = decode_row(self.backend.insert(TABLE_REPORT_EVIDENCE, row).await?)?;
        let url = self.storage.signed_url(&evidence.object_key).await?;

        tracing::info!(
            "Evidence {} ({} bytes) attached to report {}",
            evidence.id,
            file_size,
            report.reference_number
        );
        Ok(EvidenceResponseDto { evidence, url })
    }

    /// Evidence with fresh download URLs, for the owner or staff.
    pub async fn list_evidence(
        &self,
        user: &AuthenticatedUser,
        report_id: Uuid,
    ) -> Result<Vec<EvidenceResponseDto>> {
        self.get_for_user(user, report_id).await?;

        let evidence: Vec<ReportEvidence> = self
            .backend
            .select(
                SelectQuery::from(TABLE_REPORT_EVIDENCE)
                    .eq("report_id", report_id)
                    .order("created_at", true),
            )
            .await?
            .rows()?;

        let mut out = Vec::with_capacity(evidence.len());
        for evidence in evidence {
            let url = self.storage.signed_url(&evidence.object_key).await?;
            out.push(EvidenceResponseDto { evidence, url });
        }
        Ok(out)
    }
}

/// Keep object keys to a safe character set.
fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(100)
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::model::Role;
    use crate::features::reports::models::FraudType;
    use crate::modules::storage::MemoryStorage;
    use crate::shared::test_helpers::{auth_user, memory_backend};

    struct Fixture {
        service: ReportService,
        users: Arc<UserService>,
        notifications: Arc<NotificationService>,
    }

    fn fixture() -> Fixture {
        let backend = memory_backend();
        let users = Arc::new(UserService::new(backend.clone()));
        let notifications = Arc::new(NotificationService::new(backend.clone(), users.clone()));
        let service = ReportService::new(
            backend,
            users.clone(),
            notifications.clone(),
            Arc::new(MemoryStorage::new()),
        );
        Fixture {
            service,
            users,
            notifications,
        }
    }

    fn phishing() -> SubmitReportDto {
        SubmitReportDto::new("X", "Y", FraudType::Phishing)
    }

    #[tokio::test]
    async fn submit_creates_pending_report_and_notice() {
        let f = fixture();
        let citizen = auth_user(Role::Citizen);

        let report = f.service.submit_report(&citizen, phishing()).await.unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.priority, Priority::Low);
        assert!(report.reference_number.starts_with("CHK-"));

        let (notes, total) = f
            .notifications
            .list_for_user(citizen.user_id, false, &PaginationQuery::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(notes[0].related_report_id, Some(report.id));
    }

    #[tokio::test]
    async fn suspended_users_cannot_submit() {
        let f = fixture();
        let admin = auth_user(Role::Admin);
        let citizen = auth_user(Role::Citizen);
        f.users.ensure_profile(&admin).await.unwrap();
        f.users.ensure_profile(&citizen).await.unwrap();
        f.users
            .suspend_user(&admin, citizen.user_id, None)
            .await
            .unwrap();

        assert!(matches!(
            f.service.submit_report(&citizen, phishing()).await,
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn future_incident_date_is_rejected() {
        let f = fixture();
        let mut dto = phishing();
        dto.incident_date = Some(Utc::now().date_naive() + chrono::Duration::days(3));
        assert!(matches!(
            f.service.submit_report(&auth_user(Role::Citizen), dto).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn reports_are_private_to_owner_and_staff() {
        let f = fixture();
        let owner = auth_user(Role::Citizen);
        let report = f.service.submit_report(&owner, phishing()).await.unwrap();

        assert!(f.service.get_for_user(&owner, report.id).await.is_ok());
        assert!(f
            .service
            .get_for_user(&auth_user(Role::Moderator), report.id)
            .await
            .is_ok());
        assert!(matches!(
            f.service
                .get_for_user(&auth_user(Role::Citizen), report.id)
                .await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn withdraw_only_open_reports() {
        let f = fixture();
        let owner = auth_user(Role::Citizen);
        let report = f.service.submit_report(&owner, phishing()).await.unwrap();

        let withdrawn = f.service.withdraw(&owner, report.id).await.unwrap();
        assert_eq!(withdrawn.status, ReportStatus::Withdrawn);
        assert!(matches!(
            f.service.withdraw(&owner, report.id).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn evidence_is_checked_and_hashed() {
        let f = fixture();
        let owner = auth_user(Role::Citizen);
        let report = f.service.submit_report(&owner, phishing()).await.unwrap();

        let stored = f
            .service
            .attach_evidence(
                &owner,
                report.id,
                "../chat screenshot.png",
                "image/png",
                b"png-bytes".to_vec(),
            )
            .await
            .unwrap();
        assert_eq!(stored.evidence.sha256, hex::encode(Sha256::digest(b"png-bytes")));
        assert!(stored
            .evidence
            .object_key
            .starts_with(&format!("evidence/{}/", report.id)));
        assert!(stored.evidence.object_key.ends_with("-chat_screenshot.png"));

        assert!(matches!(
            f.service
                .attach_evidence(&owner, report.id, "a.exe", "application/x-msdownload", vec![1])
                .await,
            Err(AppError::BadRequest(_))
        ));
        assert!(f
            .service
            .attach_evidence(
                &auth_user(Role::Citizen),
                report.id,
                "a.png",
                "image/png",
                vec![1]
            )
            .await
            .is_err());

        let listed = f
            .service
            .list_evidence(&auth_user(Role::Admin), report.id)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].url.is_empty());
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("bank statement (1).pdf"), "bank_statement__1_.pdf");
        assert_eq!(sanitize_filename(".."), "file");
        assert_eq!(sanitize_filename(""), "file");
    }
}
