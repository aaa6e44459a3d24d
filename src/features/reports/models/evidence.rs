use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// A row of the `report_evidence` table. The file lives in object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReportEvidence {
    pub id: Uuid,
    pub report_id: Uuid,
    pub uploaded_by: Uuid,
    pub object_key: String,
    pub original_filename: String,
    pub content_type: String,
    pub file_size: i64,
    /// Hex SHA-256 of the uploaded bytes
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}
