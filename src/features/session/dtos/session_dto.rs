use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Idle-expiry countdown for the caller's session
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionStatusDto {
    pub session_id: String,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub remaining_seconds: i64,
    pub expired: bool,
}
