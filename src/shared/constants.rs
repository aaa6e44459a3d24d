/// Default page size for pagination
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size allowed
pub const MAX_PAGE_SIZE: i64 = 100;

/// Highest page number accepted; larger requests read as this page
pub const MAX_PAGE: i64 = 1_000_000;

// =============================================================================
// TABLES
// =============================================================================

pub const TABLE_REPORTS: &str = "reports";
pub const TABLE_PROFILES: &str = "profiles";
pub const TABLE_NOTIFICATIONS: &str = "notifications";
pub const TABLE_NOTIFICATION_PREFERENCES: &str = "notification_preferences";
pub const TABLE_AUDIT_LOGS: &str = "audit_logs";
pub const TABLE_REPORT_EVIDENCE: &str = "report_evidence";
pub const TABLE_COMMUNITY_POSTS: &str = "community_posts";
pub const TABLE_COMMUNITY_COMMENTS: &str = "community_comments";

/// Postgres NOTIFY channel carrying row changes
pub const REALTIME_CHANNEL: &str = "chakshu_realtime";

// =============================================================================
// EVIDENCE
// =============================================================================

/// Maximum evidence file size (10 MB)
pub const MAX_EVIDENCE_SIZE: usize = 10 * 1024 * 1024;

/// MIME types accepted as report evidence
pub const ALLOWED_EVIDENCE_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "application/pdf",
    "text/plain",
];
