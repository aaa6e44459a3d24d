use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::features::reports::models::{FraudType, Priority, Report, ReportStatus};
use crate::modules::backend::Filter;
use crate::shared::validation::escape_like;

// =============================================================================
// REPORT FILTERS
// =============================================================================

/// Filters for the staff report list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ReportFilters {
    pub status: Option<ReportStatus>,
    pub fraud_type: Option<FraudType>,
    pub priority: Option<Priority>,
    /// Case-insensitive match on title, description or reference number
    pub search: Option<String>,
    /// Submitted on or after this day (UTC)
    pub from_date: Option<NaiveDate>,
    /// Submitted on or before this day (UTC)
    pub to_date: Option<NaiveDate>,
    pub city: Option<String>,
    pub state: Option<String>,
}

fn day_start(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn day_end(day: NaiveDate) -> DateTime<Utc> {
    day_start(day) + chrono::Duration::days(1) - chrono::Duration::microseconds(1)
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl ReportFilters {
    pub fn to_filters(&self) -> Vec<Filter> {
        let mut filters = Vec::new();
        if let Some(status) = self.status {
            filters.push(Filter::eq("status", status.as_str()));
        }
        if let Some(fraud_type) = self.fraud_type {
            filters.push(Filter::eq("fraud_type", fraud_type.as_str()));
        }
        if let Some(priority) = self.priority {
            filters.push(Filter::eq("priority", priority.as_str()));
        }
        if let Some(search) = non_empty(&self.search) {
            let pattern = format!("%{}%", escape_like(search));
            filters.push(Filter::Or(vec![
                Filter::ilike("title", pattern.clone()),
                Filter::ilike("description", pattern.clone()),
                Filter::ilike("reference_number", pattern),
            ]));
        }
        if let Some(day) = self.from_date {
            filters.push(Filter::gte("created_at", day_start(day)));
        }
        if let Some(day) = self.to_date {
            filters.push(Filter::lte("created_at", day_end(day)));
        }
        if let Some(city) = non_empty(&self.city) {
            filters.push(Filter::ilike("city", escape_like(city)));
        }
        if let Some(state) = non_empty(&self.state) {
            filters.push(Filter::ilike("state", escape_like(state)));
        }
        filters
    }

    /// Whether a report belongs in a list fetched with these filters.
    pub fn matches(&self, report: &Report) -> bool {
        if self.status.is_some_and(|s| s != report.status)
            || self.fraud_type.is_some_and(|t| t != report.fraud_type)
            || self.priority.is_some_and(|p| p != report.priority)
        {
            return false;
        }
        if self.from_date.is_some_and(|d| report.created_at < day_start(d))
            || self.to_date.is_some_and(|d| report.created_at > day_end(d))
        {
            return false;
        }

        let same_place = |wanted: Option<&str>, actual: &Option<String>| match wanted {
            None => true,
            Some(w) => actual
                .as_deref()
                .is_some_and(|a| a.to_lowercase() == w.to_lowercase()),
        };
        if !same_place(non_empty(&self.city), &report.city)
            || !same_place(non_empty(&self.state), &report.state)
        {
            return false;
        }

        match non_empty(&self.search) {
            None => true,
            Some(search) => {
                let needle = search.to_lowercase();
                [&report.title, &report.description, &report.reference_number]
                    .into_iter()
                    .any(|v| v.to_lowercase().contains(&needle))
            }
        }
    }
}

// =============================================================================
// REQUESTS
// =============================================================================

/// Request DTO for a staff status change
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateReportStatusDto {
    pub status: ReportStatus,

    #[validate(length(max = 2000, message = "Notes must not exceed 2000 characters"))]
    pub admin_notes: Option<String>,
}

// =============================================================================
// STATS & HEALTH
// =============================================================================

/// Dashboard counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AdminStats {
    pub total_reports: i64,
    pub pending_reports: i64,
    pub under_review_reports: i64,
    pub resolved_reports: i64,
    pub rejected_reports: i64,
    pub escalated_reports: i64,
    pub reports_today: i64,
    pub total_users: i64,
    pub suspended_users: i64,
    pub active_sessions: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Down,
}

impl HealthStatus {
    /// Classify a probe round-trip
    pub fn from_latency_ms(latency_ms: u64) -> Self {
        if latency_ms <= HEALTHY_LATENCY_MS {
            HealthStatus::Healthy
        } else if latency_ms <= DEGRADED_LATENCY_MS {
            HealthStatus::Degraded
        } else {
            HealthStatus::Down
        }
    }
}

pub const HEALTHY_LATENCY_MS: u64 = 200;
pub const DEGRADED_LATENCY_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub error: Option<String>,
}

/// Point-in-time health snapshot; never persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SystemHealth {
    /// Worst status among the components
    pub status: HealthStatus,
    pub database: ComponentHealth,
    pub storage: ComponentHealth,
    pub active_sessions: i64,
    pub pending_reports: i64,
    pub checked_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn report(title: &str, status: ReportStatus, city: Option<&str>) -> Report {
        let now = Utc::now();
        Report {
            id: Uuid::new_v4(),
            reference_number: "CHK-2025-ABCD2345".to_string(),
            user_id: Uuid::new_v4(),
            title: title.to_string(),
            description: "Caller asked for OTP".to_string(),
            fraud_type: FraudType::UpiFraud,
            status,
            priority: Priority::Medium,
            amount_involved: None,
            city: city.map(str::to_string),
            state: None,
            suspect_identifier: None,
            incident_date: None,
            admin_notes: None,
            reviewed_by: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_filters_match_everything() {
        let filters = ReportFilters::default();
        assert!(filters.to_filters().is_empty());
        assert!(filters.matches(&report("a", ReportStatus::Rejected, None)));
    }

    #[test]
    fn status_search_and_city_combine() {
        let filters = ReportFilters {
            status: Some(ReportStatus::Pending),
            search: Some("  upi ".to_string()),
            city: Some("pune".to_string()),
            ..Default::default()
        };
        assert_eq!(filters.to_filters().len(), 3);

        assert!(filters.matches(&report("Fake UPI refund", ReportStatus::Pending, Some("Pune"))));
        assert!(!filters.matches(&report("Fake UPI refund", ReportStatus::Resolved, Some("Pune"))));
        assert!(!filters.matches(&report("Fake UPI refund", ReportStatus::Pending, Some("Delhi"))));
        assert!(!filters.matches(&report("Job offer", ReportStatus::Pending, Some("Pune"))));
        // Reference numbers are searchable too
        let filters = ReportFilters {
            search: Some("abcd23".to_string()),
            ..Default::default()
        };
        assert!(filters.matches(&report("x", ReportStatus::Pending, None)));
    }

    #[test]
    fn date_range_is_inclusive() {
        let r = report("x", ReportStatus::Pending, None);
        let today = r.created_at.date_naive();
        let filters = ReportFilters {
            from_date: Some(today),
            to_date: Some(today),
            ..Default::default()
        };
        assert!(filters.matches(&r));

        let filters = ReportFilters {
            to_date: today.pred_opt(),
            ..Default::default()
        };
        assert!(!filters.matches(&r));
    }

    #[test]
    fn latency_classification() {
        assert_eq!(HealthStatus::from_latency_ms(12), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_latency_ms(200), HealthStatus::Healthy);
        assert_eq!(HealthStatus::from_latency_ms(450), HealthStatus::Degraded);
        assert_eq!(HealthStatus::from_latency_ms(5000), HealthStatus::Down);
    }
}
