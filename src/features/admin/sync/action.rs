use crate::features::admin::dtos::{AdminStats, ReportFilters, SystemHealth};
use crate::features::reports::models::Report;
use crate::features::users::dtos::UserFilters;
use crate::features::users::models::UserProfile;

/// Every state change of the admin store goes through one of these.
#[derive(Debug, Clone)]
pub enum AdminAction {
    ReportsLoading,
    ReportsSuccess { items: Vec<Report>, total: i64 },
    ReportsError(String),
    SetReportFilters(ReportFilters),
    SetReportPage(i64),
    ReportUpdated(Report),
    ReportCreated(Report),

    UsersLoading,
    UsersSuccess { items: Vec<UserProfile>, total: i64 },
    UsersError(String),
    SetUserFilters(UserFilters),
    SetUserPage(i64),
    UserUpdated(UserProfile),
    UserCreated(UserProfile),

    StatsLoading,
    StatsSuccess(AdminStats),
    StatsError(String),

    HealthLoading,
    HealthSuccess(SystemHealth),
    HealthError(String),

    RealtimeStatus(bool),
}
