use chrono::Utc;

use crate::shared::constants::MAX_PAGE;

use super::action::AdminAction;
use super::state::AdminState;

/// Apply one action to the admin state.
pub fn reduce(state: &mut AdminState, action: AdminAction) {
    match action {
        AdminAction::ReportsLoading => {
            state.reports.loading = true;
            state.reports.error = None;
        }
        AdminAction::ReportsSuccess { items, total } => {
            state.reports.items = items;
            state.reports.total = total;
            state.reports.loading = false;
            state.reports.error = None;
            state.last_updated = Some(Utc::now());
        }
        AdminAction::ReportsError(error) => {
            state.reports.loading = false;
            state.reports.error = Some(error);
        }
        AdminAction::SetReportFilters(filters) => {
            state.reports.filters = filters;
            state.reports.page = 1;
        }
        AdminAction::SetReportPage(page) => {
            state.reports.page = page.clamp(1, MAX_PAGE);
        }
        AdminAction::ReportUpdated(report) => {
            if state.reports.apply_update(report) {
                state.last_updated = Some(Utc::now());
            }
        }
        AdminAction::ReportCreated(report) => {
            if state.reports.apply_create(report) {
                state.last_updated = Some(Utc::now());
            }
        }

        AdminAction::UsersLoading => {
            state.users.loading = true;
            state.users.error = None;
        }
        AdminAction::UsersSuccess { items, total } => {
            state.users.items = items;
            state.users.total = total;
            state.users.loading = false;
            state.users.error = None;
            state.last_updated = Some(Utc::now());
        }
        AdminAction::UsersError(error) => {
            state.users.loading = false;
            state.users.error = Some(error);
        }
        AdminAction::SetUserFilters(filters) => {
            state.users.filters = filters;
            state.users.page = 1;
        }
        AdminAction::SetUserPage(page) => {
            state.users.page = page.clamp(1, MAX_PAGE);
        }
        AdminAction::UserUpdated(user) => {
            if state.users.apply_update(user) {
                state.last_updated = Some(Utc::now());
            }
        }
        AdminAction::UserCreated(user) => {
            if state.users.apply_create(user) {
                state.last_updated = Some(Utc::now());
            }
        }

        AdminAction::StatsLoading => {
            state.stats.loading = true;
            state.stats.error = None;
        }
        AdminAction::StatsSuccess(stats) => {
            state.stats.data = Some(stats);
            state.stats.loading = false;
            state.stats.error = None;
            state.last_updated = Some(Utc::now());
        }
        AdminAction::StatsError(error) => {
            state.stats.loading = false;
            state.stats.error = Some(error);
        }

        AdminAction::HealthLoading => {
            state.system_health.loading = true;
            state.system_health.error = None;
        }
        AdminAction::HealthSuccess(health) => {
            state.system_health.data = Some(health);
            state.system_health.loading = false;
            state.system_health.error = None;
            state.last_updated = Some(Utc::now());
        }
        AdminAction::HealthError(error) => {
            state.system_health.loading = false;
            state.system_health.error = Some(error);
        }

        AdminAction::RealtimeStatus(connected) => {
            state.realtime_connected = connected;
        }
    }
}
