//! The admin console's store: a reducer-owned state fed by explicit
//! fetches, realtime row changes and a periodic full refresh.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use super::action::AdminAction;
use super::reducer::reduce;
use super::state::AdminState;
use crate::core::config::AdminConfig;
use crate::core::error::Result;
use crate::features::admin::dtos::ReportFilters;
use crate::features::admin::services::AdminService;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::reports::models::{Report, ReportStatus};
use crate::features::users::dtos::UserFilters;
use crate::features::users::models::{UserProfile, UserStatus};
use crate::modules::backend::{decode_row, ChangeEvent, RowChange, Subscription};
use crate::shared::constants::{TABLE_PROFILES, TABLE_REPORTS};

/// Sole owner of the state. Mutation happens only in [`StoreCore::dispatch`].
pub struct StoreCore {
    state: watch::Sender<AdminState>,
}

impl StoreCore {
    pub fn new(initial: AdminState) -> Self {
        Self {
            state: watch::Sender::new(initial),
        }
    }

    pub fn dispatch(&self, action: AdminAction) {
        self.state.send_modify(|state| reduce(state, action));
    }

    pub fn snapshot(&self) -> AdminState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AdminState> {
        self.state.subscribe()
    }
}

struct StoreInner {
    core: StoreCore,
    service: Arc<AdminService>,
}

impl StoreInner {
    async fn fetch_reports(&self) {
        self.core.dispatch(AdminAction::ReportsLoading);
        let (filters, page, limit) = {
            let state = self.core.state.borrow();
            (
                state.reports.filters.clone(),
                state.reports.page,
                state.reports.limit,
            )
        };

        match self.service.list_reports(&filters, page, limit).await {
            Ok((items, total)) => self
                .core
                .dispatch(AdminAction::ReportsSuccess { items, total }),
            Err(e) => self.core.dispatch(AdminAction::ReportsError(e.to_string())),
        }
    }

    async fn fetch_users(&self) {
        self.core.dispatch(AdminAction::UsersLoading);
        let (filters, page, limit) = {
            let state = self.core.state.borrow();
            (
                state.users.filters.clone(),
                state.users.page,
                state.users.limit,
            )
        };

        match self.service.list_users(&filters, page, limit).await {
            Ok((items, total)) => self.core.dispatch(AdminAction::UsersSuccess { items, total }),
            Err(e) => self.core.dispatch(AdminAction::UsersError(e.to_string())),
        }
    }

    async fn fetch_stats(&self) {
        self.core.dispatch(AdminAction::StatsLoading);
        match self.service.get_stats().await {
            Ok(stats) => self.core.dispatch(AdminAction::StatsSuccess(stats)),
            Err(e) => self.core.dispatch(AdminAction::StatsError(e.to_string())),
        }
    }

    async fn fetch_health(&self) {
        self.core.dispatch(AdminAction::HealthLoading);
        match self.service.system_health().await {
            Ok(health) => self.core.dispatch(AdminAction::HealthSuccess(health)),
            Err(e) => self.core.dispatch(AdminAction::HealthError(e.to_string())),
        }
    }

    async fn refresh(&self) {
        tokio::join!(
            self.fetch_reports(),
            self.fetch_users(),
            self.fetch_stats(),
            self.fetch_health(),
        );
    }

    fn on_change(&self, change: RowChange) {
        let Some(row) = change.record else { return };
        let action = match (change.table.as_str(), change.event) {
            (TABLE_REPORTS, ChangeEvent::Insert) => decode_row(row).map(AdminAction::ReportCreated),
            (TABLE_REPORTS, ChangeEvent::Update) => decode_row(row).map(AdminAction::ReportUpdated),
            (TABLE_PROFILES, ChangeEvent::Insert) => decode_row(row).map(AdminAction::UserCreated),
            (TABLE_PROFILES, ChangeEvent::Update) => decode_row(row).map(AdminAction::UserUpdated),
            _ => return,
        };
        match action {
            Ok(action) => self.core.dispatch(action),
            Err(e) => tracing::warn!("Ignoring undecodable {} change: {:?}", change.table, e),
        }
    }
}

/// Per-connection admin store. Mounting starts the realtime subscription and
/// the poller; dropping the store stops both.
pub struct AdminStore {
    inner: Arc<StoreInner>,
    poll_interval: Duration,
    subscription: Option<Subscription>,
    poller: Option<JoinHandle<()>>,
}

impl AdminStore {
    pub fn new(service: Arc<AdminService>, config: &AdminConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                core: StoreCore::new(AdminState::new(config.page_size)),
                service,
            }),
            poll_interval: config.poll_interval,
            subscription: None,
            poller: None,
        }
    }

    /// Subscribe to row changes, load everything once and start polling.
    pub async fn mount(&mut self) {
        if self.poller.is_some() {
            return;
        }

        let inner = self.inner.clone();
        let on_change = move |change: RowChange| inner.on_change(change);
        let subscription = self
            .inner
            .service
            .realtime()
            .channel("admin-console")
            .on(None, TABLE_REPORTS, None, on_change.clone())
            .on(None, TABLE_PROFILES, None, on_change)
            .subscribe();
        self.inner
            .core
            .dispatch(AdminAction::RealtimeStatus(subscription.is_active()));
        self.subscription = Some(subscription);

        self.inner.refresh().await;

        let inner = self.inner.clone();
        let period = self.poll_interval;
        self.poller = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                tracing::debug!("Admin console poll");
                inner.refresh().await;
            }
        }));

        tracing::debug!(
            "Admin store mounted (poll every {}s)",
            self.poll_interval.as_secs()
        );
    }

    pub fn state(&self) -> AdminState {
        self.inner.core.snapshot()
    }

    /// Receiver that sees every dispatched change
    pub fn watch(&self) -> watch::Receiver<AdminState> {
        self.inner.core.subscribe()
    }

    pub async fn refresh(&self) {
        self.inner.refresh().await;
    }

    pub async fn fetch_reports(&self) {
        self.inner.fetch_reports().await;
    }

    pub async fn fetch_users(&self) {
        self.inner.fetch_users().await;
    }

    pub async fn fetch_stats(&self) {
        self.inner.fetch_stats().await;
    }

    pub async fn fetch_health(&self) {
        self.inner.fetch_health().await;
    }

    pub async fn set_report_filters(&self, filters: ReportFilters) {
        self.inner.core.dispatch(AdminAction::SetReportFilters(filters));
        self.inner.fetch_reports().await;
    }

    pub async fn set_report_page(&self, page: i64) {
        self.inner.core.dispatch(AdminAction::SetReportPage(page));
        self.inner.fetch_reports().await;
    }

    pub async fn set_user_filters(&self, filters: UserFilters) {
        self.inner.core.dispatch(AdminAction::SetUserFilters(filters));
        self.inner.fetch_users().await;
    }

    pub async fn set_user_page(&self, page: i64) {
        self.inner.core.dispatch(AdminAction::SetUserPage(page));
        self.inner.fetch_users().await;
    }

    /// Change a report's status, patch local state from the response and
    /// refresh the counters.
    pub async fn update_report_status(
        &self,
        actor: &AuthenticatedUser,
        report_id: Uuid,
        status: ReportStatus,
        admin_notes: Option<String>,
    ) -> Result<Report> {
        let report = self
            .inner
            .service
            .update_report_status(actor, report_id, status, admin_notes)
            .await?;
        self.inner
            .core
            .dispatch(AdminAction::ReportUpdated(report.clone()));
        self.inner.fetch_stats().await;
        Ok(report)
    }

    fn local_user_status(&self, user_id: Uuid) -> Option<UserStatus> {
        let state = self.inner.core.state.borrow();
        state
            .users
            .items
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.status)
    }

    /// Suspend a user. `Ok(None)` when the loaded copy is already suspended.
    pub async fn suspend_user(
        &self,
        actor: &AuthenticatedUser,
        user_id: Uuid,
        reason: Option<String>,
    ) -> Result<Option<UserProfile>> {
        if self.local_user_status(user_id) == Some(UserStatus::Suspended) {
            return Ok(None);
        }
        let profile = self.inner.service.suspend_user(actor, user_id, reason).await?;
        self.inner
            .core
            .dispatch(AdminAction::UserUpdated(profile.clone()));
        Ok(Some(profile))
    }

    /// Reactivate a user. `Ok(None)` when the loaded copy is already active.
    pub async fn activate_user(
        &self,
        actor: &AuthenticatedUser,
        user_id: Uuid,
    ) -> Result<Option<UserProfile>> {
        if self.local_user_status(user_id) == Some(UserStatus::Active) {
            return Ok(None);
        }
        let profile = self.inner.service.activate_user(actor, user_id).await?;
        self.inner
            .core
            .dispatch(AdminAction::UserUpdated(profile.clone()));
        Ok(Some(profile))
    }
}

impl Drop for AdminStore {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        // Dropping the subscription ends the realtime channel
        self.subscription.take();
        tracing::debug!("Admin store unmounted");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::AppError;
    use crate::features::auth::model::Role;
    use crate::features::reports::dtos::SubmitReportDto;
    use crate::features::reports::models::FraudType;
    use crate::shared::test_helpers::{auth_user, TestContext};

    fn config() -> AdminConfig {
        AdminConfig {
            poll_interval: Duration::from_secs(30),
            page_size: 20,
        }
    }

    async fn mounted(ctx: &TestContext) -> AdminStore {
        let mut store = AdminStore::new(ctx.admin.clone(), &config());
        store.mount().await;
        store
    }

    async fn wait_until<F>(store: &AdminStore, condition: F) -> AdminState
    where
        F: FnMut(&AdminState) -> bool,
    {
        let mut rx = store.watch();
        let state = tokio::time::timeout(Duration::from_secs(2), rx.wait_for(condition))
            .await
            .expect("condition not reached")
            .expect("store closed");
        state.clone()
    }

    async fn submit(ctx: &TestContext, citizen: &AuthenticatedUser) -> Report {
        ctx.reports
            .submit_report(citizen, SubmitReportDto::new("X", "Y", FraudType::Phishing))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn mount_loads_every_slot() {
        let ctx = TestContext::new();
        submit(&ctx, &auth_user(Role::Citizen)).await;

        let store = mounted(&ctx).await;
        let state = store.state();
        assert!(state.realtime_connected);
        assert_eq!(state.reports.total, 1);
        assert_eq!(state.users.total, 1);
        assert!(state.stats.data.is_some());
        assert!(state.system_health.data.is_some());
        assert!(!state.reports.loading);
        assert!(state.last_updated.is_some());
    }

    #[tokio::test]
    async fn submitted_report_appears_through_realtime() {
        let ctx = TestContext::new();
        let store = mounted(&ctx).await;
        assert_eq!(store.state().reports.total, 0);

        let report = submit(&ctx, &auth_user(Role::Citizen)).await;

        let state = wait_until(&store, |s| s.reports.total == 1).await;
        assert_eq!(state.reports.items[0].id, report.id);
        assert_eq!(state.reports.items[0].status, ReportStatus::Pending);
    }

    #[tokio::test]
    async fn status_filter_returns_only_matching_items() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let citizen = auth_user(Role::Citizen);
        let first = submit(&ctx, &citizen).await;
        submit(&ctx, &citizen).await;
        ctx.admin
            .update_report_status(&admin, first.id, ReportStatus::UnderReview, None)
            .await
            .unwrap();

        let store = mounted(&ctx).await;
        store.set_report_page(2).await;
        store
            .set_report_filters(ReportFilters {
                status: Some(ReportStatus::Pending),
                ..Default::default()
            })
            .await;

        let state = store.state();
        assert_eq!(state.reports.page, 1);
        assert_eq!(state.reports.total, 1);
        assert!(state
            .reports
            .items
            .iter()
            .all(|r| r.status == ReportStatus::Pending));
    }

    #[tokio::test]
    async fn refresh_is_idempotent() {
        let ctx = TestContext::new();
        let citizen = auth_user(Role::Citizen);
        submit(&ctx, &citizen).await;
        submit(&ctx, &citizen).await;

        let store = mounted(&ctx).await;
        store.refresh().await;
        let first = store.state().reports.items;
        store.refresh().await;
        assert_eq!(store.state().reports.items, first);
    }

    #[tokio::test]
    async fn status_update_patches_locally_and_refetches_stats() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let report = submit(&ctx, &auth_user(Role::Citizen)).await;
        let store = mounted(&ctx).await;
        assert_eq!(
            store.state().stats.data.map(|s| s.pending_reports),
            Some(1)
        );

        store
            .update_report_status(&admin, report.id, ReportStatus::Resolved, Some("done".to_string()))
            .await
            .unwrap();

        let state = store.state();
        assert_eq!(state.reports.items[0].status, ReportStatus::Resolved);
        let stats = state.stats.data.unwrap();
        assert_eq!(stats.pending_reports, 0);
        assert_eq!(stats.resolved_reports, 1);
    }

    #[tokio::test]
    async fn invalid_transition_leaves_state_alone() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let report = submit(&ctx, &auth_user(Role::Citizen)).await;
        let store = mounted(&ctx).await;

        let result = store
            .update_report_status(&admin, report.id, ReportStatus::Pending, None)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(store.state().reports.items[0].status, ReportStatus::Pending);
    }

    #[tokio::test]
    async fn suspending_twice_is_a_no_op() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let citizen = auth_user(Role::Citizen);
        ctx.users.ensure_profile(&admin).await.unwrap();
        ctx.users.ensure_profile(&citizen).await.unwrap();
        let store = mounted(&ctx).await;

        let first = store.suspend_user(&admin, citizen.user_id, None).await.unwrap();
        assert_eq!(first.map(|p| p.status), Some(UserStatus::Suspended));

        let second = store.suspend_user(&admin, citizen.user_id, None).await.unwrap();
        assert!(second.is_none());

        let state = store.state();
        let local = state
            .users
            .items
            .iter()
            .find(|u| u.id == citizen.user_id)
            .unwrap();
        assert_eq!(local.status, UserStatus::Suspended);
    }

    #[tokio::test]
    async fn dropping_the_store_releases_the_subscription() {
        let ctx = TestContext::new();
        let hub = ctx.backend.realtime().clone();
        let before = hub.subscriber_count();

        let store = mounted(&ctx).await;
        assert_eq!(hub.subscriber_count(), before + 1);

        drop(store);
        // The aborted delivery task releases its receiver asynchronously
        tokio::time::timeout(Duration::from_secs(1), async {
            while hub.subscriber_count() != before {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
    }
}
