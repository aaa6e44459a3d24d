//! Admin console over WebSocket.
//!
//! Each connection mounts its own [`AdminStore`] and streams a full state
//! snapshot whenever the store changes. The client drives the store with
//! JSON commands; every command counts as session activity. Snapshots and
//! pings do not, so a console left untouched past the idle timeout, or whose
//! session was signed out elsewhere, is closed with an error frame.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::time::{interval, timeout, Duration};
use uuid::Uuid;

use crate::core::config::AdminConfig;
use crate::core::error::{self, AppError};
use crate::core::extractor::validate_dto;
use crate::features::admin::dtos::{ReportFilters, UpdateReportStatusDto};
use crate::features::admin::services::AdminService;
use crate::features::admin::sync::{AdminState, AdminStore};
use crate::features::auth::guards::RequireModerator;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::reports::models::ReportStatus;
use crate::features::session::SessionRegistry;
use crate::features::users::dtos::{SuspendUserDto, UserFilters};
use crate::shared::types::ServiceResponse;

const SEND_TIMEOUT_SECS: u64 = 5;
const PING_INTERVAL_SECS: u64 = 30;

#[derive(Clone)]
pub struct LiveState {
    pub service: Arc<AdminService>,
    pub sessions: Arc<SessionRegistry>,
    pub config: AdminConfig,
}

/// Commands accepted from the console
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleCommand {
    SetReportFilters { filters: ReportFilters },
    SetReportPage { page: i64 },
    SetUserFilters { filters: UserFilters },
    SetUserPage { page: i64 },
    Refresh,
    UpdateReportStatus {
        report_id: Uuid,
        status: ReportStatus,
        admin_notes: Option<String>,
    },
    SuspendUser {
        user_id: Uuid,
        reason: Option<String>,
    },
    ActivateUser { user_id: Uuid },
}

/// Frames sent to the console
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConsoleFrame<'a> {
    Snapshot { state: &'a AdminState },
    Ack { command: &'static str },
    Error { message: String },
}

impl ConsoleCommand {
    fn name(&self) -> &'static str {
        match self {
            Self::SetReportFilters { .. } => "set_report_filters",
            Self::SetReportPage { .. } => "set_report_page",
            Self::SetUserFilters { .. } => "set_user_filters",
            Self::SetUserPage { .. } => "set_user_page",
            Self::Refresh => "refresh",
            Self::UpdateReportStatus { .. } => "update_report_status",
            Self::SuspendUser { .. } => "suspend_user",
            Self::ActivateUser { .. } => "activate_user",
        }
    }
}

/// Live admin console
#[utoipa::path(
    get,
    path = "/api/admin/live",
    responses(
        (status = 101, description = "Switching to the console WebSocket"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - Moderator access required")
    ),
    tag = "admin",
    security(("bearer_auth" = []))
)]
pub async fn live_console(
    RequireModerator(user): RequireModerator,
    State(state): State<LiveState>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_console(socket, user, state))
}

async fn handle_console(socket: WebSocket, user: AuthenticatedUser, state: LiveState) {
    let (mut sender, mut receiver) = socket.split();

    let mut store = AdminStore::new(state.service.clone(), &state.config);
    store.mount().await;
    let mut changes = store.watch();

    tracing::info!("Admin console opened by {}", user.user_id);

    if send_snapshot(&mut sender, &store.state()).await.is_err() {
        return;
    }

    let mut ping = interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping.tick().await;

    loop {
        tokio::select! {
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                if !state.sessions.is_live(&user).await {
                    close_ended(&mut sender, &user).await;
                    break;
                }
                let snapshot = changes.borrow_and_update().clone();
                if send_snapshot(&mut sender, &snapshot).await.is_err() {
                    break;
                }
            }

            _ = ping.tick() => {
                if !state.sessions.is_live(&user).await {
                    close_ended(&mut sender, &user).await;
                    break;
                }
                if sender.send(Message::Ping(Default::default())).await.is_err() {
                    break;
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if state.sessions.touch(&user).await.is_err() {
                            close_ended(&mut sender, &user).await;
                            break;
                        }

                        let frame = match serde_json::from_str::<ConsoleCommand>(text.as_str()) {
                            Ok(command) => run_command(&store, &user, command).await,
                            Err(e) => ConsoleFrame::Error {
                                message: format!("Invalid command: {}", e),
                            },
                        };
                        if send_frame(&mut sender, &frame).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Admin console socket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::info!("Admin console closed by {}", user.user_id);
    // Dropping the store stops its poller and realtime channel
}

async fn run_command(
    store: &AdminStore,
    user: &AuthenticatedUser,
    command: ConsoleCommand,
) -> ConsoleFrame<'static> {
    let name = command.name();
    let outcome: ServiceResponse<()> = apply_command(store, user, command).await.into();
    if outcome.success {
        ConsoleFrame::Ack { command: name }
    } else {
        ConsoleFrame::Error {
            message: outcome
                .error
                .unwrap_or_else(|| format!("{} failed", name)),
        }
    }
}

/// Mutations go through the same DTO rules as their REST endpoints.
async fn apply_command(
    store: &AdminStore,
    user: &AuthenticatedUser,
    command: ConsoleCommand,
) -> error::Result<()> {
    match command {
        ConsoleCommand::SetReportFilters { filters } => store.set_report_filters(filters).await,
        ConsoleCommand::SetReportPage { page } => store.set_report_page(page).await,
        ConsoleCommand::SetUserFilters { filters } => store.set_user_filters(filters).await,
        ConsoleCommand::SetUserPage { page } => store.set_user_page(page).await,
        ConsoleCommand::Refresh => store.refresh().await,
        ConsoleCommand::UpdateReportStatus {
            report_id,
            status,
            admin_notes,
        } => {
            let update = UpdateReportStatusDto {
                status,
                admin_notes,
            };
            validate_dto(&update)?;
            store
                .update_report_status(user, report_id, update.status, update.admin_notes)
                .await?;
        }
        ConsoleCommand::SuspendUser { user_id, reason } => {
            let suspend = SuspendUserDto { reason };
            validate_dto(&suspend)?;
            store.suspend_user(user, user_id, suspend.reason).await?;
        }
        ConsoleCommand::ActivateUser { user_id } => {
            store.activate_user(user, user_id).await?;
        }
    }
    Ok(())
}

type Sink = futures::stream::SplitSink<WebSocket, Message>;

/// Tell the console its session is over and close the socket.
async fn close_ended(sender: &mut Sink, user: &AuthenticatedUser) {
    tracing::info!(
        "Closing admin console of {}: session {} has ended",
        user.user_id,
        user.session_id
    );
    let message = AppError::Unauthorized("Session has ended".to_string()).to_string();
    let _ = send_frame(sender, &ConsoleFrame::Error { message }).await;
    let _ = sender.send(Message::Close(None)).await;
}

async fn send_snapshot(sender: &mut Sink, state: &AdminState) -> Result<(), ()> {
    send_frame(sender, &ConsoleFrame::Snapshot { state }).await
}

async fn send_frame(sender: &mut Sink, frame: &ConsoleFrame<'_>) -> Result<(), ()> {
    let json = serde_json::to_string(frame).map_err(|e| {
        tracing::error!("Failed to encode console frame: {}", e);
    })?;

    match timeout(
        Duration::from_secs(SEND_TIMEOUT_SECS),
        sender.send(Message::Text(json.into())),
    )
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(_)) => Err(()),
        Err(_) => {
            tracing::warn!("Admin console send timed out");
            Err(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::auth::model::Role;
    use crate::features::reports::dtos::SubmitReportDto;
    use crate::features::reports::models::FraudType;
    use crate::shared::constants::MAX_PAGE;
    use crate::shared::test_helpers::{auth_user, TestContext};
    use serde_json::json;

    #[test]
    fn commands_are_tagged_by_type() {
        let command: ConsoleCommand = serde_json::from_value(json!({
            "type": "set_report_filters",
            "filters": { "status": "pending", "search": "upi" }
        }))
        .unwrap();
        match command {
            ConsoleCommand::SetReportFilters { filters } => {
                assert_eq!(filters.status, Some(ReportStatus::Pending));
                assert_eq!(filters.search.as_deref(), Some("upi"));
            }
            other => panic!("unexpected {:?}", other),
        }

        let command: ConsoleCommand = serde_json::from_value(json!({"type": "refresh"})).unwrap();
        assert_eq!(command.name(), "refresh");

        assert!(serde_json::from_value::<ConsoleCommand>(json!({"type": "drop_tables"})).is_err());
    }

    #[tokio::test]
    async fn commands_follow_rest_validation_rules() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let citizen = auth_user(Role::Citizen);
        let report = ctx
            .reports
            .submit_report(&citizen, SubmitReportDto::new("X", "Y", FraudType::Phishing))
            .await
            .unwrap();

        let mut store = AdminStore::new(ctx.admin.clone(), &ctx.config.admin);
        store.mount().await;

        let frame = run_command(
            &store,
            &admin,
            ConsoleCommand::UpdateReportStatus {
                report_id: report.id,
                status: ReportStatus::UnderReview,
                admin_notes: Some("n".repeat(2001)),
            },
        )
        .await;
        assert!(matches!(frame, ConsoleFrame::Error { ref message } if message.contains("2000")));
        assert_eq!(
            ctx.admin.get_report(report.id).await.unwrap().status,
            ReportStatus::Pending
        );

        let frame = run_command(
            &store,
            &admin,
            ConsoleCommand::SuspendUser {
                user_id: citizen.user_id,
                reason: Some("r".repeat(501)),
            },
        )
        .await;
        assert!(matches!(frame, ConsoleFrame::Error { .. }));

        let frame = run_command(&store, &admin, ConsoleCommand::SetReportPage { page: i64::MAX }).await;
        assert!(matches!(frame, ConsoleFrame::Ack { command: "set_report_page" }));
        assert_eq!(store.state().reports.page, MAX_PAGE);
    }

    #[test]
    fn frames_carry_their_type() {
        let frame = serde_json::to_value(ConsoleFrame::Ack {
            command: "refresh",
        })
        .unwrap();
        assert_eq!(frame, json!({"type": "ack", "command": "refresh"}));

        let state = AdminState::new(20);
        let frame = serde_json::to_value(ConsoleFrame::Snapshot { state: &state }).unwrap();
        assert_eq!(frame["type"], "snapshot");
        assert_eq!(frame["state"]["reports"]["limit"], 20);
    }
}
