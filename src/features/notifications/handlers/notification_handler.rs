use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{sse::Event, IntoResponse, Response, Sse},
    Json,
};
use futures::{future, stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant};
use tokio_stream::wrappers::{IntervalStream, ReceiverStream};
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::AppJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::notifications::dtos::{
    MarkAllReadDto, NotificationListParams, UnreadCountDto, UpdatePreferencesDto,
};
use crate::features::notifications::models::{Notification, NotificationPreferences};
use crate::features::notifications::services::NotificationService;
use crate::features::session::SessionRegistry;
use crate::shared::types::{ApiResponse, Meta};

/// Buffered notifications per live feed before new ones are dropped
const STREAM_BUFFER: usize = 64;

/// How often an idle feed re-checks that its session is still signed in
const SESSION_CHECK_SECS: u64 = 15;

#[derive(Clone)]
pub struct FeedState {
    pub service: Arc<NotificationService>,
    pub sessions: Arc<SessionRegistry>,
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationListParams),
    responses(
        (status = 200, description = "Notifications for the caller", body = ApiResponse<Vec<Notification>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn list_notifications(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Query(params): Query<NotificationListParams>,
) -> Result<Json<ApiResponse<Vec<Notification>>>> {
    let (items, total) = service
        .list_for_user(user.user_id, params.unread_only, &params.pagination())
        .await?;
    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta { total }),
    )))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    responses(
        (status = 200, description = "Unread notification count", body = ApiResponse<UnreadCountDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn unread_count(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
) -> Result<Json<ApiResponse<UnreadCountDto>>> {
    let unread = service.unread_count(user.user_id).await?;
    Ok(Json(ApiResponse::success(
        Some(UnreadCountDto { unread }),
        None,
        None,
    )))
}

#[utoipa::path(
    post,
    path = "/api/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = ApiResponse<Notification>),
        (status = 404, description = "Notification not found")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_read(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Notification>>> {
    let notification = service.mark_read(user.user_id, id).await?;
    Ok(Json(ApiResponse::success(Some(notification), None, None)))
}

#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    responses(
        (status = 200, description = "All notifications marked read", body = ApiResponse<MarkAllReadDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn mark_all_read(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
) -> Result<Json<ApiResponse<MarkAllReadDto>>> {
    let updated = service.mark_all_read(user.user_id).await?;
    Ok(Json(ApiResponse::success(
        Some(MarkAllReadDto { updated }),
        None,
        None,
    )))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{id}",
    params(("id" = Uuid, Path, description = "Notification ID")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn delete_notification(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    service.delete(user.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/notifications/preferences",
    responses(
        (status = 200, description = "Delivery preferences", body = ApiResponse<NotificationPreferences>)
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn get_preferences(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
) -> Result<Json<ApiResponse<NotificationPreferences>>> {
    let preferences = service.get_preferences(user.user_id).await?;
    Ok(Json(ApiResponse::success(Some(preferences), None, None)))
}

#[utoipa::path(
    put,
    path = "/api/notifications/preferences",
    request_body = UpdatePreferencesDto,
    responses(
        (status = 200, description = "Preferences updated", body = ApiResponse<NotificationPreferences>),
        (status = 400, description = "Invalid body")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn update_preferences(
    user: AuthenticatedUser,
    State(service): State<Arc<NotificationService>>,
    AppJson(dto): AppJson<UpdatePreferencesDto>,
) -> Result<Json<ApiResponse<NotificationPreferences>>> {
    let preferences = service.update_preferences(user.user_id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(preferences),
        Some("Preferences updated".to_string()),
        None,
    )))
}

/// Live feed of the caller's new notifications (Server-Sent Events).
///
/// Each event is named `notification` and carries the notification as JSON.
/// The feed ends once the caller's session is signed out or goes idle; the
/// realtime subscription is released when the stream is dropped.
#[utoipa::path(
    get,
    path = "/api/notifications/stream",
    responses(
        (status = 200, description = "SSE stream of notifications", content_type = "text/event-stream"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "notifications",
    security(("bearer_auth" = []))
)]
pub async fn stream_notifications(
    user: AuthenticatedUser,
    State(state): State<FeedState>,
) -> Response {
    let (tx, rx) = mpsc::channel::<Notification>(STREAM_BUFFER);
    let user_id = user.user_id;

    let subscription = state.service.subscribe(user_id, move |notification| {
        if tx.try_send(notification).is_err() {
            tracing::warn!("Notification feed for {} is full or closed", user_id);
        }
    });
    tracing::debug!("Notification feed opened for {}", user_id);

    let period = Duration::from_secs(SESSION_CHECK_SECS);
    let checks = IntervalStream::new(interval_at(Instant::now() + period, period)).map(|_| None);
    let feed = stream::select(ReceiverStream::new(rx).map(Some), checks);

    let sessions = state.sessions;
    let events = feed
        .then(move |item| {
            let sessions = sessions.clone();
            let user = user.clone();
            async move { (sessions.is_live(&user).await, item) }
        })
        .take_while(move |(live, _): &(bool, Option<Notification>)| {
            if !live {
                tracing::debug!("Notification feed for {} closed: session ended", user_id);
            }
            future::ready(*live)
        })
        .filter_map(move |(_, item)| {
            // The stream owns the subscription; dropping the stream unsubscribes
            let _feed = &subscription;
            future::ready(item.map(|n| Ok::<_, Infallible>(notification_event(&n))))
        });

    Sse::new(events)
        .keep_alive(
            axum::response::sse::KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("ping"),
        )
        .into_response()
}

fn notification_event(notification: &Notification) -> Event {
    Event::default()
        .event("notification")
        .json_data(notification)
        .unwrap_or_else(|_| Event::default().event("error").data("encode failed"))
}
