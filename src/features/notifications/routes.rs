use crate::features::notifications::handlers::notification_handler::{self, FeedState};
use crate::features::notifications::services::NotificationService;
use crate::features::session::SessionRegistry;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

pub fn routes(service: Arc<NotificationService>, sessions: Arc<SessionRegistry>) -> Router {
    let feed = Router::new()
        .route(
            "/api/notifications/stream",
            get(notification_handler::stream_notifications),
        )
        .with_state(FeedState {
            service: service.clone(),
            sessions,
        });

    Router::new()
        .route("/api/notifications", get(notification_handler::list_notifications))
        .route(
            "/api/notifications/unread-count",
            get(notification_handler::unread_count),
        )
        .route(
            "/api/notifications/read-all",
            post(notification_handler::mark_all_read),
        )
        .route(
            "/api/notifications/preferences",
            get(notification_handler::get_preferences).put(notification_handler::update_preferences),
        )
        .route(
            "/api/notifications/{id}/read",
            post(notification_handler::mark_read),
        )
        .route(
            "/api/notifications/{id}",
            delete(notification_handler::delete_notification),
        )
        .with_state(service)
        .merge(feed)
}
