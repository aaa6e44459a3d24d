use crate::features::session::handlers::session_handler;
use crate::features::session::services::SessionRegistry;
use crate::features::users::UserService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct SessionState {
    pub registry: Arc<SessionRegistry>,
    pub users: Arc<UserService>,
}

pub fn routes(registry: Arc<SessionRegistry>, users: Arc<UserService>) -> Router {
    Router::new()
        .route("/api/session", get(session_handler::get_session))
        .route("/api/session/activity", post(session_handler::record_activity))
        .route("/api/session/cleanup", post(session_handler::cleanup_session))
        .with_state(SessionState { registry, users })
}
