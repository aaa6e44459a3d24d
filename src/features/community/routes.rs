use crate::features::community::handlers::community_handler;
use crate::features::community::services::CommunityService;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn routes(service: Arc<CommunityService>) -> Router {
    Router::new()
        .route(
            "/api/community/posts",
            get(community_handler::list_posts).post(community_handler::create_post),
        )
        .route(
            "/api/community/posts/{id}",
            get(community_handler::get_post).delete(community_handler::delete_post),
        )
        .route(
            "/api/community/posts/{id}/comments",
            post(community_handler::add_comment),
        )
        .with_state(service)
}
