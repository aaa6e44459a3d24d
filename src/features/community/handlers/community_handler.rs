use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::Result;
use crate::core::extractor::ValidatedJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::community::dtos::{
    CreateCommentDto, CreatePostDto, PostDetailDto, PostListParams,
};
use crate::features::community::models::{CommunityComment, CommunityPost};
use crate::features::community::services::CommunityService;
use crate::shared::types::{ApiResponse, Meta};

/// Community feed, newest first
#[utoipa::path(
    get,
    path = "/api/community/posts",
    params(PostListParams),
    responses(
        (status = 200, description = "Posts", body = ApiResponse<Vec<CommunityPost>>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "community",
    security(("bearer_auth" = []))
)]
pub async fn list_posts(
    _user: AuthenticatedUser,
    State(service): State<Arc<CommunityService>>,
    Query(params): Query<PostListParams>,
) -> Result<Json<ApiResponse<Vec<CommunityPost>>>> {
    let (items, total) = service.list_posts(&params).await?;
    Ok(Json(ApiResponse::success(
        Some(items),
        None,
        Some(Meta { total }),
    )))
}

#[utoipa::path(
    post,
    path = "/api/community/posts",
    request_body = CreatePostDto,
    responses(
        (status = 201, description = "Post created", body = ApiResponse<CommunityPost>),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Account suspended")
    ),
    tag = "community",
    security(("bearer_auth" = []))
)]
pub async fn create_post(
    user: AuthenticatedUser,
    State(service): State<Arc<CommunityService>>,
    ValidatedJson(dto): ValidatedJson<CreatePostDto>,
) -> Result<(StatusCode, Json<ApiResponse<CommunityPost>>)> {
    let post = service.create_post(&user, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            Some(post),
            Some("Post published".to_string()),
            None,
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/api/community/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post with comments", body = ApiResponse<PostDetailDto>),
        (status = 404, description = "Post not found")
    ),
    tag = "community",
    security(("bearer_auth" = []))
)]
pub async fn get_post(
    _user: AuthenticatedUser,
    State(service): State<Arc<CommunityService>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<PostDetailDto>>> {
    let post = service.get_post(id).await?;
    Ok(Json(ApiResponse::success(Some(post), None, None)))
}

#[utoipa::path(
    post,
    path = "/api/community/posts/{id}/comments",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = CreateCommentDto,
    responses(
        (status = 201, description = "Comment added", body = ApiResponse<CommunityComment>),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Post not found")
    ),
    tag = "community",
    security(("bearer_auth" = []))
)]
pub async fn add_comment(
    user: AuthenticatedUser,
    State(service): State<Arc<CommunityService>>,
    Path(id): Path<Uuid>,
    ValidatedJson(dto): ValidatedJson<CreateCommentDto>,
) -> Result<(StatusCode, Json<ApiResponse<CommunityComment>>)> {
    let comment = service.add_comment(&user, id, dto).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(Some(comment), None, None)),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/community/posts/{id}",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 403, description = "Not the author or a moderator"),
        (status = 404, description = "Post not found")
    ),
    tag = "community",
    security(("bearer_auth" = []))
)]
pub async fn delete_post(
    user: AuthenticatedUser,
    State(service): State<Arc<CommunityService>>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode> {
    service.delete_post(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
