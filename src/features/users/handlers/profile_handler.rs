use crate::core::error::Result;
use crate::core::extractor::ValidatedJson;
use crate::features::auth::model::AuthenticatedUser;
use crate::features::users::dtos::{MeResponseDto, UpdateProfileDto};
use crate::features::users::services::UserService;
use crate::shared::types::ApiResponse;
use axum::{extract::State, Json};
use std::sync::Arc;

#[utoipa::path(
    get,
    path = "/api/users/me",
    responses(
        (status = 200, description = "Profile retrieved successfully", body = ApiResponse<MeResponseDto>),
        (status = 401, description = "Unauthorized")
    ),
    tag = "users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_profile(
    user: AuthenticatedUser,
    State(service): State<Arc<UserService>>,
) -> Result<Json<ApiResponse<MeResponseDto>>> {
    let profile = service.ensure_profile(&user).await?;
    Ok(Json(ApiResponse::success(Some(profile.into()), None, None)))
}

#[utoipa::path(
    patch,
    path = "/api/users/me",
    request_body = UpdateProfileDto,
    responses(
        (status = 200, description = "Profile updated successfully", body = ApiResponse<MeResponseDto>),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "users",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_profile(
    user: AuthenticatedUser,
    State(service): State<Arc<UserService>>,
    ValidatedJson(dto): ValidatedJson<UpdateProfileDto>,
) -> Result<Json<ApiResponse<MeResponseDto>>> {
    service.ensure_profile(&user).await?;
    let profile = service.update_profile(user.user_id, dto).await?;
    Ok(Json(ApiResponse::success(
        Some(profile.into()),
        Some("Profile updated successfully".to_string()),
        None,
    )))
}
