use crate::core::error::{AppError, Result};
use crate::features::auth::model::AuthenticatedUser;
use crate::features::session::dtos::SessionStatusDto;
use crate::features::session::routes::SessionState;
use crate::shared::types::ApiResponse;
use axum::{extract::State, http::StatusCode, Json};

#[utoipa::path(
    get,
    path = "/api/session",
    responses(
        (status = 200, description = "Session countdown", body = ApiResponse<SessionStatusDto>),
        (status = 401, description = "Session ended or expired")
    ),
    tag = "session",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_session(
    user: AuthenticatedUser,
    State(state): State<SessionState>,
) -> Result<Json<ApiResponse<SessionStatusDto>>> {
    let status = state.registry.status(&user).await?;
    Ok(Json(ApiResponse::success(Some(status), None, None)))
}

/// Activity beacon. The first beacon of a session counts as a login.
#[utoipa::path(
    post,
    path = "/api/session/activity",
    responses(
        (status = 200, description = "Activity recorded", body = ApiResponse<SessionStatusDto>),
        (status = 401, description = "Session ended or expired"),
        (status = 403, description = "Account suspended")
    ),
    tag = "session",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn record_activity(
    user: AuthenticatedUser,
    State(state): State<SessionState>,
) -> Result<Json<ApiResponse<SessionStatusDto>>> {
    let touch = state.registry.beacon(&user).await?;

    let profile = state.users.ensure_profile(&user).await?;
    if profile.is_suspended() {
        state.registry.sign_out(&user.session_id).await;
        return Err(AppError::Forbidden("Account suspended".to_string()));
    }

    // Activity bookkeeping never fails the beacon
    let recorded = if touch.first_beacon {
        state.users.record_login(user.user_id).await.map(|_| ())
    } else {
        state.users.record_activity(user.user_id).await
    };
    if let Err(e) = recorded {
        tracing::warn!("Failed to record activity for {}: {:?}", user.user_id, e);
    }

    let status = state.registry.status(&user).await?;
    Ok(Json(ApiResponse::success(Some(status), None, None)))
}

#[utoipa::path(
    post,
    path = "/api/session/cleanup",
    responses(
        (status = 204, description = "Session signed out"),
        (status = 401, description = "Unauthorized")
    ),
    tag = "session",
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn cleanup_session(
    user: AuthenticatedUser,
    State(state): State<SessionState>,
) -> StatusCode {
    if state.registry.sign_out(&user.session_id).await {
        tracing::info!("Session {} of user {} signed out", user.session_id, user.user_id);
    }
    StatusCode::NO_CONTENT
}
