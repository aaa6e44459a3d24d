use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::shared::types::ApiResponse;

/// SQLSTATE raised by Postgres when a row-level security policy refers back to its own table.
pub const POLICY_RECURSION_SQLSTATE: &str = "42P17";

/// SQL an operator can run to replace recursive `profiles` policies with a role lookup
/// through a `SECURITY DEFINER` function.
pub const POLICY_RECURSION_REMEDIATION: &str = "CREATE OR REPLACE FUNCTION public.current_app_role() \
RETURNS text LANGUAGE sql SECURITY DEFINER STABLE AS $$ SELECT role FROM public.profiles WHERE id = auth.uid() $$; \
DROP POLICY IF EXISTS \"admins read profiles\" ON public.profiles; \
CREATE POLICY \"admins read profiles\" ON public.profiles FOR SELECT \
USING (id = auth.uid() OR public.current_app_role() IN ('moderator', 'admin', 'super_admin'));";

#[derive(Debug, Error)]
#[allow(dead_code)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Access policy misconfigured: {0}")]
    PolicyMisconfigured(String),
}

impl AppError {
    /// Classify a database error by its SQLSTATE instead of its message text.
    pub fn from_database(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|db| db.code().map(|c| c.into_owned()));

        match code.as_deref() {
            Some(POLICY_RECURSION_SQLSTATE) => {
                let message = err
                    .as_database_error()
                    .map(|db| db.message().to_string())
                    .unwrap_or_default();
                AppError::PolicyMisconfigured(message)
            }
            // unique_violation
            Some("23505") => AppError::Conflict("Record already exists".to_string()),
            // foreign_key_violation
            Some("23503") => AppError::BadRequest("Referenced record does not exist".to_string()),
            // check_violation
            Some("23514") => AppError::Validation("Value rejected by a check constraint".to_string()),
            // insufficient_privilege (row-level security denial)
            Some("42501") => AppError::Forbidden("Access denied by row-level policy".to_string()),
            _ => AppError::Database(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error occurred".to_string(),
                    None,
                )
            }
            AppError::NotFound(ref msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Validation(ref msg) => (
                StatusCode::BAD_REQUEST,
                msg.clone(),
                Some(vec![msg.clone()]),
            ),
            AppError::BadRequest(ref msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                    None,
                )
            }
            AppError::Auth(ref msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            AppError::Unauthorized(ref msg) => (StatusCode::UNAUTHORIZED, msg.clone(), None),
            AppError::Forbidden(ref msg) => (StatusCode::FORBIDDEN, msg.clone(), None),
            AppError::Conflict(ref msg) => (StatusCode::CONFLICT, msg.clone(), None),
            AppError::ExternalServiceError(ref msg) => {
                tracing::error!("External service error: {}", msg);
                (StatusCode::BAD_GATEWAY, msg.clone(), None)
            }
            AppError::PolicyMisconfigured(ref msg) => {
                tracing::error!("Row-level policy recursion detected: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database access policy is misconfigured".to_string(),
                    Some(vec![POLICY_RECURSION_REMEDIATION.to_string()]),
                )
            }
        };

        let body = Json(ApiResponse::<()>::error(Some(message), errors));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn policy_error_carries_remediation_sql() {
        let response =
            AppError::PolicyMisconfigured("infinite recursion".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["errors"][0]
            .as_str()
            .unwrap()
            .contains("SECURITY DEFINER"));
    }

    #[test]
    fn non_database_errors_stay_generic() {
        let err = AppError::from_database(sqlx::Error::RowNotFound);
        assert!(matches!(err, AppError::Database(_)));
    }
}
