//! Request extractors shared by every feature.
//!
//! Body rejections and validation failures are rendered through [`AppError`]
//! so clients always receive the `ApiResponse` envelope.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, FromRequest, FromRequestParts, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use crate::core::error::AppError;
use crate::features::auth::model::AuthenticatedUser;

/// JSON body whose parse errors come back as `400` in the API envelope.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|rejection| AppError::BadRequest(rejection_message(rejection)))
    }
}

fn rejection_message(rejection: JsonRejection) -> String {
    match rejection {
        JsonRejection::JsonDataError(err) => format!("Invalid JSON data: {}", err),
        JsonRejection::JsonSyntaxError(err) => format!("Invalid JSON syntax: {}", err),
        JsonRejection::MissingJsonContentType(err) => {
            format!("Missing JSON content type: {}", err)
        }
        _ => "Failed to parse JSON body".to_string(),
    }
}

/// JSON body that must also pass its `validator` rules before the handler runs.
///
/// # Example
/// ```ignore
/// pub async fn submit(ValidatedJson(dto): ValidatedJson<SubmitReportDto>) { ... }
/// ```
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request<Body>, state: &S) -> Result<Self, Self::Rejection> {
        let AppJson(value) = AppJson::<T>::from_request(req, state).await?;
        validate_dto(&value)?;
        Ok(Self(value))
    }
}

/// Run a DTO's validation rules outside the HTTP extractors, e.g. for
/// console commands arriving over a WebSocket.
pub fn validate_dto<T: Validate>(dto: &T) -> Result<(), AppError> {
    dto.validate()
        .map_err(|e| AppError::Validation(e.to_string()))
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::CONTENT_TYPE;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Note {
        #[validate(length(min = 1, max = 5))]
        text: String,
    }

    fn json_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn validated_json_accepts_valid_bodies() {
        let ValidatedJson(note) = ValidatedJson::<Note>::from_request(json_request(r#"{"text":"hi"}"#), &())
            .await
            .unwrap();
        assert_eq!(note.text, "hi");
    }

    #[tokio::test]
    async fn validated_json_separates_parse_and_rule_failures() {
        let result =
            ValidatedJson::<Note>::from_request(json_request(r#"{"text":"too long"}"#), &()).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = ValidatedJson::<Note>::from_request(json_request("{not json"), &()).await;
        assert!(matches!(result, Err(AppError::BadRequest(m)) if m.starts_with("Invalid JSON syntax")));

        let missing_type = Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::from(r#"{"text":"hi"}"#))
            .unwrap();
        assert!(matches!(
            AppJson::<Note>::from_request(missing_type, &()).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn validate_dto_reports_rule_violations() {
        assert!(validate_dto(&Note { text: "ok".to_string() }).is_ok());
        assert!(matches!(
            validate_dto(&Note { text: String::new() }),
            Err(AppError::Validation(_))
        ));
    }
}
