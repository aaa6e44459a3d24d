use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::features::community::models::{CommunityComment, CommunityPost};
use crate::features::reports::models::FraudType;
use crate::shared::types::{default_page, default_page_size, PaginationQuery};

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreatePostDto {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 5000, message = "Body must be 1-5000 characters"))]
    pub body: String,

    pub fraud_type: Option<FraudType>,

    #[validate(length(max = 100, message = "City must not exceed 100 characters"))]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateCommentDto {
    #[validate(length(min = 1, max = 2000, message = "Comment must be 1-2000 characters"))]
    pub body: String,
}

/// Query parameters for the post feed
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PostListParams {
    #[serde(default = "default_page")]
    #[param(minimum = 1)]
    pub page: i64,

    #[serde(default = "default_page_size")]
    #[param(minimum = 1, maximum = 100)]
    pub page_size: i64,

    pub fraud_type: Option<FraudType>,

    /// Case-insensitive substring match
    pub city: Option<String>,
}

impl PostListParams {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery::new(self.page, self.page_size)
    }
}

impl Default for PostListParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
            fraud_type: None,
            city: None,
        }
    }
}

/// A post with its comments, oldest comment first
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PostDetailDto {
    #[serde(flatten)]
    pub post: CommunityPost,
    pub comments: Vec<CommunityComment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_post_is_rejected() {
        let dto = CreatePostDto {
            title: String::new(),
            body: "Got a call claiming to be from customs".to_string(),
            fraud_type: Some(FraudType::Impersonation),
            city: None,
        };
        assert!(dto.validate().is_err());

        let dto = CreateCommentDto {
            body: "x".repeat(2001),
        };
        assert!(dto.validate().is_err());
    }
}
