use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::audit::models::{AuditAction, AuditEntry};
use crate::features::audit::AuditService;
use crate::features::auth::model::{AuthenticatedUser, Permission};
use crate::features::community::dtos::{
    CreateCommentDto, CreatePostDto, PostDetailDto, PostListParams,
};
use crate::features::community::models::{CommunityComment, CommunityPost};
use crate::features::users::UserService;
use crate::modules::backend::{decode_row, select_one, Backend, Filter, SelectQuery};
use crate::shared::constants::{TABLE_COMMUNITY_COMMENTS, TABLE_COMMUNITY_POSTS};
use crate::shared::validation::escape_like;

pub struct CommunityService {
    backend: Arc<dyn Backend>,
    users: Arc<UserService>,
    audit: Arc<AuditService>,
}

impl CommunityService {
    pub fn new(backend: Arc<dyn Backend>, users: Arc<UserService>, audit: Arc<AuditService>) -> Self {
        Self {
            backend,
            users,
            audit,
        }
    }

    /// Check the author may post at all: permission plus an active account.
    async fn ensure_can_post(&self, user: &AuthenticatedUser) -> Result<()> {
        if !user.has_permission(Permission::PostCommunity) {
            return Err(AppError::Forbidden(
                "Missing permission: post_community".to_string(),
            ));
        }
        let profile = self.users.ensure_profile(user).await?;
        if profile.is_suspended() {
            return Err(AppError::Forbidden(
                "Suspended accounts cannot post".to_string(),
            ));
        }
        Ok(())
    }

    async fn find_post(&self, id: Uuid) -> Result<CommunityPost> {
        let row = select_one(
            self.backend.as_ref(),
            SelectQuery::from(TABLE_COMMUNITY_POSTS).eq("id", id),
        )
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", id)))?;
        decode_row(row)
    }

    pub async fn list_posts(&self, params: &PostListParams) -> Result<(Vec<CommunityPost>, i64)> {
        let (from, to) = params.pagination().range();
        let mut query = SelectQuery::from(TABLE_COMMUNITY_POSTS)
            .order("created_at", false)
            .range(from, to)
            .with_count();
        if let Some(fraud_type) = params.fraud_type {
            query = query.eq("fraud_type", fraud_type.as_str());
        }
        if let Some(city) = params.city.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            query = query.ilike("city", format!("%{}%", escape_like(city)));
        }

        let result = self.backend.select(query).await?;
        let total = result.count.unwrap_or(0);
        Ok((result.rows()?, total))
    }

    pub async fn create_post(
        &self,
        user: &AuthenticatedUser,
        dto: CreatePostDto,
    ) -> Result<CommunityPost> {
        self.ensure_can_post(user).await?;

        let row = json!({
            "author_id": user.user_id,
            "title": dto.title.trim(),
            "body": dto.body.trim(),
            "fraud_type": dto.fraud_type.map(|t| t.as_str()),
            "city": dto.city.as_deref().map(str::trim),
            "comment_count": 0,
        });
        let post: CommunityPost = decode_row(self.backend.insert(TABLE_COMMUNITY_POSTS, row).await?)?;

        tracing::info!("Community post {} created by {}", post.id, user.user_id);
        Ok(post)
    }

    pub async fn get_post(&self, id: Uuid) -> Result<PostDetailDto> {
        let post = self.find_post(id).await?;
        let comments = self
            .backend
            .select(
                SelectQuery::from(TABLE_COMMUNITY_COMMENTS)
                    .eq("post_id", id)
                    .order("created_at", true),
            )
            .await?
            .rows()?;
        Ok(PostDetailDto { post, comments })
    }

    pub async fn add_comment(
        &self,
        user: &AuthenticatedUser,
        post_id: Uuid,
        dto: CreateCommentDto,
    ) -> Result<CommunityComment> {
        self.ensure_can_post(user).await?;
        let post = self.find_post(post_id).await?;

        let row = json!({
            "post_id": post_id,
            "author_id": user.user_id,
            "body": dto.body.trim(),
        });
        let comment: CommunityComment =
            decode_row(self.backend.insert(TABLE_COMMUNITY_COMMENTS, row).await?)?;

        // Read-modify-write; concurrent comments may undercount
        self.backend
            .update(
                TABLE_COMMUNITY_POSTS,
                vec![Filter::eq("id", post_id)],
                json!({
                    "comment_count": post.comment_count + 1,
                    "updated_at": Utc::now(),
                }),
            )
            .await?;

        Ok(comment)
    }

    /// Remove a post and its comments. Authors may delete their own posts;
    /// moderators may delete any, which is audited.
    pub async fn delete_post(&self, user: &AuthenticatedUser, id: Uuid) -> Result<()> {
        let post = self.find_post(id).await?;
        let own = post.author_id == user.user_id;
        if !own && !user.has_permission(Permission::ModerateCommunity) {
            return Err(AppError::Forbidden(
                "Only the author or a moderator can delete this post".to_string(),
            ));
        }

        self.backend
            .delete(TABLE_COMMUNITY_COMMENTS, vec![Filter::eq("post_id", id)])
            .await?;
        self.backend
            .delete(TABLE_COMMUNITY_POSTS, vec![Filter::eq("id", id)])
            .await?;

        if !own {
            self.audit
                .record(
                    AuditEntry::new(user.user_id, AuditAction::CommunityPostRemoved, "community_post")
                        .target(id)
                        .details(json!({
                            "author_id": post.author_id,
                            "title": post.title,
                        })),
                )
                .await;
        }

        tracing::info!("Community post {} deleted by {}", id, user.user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::audit::models::AuditLogParams;
    use crate::features::auth::model::Role;
    use crate::features::reports::models::FraudType;
    use crate::shared::test_helpers::{auth_user, TestContext};

    fn post(title: &str, city: Option<&str>) -> CreatePostDto {
        CreatePostDto {
            title: title.to_string(),
            body: "Caller asked for an OTP to 'unblock' my card".to_string(),
            fraud_type: Some(FraudType::Phishing),
            city: city.map(str::to_string),
        }
    }

    fn comment(body: &str) -> CreateCommentDto {
        CreateCommentDto {
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn comments_are_counted_and_ordered() {
        let ctx = TestContext::new();
        let author = auth_user(Role::Citizen);
        let reader = auth_user(Role::Citizen);
        let created = ctx.community.create_post(&author, post("OTP scam", None)).await.unwrap();
        assert_eq!(created.comment_count, 0);

        ctx.community
            .add_comment(&reader, created.id, comment("Same here"))
            .await
            .unwrap();
        ctx.community
            .add_comment(&author, created.id, comment("Reported it"))
            .await
            .unwrap();

        let detail = ctx.community.get_post(created.id).await.unwrap();
        assert_eq!(detail.post.comment_count, 2);
        assert_eq!(detail.comments.len(), 2);
        assert_eq!(detail.comments[0].body, "Same here");
    }

    #[tokio::test]
    async fn commenting_on_missing_post_is_not_found() {
        let ctx = TestContext::new();
        let result = ctx
            .community
            .add_comment(&auth_user(Role::Citizen), Uuid::new_v4(), comment("hello"))
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn list_filters_by_city() {
        let ctx = TestContext::new();
        let author = auth_user(Role::Citizen);
        ctx.community.create_post(&author, post("A", Some("Pune"))).await.unwrap();
        ctx.community.create_post(&author, post("B", Some("Mumbai"))).await.unwrap();

        let params = PostListParams {
            city: Some("pun".to_string()),
            ..Default::default()
        };
        let (posts, total) = ctx.community.list_posts(&params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(posts[0].title, "A");
    }

    #[tokio::test]
    async fn only_author_or_moderator_can_delete() {
        let ctx = TestContext::new();
        let author = auth_user(Role::Citizen);
        let stranger = auth_user(Role::Citizen);
        let moderator = auth_user(Role::Moderator);

        let first = ctx.community.create_post(&author, post("A", None)).await.unwrap();
        let second = ctx.community.create_post(&author, post("B", None)).await.unwrap();

        assert!(matches!(
            ctx.community.delete_post(&stranger, first.id).await,
            Err(AppError::Forbidden(_))
        ));

        // Own deletion is not audited
        ctx.community.delete_post(&author, first.id).await.unwrap();
        ctx.community.delete_post(&moderator, second.id).await.unwrap();
        assert!(ctx.community.get_post(second.id).await.is_err());

        let (logs, total) = ctx.audit.list(&AuditLogParams::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(logs[0].action, AuditAction::CommunityPostRemoved);
        assert_eq!(logs[0].target_id, Some(second.id));
    }

    #[tokio::test]
    async fn suspended_users_cannot_post() {
        let ctx = TestContext::new();
        let admin = auth_user(Role::Admin);
        let citizen = auth_user(Role::Citizen);
        ctx.users.ensure_profile(&admin).await.unwrap();
        ctx.users.ensure_profile(&citizen).await.unwrap();
        ctx.users.suspend_user(&admin, citizen.user_id, None).await.unwrap();

        assert!(matches!(
            ctx.community.create_post(&citizen, post("A", None)).await,
            Err(AppError::Forbidden(_))
        ));
    }
}
