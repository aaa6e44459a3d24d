mod community_dto;

pub use community_dto::{CreateCommentDto, CreatePostDto, PostDetailDto, PostListParams};
