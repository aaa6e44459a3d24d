mod post;

pub use post::{CommunityComment, CommunityPost};
