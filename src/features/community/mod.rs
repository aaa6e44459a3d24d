//! Community discussion threads about scams seen in the wild.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/community/posts` | Feed (filter by fraud type, city) |
//! | POST | `/api/community/posts` | Publish a post |
//! | GET | `/api/community/posts/{id}` | Post with comments |
//! | POST | `/api/community/posts/{id}/comments` | Comment on a post |
//! | DELETE | `/api/community/posts/{id}` | Delete (author or moderator) |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::CommunityService;
