//! In-app notifications.
//!
//! Rows are owned by their recipient; every read and mutation is scoped by
//! `user_id`. New rows reach connected clients through a realtime
//! subscription exposed as a Server-Sent Events feed.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/notifications` | List (paginated, `unread_only`) |
//! | GET | `/api/notifications/unread-count` | Unread counter |
//! | POST | `/api/notifications/{id}/read` | Mark one read |
//! | POST | `/api/notifications/read-all` | Mark all read |
//! | DELETE | `/api/notifications/{id}` | Delete one |
//! | GET/PUT | `/api/notifications/preferences` | Delivery toggles |
//! | GET | `/api/notifications/stream` | Live feed (SSE) |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod workers;

pub use services::NotificationService;
pub use workers::DemoNotificationGenerator;
