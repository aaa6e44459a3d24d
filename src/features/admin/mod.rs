//! Staff console: report review, user management, audit trail and the
//! realtime-synchronized admin store.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/admin/reports` | Filtered report queue |
//! | GET | `/api/admin/reports/{id}` | Any report |
//! | PATCH | `/api/admin/reports/{id}/status` | Review workflow transition |
//! | GET | `/api/admin/stats` | Dashboard counters |
//! | GET | `/api/admin/health` | Database and storage probes |
//! | GET | `/api/admin/users` | Filtered user list |
//! | POST | `/api/admin/users/{id}/suspend` | Suspend an account |
//! | POST | `/api/admin/users/{id}/activate` | Reactivate an account |
//! | GET | `/api/admin/audit-logs` | Staff action history |
//! | POST | `/api/admin/announcements` | Broadcast to all active users |
//! | GET | `/api/admin/live` | Console WebSocket (store snapshots) |

pub mod dtos;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod sync;

pub use services::AdminService;
pub use sync::AdminStore;
