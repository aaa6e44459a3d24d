//! Session activity tracking and idle sign-out.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/session` | Idle-expiry countdown |
//! | POST | `/api/session/activity` | Activity beacon |
//! | POST | `/api/session/cleanup` | Sign the session out |

pub mod dtos;
pub mod handlers;
pub mod routes;
pub mod services;
pub mod workers;

pub use services::SessionRegistry;
pub use workers::SessionSweeper;
