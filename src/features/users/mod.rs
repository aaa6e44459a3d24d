//! User profiles.
//!
//! Profiles mirror the hosted auth accounts; a row is created the first time a
//! user is seen. Staff actions on other accounts live in the admin feature.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | GET | `/api/users/me` | Get profile + permissions |
//! | PATCH | `/api/users/me` | Update name, phone, location |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::UserService;
