//! Append-only log of staff actions. Read through the admin API.

pub mod models;
pub mod services;

pub use services::AuditService;
