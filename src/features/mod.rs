pub mod admin;
pub mod audit;
pub mod auth;
pub mod community;
pub mod notifications;
pub mod reports;
pub mod session;
pub mod users;
