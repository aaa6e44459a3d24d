//! Access-token validation and role guards.
//!
//! Sign-in, sign-out and token issuance belong to the hosted auth provider;
//! this service only validates the HS256 access tokens it mints.

mod validator;

pub mod guards;
pub mod model;

pub use validator::JwtValidator;
