//! Fraud reports filed by citizens.
//!
//! Staff review lives in the admin feature; this module covers submission,
//! the owner's own view, withdrawal and evidence files.
//!
//! ## Endpoints
//!
//! | Method | Endpoint | Description |
//! |--------|----------|-------------|
//! | POST | `/api/reports` | Submit a report |
//! | GET | `/api/reports` | List own reports |
//! | GET | `/api/reports/{id}` | Get a report (owner or staff) |
//! | POST | `/api/reports/{id}/withdraw` | Withdraw an open report |
//! | POST | `/api/reports/{id}/evidence` | Upload evidence (multipart) |
//! | GET | `/api/reports/{id}/evidence` | List evidence with signed URLs |

pub mod dtos;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

pub use services::ReportService;
