use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::features::reports::handlers::report_handler;
use crate::features::reports::services::ReportService;

/// Citizen-facing report routes (auth middleware applied by the caller)
pub fn routes(service: Arc<ReportService>) -> Router {
    Router::new()
        .route(
            "/api/reports",
            get(report_handler::list_my_reports).post(report_handler::submit_report),
        )
        .route("/api/reports/{id}", get(report_handler::get_report))
        .route(
            "/api/reports/{id}/withdraw",
            post(report_handler::withdraw_report),
        )
        .route(
            "/api/reports/{id}/evidence",
            get(report_handler::list_evidence).post(report_handler::upload_evidence),
        )
        .with_state(service)
}
