mod admin_dtos;

pub use admin_dtos::{
    AdminStats, ComponentHealth, HealthStatus, ReportFilters, SystemHealth, UpdateReportStatusDto,
};
