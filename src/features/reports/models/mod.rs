mod evidence;
mod report;

pub use evidence::ReportEvidence;
pub use report::{generate_reference_number, FraudType, Priority, Report, ReportStatus};
