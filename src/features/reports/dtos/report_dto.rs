use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError};

use crate::features::reports::models::{FraudType, ReportEvidence, ReportStatus};
use crate::shared::types::{default_page, default_page_size, PaginationQuery};

fn validate_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() {
        return Err(ValidationError::new("amount_negative")
            .with_message("Amount involved cannot be negative".into()));
    }
    Ok(())
}

/// Request DTO for submitting a fraud report
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct SubmitReportDto {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 5000, message = "Description must be 1-5000 characters"))]
    pub description: String,

    pub fraud_type: FraudType,

    /// Money lost, in INR
    #[validate(custom(function = "validate_amount"))]
    #[schema(value_type = Option<String>, example = "25000")]
    pub amount_involved: Option<Decimal>,

    #[validate(length(max = 100, message = "City must not exceed 100 characters"))]
    pub city: Option<String>,

    #[validate(length(max = 100, message = "State must not exceed 100 characters"))]
    pub state: Option<String>,

    /// Phone number, UPI id, website or handle used by the fraudster
    #[validate(length(max = 200, message = "Suspect identifier must not exceed 200 characters"))]
    pub suspect_identifier: Option<String>,

    pub incident_date: Option<NaiveDate>,
}

impl SubmitReportDto {
    /// Minimal submission with only the required fields
    #[cfg(test)]
    pub fn new(title: &str, description: &str, fraud_type: FraudType) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            fraud_type,
            amount_involved: None,
            city: None,
            state: None,
            suspect_identifier: None,
            incident_date: None,
        }
    }
}

/// Query parameters for a citizen's own report list
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MyReportsParams {
    #[serde(default = "default_page")]
    #[param(minimum = 1)]
    pub page: i64,

    #[serde(default = "default_page_size")]
    #[param(minimum = 1, maximum = 100)]
    pub page_size: i64,

    pub status: Option<ReportStatus>,
}

impl MyReportsParams {
    pub fn pagination(&self) -> PaginationQuery {
        PaginationQuery::new(self.page, self.page_size)
    }
}

/// Multipart form for evidence uploads (documentation only)
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadEvidenceDto {
    /// The evidence file (image, PDF or text, max 10 MB)
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
}

/// Evidence row plus a fresh time-limited download URL
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EvidenceResponseDto {
    #[serde(flatten)]
    pub evidence: ReportEvidence,
    pub url: String,
}
