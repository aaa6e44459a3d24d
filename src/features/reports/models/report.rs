use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Characters used in reference numbers; no 0/O or 1/I lookalikes
const REFERENCE_CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const REFERENCE_SUFFIX_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FraudType {
    Phishing,
    UpiFraud,
    InvestmentScam,
    JobScam,
    LotteryScam,
    LoanApp,
    Impersonation,
    Sextortion,
    IdentityTheft,
    OnlineShopping,
    Other,
}

impl FraudType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FraudType::Phishing => "phishing",
            FraudType::UpiFraud => "upi_fraud",
            FraudType::InvestmentScam => "investment_scam",
            FraudType::JobScam => "job_scam",
            FraudType::LotteryScam => "lottery_scam",
            FraudType::LoanApp => "loan_app",
            FraudType::Impersonation => "impersonation",
            FraudType::Sextortion => "sextortion",
            FraudType::IdentityTheft => "identity_theft",
            FraudType::OnlineShopping => "online_shopping",
            FraudType::Other => "other",
        }
    }

    /// Fraud types whose harm is not measured by money lost
    fn is_personal_harm(&self) -> bool {
        matches!(
            self,
            FraudType::Sextortion | FraudType::Impersonation | FraudType::IdentityTheft
        )
    }
}

impl fmt::Display for FraudType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Report status; see [`ReportStatus::admin_transitions`] for the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    UnderReview,
    Resolved,
    Rejected,
    Withdrawn,
    Escalated,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::UnderReview => "under_review",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
            ReportStatus::Withdrawn => "withdrawn",
            ReportStatus::Escalated => "escalated",
        }
    }

    /// Statuses staff may move a report to from this one.
    pub fn admin_transitions(&self) -> &'static [ReportStatus] {
        match self {
            ReportStatus::Pending => &[
                ReportStatus::UnderReview,
                ReportStatus::Resolved,
                ReportStatus::Rejected,
            ],
            ReportStatus::UnderReview | ReportStatus::Escalated => {
                &[ReportStatus::Resolved, ReportStatus::Rejected]
            }
            ReportStatus::Resolved | ReportStatus::Rejected | ReportStatus::Withdrawn => &[],
        }
    }

    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        self.admin_transitions().contains(&next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReportStatus::Resolved | ReportStatus::Rejected | ReportStatus::Withdrawn
        )
    }

    /// The owner may withdraw a report nobody has concluded yet.
    pub fn can_withdraw(&self) -> bool {
        matches!(self, ReportStatus::Pending | ReportStatus::UnderReview)
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReportStatus::Pending),
            "under_review" => Ok(ReportStatus::UnderReview),
            "resolved" => Ok(ReportStatus::Resolved),
            "rejected" => Ok(ReportStatus::Rejected),
            "withdrawn" => Ok(ReportStatus::Withdrawn),
            "escalated" => Ok(ReportStatus::Escalated),
            other => Err(format!("Invalid report status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// Triage priority from the amount lost (INR) and the kind of fraud.
    pub fn derive(amount: Option<Decimal>, fraud_type: FraudType) -> Self {
        let amount = amount.unwrap_or(Decimal::ZERO);
        let by_amount = if amount >= Decimal::from(1_000_000) {
            Priority::Critical
        } else if amount >= Decimal::from(100_000) {
            Priority::High
        } else if amount >= Decimal::from(10_000) {
            Priority::Medium
        } else {
            Priority::Low
        };

        if fraud_type.is_personal_harm() {
            by_amount.max(Priority::High)
        } else {
            by_amount
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row of the `reports` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Report {
    pub id: Uuid,
    pub reference_number: String,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub fraud_type: FraudType,
    pub status: ReportStatus,
    pub priority: Priority,
    #[schema(value_type = Option<String>, example = "25000.00")]
    pub amount_involved: Option<Decimal>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub suspect_identifier: Option<String>,
    pub incident_date: Option<NaiveDate>,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `CHK-<year>-<8 random characters>`
pub fn generate_reference_number(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..REFERENCE_SUFFIX_LEN)
        .map(|_| REFERENCE_CHARSET[rng.gen_range(0..REFERENCE_CHARSET.len())] as char)
        .collect();
    format!("CHK-{}-{}", now.year(), suffix)
}
