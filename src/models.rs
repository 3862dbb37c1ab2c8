use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// ============ Domain Enums ============

/// Lifecycle status of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lead_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    /// Freshly created, not yet distributed.
    New,
    /// Distribution to lenders in progress.
    Processing,
    /// All dispatches for the latest round have resolved.
    Completed,
    /// Unrecoverable processing failure.
    Error,
}

/// Employment category reported by the applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "employment_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmploymentType {
    Salaried,
    SelfEmployed,
    Business,
    Student,
    Unemployed,
}

impl EmploymentType {
    /// All variants, in declaration order. Used for validation messages.
    pub const ALL: [EmploymentType; 5] = [
        EmploymentType::Salaried,
        EmploymentType::SelfEmployed,
        EmploymentType::Business,
        EmploymentType::Student,
        EmploymentType::Unemployed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::Salaried => "salaried",
            EmploymentType::SelfEmployed => "self_employed",
            EmploymentType::Business => "business",
            EmploymentType::Student => "student",
            EmploymentType::Unemployed => "unemployed",
        }
    }

    pub fn parse(value: &str) -> Option<EmploymentType> {
        EmploymentType::ALL.into_iter().find(|t| t.as_str() == value)
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical classification of one lender's answer to one send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "lender_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LenderOutcome {
    /// Lender accepted the application.
    Accepted,
    /// Lender declined the application.
    Rejected,
    /// Lender already has this identity; retried after the cooldown.
    Duplicate,
    /// Transport or protocol failure; the call produced no usable answer.
    Error,
}

impl fmt::Display for LenderOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LenderOutcome::Accepted => "Accepted",
            LenderOutcome::Rejected => "Rejected",
            LenderOutcome::Duplicate => "Duplicate",
            LenderOutcome::Error => "Error",
        };
        f.write_str(s)
    }
}

/// Audit verdict for one (lead, lender) routing evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "routing_decision", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoutingDecision {
    /// The lead was dispatched to the lender.
    Sent,
    /// The lender's eligibility rules rejected the lead before dispatch.
    SkippedIneligible,
    /// Dispatch was attempted but failed.
    Error,
}

/// The closed set of lending partners, in declaration (routing) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LenderName {
    KarroFin,
    PocketCredit,
    Zype,
}

impl LenderName {
    /// All partners, in stable declaration order. Drives enabled-lender
    /// iteration so dispatch order never depends on map iteration.
    pub const ALL: [LenderName; 3] = [
        LenderName::KarroFin,
        LenderName::PocketCredit,
        LenderName::Zype,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LenderName::KarroFin => "KarroFin",
            LenderName::PocketCredit => "PocketCredit",
            LenderName::Zype => "Zype",
        }
    }

    pub fn parse(value: &str) -> Option<LenderName> {
        LenderName::ALL.into_iter().find(|n| n.as_str() == value)
    }
}

impl fmt::Display for LenderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Database Models ============

/// One identity-deduplicated loan application.
///
/// Identity is the (phone, email) pair; both columns carry unique indexes, so
/// re-submissions under either key append a `LeadSource` instead of creating
/// a second row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    /// Unique identifier for the lead.
    pub id: Uuid,
    /// 10-digit mobile number (identity key).
    pub phone: String,
    /// Email address (identity key).
    pub email: String,
    /// First name of the applicant.
    pub first_name: String,
    /// Last name of the applicant.
    pub last_name: String,
    /// Date of birth.
    pub date_of_birth: NaiveDate,
    /// Monthly income in rupees.
    pub monthly_income: f64,
    /// Employment category.
    pub employment_type: EmploymentType,
    /// PAN tax identifier (ABCDE1234F format).
    pub pan_number: String,
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// State code (e.g. "MH", "DL").
    pub state: String,
    /// 6-digit postal code.
    pub pincode: String,
    /// Current lifecycle status.
    pub status: LeadStatus,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Timestamp of last update.
    pub updated_at: DateTime<Utc>,
}

/// One intake channel that reported a lead. Append-only.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadSource {
    /// Unique identifier for the source record.
    pub id: Uuid,
    /// Owning lead.
    pub lead_id: Uuid,
    /// Free-text channel name (e.g. "website", "partner-xyz").
    pub source_name: String,
    /// When this channel reported the lead.
    pub received_at: DateTime<Utc>,
    /// The raw payload the channel submitted, kept for audit/replay.
    pub raw_data: Value,
}

/// One send attempt to one lender. Rows are never mutated; a retry appends a
/// new row so the full response history survives.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LenderResponse {
    /// Unique identifier for the response record.
    pub id: Uuid,
    /// Owning lead.
    pub lead_id: Uuid,
    /// Static lender identifier from config (e.g. "karrofin-001").
    pub lender_id: String,
    /// Lender display name.
    pub lender_name: String,
    /// Classified outcome of the attempt.
    pub status: LenderOutcome,
    /// Opaque lender response payload.
    pub response_data: Option<Value>,
    /// When the request was issued.
    pub sent_at: DateTime<Utc>,
    /// When the lender answered (or the failure was observed).
    pub responded_at: Option<DateTime<Utc>>,
    /// Earliest instant a Duplicate outcome may be retried. Non-null exactly
    /// when `status` is Duplicate.
    pub retry_after: Option<DateTime<Utc>>,
}

/// Immutable audit record of one routing evaluation for one (lead, lender)
/// pair. `lead_data` snapshots the eligibility-relevant fields at decision
/// time, since the lead itself may change later.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingLog {
    /// Unique identifier for the audit record.
    pub id: Uuid,
    /// Lead this decision was made for (weak reference).
    pub lead_id: Uuid,
    /// Lender the decision concerns.
    pub lender_name: String,
    /// The verdict.
    pub decision: RoutingDecision,
    /// Human-readable reason for the verdict.
    pub reason: Option<String>,
    /// Snapshot of income, age, employment type and state at decision time.
    pub lead_data: Value,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
}

// ============ New-Row Payloads ============

/// Validated intake payload, ready for persistence.
#[derive(Debug, Clone)]
pub struct NewLead {
    pub phone: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub monthly_income: f64,
    pub employment_type: EmploymentType,
    pub pan_number: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    /// Intake channel that submitted this payload; becomes the first
    /// `LeadSource`.
    pub source: String,
}

/// Insert payload for one lender response row.
#[derive(Debug, Clone)]
pub struct NewLenderResponse {
    pub lead_id: Uuid,
    pub lender_id: String,
    pub lender_name: String,
    pub status: LenderOutcome,
    pub response_data: Option<Value>,
    pub sent_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub retry_after: Option<DateTime<Utc>>,
}

/// Insert payload for one routing audit row.
#[derive(Debug, Clone)]
pub struct NewRoutingLog {
    pub lead_id: Uuid,
    pub lender_name: String,
    pub decision: RoutingDecision,
    pub reason: Option<String>,
    pub lead_data: Value,
}

// ============ Eligibility Rules ============

/// Static per-lender admission criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilityRules {
    /// Minimum monthly income, inclusive.
    pub min_income: f64,
    /// Maximum monthly income, inclusive, when the lender caps it.
    pub max_income: Option<f64>,
    /// Minimum age in whole years, inclusive.
    pub min_age: i32,
    /// Maximum age in whole years, inclusive.
    pub max_age: i32,
    /// Employment categories the lender accepts.
    pub allowed_employment_types: Vec<EmploymentType>,
    /// When set, only these state codes are admitted.
    pub allowed_states: Option<Vec<String>>,
    /// When set, these state codes are always rejected.
    pub excluded_states: Option<Vec<String>>,
}

// ============ API Request Models ============

/// Intake payload for `POST /api/v1/leads`.
///
/// Everything arrives as loosely-typed strings/numbers and is checked by the
/// validation layer so that all field failures can be reported together.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    /// 10-digit mobile number.
    pub phone: String,
    /// Email address.
    pub email: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// ISO date (YYYY-MM-DD).
    pub date_of_birth: String,
    /// Monthly income in rupees.
    pub monthly_income: f64,
    /// One of salaried/self_employed/business/student/unemployed.
    pub employment_type: String,
    /// PAN tax identifier.
    pub pan_number: String,
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// State code.
    pub state: String,
    /// 6-digit postal code.
    pub pincode: String,
    /// Free-text intake channel name.
    pub source: String,
}
