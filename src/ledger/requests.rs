//! Request DTOs for ledger API endpoints.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use super::calculators::LineItem;

/// Request to open a new customer query
#[derive(Debug, Deserialize)]
pub struct CreateQueryRequest {
    pub customer_name: String,
    pub destination: String,
    #[serde(default)]
    pub travel_start: Option<NaiveDate>,
    #[serde(default)]
    pub travel_end: Option<NaiveDate>,
    #[serde(default = "default_adults")]
    pub adults: i32,
    #[serde(default)]
    pub children: i32,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_adults() -> i32 {
    1
}

/// Optional per-quotation overrides of the configured pricing terms
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct TermsOverride {
    #[serde(default)]
    pub markup_percent: Option<Decimal>,
    #[serde(default)]
    pub gst_percent: Option<Decimal>,
    #[serde(default)]
    pub rounding_unit: Option<Decimal>,
}

/// Request to price line items without saving anything
#[derive(Debug, Deserialize)]
pub struct PreviewSummaryRequest {
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub markup_percent: Option<Decimal>,
    #[serde(default)]
    pub gst_percent: Option<Decimal>,
    #[serde(default)]
    pub rounding_unit: Option<Decimal>,
}

impl PreviewSummaryRequest {
    pub fn terms(&self) -> TermsOverride {
        TermsOverride {
            markup_percent: self.markup_percent,
            gst_percent: self.gst_percent,
            rounding_unit: self.rounding_unit,
        }
    }
}

/// Request to create a quotation for a query
#[derive(Debug, Deserialize)]
pub struct CreateQuotationRequest {
    pub query_id: Uuid,
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub markup_percent: Option<Decimal>,
    #[serde(default)]
    pub gst_percent: Option<Decimal>,
    #[serde(default)]
    pub rounding_unit: Option<Decimal>,
}

impl CreateQuotationRequest {
    pub fn terms(&self) -> TermsOverride {
        TermsOverride {
            markup_percent: self.markup_percent,
            gst_percent: self.gst_percent,
            rounding_unit: self.rounding_unit,
        }
    }
}

/// One instalment as sent by the client.
///
/// Both fields are optional on the wire so that a missing value is reported
/// as an invalid instalment rather than a malformed body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstalmentRequest {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub due_date: Option<String>,
}

/// Request to convert a quotation into a trip
#[derive(Debug, Clone, Deserialize)]
pub struct ConvertRequest {
    pub quote_id: Uuid,
    #[serde(default)]
    pub instalments: Vec<InstalmentRequest>,
    #[serde(default)]
    pub comments: Option<String>,
    /// The "I have verified" confirmation from the operator.
    #[serde(default)]
    pub verified: bool,
}

/// Request to add a follow-up note
#[derive(Debug, Deserialize)]
pub struct AddFollowUpRequest {
    pub message: String,
    #[serde(default)]
    pub is_actionable: bool,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
}

/// Query string for instalment plan suggestions
#[derive(Debug, Deserialize)]
pub struct InstalmentPlanParams {
    pub parts: u32,
    pub first_due: NaiveDate,
}
