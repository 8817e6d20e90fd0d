//! Ledger entities: queries, quotations, trips and follow-ups.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::calculators::{LineItem, PricingTerms, QuoteSummary};

/// An inbound customer trip request. Read-only input to pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub id: Uuid,
    pub customer_name: String,
    pub destination: String,
    pub travel_start: Option<NaiveDate>,
    pub travel_end: Option<NaiveDate>,
    pub adults: i32,
    pub children: i32,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    /// Set once, by the conversion that booked this query.
    pub converted_quotation_id: Option<Uuid>,
}

impl Query {
    pub fn is_converted(&self) -> bool {
        self.converted_quotation_id.is_some()
    }
}

/// Quotation lifecycle. `Draft -> UsedForConversion` is the only transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    UsedForConversion,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuotationStatus::Draft => "draft",
            QuotationStatus::UsedForConversion => "used_for_conversion",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(QuotationStatus::Draft),
            "used_for_conversion" => Some(QuotationStatus::UsedForConversion),
            _ => None,
        }
    }
}

/// A priced proposal for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: Uuid,
    pub query_id: Uuid,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub status: QuotationStatus,
    pub terms: PricingTerms,
    pub line_items: Vec<LineItem>,
    pub summary: QuoteSummary,
}

impl Quotation {
    pub fn is_converted(&self) -> bool {
        self.status == QuotationStatus::UsedForConversion
    }
}

/// One scheduled payment toward a trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instalment {
    /// 1-based position in the plan.
    pub sequence: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

/// A booked trip, created exactly once per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub query_id: Uuid,
    pub quotation_id: Uuid,
    pub comments: Option<String>,
    pub instalments: Vec<Instalment>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FollowUpStatus {
    #[serde(rename = "Not Solved")]
    NotSolved,
    #[serde(rename = "Solved")]
    Solved,
}

impl FollowUpStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowUpStatus::NotSolved => "Not Solved",
            FollowUpStatus::Solved => "Solved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Not Solved" => Some(FollowUpStatus::NotSolved),
            "Solved" => Some(FollowUpStatus::Solved),
            _ => None,
        }
    }
}

/// A timestamped note on a query, optionally actionable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub id: Uuid,
    pub query_id: Uuid,
    pub message: String,
    pub status: FollowUpStatus,
    pub is_actionable: bool,
    pub due_date: Option<NaiveDate>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FollowUp {
    /// Non-actionable notes are born solved.
    pub fn new(
        query_id: Uuid,
        message: String,
        is_actionable: bool,
        due_date: Option<NaiveDate>,
        created_by: String,
        now: DateTime<Utc>,
    ) -> Self {
        let status = if is_actionable {
            FollowUpStatus::NotSolved
        } else {
            FollowUpStatus::Solved
        };

        Self {
            id: Uuid::new_v4(),
            query_id,
            message,
            status,
            is_actionable,
            due_date,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follow_up_initial_status() {
        let now = Utc::now();
        let note = FollowUp::new(
            Uuid::new_v4(),
            "Shared hotel options".to_string(),
            false,
            None,
            "asha".to_string(),
            now,
        );
        assert_eq!(note.status, FollowUpStatus::Solved);

        let task = FollowUp::new(
            Uuid::new_v4(),
            "Call back about dates".to_string(),
            true,
            NaiveDate::from_ymd_opt(2030, 1, 1),
            "asha".to_string(),
            now,
        );
        assert_eq!(task.status, FollowUpStatus::NotSolved);
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in [FollowUpStatus::NotSolved, FollowUpStatus::Solved] {
            assert_eq!(FollowUpStatus::parse(status.as_str()), Some(status));
        }
        for status in [QuotationStatus::Draft, QuotationStatus::UsedForConversion] {
            assert_eq!(QuotationStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(
            serde_json::to_string(&FollowUpStatus::NotSolved).unwrap(),
            r#""Not Solved""#
        );
    }
}
