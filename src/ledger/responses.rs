//! Response DTOs for ledger API endpoints.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::calculators::{profit_of, LineItem, PricingTerms, Profit, QuoteSummary};
use super::calendar::{due_label, time_ago};
use super::models::{FollowUp, FollowUpStatus, Instalment, Query, Quotation, QuotationStatus, Trip};
use super::services::Conversion;

/// Response for a customer query
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    #[serde(flatten)]
    pub query: Query,
    pub is_converted: bool,
}

impl From<Query> for QueryResponse {
    fn from(query: Query) -> Self {
        Self {
            is_converted: query.is_converted(),
            query,
        }
    }
}

/// Response for a summary preview
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub summary: QuoteSummary,
    pub profit: Profit,
}

impl From<QuoteSummary> for SummaryResponse {
    fn from(summary: QuoteSummary) -> Self {
        Self {
            profit: profit_of(&summary),
            summary,
        }
    }
}

/// One presentation for both draft and converted quotations.
#[derive(Debug, Serialize)]
pub struct QuotationResponse {
    pub id: Uuid,
    pub query_id: Uuid,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub created_ago: String,
    pub status: QuotationStatus,
    pub is_converted: bool,
    /// True for the newest quotation of its query.
    pub is_latest: bool,
    pub terms: PricingTerms,
    pub line_items: Vec<LineItem>,
    pub summary: QuoteSummary,
    pub profit: Profit,
}

impl QuotationResponse {
    pub fn new(quotation: Quotation, is_latest: bool, now: DateTime<Utc>) -> Self {
        Self {
            created_ago: time_ago(quotation.created_at, now),
            is_converted: quotation.is_converted(),
            profit: profit_of(&quotation.summary),
            id: quotation.id,
            query_id: quotation.query_id,
            created_by: quotation.created_by,
            created_at: quotation.created_at,
            status: quotation.status,
            is_latest,
            terms: quotation.terms,
            line_items: quotation.line_items,
            summary: quotation.summary,
        }
    }

    /// Newest-first list; the first entry is the latest.
    pub fn list(quotations: Vec<Quotation>, now: DateTime<Utc>) -> Vec<Self> {
        quotations
            .into_iter()
            .enumerate()
            .map(|(position, q)| Self::new(q, position == 0, now))
            .collect()
    }
}

/// Response for an instalment
#[derive(Debug, Serialize)]
pub struct InstalmentResponse {
    pub sequence: i32,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub due_text: String,
}

impl InstalmentResponse {
    pub fn new(instalment: Instalment, today: NaiveDate) -> Self {
        Self {
            due_text: due_label(instalment.due_date, today),
            sequence: instalment.sequence,
            amount: instalment.amount,
            due_date: instalment.due_date,
        }
    }
}

/// Response for a booked trip
#[derive(Debug, Serialize)]
pub struct TripResponse {
    pub id: Uuid,
    pub query_id: Uuid,
    pub quotation_id: Uuid,
    pub comments: Option<String>,
    pub instalments: Vec<InstalmentResponse>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TripResponse {
    pub fn new(trip: Trip, now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        Self {
            id: trip.id,
            query_id: trip.query_id,
            quotation_id: trip.quotation_id,
            comments: trip.comments,
            instalments: trip
                .instalments
                .into_iter()
                .map(|i| InstalmentResponse::new(i, today))
                .collect(),
            created_by: trip.created_by,
            created_at: trip.created_at,
        }
    }
}

/// Response for a successful conversion
#[derive(Debug, Serialize)]
pub struct ConversionResponse {
    pub trip: TripResponse,
    pub quotation: QuotationResponse,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_selling_price: Decimal,
    pub warnings: Vec<String>,
}

impl ConversionResponse {
    pub fn new(conversion: Conversion, is_latest: bool, now: DateTime<Utc>) -> Self {
        Self {
            total_selling_price: conversion.quotation.summary.total_selling_price,
            trip: TripResponse::new(conversion.trip, now),
            quotation: QuotationResponse::new(conversion.quotation, is_latest, now),
            warnings: conversion.warnings,
        }
    }
}

/// Response for a suggested instalment plan
#[derive(Debug, Serialize)]
pub struct InstalmentPlanResponse {
    pub quote_id: Uuid,
    #[serde(with = "rust_decimal::serde::str")]
    pub total_selling_price: Decimal,
    pub instalments: Vec<InstalmentResponse>,
}

/// Response for a follow-up
#[derive(Debug, Serialize)]
pub struct FollowUpResponse {
    pub id: Uuid,
    pub query_id: Uuid,
    pub message: String,
    pub status: FollowUpStatus,
    pub is_actionable: bool,
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_text: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub created_ago: String,
    pub updated_at: DateTime<Utc>,
}

impl FollowUpResponse {
    pub fn new(follow_up: FollowUp, now: DateTime<Utc>) -> Self {
        // Solved follow-ups have nothing left to be due.
        let due_text = match (follow_up.status, follow_up.due_date) {
            (FollowUpStatus::NotSolved, Some(due)) => Some(due_label(due, now.date_naive())),
            _ => None,
        };

        Self {
            created_ago: time_ago(follow_up.created_at, now),
            due_text,
            id: follow_up.id,
            query_id: follow_up.query_id,
            message: follow_up.message,
            status: follow_up.status,
            is_actionable: follow_up.is_actionable,
            due_date: follow_up.due_date,
            created_by: follow_up.created_by,
            created_at: follow_up.created_at,
            updated_at: follow_up.updated_at,
        }
    }
}

/// Generic ledger error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error_type: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
