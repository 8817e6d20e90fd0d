//! Quotation ledger.
//!
//! Prices travel quotations, converts one quotation per query into a booked
//! trip with its instalment schedule, and tracks follow-ups on each query.

pub mod calculators;
pub mod calendar;
pub mod instalments;
pub mod models;
pub mod requests;
pub mod responses;
pub mod routes;
pub mod services;

// Re-export commonly used items
pub use calculators::{
    compute_summary, profit_of, round_money, round_to_unit, LineItem, PricingTerms, QuoteSummary,
};
pub use routes::router;
pub use services::{Conversion, LedgerError, LedgerPolicy, LedgerService};
