//! Ledger service: quotation lifecycle, conversion and follow-ups.
//!
//! Pricing math lives in [`super::calculators`]; this layer adds policy,
//! caching and the calls to the storage collaborator.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::Agent;
use crate::cache::AppCache;
use crate::store::{LedgerStore, StorageError};

use super::calculators::{
    compute_summary, profit_of, round_money, LineItem, PricingTerms, QuoteSummary,
};
use super::instalments::{reconcile, suggest_plan, validate_instalments};
use super::models::{FollowUp, Instalment, Query, Quotation, QuotationStatus, Trip};
use super::requests::{
    AddFollowUpRequest, ConvertRequest, CreateQueryRequest, CreateQuotationRequest,
    TermsOverride,
};

/// Ledger error types
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("query {query_id} has already been converted")]
    AlreadyConverted { query_id: Uuid },

    #[error("invalid instalments: {0}")]
    InvalidInstalments(String),

    #[error("conversion must be confirmed as verified")]
    NotVerified,

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<StorageError> for LedgerError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyConverted { query_id } => {
                LedgerError::AlreadyConverted { query_id }
            }
            StorageError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            other => LedgerError::Storage(other),
        }
    }
}

/// Pricing defaults and conversion policy
#[derive(Debug, Clone, Copy)]
pub struct LedgerPolicy {
    pub default_terms: PricingTerms,
    /// Demand the operator's "I have verified" flag on conversion.
    pub require_verification: bool,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            default_terms: PricingTerms::default(),
            require_verification: true,
        }
    }
}

impl LedgerPolicy {
    fn terms_with(&self, overrides: TermsOverride) -> PricingTerms {
        PricingTerms {
            markup_percent: overrides
                .markup_percent
                .unwrap_or(self.default_terms.markup_percent),
            gst_percent: overrides
                .gst_percent
                .unwrap_or(self.default_terms.gst_percent),
            rounding_unit: overrides
                .rounding_unit
                .unwrap_or(self.default_terms.rounding_unit),
        }
    }
}

/// Result of a successful conversion
#[derive(Debug, Clone)]
pub struct Conversion {
    pub trip: Trip,
    /// The quotation as it stands after conversion.
    pub quotation: Quotation,
    /// Non-fatal findings, such as instalments not adding up.
    pub warnings: Vec<String>,
}

/// One converted trip in the profit report
#[derive(Debug, Clone, Serialize)]
pub struct ProfitRow {
    pub trip_id: Uuid,
    pub query_id: Uuid,
    pub quotation_id: Uuid,
    pub total_selling_price: Decimal,
    pub total_net_cost: Decimal,
    pub subtotal_with_markup: Decimal,
    pub net_profit: Decimal,
    pub profit_percent: Option<Decimal>,
}

/// Profit report over every converted trip
#[derive(Debug, Clone, Serialize)]
pub struct ProfitReport {
    pub trips: Vec<ProfitRow>,
    pub trip_count: usize,
    pub revenue: Decimal,
    pub net_cost: Decimal,
    pub net_profit: Decimal,
    pub profit_percent: Option<Decimal>,
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    cache: AppCache,
    policy: LedgerPolicy,
}

impl LedgerService {
    pub fn new(store: Arc<dyn LedgerStore>, cache: AppCache, policy: LedgerPolicy) -> Self {
        Self {
            store,
            cache,
            policy,
        }
    }

    pub fn policy(&self) -> &LedgerPolicy {
        &self.policy
    }

    pub fn cache(&self) -> &AppCache {
        &self.cache
    }

    pub async fn health_check(&self) -> Result<(), LedgerError> {
        self.store.ping().await?;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    pub async fn create_query(
        &self,
        agent: &Agent,
        request: CreateQueryRequest,
    ) -> Result<Query, LedgerError> {
        if request.customer_name.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "customer name is required".to_string(),
            ));
        }
        if request.destination.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "destination is required".to_string(),
            ));
        }
        if request.adults < 0 || request.children < 0 {
            return Err(LedgerError::InvalidInput(
                "traveller counts must not be negative".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (request.travel_start, request.travel_end) {
            if end < start {
                return Err(LedgerError::InvalidInput(
                    "travel end must not be before travel start".to_string(),
                ));
            }
        }

        let query = Query {
            id: Uuid::new_v4(),
            customer_name: request.customer_name.trim().to_string(),
            destination: request.destination.trim().to_string(),
            travel_start: request.travel_start,
            travel_end: request.travel_end,
            adults: request.adults,
            children: request.children,
            notes: request.notes,
            created_by: agent.name.clone(),
            created_at: Utc::now(),
            converted_quotation_id: None,
        };

        self.store.insert_query(&query).await?;
        info!(query_id = %query.id, agent = %agent.name, "Query created");

        Ok(query)
    }

    pub async fn get_query(&self, query_id: Uuid) -> Result<Query, LedgerError> {
        self.store
            .get_query(query_id)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "query",
                id: query_id,
            })
    }

    // -------------------------------------------------------------------------
    // Quotations
    // -------------------------------------------------------------------------

    /// Price line items with the configured defaults plus overrides.
    pub fn preview_summary(
        &self,
        items: &[LineItem],
        overrides: TermsOverride,
    ) -> Result<QuoteSummary, LedgerError> {
        compute_summary(items, &self.policy.terms_with(overrides))
    }

    /// Price and persist a new draft quotation for a query.
    pub async fn create_quotation(
        &self,
        agent: &Agent,
        request: CreateQuotationRequest,
    ) -> Result<Quotation, LedgerError> {
        let terms = self.policy.terms_with(request.terms());
        let summary = compute_summary(&request.line_items, &terms)?;

        self.get_query(request.query_id).await?;

        let quotation = Quotation {
            id: Uuid::new_v4(),
            query_id: request.query_id,
            created_by: agent.name.clone(),
            created_at: Utc::now(),
            status: QuotationStatus::Draft,
            terms,
            line_items: request.line_items,
            summary,
        };

        self.store.insert_quotation(&quotation).await?;
        self.cache.invalidate_query(quotation.query_id, None).await;

        info!(
            quotation_id = %quotation.id,
            query_id = %quotation.query_id,
            total_selling_price = %quotation.summary.total_selling_price,
            agent = %agent.name,
            "Quotation created"
        );

        Ok(quotation)
    }

    pub async fn get_quotation(&self, quote_id: Uuid) -> Result<Quotation, LedgerError> {
        if let Some(cached) = self.cache.quotations.get(&quote_id).await {
            debug!("Cache HIT for quotation: {}", quote_id);
            return Ok((*cached).clone());
        }
        debug!("Cache MISS for quotation: {}", quote_id);

        let seen = self.cache.generation();
        let quotation = self
            .store
            .get_quotation(quote_id)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "quotation",
                id: quote_id,
            })?;

        self.cache.fill_quotation(seen, quotation.clone()).await;

        Ok(quotation)
    }

    /// Quotations for a query, newest first. The first one is the latest.
    pub async fn list_quotations(&self, query_id: Uuid) -> Result<Vec<Quotation>, LedgerError> {
        if let Some(cached) = self.cache.quotation_lists.get(&query_id).await {
            debug!("Cache HIT for quotation list: {}", query_id);
            return Ok((*cached).clone());
        }
        debug!("Cache MISS for quotation list: {}", query_id);

        let seen = self.cache.generation();
        self.get_query(query_id).await?;
        let quotations = self.store.list_quotations(query_id).await?;

        self.cache
            .fill_quotation_list(seen, query_id, quotations.clone())
            .await;

        Ok(quotations)
    }

    /// Suggest equal monthly instalments for a quotation's total.
    pub async fn suggest_instalments(
        &self,
        quote_id: Uuid,
        parts: u32,
        first_due: NaiveDate,
    ) -> Result<(Quotation, Vec<Instalment>), LedgerError> {
        let quotation = self.get_quotation(quote_id).await?;
        let plan = suggest_plan(quotation.summary.total_selling_price, parts, first_due)?;
        Ok((quotation, plan))
    }

    // -------------------------------------------------------------------------
    // Conversion
    // -------------------------------------------------------------------------

    /// Turn a quotation into the query's one and only trip.
    ///
    /// The caller is expected to have obtained human confirmation already.
    /// Checks run in order: verification flag, instalment shape, query and
    /// quotation lookup, then the store's atomic check-and-set. A retried
    /// conversion therefore always re-checks `AlreadyConverted`.
    pub async fn convert(
        &self,
        agent: &Agent,
        query_id: Uuid,
        request: ConvertRequest,
    ) -> Result<Conversion, LedgerError> {
        if self.policy.require_verification && !request.verified {
            return Err(LedgerError::NotVerified);
        }

        let instalments = validate_instalments(&request.instalments)?;

        let query = self.get_query(query_id).await?;
        if query.is_converted() {
            return Err(LedgerError::AlreadyConverted { query_id });
        }

        // Bypass the cache; the status must be current.
        let mut quotation = self
            .store
            .get_quotation(request.quote_id)
            .await?
            .filter(|q| q.query_id == query_id)
            .ok_or(LedgerError::NotFound {
                entity: "quotation",
                id: request.quote_id,
            })?;
        if quotation.is_converted() {
            return Err(LedgerError::AlreadyConverted { query_id });
        }

        let mut warnings = Vec::new();
        if let Some(warning) = reconcile(&instalments, quotation.summary.total_selling_price) {
            warn!(%query_id, quotation_id = %quotation.id, "{}", warning);
            warnings.push(warning);
        }

        let trip = Trip {
            id: Uuid::new_v4(),
            query_id,
            quotation_id: quotation.id,
            comments: request
                .comments
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            instalments,
            created_by: agent.name.clone(),
            created_at: Utc::now(),
        };

        let outcome = self.store.convert(&trip).await;
        self.cache.invalidate_query(query_id, Some(quotation.id)).await;

        match outcome {
            Ok(()) => {
                info!(
                    %query_id,
                    quotation_id = %quotation.id,
                    trip_id = %trip.id,
                    instalments = trip.instalments.len(),
                    agent = %agent.name,
                    "Quotation converted"
                );
            }
            Err(StorageError::AlreadyConverted { .. }) => {
                warn!(%query_id, quotation_id = %quotation.id, "Conversion lost to a concurrent conversion");
                return Err(LedgerError::AlreadyConverted { query_id });
            }
            Err(e) => return Err(e.into()),
        }

        quotation.status = QuotationStatus::UsedForConversion;

        Ok(Conversion {
            trip,
            quotation,
            warnings,
        })
    }

    pub async fn get_trip(&self, query_id: Uuid) -> Result<Trip, LedgerError> {
        self.store
            .get_trip(query_id)
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "trip",
                id: query_id,
            })
    }

    // -------------------------------------------------------------------------
    // Follow-ups
    // -------------------------------------------------------------------------

    pub async fn add_follow_up(
        &self,
        agent: &Agent,
        query_id: Uuid,
        request: AddFollowUpRequest,
    ) -> Result<FollowUp, LedgerError> {
        let message = request.message.trim();
        if message.is_empty() {
            return Err(LedgerError::InvalidInput(
                "follow-up message is required".to_string(),
            ));
        }

        self.get_query(query_id).await?;

        let follow_up = FollowUp::new(
            query_id,
            message.to_string(),
            request.is_actionable,
            request.due_date,
            agent.name.clone(),
            Utc::now(),
        );

        self.store.insert_follow_up(&follow_up).await?;
        info!(
            %query_id,
            follow_up_id = %follow_up.id,
            status = follow_up.status.as_str(),
            "Follow-up added"
        );

        Ok(follow_up)
    }

    pub async fn list_follow_ups(&self, query_id: Uuid) -> Result<Vec<FollowUp>, LedgerError> {
        self.get_query(query_id).await?;
        Ok(self.store.list_follow_ups(query_id).await?)
    }

    /// Mark a follow-up solved. Solving an already solved one is a no-op.
    pub async fn resolve_follow_up(
        &self,
        query_id: Uuid,
        follow_up_id: Uuid,
    ) -> Result<FollowUp, LedgerError> {
        let follow_up = self
            .store
            .resolve_follow_up(query_id, follow_up_id, Utc::now())
            .await?
            .ok_or(LedgerError::NotFound {
                entity: "follow-up",
                id: follow_up_id,
            })?;

        info!(%query_id, %follow_up_id, "Follow-up resolved");
        Ok(follow_up)
    }

    // -------------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------------

    /// Revenue, cost and margin across all trips, from their frozen summaries.
    pub async fn profit_report(&self) -> Result<ProfitReport, LedgerError> {
        let trips = self.store.list_trips().await?;

        let mut rows = Vec::with_capacity(trips.len());
        for trip in trips {
            let quotation = match self.get_quotation(trip.quotation_id).await {
                Ok(q) => q,
                Err(LedgerError::NotFound { .. }) => {
                    warn!(trip_id = %trip.id, quotation_id = %trip.quotation_id, "Trip without quotation skipped in report");
                    continue;
                }
                Err(e) => return Err(e),
            };

            let profit = profit_of(&quotation.summary);
            rows.push(ProfitRow {
                trip_id: trip.id,
                query_id: trip.query_id,
                quotation_id: quotation.id,
                total_selling_price: quotation.summary.total_selling_price,
                total_net_cost: quotation.summary.total_net_cost,
                subtotal_with_markup: quotation.summary.subtotal_with_markup,
                net_profit: profit.net_profit,
                profit_percent: profit.profit_percent,
            });
        }

        summarize_profit(rows)
    }
}

fn checked_total<F>(rows: &[ProfitRow], field: F) -> Result<Decimal, LedgerError>
where
    F: Fn(&ProfitRow) -> Decimal,
{
    rows.iter()
        .try_fold(Decimal::ZERO, |sum, row| sum.checked_add(field(row)))
        .ok_or_else(|| LedgerError::InvalidInput("report totals out of range".to_string()))
}

fn summarize_profit(rows: Vec<ProfitRow>) -> Result<ProfitReport, LedgerError> {
    let revenue = checked_total(&rows, |r| r.total_selling_price)?;
    let net_cost = checked_total(&rows, |r| r.total_net_cost)?;
    let net_profit = checked_total(&rows, |r| r.net_profit)?;

    let profit_percent = if net_cost.is_zero() {
        None
    } else {
        net_profit
            .checked_mul(Decimal::ONE_HUNDRED)
            .and_then(|v| v.checked_div(net_cost))
            .map(|pct| round_money(pct, 2).normalize())
    };

    Ok(ProfitReport {
        trip_count: rows.len(),
        trips: rows,
        revenue,
        net_cost,
        net_profit,
        profit_percent,
    })
}
