//! HTTP handlers for the ledger API.

use axum::{
    extract::{Path, Query as QueryParams, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::Agent;
use crate::error::Result;
use crate::AppState;

use super::requests::{
    AddFollowUpRequest, ConvertRequest, CreateQueryRequest, CreateQuotationRequest,
    InstalmentPlanParams, PreviewSummaryRequest,
};
use super::responses::{
    ConversionResponse, FollowUpResponse, InstalmentPlanResponse, InstalmentResponse,
    QueryResponse, QuotationResponse, SummaryResponse, TripResponse,
};
use super::services::ProfitReport;

/// Ledger routes. Every handler requires an authenticated [`Agent`].
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/destination/query", post(create_query))
        .route("/destination/getquery/:id", get(get_query))
        .route("/quotations/preview", post(preview_summary))
        .route("/quotations", post(create_quotation))
        .route("/quotations/:quote_id", get(get_quotation))
        .route(
            "/quotations/:quote_id/instalment-plan",
            get(suggest_instalments),
        )
        .route("/quotations/by-query/:query_id", get(list_quotations))
        .route("/destination/query/:query_id/convert", post(convert))
        .route("/destination/query/:query_id/trip", get(get_trip))
        .route(
            "/destination/getfollowupsquery/:query_id",
            get(list_follow_ups),
        )
        .route("/destination/addfollowups/:query_id", post(add_follow_up))
        .route(
            "/destination/query/:query_id/followup/:follow_up_id/status",
            post(resolve_follow_up),
        )
        .route("/reports/profit", get(profit_report))
}

// =============================================================================
// Queries
// =============================================================================

async fn create_query(
    State(state): State<AppState>,
    agent: Agent,
    Json(request): Json<CreateQueryRequest>,
) -> Result<(StatusCode, Json<QueryResponse>)> {
    let query = state.ledger.create_query(&agent, request).await?;
    Ok((StatusCode::CREATED, Json(query.into())))
}

async fn get_query(
    State(state): State<AppState>,
    _agent: Agent,
    Path(id): Path<Uuid>,
) -> Result<Json<QueryResponse>> {
    let query = state.ledger.get_query(id).await?;
    Ok(Json(query.into()))
}

// =============================================================================
// Quotations
// =============================================================================

async fn preview_summary(
    State(state): State<AppState>,
    _agent: Agent,
    Json(request): Json<PreviewSummaryRequest>,
) -> Result<Json<SummaryResponse>> {
    let summary = state
        .ledger
        .preview_summary(&request.line_items, request.terms())?;
    Ok(Json(summary.into()))
}

async fn create_quotation(
    State(state): State<AppState>,
    agent: Agent,
    Json(request): Json<CreateQuotationRequest>,
) -> Result<(StatusCode, Json<QuotationResponse>)> {
    let quotation = state.ledger.create_quotation(&agent, request).await?;
    Ok((
        StatusCode::CREATED,
        Json(QuotationResponse::new(quotation, true, Utc::now())),
    ))
}

async fn get_quotation(
    State(state): State<AppState>,
    _agent: Agent,
    Path(quote_id): Path<Uuid>,
) -> Result<Json<QuotationResponse>> {
    let quotation = state.ledger.get_quotation(quote_id).await?;
    let is_latest = is_latest(&state, quotation.query_id, quotation.id).await?;
    Ok(Json(QuotationResponse::new(quotation, is_latest, Utc::now())))
}

async fn list_quotations(
    State(state): State<AppState>,
    _agent: Agent,
    Path(query_id): Path<Uuid>,
) -> Result<Json<Vec<QuotationResponse>>> {
    let quotations = state.ledger.list_quotations(query_id).await?;
    Ok(Json(QuotationResponse::list(quotations, Utc::now())))
}

async fn suggest_instalments(
    State(state): State<AppState>,
    _agent: Agent,
    Path(quote_id): Path<Uuid>,
    QueryParams(params): QueryParams<InstalmentPlanParams>,
) -> Result<Json<InstalmentPlanResponse>> {
    let (quotation, plan) = state
        .ledger
        .suggest_instalments(quote_id, params.parts, params.first_due)
        .await?;

    let today = Utc::now().date_naive();
    Ok(Json(InstalmentPlanResponse {
        quote_id: quotation.id,
        total_selling_price: quotation.summary.total_selling_price,
        instalments: plan
            .into_iter()
            .map(|i| InstalmentResponse::new(i, today))
            .collect(),
    }))
}

async fn is_latest(state: &AppState, query_id: Uuid, quote_id: Uuid) -> Result<bool> {
    let quotations = state.ledger.list_quotations(query_id).await?;
    Ok(quotations.first().map(|q| q.id) == Some(quote_id))
}

// =============================================================================
// Conversion
// =============================================================================

async fn convert(
    State(state): State<AppState>,
    agent: Agent,
    Path(query_id): Path<Uuid>,
    Json(request): Json<ConvertRequest>,
) -> Result<(StatusCode, Json<ConversionResponse>)> {
    let conversion = state.ledger.convert(&agent, query_id, request).await?;
    // Conversion is committed; the latest flag is informational from here.
    let is_latest = match is_latest(&state, query_id, conversion.quotation.id).await {
        Ok(is_latest) => is_latest,
        Err(e) => {
            tracing::warn!(%query_id, "Could not determine latest quotation after conversion: {}", e);
            false
        }
    };
    Ok((
        StatusCode::CREATED,
        Json(ConversionResponse::new(conversion, is_latest, Utc::now())),
    ))
}

async fn get_trip(
    State(state): State<AppState>,
    _agent: Agent,
    Path(query_id): Path<Uuid>,
) -> Result<Json<TripResponse>> {
    let trip = state.ledger.get_trip(query_id).await?;
    Ok(Json(TripResponse::new(trip, Utc::now())))
}

// =============================================================================
// Follow-ups
// =============================================================================

async fn list_follow_ups(
    State(state): State<AppState>,
    _agent: Agent,
    Path(query_id): Path<Uuid>,
) -> Result<Json<Vec<FollowUpResponse>>> {
    let now = Utc::now();
    let follow_ups = state.ledger.list_follow_ups(query_id).await?;
    Ok(Json(
        follow_ups
            .into_iter()
            .map(|f| FollowUpResponse::new(f, now))
            .collect(),
    ))
}

async fn add_follow_up(
    State(state): State<AppState>,
    agent: Agent,
    Path(query_id): Path<Uuid>,
    Json(request): Json<AddFollowUpRequest>,
) -> Result<(StatusCode, Json<FollowUpResponse>)> {
    let follow_up = state
        .ledger
        .add_follow_up(&agent, query_id, request)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(FollowUpResponse::new(follow_up, Utc::now())),
    ))
}

async fn resolve_follow_up(
    State(state): State<AppState>,
    _agent: Agent,
    Path((query_id, follow_up_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<FollowUpResponse>> {
    let follow_up = state
        .ledger
        .resolve_follow_up(query_id, follow_up_id)
        .await?;
    Ok(Json(FollowUpResponse::new(follow_up, Utc::now())))
}

// =============================================================================
// Reports
// =============================================================================

async fn profit_report(
    State(state): State<AppState>,
    _agent: Agent,
) -> Result<Json<ProfitReport>> {
    Ok(Json(state.ledger.profit_report().await?))
}
