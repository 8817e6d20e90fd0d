//! Storage collaborator for the ledger.
//!
//! The ledger only talks to persistence through [`LedgerStore`]. Two
//! backends exist: Postgres for deployments and an in-memory map for
//! development and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ledger::models::{FollowUp, Query, Quotation, Trip};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// All errors a [`LedgerStore`] backend can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The query already has a trip, or the quotation was already used.
    #[error("query {query_id} has already been converted")]
    AlreadyConverted { query_id: Uuid },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    /// Connection, timeout, serialization or constraint failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Narrow read/write interface used by the ledger service.
///
/// ## Conversion
///
/// [`LedgerStore::convert`] is the single check-and-set of the system. The
/// backend must guarantee that, for any number of concurrent calls against
/// one query, at most one returns `Ok`. Every other call returns
/// [`StorageError::AlreadyConverted`]. Backends never retry it.
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    async fn ping(&self) -> Result<(), StorageError>;

    async fn insert_query(&self, query: &Query) -> Result<(), StorageError>;

    async fn get_query(&self, id: Uuid) -> Result<Option<Query>, StorageError>;

    async fn insert_quotation(&self, quotation: &Quotation) -> Result<(), StorageError>;

    async fn get_quotation(&self, id: Uuid) -> Result<Option<Quotation>, StorageError>;

    /// Quotations for a query, newest first.
    async fn list_quotations(&self, query_id: Uuid) -> Result<Vec<Quotation>, StorageError>;

    /// Mark `trip.quotation_id` as used for conversion, link it to
    /// `trip.query_id` and persist the trip with its instalments, atomically.
    async fn convert(&self, trip: &Trip) -> Result<(), StorageError>;

    async fn get_trip(&self, query_id: Uuid) -> Result<Option<Trip>, StorageError>;

    /// All trips, newest first.
    async fn list_trips(&self) -> Result<Vec<Trip>, StorageError>;

    async fn insert_follow_up(&self, follow_up: &FollowUp) -> Result<(), StorageError>;

    /// Follow-ups for a query, newest first.
    async fn list_follow_ups(&self, query_id: Uuid) -> Result<Vec<FollowUp>, StorageError>;

    /// Move a follow-up to `Solved`. Already solved follow-ups are returned
    /// unchanged. `None` when no follow-up with that id belongs to the query.
    async fn resolve_follow_up(
        &self,
        query_id: Uuid,
        follow_up_id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<FollowUp>, StorageError>;
}
