//! In-memory ledger store.
//!
//! Every mutation takes the single write guard, so a conversion's checks and
//! writes cannot interleave with another conversion.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{LedgerStore, StorageError};
use crate::ledger::models::{FollowUp, FollowUpStatus, Query, Quotation, QuotationStatus, Trip};

#[derive(Debug, Default)]
struct Tables {
    queries: HashMap<Uuid, Query>,
    quotations: HashMap<Uuid, Quotation>,
    /// Keyed by query id; one trip per query.
    trips: HashMap<Uuid, Trip>,
    follow_ups: HashMap<Uuid, FollowUp>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn insert_query(&self, query: &Query) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        tables.queries.insert(query.id, query.clone());
        Ok(())
    }

    async fn get_query(&self, id: Uuid) -> Result<Option<Query>, StorageError> {
        Ok(self.tables.read().await.queries.get(&id).cloned())
    }

    async fn insert_quotation(&self, quotation: &Quotation) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.queries.contains_key(&quotation.query_id) {
            return Err(StorageError::NotFound {
                entity: "query",
                id: quotation.query_id,
            });
        }
        tables.quotations.insert(quotation.id, quotation.clone());
        Ok(())
    }

    async fn get_quotation(&self, id: Uuid) -> Result<Option<Quotation>, StorageError> {
        Ok(self.tables.read().await.quotations.get(&id).cloned())
    }

    async fn list_quotations(&self, query_id: Uuid) -> Result<Vec<Quotation>, StorageError> {
        let tables = self.tables.read().await;
        let mut quotations: Vec<Quotation> = tables
            .quotations
            .values()
            .filter(|q| q.query_id == query_id)
            .cloned()
            .collect();
        quotations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(quotations)
    }

    async fn convert(&self, trip: &Trip) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;

        let query = tables
            .queries
            .get(&trip.query_id)
            .ok_or(StorageError::NotFound {
                entity: "query",
                id: trip.query_id,
            })?;
        if query.is_converted() || tables.trips.contains_key(&trip.query_id) {
            return Err(StorageError::AlreadyConverted {
                query_id: trip.query_id,
            });
        }

        match tables.quotations.get(&trip.quotation_id) {
            Some(q) if q.query_id != trip.query_id => {
                return Err(StorageError::NotFound {
                    entity: "quotation",
                    id: trip.quotation_id,
                })
            }
            Some(q) if q.status == QuotationStatus::UsedForConversion => {
                return Err(StorageError::AlreadyConverted {
                    query_id: trip.query_id,
                })
            }
            Some(_) => {}
            None => {
                return Err(StorageError::NotFound {
                    entity: "quotation",
                    id: trip.quotation_id,
                })
            }
        }

        if let Some(quotation) = tables.quotations.get_mut(&trip.quotation_id) {
            quotation.status = QuotationStatus::UsedForConversion;
        }
        if let Some(query) = tables.queries.get_mut(&trip.query_id) {
            query.converted_quotation_id = Some(trip.quotation_id);
        }
        tables.trips.insert(trip.query_id, trip.clone());

        Ok(())
    }

    async fn get_trip(&self, query_id: Uuid) -> Result<Option<Trip>, StorageError> {
        Ok(self.tables.read().await.trips.get(&query_id).cloned())
    }

    async fn list_trips(&self) -> Result<Vec<Trip>, StorageError> {
        let tables = self.tables.read().await;
        let mut trips: Vec<Trip> = tables.trips.values().cloned().collect();
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(trips)
    }

    async fn insert_follow_up(&self, follow_up: &FollowUp) -> Result<(), StorageError> {
        let mut tables = self.tables.write().await;
        if !tables.queries.contains_key(&follow_up.query_id) {
            return Err(StorageError::NotFound {
                entity: "query",
                id: follow_up.query_id,
            });
        }
        tables.follow_ups.insert(follow_up.id, follow_up.clone());
        Ok(())
    }

    async fn list_follow_ups(&self, query_id: Uuid) -> Result<Vec<FollowUp>, StorageError> {
        let tables = self.tables.read().await;
        let mut follow_ups: Vec<FollowUp> = tables
            .follow_ups
            .values()
            .filter(|f| f.query_id == query_id)
            .cloned()
            .collect();
        follow_ups.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(follow_ups)
    }

    async fn resolve_follow_up(
        &self,
        query_id: Uuid,
        follow_up_id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<FollowUp>, StorageError> {
        let mut tables = self.tables.write().await;
        let follow_up = match tables.follow_ups.get_mut(&follow_up_id) {
            Some(f) if f.query_id == query_id => f,
            _ => return Ok(None),
        };

        if follow_up.status == FollowUpStatus::NotSolved {
            follow_up.status = FollowUpStatus::Solved;
            follow_up.updated_at = resolved_at;
        }

        Ok(Some(follow_up.clone()))
    }
}
