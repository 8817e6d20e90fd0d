//! In-memory caching using moka
//!
//! Quotations are read far more often than they change: after creation the
//! only mutation is the one-way conversion flag. Both caches are invalidated
//! on every write that touches a query's quotations.
//!
//! Reads that miss go to the store and then fill the cache. A write can land
//! between the store read and the fill, so every fill carries the write
//! generation seen before the read and is dropped again if it moved.

use moka::future::Cache;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::ledger::models::Quotation;

/// Application cache holding quotations and per-query quotation lists
#[derive(Clone)]
pub struct AppCache {
    /// Quotations (quote id -> Quotation)
    pub quotations: Cache<Uuid, Arc<Quotation>>,
    /// Quotation lists (query id -> newest-first quotations)
    pub quotation_lists: Cache<Uuid, Arc<Vec<Quotation>>>,
    /// Bumped by every invalidation, before entries are dropped.
    generation: Arc<AtomicU64>,
}

impl AppCache {
    /// Create a new cache instance with configured TTLs
    pub fn new() -> Self {
        Self {
            // Quotations: 1000 entries, 30 min TTL, 10 min idle
            quotations: Cache::builder()
                .max_capacity(1_000)
                .time_to_live(Duration::from_secs(30 * 60))
                .time_to_idle(Duration::from_secs(10 * 60))
                .build(),

            // Quotation lists: 500 queries, 5 min TTL
            quotation_lists: Cache::builder()
                .max_capacity(500)
                .time_to_live(Duration::from_secs(5 * 60))
                .build(),

            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current write generation. Take it before reading from the store.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cache a quotation read from the store under generation `seen`
    pub async fn fill_quotation(&self, seen: u64, quotation: Quotation) {
        let id = quotation.id;
        self.quotations.insert(id, Arc::new(quotation)).await;
        if self.generation() != seen {
            self.quotations.invalidate(&id).await;
            debug!(quotation_id = %id, "Dropped quotation read that raced a write");
        }
    }

    /// Cache a query's quotation list read from the store under generation `seen`
    pub async fn fill_quotation_list(&self, seen: u64, query_id: Uuid, quotations: Vec<Quotation>) {
        self.quotation_lists
            .insert(query_id, Arc::new(quotations))
            .await;
        if self.generation() != seen {
            self.quotation_lists.invalidate(&query_id).await;
            debug!(%query_id, "Dropped quotation list read that raced a write");
        }
    }

    /// Get cache statistics for monitoring
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            quotations_size: self.quotations.entry_count(),
            quotation_lists_size: self.quotation_lists.entry_count(),
        }
    }

    /// Drop everything cached for a query after one of its quotations changed
    pub async fn invalidate_query(&self, query_id: Uuid, quotation_id: Option<Uuid>) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.quotation_lists.invalidate(&query_id).await;
        if let Some(id) = quotation_id {
            self.quotations.invalidate(&id).await;
        }
        debug!(%query_id, "Cache invalidated for query");
    }
}

impl Default for AppCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub quotations_size: u64,
    pub quotation_lists_size: u64,
}
