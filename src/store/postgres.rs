//! Postgres ledger store.
//!
//! Plain `sqlx::query_as` with runtime binding. Quotation line items and
//! summaries are stored as JSONB exactly as the calculators produced them.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::info;
use uuid::Uuid;

use super::{LedgerStore, StorageError};
use crate::ledger::calculators::{LineItem, PricingTerms, QuoteSummary};
use crate::ledger::models::{
    FollowUp, FollowUpStatus, Instalment, Query, Quotation, QuotationStatus, Trip,
};

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        StorageError::Backend(err.to_string())
    }
}

/// Query row from `queries`
#[derive(Debug, FromRow)]
struct QueryRow {
    id: Uuid,
    customer_name: String,
    destination: String,
    travel_start: Option<NaiveDate>,
    travel_end: Option<NaiveDate>,
    adults: i32,
    children: i32,
    notes: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
    converted_quotation_id: Option<Uuid>,
}

impl From<QueryRow> for Query {
    fn from(row: QueryRow) -> Self {
        Query {
            id: row.id,
            customer_name: row.customer_name,
            destination: row.destination,
            travel_start: row.travel_start,
            travel_end: row.travel_end,
            adults: row.adults,
            children: row.children,
            notes: row.notes,
            created_by: row.created_by,
            created_at: row.created_at,
            converted_quotation_id: row.converted_quotation_id,
        }
    }
}

/// Quotation row from `quotations`
#[derive(Debug, FromRow)]
struct QuotationRow {
    id: Uuid,
    query_id: Uuid,
    created_by: String,
    created_at: DateTime<Utc>,
    status: String,
    markup_percent: Decimal,
    gst_percent: Decimal,
    rounding_unit: Decimal,
    line_items: Json<Vec<LineItem>>,
    summary: Json<QuoteSummary>,
}

impl TryFrom<QuotationRow> for Quotation {
    type Error = StorageError;

    fn try_from(row: QuotationRow) -> Result<Self, Self::Error> {
        let status = QuotationStatus::parse(&row.status).ok_or_else(|| {
            StorageError::Backend(format!(
                "quotation {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(Quotation {
            id: row.id,
            query_id: row.query_id,
            created_by: row.created_by,
            created_at: row.created_at,
            status,
            terms: PricingTerms {
                markup_percent: row.markup_percent,
                gst_percent: row.gst_percent,
                rounding_unit: row.rounding_unit,
            },
            line_items: row.line_items.0,
            summary: row.summary.0,
        })
    }
}

/// Trip row from `trips`
#[derive(Debug, FromRow)]
struct TripRow {
    id: Uuid,
    query_id: Uuid,
    quotation_id: Uuid,
    comments: Option<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

/// Instalment row from `trip_instalments`
#[derive(Debug, FromRow)]
struct InstalmentRow {
    trip_id: Uuid,
    sequence: i32,
    amount: Decimal,
    due_date: NaiveDate,
}

impl TripRow {
    fn with_instalments(self, rows: &[InstalmentRow]) -> Trip {
        let instalments = rows
            .iter()
            .filter(|r| r.trip_id == self.id)
            .map(|r| Instalment {
                sequence: r.sequence,
                amount: r.amount,
                due_date: r.due_date,
            })
            .collect();

        Trip {
            id: self.id,
            query_id: self.query_id,
            quotation_id: self.quotation_id,
            comments: self.comments,
            instalments,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

/// Follow-up row from `follow_ups`
#[derive(Debug, FromRow)]
struct FollowUpRow {
    id: Uuid,
    query_id: Uuid,
    message: String,
    status: String,
    is_actionable: bool,
    due_date: Option<NaiveDate>,
    created_by: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FollowUpRow> for FollowUp {
    type Error = StorageError;

    fn try_from(row: FollowUpRow) -> Result<Self, Self::Error> {
        let status = FollowUpStatus::parse(&row.status).ok_or_else(|| {
            StorageError::Backend(format!(
                "follow-up {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(FollowUp {
            id: row.id,
            query_id: row.query_id,
            message: row.message,
            status,
            is_actionable: row.is_actionable,
            due_date: row.due_date,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const QUOTATION_COLUMNS: &str = r#"
    id, query_id, created_by, created_at, status,
    markup_percent, gst_percent, rounding_unit,
    line_items, summary
"#;

const FOLLOW_UP_COLUMNS: &str = r#"
    id, query_id, message, status, is_actionable,
    due_date, created_by, created_at, updated_at
"#;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with the given pool limits.
    ///
    /// `acquire_timeout` bounds every storage call waiting for a connection;
    /// hitting it surfaces as [`StorageError::Backend`].
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, StorageError> {
        info!(max_connections, "Connecting to PostgreSQL");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        info!("PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("migration failed: {}", e)))?;
        Ok(())
    }

    async fn instalments_for(&self, trip_ids: &[Uuid]) -> Result<Vec<InstalmentRow>, StorageError> {
        let rows = sqlx::query_as::<_, InstalmentRow>(
            r#"
            SELECT trip_id, sequence, amount, due_date
            FROM trip_instalments
            WHERE trip_id = ANY($1)
            ORDER BY trip_id, sequence
            "#,
        )
        .bind(trip_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn ping(&self) -> Result<(), StorageError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_query(&self, query: &Query) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO queries (
                id, customer_name, destination, travel_start, travel_end,
                adults, children, notes, created_by, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(query.id)
        .bind(&query.customer_name)
        .bind(&query.destination)
        .bind(query.travel_start)
        .bind(query.travel_end)
        .bind(query.adults)
        .bind(query.children)
        .bind(&query.notes)
        .bind(&query.created_by)
        .bind(query.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_query(&self, id: Uuid) -> Result<Option<Query>, StorageError> {
        let row = sqlx::query_as::<_, QueryRow>(
            r#"
            SELECT
                id, customer_name, destination, travel_start, travel_end,
                adults, children, notes, created_by, created_at,
                converted_quotation_id
            FROM queries
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Query::from))
    }

    async fn insert_quotation(&self, quotation: &Quotation) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO quotations (
                id, query_id, created_by, created_at, status,
                markup_percent, gst_percent, rounding_unit,
                line_items, summary
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(quotation.id)
        .bind(quotation.query_id)
        .bind(&quotation.created_by)
        .bind(quotation.created_at)
        .bind(quotation.status.as_str())
        .bind(quotation.terms.markup_percent)
        .bind(quotation.terms.gst_percent)
        .bind(quotation.terms.rounding_unit)
        .bind(Json(&quotation.line_items))
        .bind(Json(&quotation.summary))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StorageError::NotFound {
                    entity: "query",
                    id: quotation.query_id,
                }
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    async fn get_quotation(&self, id: Uuid) -> Result<Option<Quotation>, StorageError> {
        let row = sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {} FROM quotations WHERE id = $1",
            QUOTATION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Quotation::try_from).transpose()
    }

    async fn list_quotations(&self, query_id: Uuid) -> Result<Vec<Quotation>, StorageError> {
        let rows = sqlx::query_as::<_, QuotationRow>(&format!(
            "SELECT {} FROM quotations WHERE query_id = $1 ORDER BY created_at DESC, id DESC",
            QUOTATION_COLUMNS
        ))
        .bind(query_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Quotation::try_from).collect()
    }

    async fn convert(&self, trip: &Trip) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes concurrent conversions of the same query.
        let converted = sqlx::query_scalar::<_, Option<Uuid>>(
            r#"
            SELECT converted_quotation_id
            FROM queries
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(trip.query_id)
        .fetch_optional(&mut *tx)
        .await?;

        match converted {
            None => {
                return Err(StorageError::NotFound {
                    entity: "query",
                    id: trip.query_id,
                })
            }
            Some(Some(_)) => {
                return Err(StorageError::AlreadyConverted {
                    query_id: trip.query_id,
                })
            }
            Some(None) => {}
        }

        let marked = sqlx::query(
            r#"
            UPDATE quotations
            SET status = 'used_for_conversion'
            WHERE id = $1
              AND query_id = $2
              AND status = 'draft'
            "#,
        )
        .bind(trip.quotation_id)
        .bind(trip.query_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if marked == 0 {
            let exists = sqlx::query_scalar::<_, String>(
                "SELECT status FROM quotations WHERE id = $1 AND query_id = $2",
            )
            .bind(trip.quotation_id)
            .bind(trip.query_id)
            .fetch_optional(&mut *tx)
            .await?;

            return Err(match exists {
                Some(_) => StorageError::AlreadyConverted {
                    query_id: trip.query_id,
                },
                None => StorageError::NotFound {
                    entity: "quotation",
                    id: trip.quotation_id,
                },
            });
        }

        sqlx::query("UPDATE queries SET converted_quotation_id = $2 WHERE id = $1")
            .bind(trip.query_id)
            .bind(trip.quotation_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO trips (id, query_id, quotation_id, comments, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(trip.id)
        .bind(trip.query_id)
        .bind(trip.quotation_id)
        .bind(&trip.comments)
        .bind(&trip.created_by)
        .bind(trip.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::AlreadyConverted {
                    query_id: trip.query_id,
                }
            } else {
                e.into()
            }
        })?;

        for instalment in &trip.instalments {
            sqlx::query(
                r#"
                INSERT INTO trip_instalments (trip_id, sequence, amount, due_date)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(trip.id)
            .bind(instalment.sequence)
            .bind(instalment.amount)
            .bind(instalment.due_date)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_trip(&self, query_id: Uuid) -> Result<Option<Trip>, StorageError> {
        let row = sqlx::query_as::<_, TripRow>(
            r#"
            SELECT id, query_id, quotation_id, comments, created_by, created_at
            FROM trips
            WHERE query_id = $1
            "#,
        )
        .bind(query_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let instalments = self.instalments_for(&[row.id]).await?;
        Ok(Some(row.with_instalments(&instalments)))
    }

    async fn list_trips(&self) -> Result<Vec<Trip>, StorageError> {
        let rows = sqlx::query_as::<_, TripRow>(
            r#"
            SELECT id, query_id, quotation_id, comments, created_by, created_at
            FROM trips
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let instalments = self.instalments_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| row.with_instalments(&instalments))
            .collect())
    }

    async fn insert_follow_up(&self, follow_up: &FollowUp) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO follow_ups (
                id, query_id, message, status, is_actionable,
                due_date, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(follow_up.id)
        .bind(follow_up.query_id)
        .bind(&follow_up.message)
        .bind(follow_up.status.as_str())
        .bind(follow_up.is_actionable)
        .bind(follow_up.due_date)
        .bind(&follow_up.created_by)
        .bind(follow_up.created_at)
        .bind(follow_up.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                StorageError::NotFound {
                    entity: "query",
                    id: follow_up.query_id,
                }
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    async fn list_follow_ups(&self, query_id: Uuid) -> Result<Vec<FollowUp>, StorageError> {
        let rows = sqlx::query_as::<_, FollowUpRow>(&format!(
            "SELECT {} FROM follow_ups WHERE query_id = $1 ORDER BY created_at DESC, id DESC",
            FOLLOW_UP_COLUMNS
        ))
        .bind(query_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FollowUp::try_from).collect()
    }

    async fn resolve_follow_up(
        &self,
        query_id: Uuid,
        follow_up_id: Uuid,
        resolved_at: DateTime<Utc>,
    ) -> Result<Option<FollowUp>, StorageError> {
        // Only the Not Solved -> Solved edge updates; a solved row is left as is.
        sqlx::query(
            r#"
            UPDATE follow_ups
            SET status = 'Solved', updated_at = $3
            WHERE id = $1
              AND query_id = $2
              AND status = 'Not Solved'
            "#,
        )
        .bind(follow_up_id)
        .bind(query_id)
        .bind(resolved_at)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, FollowUpRow>(&format!(
            "SELECT {} FROM follow_ups WHERE id = $1 AND query_id = $2",
            FOLLOW_UP_COLUMNS
        ))
        .bind(follow_up_id)
        .bind(query_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FollowUp::try_from).transpose()
    }
}
