//! Postgres store tests.
//!
//! Run against the database named by `TEST_DATABASE_URL`; each test returns
//! early when it is not set. Every test works on fresh ids, so runs can share
//! one database.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

use quote_ledger::ledger::models::{
    FollowUp, FollowUpStatus, Instalment, Query, Quotation, QuotationStatus, Trip,
};
use quote_ledger::ledger::{compute_summary, LineItem, PricingTerms};
use quote_ledger::store::{LedgerStore, PgStore, StorageError};

async fn test_store() -> Option<PgStore> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping Postgres store test");
        return None;
    };

    let store = PgStore::connect(&url, 5, Duration::from_secs(5))
        .await
        .expect("connect to TEST_DATABASE_URL");
    store.run_migrations().await.expect("run migrations");
    Some(store)
}

async fn insert_query(store: &PgStore) -> Query {
    let query = Query {
        id: Uuid::new_v4(),
        customer_name: "Meera Nair".to_string(),
        destination: "Goa".to_string(),
        travel_start: NaiveDate::from_ymd_opt(2025, 1, 10),
        travel_end: NaiveDate::from_ymd_opt(2025, 1, 13),
        adults: 2,
        children: 0,
        notes: None,
        created_by: "asha".to_string(),
        created_at: Utc::now(),
        converted_quotation_id: None,
    };
    store.insert_query(&query).await.unwrap();
    query
}

async fn insert_quotation(store: &PgStore, query_id: Uuid) -> Quotation {
    let terms = PricingTerms::default();
    let line_items = vec![LineItem::HotelStay {
        hotel: "Sea Breeze".to_string(),
        room_type: None,
        nights: 3,
        cost_price: dec!(2800),
        selling_price: dec!(3200),
    }];
    let summary = compute_summary(&line_items, &terms).unwrap();

    let quotation = Quotation {
        id: Uuid::new_v4(),
        query_id,
        created_by: "asha".to_string(),
        created_at: Utc::now(),
        status: QuotationStatus::Draft,
        terms,
        line_items,
        summary,
    };
    store.insert_quotation(&quotation).await.unwrap();
    quotation
}

fn trip_for(quotation: &Quotation) -> Trip {
    Trip {
        id: Uuid::new_v4(),
        query_id: quotation.query_id,
        quotation_id: quotation.id,
        comments: Some("Advance received".to_string()),
        instalments: vec![
            Instalment {
                sequence: 1,
                amount: dec!(5000),
                due_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            },
            Instalment {
                sequence: 2,
                amount: dec!(5080),
                due_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            },
        ],
        created_by: "asha".to_string(),
        created_at: Utc::now(),
    }
}

// ==================== conversion tests ====================

#[tokio::test]
async fn test_convert_marks_query_and_quotation() {
    let Some(store) = test_store().await else { return };
    let query = insert_query(&store).await;
    let quotation = insert_quotation(&store, query.id).await;

    store.convert(&trip_for(&quotation)).await.unwrap();

    let query = store.get_query(query.id).await.unwrap().unwrap();
    assert_eq!(query.converted_quotation_id, Some(quotation.id));

    let stored = store.get_quotation(quotation.id).await.unwrap().unwrap();
    assert!(stored.is_converted());

    let trip = store.get_trip(query.id).await.unwrap().unwrap();
    assert_eq!(trip.quotation_id, quotation.id);
    assert_eq!(trip.instalments.len(), 2);
    assert_eq!(trip.instalments[1].amount, dec!(5080));
}

#[tokio::test]
async fn test_second_conversion_of_query_conflicts() {
    let Some(store) = test_store().await else { return };
    let query = insert_query(&store).await;
    let first = insert_quotation(&store, query.id).await;
    let second = insert_quotation(&store, query.id).await;

    store.convert(&trip_for(&first)).await.unwrap();
    let err = store.convert(&trip_for(&second)).await.unwrap_err();

    assert!(matches!(err, StorageError::AlreadyConverted { query_id } if query_id == query.id));
    let second = store.get_quotation(second.id).await.unwrap().unwrap();
    assert_eq!(second.status, QuotationStatus::Draft);
}

#[tokio::test]
async fn test_concurrent_conversions_one_wins() {
    let Some(store) = test_store().await else { return };
    let store = Arc::new(store);
    let query = insert_query(&store).await;

    let mut quotations = Vec::new();
    for _ in 0..8 {
        quotations.push(insert_quotation(&store, query.id).await);
    }

    let handles: Vec<_> = quotations
        .iter()
        .map(|quotation| {
            let store = store.clone();
            let trip = trip_for(quotation);
            tokio::spawn(async move { store.convert(&trip).await })
        })
        .collect();

    let mut won = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => won += 1,
            Err(StorageError::AlreadyConverted { .. }) => {}
            Err(e) => panic!("unexpected storage error: {}", e),
        }
    }
    assert_eq!(won, 1);

    let converted = store
        .list_quotations(query.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|q| q.is_converted())
        .count();
    assert_eq!(converted, 1);
}

#[tokio::test]
async fn test_convert_quotation_of_other_query_is_not_found() {
    let Some(store) = test_store().await else { return };
    let query = insert_query(&store).await;
    let other = insert_query(&store).await;
    let foreign = insert_quotation(&store, other.id).await;

    let mut trip = trip_for(&foreign);
    trip.query_id = query.id;
    let err = store.convert(&trip).await.unwrap_err();

    assert!(matches!(err, StorageError::NotFound { entity: "quotation", .. }));
    let query = store.get_query(query.id).await.unwrap().unwrap();
    assert!(!query.is_converted());
    assert!(store.get_trip(query.id).await.unwrap().is_none());
}

// ==================== follow-up tests ====================

#[tokio::test]
async fn test_resolve_follow_up_twice_keeps_first_resolution() {
    let Some(store) = test_store().await else { return };
    let query = insert_query(&store).await;
    let follow_up = FollowUp::new(
        query.id,
        "Call back about the room upgrade".to_string(),
        true,
        None,
        "asha".to_string(),
        Utc::now(),
    );
    store.insert_follow_up(&follow_up).await.unwrap();

    let first = store
        .resolve_follow_up(query.id, follow_up.id, Utc::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, FollowUpStatus::Solved);

    let second = store
        .resolve_follow_up(query.id, follow_up.id, Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.status, FollowUpStatus::Solved);
    assert_eq!(second.updated_at, first.updated_at);
}

#[tokio::test]
async fn test_resolve_follow_up_of_other_query_is_none() {
    let Some(store) = test_store().await else { return };
    let query = insert_query(&store).await;
    let other = insert_query(&store).await;
    let follow_up = FollowUp::new(
        query.id,
        "Send visa checklist".to_string(),
        true,
        None,
        "asha".to_string(),
        Utc::now(),
    );
    store.insert_follow_up(&follow_up).await.unwrap();

    let resolved = store
        .resolve_follow_up(other.id, follow_up.id, Utc::now())
        .await
        .unwrap();
    assert!(resolved.is_none());
}
