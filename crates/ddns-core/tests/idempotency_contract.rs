//! Contract Test: Idempotent Upserts
//!
//! Constraints verified:
//! - Repeating a `set` with an unchanged address yields NoChange and
//!   issues no provider write
//! - The published record always equals the last accepted address
//! - Concurrent `set`s for one hostname converge on one of the addresses
//!
//! If this test fails, clients polling on a schedule will churn the zone.

mod common;

use common::*;
use ddns_core::traits::RecordType;
use ddns_core::{DnsMutator, MutateOutcome, UpdateStatus};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn repeated_set_reports_no_change() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    provider.publish(HOSTNAME, ip("203.0.113.9"));
    let service = service(&store, &provider);
    let request = query(Some("set"), Some(HOSTNAME), Some(SECRET));

    let first = service.handle(&request, &from("203.0.113.7")).await;
    let second = service.handle(&request, &from("203.0.113.7")).await;

    assert_eq!(first.status, UpdateStatus::Ok);
    assert_eq!(second.status, UpdateStatus::NoChange);
    assert_eq!(second.address, Some(ip("203.0.113.7")));
    assert_eq!(provider.upsert_call_count(), 1, "second call must not write");
    assert_eq!(provider.published(HOSTNAME, RecordType::A), Some(ip("203.0.113.7")));
}

#[tokio::test]
async fn mutator_upsert_twice_is_no_change() {
    let provider = MockDnsProvider::new();
    let mutator = DnsMutator::new(Arc::new(provider.clone()), 60, Duration::from_secs(5));

    let first = mutator.upsert(HOSTNAME, ip("203.0.113.7")).await.unwrap();
    let second = mutator.upsert(HOSTNAME, ip("203.0.113.7")).await.unwrap();

    assert_eq!(first, MutateOutcome::Updated { previous: None });
    assert_eq!(second, MutateOutcome::Unchanged);
    assert_eq!(provider.published(HOSTNAME, RecordType::A), Some(ip("203.0.113.7")));
}

#[tokio::test]
async fn address_change_is_written_over_existing_record() {
    let provider = MockDnsProvider::new();
    provider.publish(HOSTNAME, ip("203.0.113.9"));
    let mutator = DnsMutator::new(Arc::new(provider.clone()), 60, Duration::from_secs(5));

    let outcome = mutator.upsert(HOSTNAME, ip("203.0.113.7")).await.unwrap();

    assert_eq!(
        outcome,
        MutateOutcome::Updated {
            previous: Some(ip("203.0.113.9"))
        }
    );
    assert_eq!(provider.published(HOSTNAME, RecordType::A), Some(ip("203.0.113.7")));
}

#[tokio::test]
async fn concurrent_sets_converge_to_one_address() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    let service = Arc::new(service(&store, &provider));

    let callers = ["203.0.113.1", "203.0.113.2", "203.0.113.3", "203.0.113.4"];
    let handles: Vec<_> = callers
        .iter()
        .map(|caller| {
            let service = Arc::clone(&service);
            let meta = from(caller);
            tokio::spawn(async move {
                service
                    .handle(&query(Some("set"), Some(HOSTNAME), Some(SECRET)), &meta)
                    .await
            })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.status.is_success(), "got {:?}", result.status);
    }

    let published = provider
        .published(HOSTNAME, RecordType::A)
        .expect("a record was published");
    assert!(
        callers.iter().any(|caller| ip(caller) == published),
        "published {} is not one of the callers",
        published
    );
}
