//! Contract Test: Failure Isolation
//!
//! Constraints verified:
//! - Provider and store failures surface as ProviderError immediately
//! - Nothing is retried inside a request
//! - A slow provider is cut off by the request deadline
//! - A failed request leaves the service usable for the next one
//!
//! If this test fails, a misbehaving dependency can stall or poison requests.

mod common;

use common::*;
use ddns_core::{ServiceConfig, UpdateStatus};
use std::time::Duration;

#[tokio::test]
async fn provider_rejection_is_provider_error_without_retry() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::with_behavior(Behavior::Failing);
    let service = service(&store, &provider);

    let result = service
        .handle(&query(Some("set"), Some(HOSTNAME), Some(SECRET)), &from("203.0.113.7"))
        .await;

    assert_eq!(result.status, UpdateStatus::ProviderError);
    assert_eq!(result.address, None);
    assert_eq!(provider.read_call_count(), 1, "exactly one attempt, no retry");
    assert_eq!(provider.upsert_call_count(), 0);
}

#[tokio::test]
async fn secret_store_failure_is_provider_error() {
    let store = MockSecretStore::failing();
    let provider = MockDnsProvider::new();
    let service = service(&store, &provider);

    let result = service
        .handle(&query(Some("set"), Some(HOSTNAME), Some(SECRET)), &from("203.0.113.7"))
        .await;

    assert_eq!(result.status, UpdateStatus::ProviderError);
    assert_eq!(store.get_call_count(), 1);
    assert_eq!(provider.read_call_count(), 0, "no DNS access without authentication");
}

#[tokio::test(start_paused = true)]
async fn slow_provider_is_bounded_by_deadline() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::with_behavior(Behavior::Slow(Duration::from_secs(120)));
    let config = ServiceConfig {
        provider_timeout_secs: 2,
        ..Default::default()
    };
    let service = service_with(config, &store, &provider);

    let started = tokio::time::Instant::now();
    let result = service
        .handle(&query(Some("set"), Some(HOSTNAME), Some(SECRET)), &from("203.0.113.7"))
        .await;

    assert_eq!(result.status, UpdateStatus::ProviderError);
    assert!(started.elapsed() < Duration::from_secs(3), "deadline not enforced");
    assert_eq!(provider.upsert_call_count(), 0);
}

#[tokio::test]
async fn failure_does_not_affect_following_requests() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    let service = service(&store, &provider);

    let bad = service
        .handle(&query(Some("set"), Some(HOSTNAME), Some("wrong")), &from("203.0.113.7"))
        .await;
    let invalid = service
        .handle(&query(Some("bogus"), None, None), &from("203.0.113.7"))
        .await;
    let good = service
        .handle(&query(Some("set"), Some(HOSTNAME), Some(SECRET)), &from("203.0.113.7"))
        .await;

    assert_eq!(bad.status, UpdateStatus::Unauthorized);
    assert_eq!(invalid.status, UpdateStatus::InvalidRequest);
    assert_eq!(good.status, UpdateStatus::Ok);
}
