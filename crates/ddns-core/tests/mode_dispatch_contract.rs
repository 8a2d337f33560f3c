//! Contract Test: Mode Dispatch
//!
//! Constraints verified:
//! - `get` reports the caller address and touches neither store nor zone
//! - `set` authenticates before any DNS access
//! - Missing or unknown modes are rejected before any I/O
//! - The written address is the transport-observed one, never a parameter
//!
//! If this test fails, requests are being routed down the wrong path.

mod common;

use common::*;
use ddns_core::traits::RecordType;
use ddns_core::{ConnectionMeta, UpdateStatus};

#[tokio::test]
async fn get_reports_caller_address_without_side_effects() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    let service = service(&store, &provider);

    let result = service
        .handle(&query(Some("get"), None, None), &from("203.0.113.7"))
        .await;

    assert_eq!(result.status, UpdateStatus::Ok);
    assert_eq!(result.address, Some(ip("203.0.113.7")));
    assert_eq!(store.get_call_count(), 0, "get must not read the secret store");
    assert_eq!(provider.read_call_count(), 0, "get must not read the zone");
    assert_eq!(provider.upsert_call_count(), 0, "get must not write the zone");
}

#[tokio::test]
async fn get_never_mutates_regardless_of_credentials() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    let service = service(&store, &provider);

    let test_cases = vec![
        (Some(HOSTNAME), Some(SECRET), "valid credential"),
        (Some(HOSTNAME), Some("wrong"), "wrong credential"),
        (Some("not a hostname!"), None, "garbage hostname"),
        (None, Some(SECRET), "credential without hostname"),
    ];

    for (hostname, hash, description) in test_cases {
        let result = service
            .handle(&query(Some("GET"), hostname, hash), &from("203.0.113.7"))
            .await;
        assert_eq!(result.status, UpdateStatus::Ok, "Failed: {}", description);
    }

    assert_eq!(provider.upsert_call_count(), 0);
    assert_eq!(store.get_call_count(), 0);
}

#[tokio::test]
async fn set_updates_changed_address() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    provider.publish(HOSTNAME, ip("203.0.113.9"));
    let service = service(&store, &provider);

    let result = service
        .handle(&query(Some("set"), Some(HOSTNAME), Some(SECRET)), &from("203.0.113.7"))
        .await;

    assert_eq!(result.status, UpdateStatus::Ok);
    assert_eq!(result.address, Some(ip("203.0.113.7")));
    assert_eq!(provider.published(HOSTNAME, RecordType::A), Some(ip("203.0.113.7")));
    assert_eq!(provider.published_ttl(HOSTNAME, RecordType::A), Some(60));
    assert_eq!(provider.upsert_call_count(), 1);
}

#[tokio::test]
async fn set_with_wrong_hash_leaves_zone_untouched() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    provider.publish(HOSTNAME, ip("203.0.113.9"));
    let service = service(&store, &provider);

    for hash in [Some("not-the-secret"), Some(""), None] {
        let result = service
            .handle(&query(Some("set"), Some(HOSTNAME), hash), &from("203.0.113.7"))
            .await;
        assert_eq!(result.status, UpdateStatus::Unauthorized, "hash {:?}", hash);
        assert_eq!(result.address, None);
    }

    assert_eq!(provider.read_call_count(), 0, "no DNS access before authentication");
    assert_eq!(provider.upsert_call_count(), 0);
    assert_eq!(provider.published(HOSTNAME, RecordType::A), Some(ip("203.0.113.9")));
}

#[tokio::test]
async fn invalid_or_missing_mode_is_rejected_without_lookup() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    let service = service(&store, &provider);

    for mode in [Some("invalid"), Some(""), Some("update"), None] {
        let result = service
            .handle(&query(mode, Some(HOSTNAME), Some(SECRET)), &from("203.0.113.7"))
            .await;
        assert_eq!(result.status, UpdateStatus::InvalidRequest, "mode {:?}", mode);
    }

    assert_eq!(store.get_call_count(), 0, "invalid mode must not read the secret store");
    assert_eq!(provider.read_call_count(), 0);
    assert_eq!(provider.upsert_call_count(), 0);
}

#[tokio::test]
async fn set_rejects_bad_hostnames_before_lookup() {
    let store = MockSecretStore::new();
    let provider = MockDnsProvider::new();
    let service = service(&store, &provider);

    for hostname in [None, Some(""), Some("../etc/passwd"), Some("-bad.fishare.de")] {
        let result = service
            .handle(&query(Some("set"), hostname, Some(SECRET)), &from("203.0.113.7"))
            .await;
        assert_eq!(result.status, UpdateStatus::InvalidRequest, "hostname {:?}", hostname);
    }

    assert_eq!(store.get_call_count(), 0);
}

#[tokio::test]
async fn set_outside_configured_zone_is_rejected() {
    let store = MockSecretStore::new();
    store.register("ddns.example.org", SECRET);
    let provider = MockDnsProvider::new();
    let config = ddns_core::ServiceConfig {
        zone_name: Some("fishare.de".to_string()),
        ..Default::default()
    };
    let service = service_with(config, &store, &provider);

    let result = service
        .handle(
            &query(Some("set"), Some("ddns.example.org"), Some(SECRET)),
            &from("203.0.113.7"),
        )
        .await;

    assert_eq!(result.status, UpdateStatus::InvalidRequest);
    assert_eq!(store.get_call_count(), 0);
}

#[tokio::test]
async fn hostname_is_normalized_before_lookup() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    let service = service(&store, &provider);

    let result = service
        .handle(
            &query(Some("set"), Some("DDNS.Fishare.DE."), Some(SECRET)),
            &from("203.0.113.7"),
        )
        .await;

    assert_eq!(result.status, UpdateStatus::Ok);
    assert_eq!(provider.published(HOSTNAME, RecordType::A), Some(ip("203.0.113.7")));
}

#[tokio::test]
async fn spoofed_forwarding_header_is_ignored_from_untrusted_peer() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    let service = service(&store, &provider);

    let meta = ConnectionMeta {
        peer: ip("203.0.113.7"),
        forwarded_for: Some("198.51.100.66".to_string()),
    };
    let result = service
        .handle(&query(Some("set"), Some(HOSTNAME), Some(SECRET)), &meta)
        .await;

    assert_eq!(result.status, UpdateStatus::Ok);
    assert_eq!(provider.published(HOSTNAME, RecordType::A), Some(ip("203.0.113.7")));
}

#[tokio::test]
async fn trusted_proxy_forwards_caller_address() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    let config = ddns_core::ServiceConfig {
        trusted_proxies: vec!["10.0.0.0/8".to_string()],
        ..Default::default()
    };
    let service = service_with(config, &store, &provider);

    let forwarded = ConnectionMeta {
        peer: ip("10.0.0.2"),
        forwarded_for: Some("203.0.113.7".to_string()),
    };
    let result = service
        .handle(&query(Some("set"), Some(HOSTNAME), Some(SECRET)), &forwarded)
        .await;
    assert_eq!(result.status, UpdateStatus::Ok);
    assert_eq!(provider.published(HOSTNAME, RecordType::A), Some(ip("203.0.113.7")));

    let headerless = ConnectionMeta::direct(ip("10.0.0.2"));
    let result = service.handle(&query(Some("get"), None, None), &headerless).await;
    assert_eq!(result.status, UpdateStatus::InvalidRequest);
}

#[tokio::test]
async fn ipv6_caller_updates_aaaa_record() {
    let store = MockSecretStore::new();
    store.register(HOSTNAME, SECRET);
    let provider = MockDnsProvider::new();
    provider.publish(HOSTNAME, ip("203.0.113.9"));
    let service = service(&store, &provider);

    let result = service
        .handle(&query(Some("set"), Some(HOSTNAME), Some(SECRET)), &from("2001:db8::7"))
        .await;

    assert_eq!(result.status, UpdateStatus::Ok);
    assert_eq!(provider.published(HOSTNAME, RecordType::Aaaa), Some(ip("2001:db8::7")));
    assert_eq!(
        provider.published(HOSTNAME, RecordType::A),
        Some(ip("203.0.113.9")),
        "A record is independent of AAAA"
    );
}
