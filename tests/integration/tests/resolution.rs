//! Integration test: DID resolution across prioritized backends.

use std::time::Duration;

use attest_core::{Categorized, Did, DidMethod, ErrorKind};
use attest_integration_tests::Harness;
use attest_resolver::{DocumentMutation, ResolveError, ServiceEndpoint};
use futures::future::{join_all, AbortHandle};

#[tokio::test]
async fn test_falls_back_when_primary_is_down() {
    let harness = Harness::new();
    let did = harness.did(DidMethod::Ledger).await;

    harness.primary.down();
    harness.resolver.invalidate(&did);
    let document = harness.resolver.resolve(&did).await.unwrap();

    assert_eq!(document.id, did);
    assert!(harness.primary.fetches() >= 1);
    assert_eq!(harness.secondary.fetches(), 1);
}

#[tokio::test]
async fn test_all_backends_down_is_unavailable() {
    let harness = Harness::new();
    let did = harness.did(DidMethod::Ledger).await;

    harness.primary.down();
    harness.secondary.down();
    harness.resolver.invalidate(&did);
    let err = harness.resolver.resolve(&did).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
    // The transient failure is retried once before giving up.
    assert_eq!(harness.resolver.stats().fetches, 2);
}

#[tokio::test]
async fn test_unknown_did_is_not_found() {
    let harness = Harness::new();
    let did = Did::parse("did:ledger:zUnknown").unwrap();
    let err = harness.resolver.resolve(&did).await.unwrap_err();
    assert!(matches!(err, ResolveError::NotFound(_)));
}

#[tokio::test]
async fn test_concurrent_resolutions_share_one_fetch() {
    let harness = Harness::new();
    let did = harness.did(DidMethod::Ledger).await;
    harness.resolver.invalidate(&did);
    harness.primary.slow();
    let before = harness.primary.fetches();

    let results = join_all((0..16).map(|_| harness.resolver.resolve(&did))).await;

    assert!(results.iter().all(|r| r.as_ref().map(|d| d.id == did).unwrap_or(false)));
    assert_eq!(harness.primary.fetches() - before, 1);
    assert_eq!(harness.resolver.stats().coalesced, 15);
}

#[tokio::test]
async fn test_cached_document_skips_backends() {
    let harness = Harness::new();
    let did = harness.did(DidMethod::Ledger).await;
    harness.primary.down();
    harness.secondary.down();

    // Freshly created documents are cached by the registrar.
    let document = harness.resolver.resolve(&did).await.unwrap();
    assert_eq!(document.version, 1);
    assert_eq!(harness.resolver.stats().cache_hits, 1);
}

#[tokio::test]
async fn test_slow_primary_times_out_and_falls_back() {
    let harness = Harness::with_delay(Duration::from_secs(5));
    let did = harness.did(DidMethod::Ledger).await;
    harness.resolver.invalidate(&did);
    harness.primary.slow();

    let document = harness.resolver.resolve(&did).await.unwrap();
    assert_eq!(document.id, did);
    assert_eq!(harness.secondary.fetches(), 1);
}

#[tokio::test]
async fn test_caller_timeout_and_cancellation() {
    let harness = Harness::with_delay(Duration::from_secs(5));
    let did = harness.did(DidMethod::Ledger).await;
    harness.resolver.invalidate(&did);
    harness.primary.slow();
    harness.secondary.slow();

    let err = harness
        .resolver
        .resolve_with_timeout(&did, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);

    let (handle, registration) = AbortHandle::new_pair();
    handle.abort();
    let err = harness.resolver.resolve_abortable(&did, registration).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_updates_are_visible_after_invalidation() {
    let harness = Harness::new();
    let did = harness.did(DidMethod::Ledger).await;

    harness
        .registrar
        .update(
            &did,
            DocumentMutation::AddService(ServiceEndpoint {
                id: format!("{}#hub", did),
                service_type: "CredentialHub".into(),
                service_endpoint: "https://hub.example.com".into(),
            }),
        )
        .await
        .unwrap();
    harness.resolver.invalidate(&did);

    let document = harness.resolver.resolve(&did).await.unwrap();
    assert_eq!(document.version, 2);
    assert_eq!(document.services[0].service_type, "CredentialHub");
}

#[tokio::test]
async fn test_key_and_web_methods() {
    let harness = Harness::new();

    let key = harness.did(DidMethod::Key).await;
    let document = harness.resolver.resolve(&key).await.unwrap();
    assert_eq!(document.id, key);

    let web = harness.did(DidMethod::Web).await;
    assert!(web.as_str().starts_with("did:web:example.com:"));
    harness.resolver.invalidate(&web);
    assert_eq!(harness.resolver.resolve(&web).await.unwrap().id, web);

    let unknown = Did::parse("did:example:123").unwrap();
    let err = harness.resolver.resolve(&unknown).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MethodUnsupported);
}
