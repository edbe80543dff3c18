//! Integration test: credential issuance, registration and revocation.

use std::sync::Arc;

use attest_core::{Categorized, ClaimValue, CredentialStatus, DidMethod, ErrorKind};
use attest_integration_tests::{adult_claims, Harness};
use chrono::{Duration, Utc};

#[tokio::test]
async fn test_issue_register_and_fetch() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;

    let credential = harness
        .issuer
        .issue(&issuer, &holder, "IdentityCredential", adult_claims(), None)
        .await
        .unwrap();
    harness.registry.issue(credential.clone()).await.unwrap();

    let stored = harness.registry.get(&credential.id).unwrap();
    assert_eq!(*stored, credential);
    assert_eq!(stored.claims.get("age"), Some(&ClaimValue::Integer(34)));
    assert_eq!(harness.registry.status(&credential.id), CredentialStatus::Valid);
}

#[tokio::test]
async fn test_credential_survives_json() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;

    let credential = harness
        .issuer
        .issue(&issuer, &holder, "IdentityCredential", adult_claims(), None)
        .await
        .unwrap();
    let json = serde_json::to_string(&credential).unwrap();
    let decoded = serde_json::from_str(&json).unwrap();

    harness.registry.issue(decoded).await.unwrap();
    assert!(harness.registry.status(&credential.id).is_valid());
}

#[tokio::test]
async fn test_issuer_resolved_through_fallback_backend() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;
    let credential = harness
        .issuer
        .issue(&issuer, &holder, "IdentityCredential", adult_claims(), None)
        .await
        .unwrap();

    harness.primary.down();
    harness.resolver.invalidate(&issuer);
    harness.registry.issue(credential).await.unwrap();
    assert!(harness.secondary.fetches() >= 1);
}

#[tokio::test]
async fn test_tampered_claim_is_rejected() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;
    let mut credential = harness
        .issuer
        .issue(&issuer, &holder, "IdentityCredential", adult_claims(), None)
        .await
        .unwrap();

    credential.claims.insert("age".into(), ClaimValue::Integer(17));
    // The claim no longer opens the committed root.
    let err = harness.registry.issue(credential.clone()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
    assert!(harness.registry.get(&credential.id).is_none());
}

#[tokio::test]
async fn test_zk_issued_credential_registers() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;
    let credential = harness
        .issuer
        .issue_zk(&issuer, &holder, "IdentityCredential", adult_claims(), None)
        .await
        .unwrap();

    harness.registry.issue(credential.clone()).await.unwrap();
    let err = harness.registry.issue(credential).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Duplicate);
}

#[tokio::test]
async fn test_revocation_is_monotonic() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;
    let credential = harness
        .issuer
        .issue(&issuer, &holder, "IdentityCredential", adult_claims(), None)
        .await
        .unwrap();
    harness.registry.issue(credential.clone()).await.unwrap();
    let before = Utc::now() - Duration::seconds(1);

    let first = harness.registry.revoke(&credential.id, "compromised").unwrap();
    assert!(first.is_new());
    let second = harness.registry.revoke(&credential.id, "again").unwrap();
    assert!(!second.is_new());
    assert_eq!(second.entry(), first.entry());
    assert_eq!(second.entry().reason, "compromised");

    match harness.registry.status(&credential.id) {
        CredentialStatus::Revoked(entry) => assert_eq!(&entry, first.entry()),
        other => panic!("expected revoked, got {:?}", other),
    }
    assert_eq!(harness.registry.status_at(&credential.id, before), CredentialStatus::Valid);
    assert_eq!(harness.registry.revocations().len(), 1);
}

#[tokio::test]
async fn test_concurrent_revocations_record_one_entry() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;
    let credential = harness
        .issuer
        .issue(&issuer, &holder, "IdentityCredential", adult_claims(), None)
        .await
        .unwrap();
    harness.registry.issue(credential.clone()).await.unwrap();

    let registry = Arc::clone(&harness.registry);
    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let id = credential.id.clone();
            tokio::spawn(async move { registry.revoke(&id, &format!("reason {}", i)).unwrap() })
        })
        .collect();
    let mut new_entries = 0;
    for task in tasks {
        if task.await.unwrap().is_new() {
            new_entries += 1;
        }
    }
    assert_eq!(new_entries, 1);
    assert_eq!(registry.revocations().len(), 1);
}

#[tokio::test]
async fn test_expired_credential_reports_expired() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;
    let credential = harness
        .issuer
        .issue(
            &issuer,
            &holder,
            "IdentityCredential",
            adult_claims(),
            Some(Utc::now() - Duration::minutes(1)),
        )
        .await
        .unwrap();
    harness.registry.issue(credential.clone()).await.unwrap();
    assert_eq!(harness.registry.status(&credential.id), CredentialStatus::Expired);

    harness.registry.revoke(&credential.id, "cleanup").unwrap();
    assert!(matches!(
        harness.registry.status(&credential.id),
        CredentialStatus::Revoked(_)
    ));
}
