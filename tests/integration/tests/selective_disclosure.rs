//! Integration test: selective disclosure from issuance to verification,
//! driven both through the identity service and through the crates directly.

use attest_core::{Categorized, ClaimValue, DidMethod, ErrorKind, KeyType};
use attest_disclosure::{DisclosureRequest, RejectionReason, VerificationState};
use attest_integration_tests::{adult_claims, Harness};
use attest_proof::Predicate;
use attest_service::{AttestConfig, IdentityService};

#[tokio::test]
async fn test_service_discloses_country_and_proves_age() {
    let service = IdentityService::new(&AttestConfig::default()).unwrap();
    let issuer = service.create_did(&DidMethod::Ledger, KeyType::Ed25519).await.unwrap().id;
    let holder = service.create_did(&DidMethod::Key, KeyType::Ed25519).await.unwrap().id;
    let verifier = service.create_did(&DidMethod::Web, KeyType::Secp256k1).await.unwrap().id;

    let credential = service.issue_credential(&issuer, &holder, adult_claims(), None).await.unwrap();
    let required = [Predicate::at_least("age", 21)];
    let presentation = service
        .build_presentation(&credential.id, &["country"], required.to_vec(), "nonce-7", &verifier)
        .await
        .unwrap();

    let json = serde_json::to_value(&presentation).unwrap();
    assert_eq!(json["disclosedClaims"]["country"], "US");
    assert!(json["disclosedClaims"].get("age").is_none());

    let report = service
        .verify_presentation_requiring(&presentation, "nonce-7", &verifier, &required)
        .await
        .unwrap();
    assert!(report.is_accepted(), "{:?}", report);
    assert_eq!(report.stages.last(), Some(&VerificationState::Accepted));
}

#[tokio::test]
async fn test_presentation_survives_transport() {
    let service = IdentityService::new(&AttestConfig::default()).unwrap();
    let issuer = service.create_did(&DidMethod::Ledger, KeyType::Secp256k1).await.unwrap().id;
    let holder = service.create_did(&DidMethod::Key, KeyType::Ed25519).await.unwrap().id;
    let credential = service.issue_credential(&issuer, &holder, adult_claims(), None).await.unwrap();

    let presentation = service
        .build_presentation(
            &credential.id,
            &[],
            vec![Predicate::member_of("country", ["CA", "US"])],
            "nonce-8",
            &holder,
        )
        .await
        .unwrap();
    let wire = serde_json::to_string(&presentation).unwrap();
    let received = serde_json::from_str(&wire).unwrap();

    let report = service
        .verify_presentation_requiring(
            &received,
            "nonce-8",
            &holder,
            &[Predicate::member_of("country", ["US", "CA"])],
        )
        .await
        .unwrap();
    assert!(report.is_accepted(), "{:?}", report);
}

#[tokio::test]
async fn test_tampered_disclosure_rejected() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;
    let verifier = harness.did(DidMethod::Web).await;
    let credential = harness
        .issuer
        .issue(&issuer, &holder, "IdentityCredential", adult_claims(), None)
        .await
        .unwrap();
    harness.registry.issue(credential.clone()).await.unwrap();

    let request = DisclosureRequest::new().disclose("country");
    let mut presentation = harness
        .disclosure
        .build_presentation(&credential, &request, "nonce-1", &verifier)
        .await
        .unwrap();
    presentation
        .disclosed_claims
        .insert("country".into(), ClaimValue::String("CA".into()));

    let report = harness
        .disclosure
        .verify_presentation(&presentation, "nonce-1", &verifier)
        .await
        .unwrap();
    assert_eq!(report.rejection().map(|r| r.kind()), Some(ErrorKind::ProofRejected));
    assert!(!report.stages.contains(&VerificationState::ProofVerified));
}

#[tokio::test]
async fn test_replay_to_other_verifier_rejected() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;
    let verifier = harness.did(DidMethod::Web).await;
    let other = harness.did(DidMethod::Web).await;
    let credential = harness
        .issuer
        .issue(&issuer, &holder, "IdentityCredential", adult_claims(), None)
        .await
        .unwrap();
    harness.registry.issue(credential.clone()).await.unwrap();

    let request = DisclosureRequest::new().prove(Predicate::at_least("age", 18));
    let presentation = harness
        .disclosure
        .build_presentation(&credential, &request, "nonce-1", &verifier)
        .await
        .unwrap();

    let report = harness
        .disclosure
        .verify_presentation(&presentation, "nonce-1", &other)
        .await
        .unwrap();
    assert_eq!(report.rejection(), Some(&RejectionReason::AudienceMismatch));

    // Rewriting the audience breaks the proof binding.
    let mut forwarded = presentation.clone();
    forwarded.audience = other.clone();
    let report = harness
        .disclosure
        .verify_presentation(&forwarded, "nonce-1", &other)
        .await
        .unwrap();
    assert_eq!(report.rejection().map(|r| r.kind()), Some(ErrorKind::ProofRejected));
}

#[tokio::test]
async fn test_revocation_after_presentation() {
    let harness = Harness::new();
    let issuer = harness.did(DidMethod::Ledger).await;
    let holder = harness.did(DidMethod::Key).await;
    let verifier = harness.did(DidMethod::Web).await;
    let credential = harness
        .issuer
        .issue(&issuer, &holder, "IdentityCredential", adult_claims(), None)
        .await
        .unwrap();
    harness.registry.issue(credential.clone()).await.unwrap();

    let request = DisclosureRequest::new().disclose("country");
    let presentation = harness
        .disclosure
        .build_presentation(&credential, &request, "nonce-1", &verifier)
        .await
        .unwrap();
    let report = harness
        .disclosure
        .verify_presentation(&presentation, "nonce-1", &verifier)
        .await
        .unwrap();
    assert!(report.is_accepted());

    harness.registry.revoke(&credential.id, "key compromise").unwrap();
    let report = harness
        .disclosure
        .verify_presentation(&presentation, "nonce-1", &verifier)
        .await
        .unwrap();
    assert_eq!(report.rejection().map(|r| r.kind()), Some(ErrorKind::CredentialNotValid));
    assert_eq!(
        report.stages,
        vec![
            VerificationState::Received,
            VerificationState::ChallengeChecked,
            VerificationState::Rejected,
        ]
    );
}

#[tokio::test]
async fn test_predicate_the_holder_cannot_meet() {
    let service = IdentityService::new(&AttestConfig::default()).unwrap();
    let issuer = service.create_did(&DidMethod::Ledger, KeyType::Ed25519).await.unwrap().id;
    let holder = service.create_did(&DidMethod::Key, KeyType::Ed25519).await.unwrap().id;
    let credential = service.issue_credential(&issuer, &holder, adult_claims(), None).await.unwrap();

    let err = service
        .build_presentation(&credential.id, &[], vec![Predicate::at_most("age", 30)], "n", &holder)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ConstraintViolation);
}

#[tokio::test]
async fn test_accepted_presentation_cannot_be_replayed() {
    let service = IdentityService::new(&AttestConfig::default()).unwrap();
    let issuer = service.create_did(&DidMethod::Ledger, KeyType::Ed25519).await.unwrap().id;
    let holder = service.create_did(&DidMethod::Key, KeyType::Ed25519).await.unwrap().id;
    let verifier = service.create_did(&DidMethod::Web, KeyType::Ed25519).await.unwrap().id;
    let credential = service.issue_credential(&issuer, &holder, adult_claims(), None).await.unwrap();

    let presentation = service
        .build_presentation(&credential.id, &["country"], vec![], "session-1", &verifier)
        .await
        .unwrap();
    let report = service.verify_presentation(&presentation, "session-1", &verifier).await.unwrap();
    assert!(report.is_accepted());

    let report = service.verify_presentation(&presentation, "session-2", &verifier).await.unwrap();
    assert_eq!(report.rejection(), Some(&RejectionReason::ChallengeMismatch));
}
