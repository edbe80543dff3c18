use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::proof::{Proof, ZkProof};
use crate::types::{Claims, Did};

/// Commitments binding a credential's claims.
///
/// `root` is the Merkle root over per-claim salted commitments; `salt_seed`
/// lets the holder re-derive every claim salt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCommitments {
    pub root: String,
    pub salt_seed: String,
}

/// A verifiable credential. Immutable once issued; reissue under a new id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// `urn:uuid:<v7>`.
    pub id: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub issuer: Did,
    pub subject: Did,
    pub claims: Claims,
    pub issued_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub claim_commitments: ClaimCommitments,
    pub proof: Proof,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialBody<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    credential_type: &'a str,
    issuer: &'a Did,
    subject: &'a Did,
    claims: &'a Claims,
    issued_at: &'a DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<&'a DateTime<Utc>>,
    claim_commitments: &'a ClaimCommitments,
}

impl Credential {
    /// Fresh credential identifier.
    pub fn new_id() -> String {
        format!("urn:uuid:{}", uuid::Uuid::now_v7())
    }

    /// Canonical bytes covered by the credential's proof: every field except `proof`.
    pub fn signing_payload(&self) -> Result<Vec<u8>, CoreError> {
        signing_payload_for(
            &self.id,
            &self.credential_type,
            &self.issuer,
            &self.subject,
            &self.claims,
            &self.issued_at,
            &self.expires_at,
            &self.claim_commitments,
        )
    }

    /// Whether the credential has expired as of `at`.
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| at >= exp)
    }
}

/// Signing payload for a credential that has not been assembled yet.
#[allow(clippy::too_many_arguments)]
pub fn signing_payload_for(
    id: &str,
    credential_type: &str,
    issuer: &Did,
    subject: &Did,
    claims: &Claims,
    issued_at: &DateTime<Utc>,
    expires_at: &Option<DateTime<Utc>>,
    claim_commitments: &ClaimCommitments,
) -> Result<Vec<u8>, CoreError> {
    let body = CredentialBody {
        id,
        credential_type,
        issuer,
        subject,
        claims,
        issued_at,
        expires_at: expires_at.as_ref(),
        claim_commitments,
    };
    Ok(serde_json::to_vec(&body)?)
}

/// Append-only record that a credential was revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationEntry {
    pub credential_id: String,
    pub revoked_at: DateTime<Utc>,
    pub reason: String,
}

/// Live status of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum CredentialStatus {
    Valid,
    Revoked(RevocationEntry),
    Expired,
    Unknown,
}

impl CredentialStatus {
    /// Only `Valid` is usable.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

impl fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "Valid"),
            Self::Revoked(entry) => write!(f, "Revoked ({})", entry.reason),
            Self::Expired => write!(f, "Expired"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Holder-built bundle exposing a subset of a credential's claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub credential_id: String,
    pub issuer: Did,
    pub disclosed_claims: Claims,
    pub proof: ZkProof,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub predicate_proofs: Vec<ZkProof>,
    pub challenge: String,
    pub audience: Did,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proof::SignatureProof;
    use crate::types::{ClaimValue, KeyType};

    fn sample_credential() -> Credential {
        let mut claims = Claims::new();
        claims.insert("age".into(), ClaimValue::Integer(34));
        claims.insert("country".into(), ClaimValue::from("US"));
        Credential {
            id: Credential::new_id(),
            credential_type: "IdentityCredential".into(),
            issuer: Did::parse("did:ledger:issuer").unwrap(),
            subject: Did::parse("did:key:z6Mkholder").unwrap(),
            claims,
            issued_at: Utc::now(),
            expires_at: None,
            claim_commitments: ClaimCommitments {
                root: "00".repeat(32),
                salt_seed: "11".repeat(32),
            },
            proof: Proof::Signature(SignatureProof {
                algorithm: KeyType::Ed25519,
                verification_method: "did:ledger:issuer#key-1".into(),
                signature_value: vec![0u8; 64],
            }),
        }
    }

    #[test]
    fn test_new_id_is_urn_uuid() {
        let id = Credential::new_id();
        assert!(id.starts_with("urn:uuid:"));
        assert_ne!(id, Credential::new_id());
    }

    #[test]
    fn test_signing_payload_excludes_proof() {
        let mut cred = sample_credential();
        let before = cred.signing_payload().unwrap();
        cred.proof = Proof::Signature(SignatureProof {
            algorithm: KeyType::Secp256k1,
            verification_method: "other".into(),
            signature_value: vec![9u8; 64],
        });
        assert_eq!(before, cred.signing_payload().unwrap());
    }

    #[test]
    fn test_signing_payload_covers_claims() {
        let mut cred = sample_credential();
        let before = cred.signing_payload().unwrap();
        cred.claims.insert("age".into(), ClaimValue::Integer(35));
        assert_ne!(before, cred.signing_payload().unwrap());
    }

    #[test]
    fn test_expiry() {
        let mut cred = sample_credential();
        let now = Utc::now();
        assert!(!cred.is_expired_at(now));
        cred.expires_at = Some(now - chrono::Duration::seconds(1));
        assert!(cred.is_expired_at(now));
    }

    #[test]
    fn test_credential_json_roundtrip() {
        let cred = sample_credential();
        let json = serde_json::to_string(&cred).unwrap();
        assert!(json.contains("\"type\":\"IdentityCredential\""));
        assert!(json.contains("\"claimCommitments\""));
        let decoded: Credential = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, cred);
    }

    #[test]
    fn test_status_wire_format() {
        let status = CredentialStatus::Revoked(RevocationEntry {
            credential_id: "urn:uuid:1".into(),
            revoked_at: Utc::now(),
            reason: "compromised".into(),
        });
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "revoked");
        assert_eq!(json["reason"], "compromised");
        assert!(!status.is_valid());
        assert!(CredentialStatus::Valid.is_valid());
    }
}
