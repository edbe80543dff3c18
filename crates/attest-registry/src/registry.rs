use std::sync::Arc;

use attest_core::{
    Credential, CredentialStatus, Proof, RevocationEntry, SignatureProof, ZkProof,
};
use attest_crypto::{verify_with_key_type, ClaimCommitmentSet};
use attest_proof::{inputs, CircuitKind, ProofEngine};
use attest_resolver::{DidDocument, DocumentResolver};
use attest_trust::{TrustAnchor, TrustError, TrustStore};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::error::RegistryError;
use crate::revocation::{RevocationLog, RevokeOutcome};

/// Policy knobs for [`CredentialRegistry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Reject issuers without a configured trust anchor.
    pub require_anchor: bool,
}

/// Records issued credentials and their revocations.
pub struct CredentialRegistry {
    resolver: Arc<dyn DocumentResolver>,
    trust: Arc<TrustStore>,
    engine: Arc<ProofEngine>,
    options: RegistryOptions,
    credentials: DashMap<String, Arc<Credential>>,
    revocations: RevocationLog,
}

impl CredentialRegistry {
    pub fn new(
        resolver: Arc<dyn DocumentResolver>,
        trust: Arc<TrustStore>,
        engine: Arc<ProofEngine>,
        options: RegistryOptions,
    ) -> Self {
        Self {
            resolver,
            trust,
            engine,
            options,
            credentials: DashMap::new(),
            revocations: RevocationLog::new(),
        }
    }

    /// Verify a credential and record it.
    pub async fn issue(&self, credential: Credential) -> Result<Arc<Credential>, RegistryError> {
        if self.credentials.contains_key(&credential.id) {
            return Err(RegistryError::Duplicate(credential.id));
        }

        let issuer = &credential.issuer;
        let document = self
            .resolver
            .resolve(issuer)
            .await
            .map_err(|e| RegistryError::unresolved_issuer(issuer, e))?;
        let anchor = self.anchor_for(&credential)?;

        check_commitments(&credential)?;
        match &credential.proof {
            Proof::Signature(proof) => {
                self.check_signature(&credential, proof, &document, anchor.as_ref())?
            }
            Proof::Zk(proof) => {
                self.check_zk_proof(&credential, proof)?;
                let signature = proof.issuer_signature.as_ref().ok_or_else(|| {
                    RegistryError::InvalidSignature(format!(
                        "zero-knowledge proof of {} carries no issuer signature",
                        credential.id
                    ))
                })?;
                self.check_signature(&credential, signature, &document, anchor.as_ref())?
            }
        }

        let credential = Arc::new(credential);
        match self.credentials.entry(credential.id.clone()) {
            Entry::Occupied(_) => return Err(RegistryError::Duplicate(credential.id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&credential));
            }
        }

        tracing::info!(
            issuer = %credential.issuer,
            subject = %credential.subject,
            credential_id = %credential.id,
            proof = credential.proof.type_name(),
            anchored = anchor.is_some(),
            "credential recorded"
        );
        Ok(credential)
    }

    fn anchor_for(&self, credential: &Credential) -> Result<Option<TrustAnchor>, RegistryError> {
        match self.trust.trust_anchor(&credential.issuer) {
            Ok(anchor) => Ok(Some(anchor)),
            Err(TrustError::Untrusted(did)) if !self.options.require_anchor => {
                tracing::debug!(issuer = %did, "no trust anchor, using DID document keys");
                Ok(None)
            }
            Err(e @ (TrustError::Untrusted(_) | TrustError::AnchorNotValid { .. })) => {
                Err(RegistryError::InvalidIssuer(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn check_signature(
        &self,
        credential: &Credential,
        proof: &SignatureProof,
        document: &DidDocument,
        anchor: Option<&TrustAnchor>,
    ) -> Result<(), RegistryError> {
        let (key_type, public_key) = match anchor {
            Some(anchor) => (anchor.key_type, anchor.public_key()?),
            None => {
                let vm = document
                    .verification_method(&proof.verification_method)
                    .filter(|vm| vm.controller == credential.issuer)
                    .ok_or_else(|| {
                        RegistryError::InvalidSignature(format!(
                            "{} is not a verification method of {}",
                            proof.verification_method, credential.issuer
                        ))
                    })?;
                let key_type = vm.key_type().ok_or_else(|| {
                    RegistryError::InvalidSignature(format!("unknown key type {}", vm.method_type))
                })?;
                let public_key = vm
                    .public_key()
                    .map_err(|e| RegistryError::InvalidSignature(e.to_string()))?;
                (key_type, public_key)
            }
        };

        if proof.algorithm != key_type {
            return Err(RegistryError::InvalidSignature(format!(
                "signed with {} but the issuer key is {}",
                proof.algorithm, key_type
            )));
        }
        verify_with_key_type(
            key_type,
            &public_key,
            &credential.signing_payload()?,
            &proof.signature_value,
        )
        .map_err(|e| RegistryError::InvalidSignature(e.to_string()))
    }

    fn check_zk_proof(&self, credential: &Credential, proof: &ZkProof) -> Result<(), RegistryError> {
        let is_commitment_circuit = self
            .engine
            .circuits()
            .get(&proof.circuit_id)
            .is_some_and(|c| c.kind == CircuitKind::ClaimCommitment);
        if !is_commitment_circuit {
            return Err(RegistryError::InvalidSignature(format!(
                "{} does not prove claim commitments",
                proof.circuit_id
            )));
        }

        let stated = &proof.public_inputs;
        let binds_credential = stated.get_str(inputs::CLAIM_ROOT) == Some(credential.claim_commitments.root.as_str())
            && stated.get_str(inputs::ISSUER) == Some(credential.issuer.as_str())
            && stated.get_str(inputs::CREDENTIAL_ID) == Some(credential.id.as_str());
        if !binds_credential || !self.engine.verify(proof, stated) {
            return Err(RegistryError::InvalidSignature(format!(
                "zero-knowledge proof does not verify for {}",
                credential.id
            )));
        }
        Ok(())
    }

    /// Revoke a recorded credential. Revoking twice returns the first entry.
    pub fn revoke(&self, credential_id: &str, reason: &str) -> Result<RevokeOutcome, RegistryError> {
        if !self.credentials.contains_key(credential_id) {
            return Err(RegistryError::NotFound(credential_id.to_string()));
        }
        let outcome = self.revocations.revoke(credential_id, reason, Utc::now());
        if outcome.is_new() {
            tracing::info!(credential_id, reason, "credential revoked");
        } else {
            tracing::debug!(credential_id, "credential already revoked");
        }
        Ok(outcome)
    }

    /// Current status. A revoked credential stays revoked.
    pub fn status(&self, credential_id: &str) -> CredentialStatus {
        self.evaluate(credential_id, Utc::now(), true)
    }

    /// Status as of `at`; revocations recorded after `at` are ignored.
    pub fn status_at(&self, credential_id: &str, at: DateTime<Utc>) -> CredentialStatus {
        self.evaluate(credential_id, at, false)
    }

    fn evaluate(&self, credential_id: &str, at: DateTime<Utc>, sticky: bool) -> CredentialStatus {
        let Some(credential) = self.get(credential_id) else {
            return CredentialStatus::Unknown;
        };
        if let Some(entry) = self.revocations.get(credential_id) {
            if sticky || entry.revoked_at <= at {
                return CredentialStatus::Revoked(entry);
            }
        }
        if credential.is_expired_at(at) {
            return CredentialStatus::Expired;
        }
        CredentialStatus::Valid
    }

    /// A registered credential.
    pub fn get(&self, credential_id: &str) -> Option<Arc<Credential>> {
        self.credentials.get(credential_id).map(|c| Arc::clone(&c))
    }

    /// Every revocation in the order it was recorded.
    pub fn revocations(&self) -> Vec<RevocationEntry> {
        self.revocations.entries()
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}

fn check_commitments(credential: &Credential) -> Result<(), RegistryError> {
    let commitments = &credential.claim_commitments;
    let seed: [u8; 32] = hex::decode(&commitments.salt_seed)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| RegistryError::CommitmentMismatch("salt seed must be 32 hex bytes".into()))?;
    let root = ClaimCommitmentSet::new(&seed, &credential.claims).root();
    if hex::encode(root) != commitments.root {
        return Err(RegistryError::CommitmentMismatch(credential.id.clone()));
    }
    Ok(())
}
