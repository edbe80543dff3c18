use std::sync::Arc;

use attest_core::{
    signing_payload_for, ClaimCommitments, Claims, Credential, Did, KeyType, Proof, PublicInputs,
    SignatureProof,
};
use attest_crypto::ClaimCommitmentSet;
use attest_proof::{inputs, ProofEngine, ProofError, Witness};
use attest_resolver::{DidDocument, DocumentResolver, VerificationMethod};
use attest_trust::{KeyId, KeyStore};
use chrono::{DateTime, Utc};
use zeroize::Zeroize;

use crate::error::RegistryError;

/// Builds, commits and signs credentials for DIDs whose keys are held locally.
pub struct CredentialIssuer {
    keys: Arc<KeyStore>,
    resolver: Arc<dyn DocumentResolver>,
    engine: Arc<ProofEngine>,
}

struct Draft {
    id: String,
    issued_at: DateTime<Utc>,
    commitments: ClaimCommitmentSet,
    claim_commitments: ClaimCommitments,
}

impl CredentialIssuer {
    pub fn new(keys: Arc<KeyStore>, resolver: Arc<dyn DocumentResolver>, engine: Arc<ProofEngine>) -> Self {
        Self {
            keys,
            resolver,
            engine,
        }
    }

    /// Issue a credential signed by the issuer's verification method.
    pub async fn issue(
        &self,
        issuer: &Did,
        subject: &Did,
        credential_type: &str,
        claims: Claims,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Credential, RegistryError> {
        let key_id = self.keys.signing_key_for(issuer)?;
        let document = self.resolve_issuer(issuer).await?;
        let (vm, algorithm) = self.controlling_method(&document, key_id)?;
        let draft = draft(&claims);

        let payload = signing_payload_for(
            &draft.id,
            credential_type,
            issuer,
            subject,
            &claims,
            &draft.issued_at,
            &expires_at,
            &draft.claim_commitments,
        )?;
        let signature_value = self.keys.sign(key_id, &payload)?;

        tracing::info!(
            issuer = %issuer,
            subject = %subject,
            credential_id = %draft.id,
            "credential issued"
        );
        Ok(Credential {
            id: draft.id,
            credential_type: credential_type.to_string(),
            issuer: issuer.clone(),
            subject: subject.clone(),
            claims,
            issued_at: draft.issued_at,
            expires_at,
            claim_commitments: draft.claim_commitments,
            proof: Proof::Signature(SignatureProof {
                algorithm,
                verification_method: vm.id.clone(),
                signature_value,
            }),
        })
    }

    /// Issue a credential whose proof is a claim-commitment circuit proof.
    pub async fn issue_zk(
        &self,
        issuer: &Did,
        subject: &Did,
        credential_type: &str,
        claims: Claims,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Credential, RegistryError> {
        let key_id = self.keys.signing_key_for(issuer)?;
        let document = self.resolve_issuer(issuer).await?;
        let (vm, algorithm) = self.controlling_method(&document, key_id)?;
        let draft = draft(&claims);

        let circuit = self
            .engine
            .circuits()
            .commitment()
            .ok_or_else(|| RegistryError::Proof(ProofError::Internal("no claim-commitment circuit loaded".into())))?;
        let public_inputs = PublicInputs::new()
            .with(inputs::CLAIM_ROOT, draft.claim_commitments.root.clone())
            .with(inputs::ISSUER, issuer.as_str())
            .with(inputs::CREDENTIAL_ID, draft.id.as_str());
        let witness = Witness::full(&claims, &draft.commitments);
        let mut proof = self.engine.generate_proof(&circuit.id, &witness, &public_inputs)?;

        // The circuit key belongs to the engine, so the issuer signs as well.
        let payload = signing_payload_for(
            &draft.id,
            credential_type,
            issuer,
            subject,
            &claims,
            &draft.issued_at,
            &expires_at,
            &draft.claim_commitments,
        )?;
        proof.issuer_signature = Some(SignatureProof {
            algorithm,
            verification_method: vm.id.clone(),
            signature_value: self.keys.sign(key_id, &payload)?,
        });

        tracing::info!(
            issuer = %issuer,
            subject = %subject,
            credential_id = %draft.id,
            circuit = %circuit.id,
            "credential issued with zero-knowledge proof"
        );
        Ok(Credential {
            id: draft.id,
            credential_type: credential_type.to_string(),
            issuer: issuer.clone(),
            subject: subject.clone(),
            claims,
            issued_at: draft.issued_at,
            expires_at,
            claim_commitments: draft.claim_commitments,
            proof: Proof::Zk(proof),
        })
    }

    async fn resolve_issuer(&self, issuer: &Did) -> Result<Arc<DidDocument>, RegistryError> {
        self.resolver
            .resolve(issuer)
            .await
            .map_err(|e| RegistryError::unresolved_issuer(issuer, e))
    }

    /// The verification method carrying the key behind `key_id`.
    fn controlling_method<'a>(
        &self,
        document: &'a DidDocument,
        key_id: KeyId,
    ) -> Result<(&'a VerificationMethod, KeyType), RegistryError> {
        let public_key = self.keys.public_key(key_id)?;
        document
            .verification_methods
            .iter()
            .filter(|vm| vm.public_key().ok().as_deref() == Some(public_key.as_slice()))
            .find_map(|vm| vm.key_type().filter(KeyType::can_sign).map(|kt| (vm, kt)))
            .ok_or_else(|| {
                RegistryError::InvalidIssuer(format!(
                    "{} lists no signing method for the held key",
                    document.id
                ))
            })
    }
}

fn draft(claims: &Claims) -> Draft {
    let mut seed = ClaimCommitmentSet::generate_seed();
    let commitments = ClaimCommitmentSet::new(&seed, claims);
    let claim_commitments = ClaimCommitments {
        root: hex::encode(commitments.root()),
        salt_seed: hex::encode(seed),
    };
    seed.zeroize();
    Draft {
        id: Credential::new_id(),
        issued_at: Utc::now(),
        commitments,
        claim_commitments,
    }
}
