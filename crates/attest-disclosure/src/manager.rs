use std::sync::Arc;
use std::time::Duration;

use attest_core::{
    Claims, Credential, CredentialStatus, Did, PublicInputs, Presentation, ZkProof,
};
use attest_crypto::ClaimCommitmentSet;
use attest_proof::{inputs, Circuit, CircuitKind, Predicate, ProofEngine, ProofWorkerPool, Witness};
use attest_registry::CredentialRegistry;
use attest_resolver::DocumentResolver;
use zeroize::Zeroize;

use crate::error::DisclosureError;
use crate::request::DisclosureRequest;
use crate::state::{RejectionReason, VerificationEvent, VerificationReport, VerificationRun};

/// Default bound on waiting for one pooled proof.
pub const DEFAULT_PROOF_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds presentations for holders and verifies them for relying parties.
pub struct SelectiveDisclosureManager {
    engine: Arc<ProofEngine>,
    registry: Arc<CredentialRegistry>,
    resolver: Arc<dyn DocumentResolver>,
    pool: Option<Arc<ProofWorkerPool>>,
    proof_timeout: Duration,
}

impl SelectiveDisclosureManager {
    pub fn new(
        engine: Arc<ProofEngine>,
        registry: Arc<CredentialRegistry>,
        resolver: Arc<dyn DocumentResolver>,
    ) -> Self {
        Self {
            engine,
            registry,
            resolver,
            pool: None,
            proof_timeout: DEFAULT_PROOF_TIMEOUT,
        }
    }

    /// Generate proofs on `pool` instead of the calling task.
    pub fn with_pool(mut self, pool: Arc<ProofWorkerPool>, proof_timeout: Duration) -> Self {
        self.pool = Some(pool);
        self.proof_timeout = proof_timeout;
        self
    }

    /// Reveal the requested attributes and prove the requested predicates,
    /// bound to `challenge` and `audience`.
    pub async fn build_presentation(
        &self,
        credential: &Credential,
        request: &DisclosureRequest,
        challenge: &str,
        audience: &Did,
    ) -> Result<Presentation, DisclosureError> {
        if let Some(missing) = request
            .referenced_attributes()
            .find(|name| !credential.claims.contains_key(*name))
        {
            return Err(DisclosureError::AttributeNotFound(missing.to_string()));
        }

        let commitments = open_commitments(credential)?;
        let binding = binding_inputs(
            &credential.id,
            &credential.issuer,
            &credential.claim_commitments.root,
            challenge,
            audience,
        );

        let disclosed: Claims = credential
            .claims
            .iter()
            .filter(|(name, _)| request.attributes.contains(*name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        let circuit = self
            .engine
            .circuits()
            .disclosure()
            .ok_or_else(|| DisclosureError::NoCircuit("claim disclosure".into()))?;
        let proof = self
            .prove(
                circuit,
                Witness::full(&credential.claims, &commitments),
                binding.clone().with(inputs::DISCLOSED, disclosed_value(&disclosed)),
            )
            .await?;

        let mut predicate_proofs = Vec::with_capacity(request.predicates.len());
        for predicate in &request.predicates {
            let circuit = self
                .engine
                .circuits()
                .for_predicate(predicate)
                .ok_or_else(|| DisclosureError::NoCircuit(predicate.to_string()))?;
            let witness = Witness::single(predicate.attribute(), &credential.claims, &commitments)
                .ok_or_else(|| DisclosureError::AttributeNotFound(predicate.attribute().to_string()))?;
            let mut public_inputs = binding.clone();
            for (name, value) in predicate.public_inputs().iter() {
                public_inputs.insert(name.clone(), value.clone());
            }
            predicate_proofs.push(self.prove(circuit, witness, public_inputs).await?);
        }

        tracing::info!(
            credential_id = %credential.id,
            audience = %audience,
            disclosed = disclosed.len(),
            predicates = predicate_proofs.len(),
            "presentation built"
        );
        Ok(Presentation {
            credential_id: credential.id.clone(),
            issuer: credential.issuer.clone(),
            disclosed_claims: disclosed,
            proof,
            predicate_proofs,
            challenge: challenge.to_string(),
            audience: audience.clone(),
        })
    }

    async fn prove(
        &self,
        circuit: &Circuit,
        witness: Witness,
        public_inputs: PublicInputs,
    ) -> Result<ZkProof, DisclosureError> {
        let proof = match &self.pool {
            Some(pool) => {
                pool.submit(circuit.id.clone(), witness, public_inputs)
                    .await?
                    .wait_timeout(self.proof_timeout)
                    .await?
            }
            None => self.engine.generate_proof(&circuit.id, &witness, &public_inputs)?,
        };
        Ok(proof)
    }

    /// Verify a presentation for the expected challenge and audience.
    pub async fn verify_presentation(
        &self,
        presentation: &Presentation,
        expected_challenge: &str,
        expected_audience: &Did,
    ) -> Result<VerificationReport, DisclosureError> {
        self.verify_presentation_with(presentation, expected_challenge, expected_audience, &[])
            .await
    }

    /// As [`verify_presentation`](Self::verify_presentation), additionally
    /// requiring a proof for each of `required`.
    pub async fn verify_presentation_with(
        &self,
        presentation: &Presentation,
        expected_challenge: &str,
        expected_audience: &Did,
        required: &[Predicate],
    ) -> Result<VerificationReport, DisclosureError> {
        let mut run = VerificationRun::new();

        if presentation.challenge != expected_challenge {
            return run.reject(RejectionReason::ChallengeMismatch);
        }
        if &presentation.audience != expected_audience {
            return run.reject(RejectionReason::AudienceMismatch);
        }
        run.advance(VerificationEvent::ChallengePassed)?;

        let status = self.registry.status(&presentation.credential_id);
        let credential = match (&status, self.registry.get(&presentation.credential_id)) {
            (CredentialStatus::Valid, Some(credential)) => credential,
            _ => return run.reject(RejectionReason::CredentialNotValid { status }),
        };
        run.advance(VerificationEvent::StatusPassed)?;

        if let Err(detail) = self.check_proofs(presentation, &credential, required).await {
            return run.reject(RejectionReason::ProofRejected { detail });
        }
        run.advance(VerificationEvent::ProofsPassed)?;

        tracing::info!(
            credential_id = %presentation.credential_id,
            audience = %presentation.audience,
            "presentation accepted"
        );
        run.accept()
    }

    async fn check_proofs(
        &self,
        presentation: &Presentation,
        credential: &Credential,
        required: &[Predicate],
    ) -> Result<(), String> {
        if presentation.issuer != credential.issuer {
            return Err(format!("{} did not issue {}", presentation.issuer, credential.id));
        }
        if let Err(e) = self.resolver.resolve(&presentation.issuer).await {
            return Err(format!("issuer {} does not resolve: {}", presentation.issuer, e));
        }

        let binding = binding_inputs(
            &credential.id,
            &credential.issuer,
            &credential.claim_commitments.root,
            &presentation.challenge,
            &presentation.audience,
        );

        let proof = &presentation.proof;
        if self.circuit_kind(proof) != Some(&CircuitKind::ClaimDisclosure) {
            return Err(format!("{} is not a disclosure circuit", proof.circuit_id));
        }
        let expected = binding
            .clone()
            .with(inputs::DISCLOSED, disclosed_value(&presentation.disclosed_claims));
        if proof.public_inputs != expected {
            return Err("disclosure proof is bound to other inputs".into());
        }
        if !self.engine.verify(proof, &expected) {
            return Err("disclosure proof does not verify".into());
        }

        for proof in &presentation.predicate_proofs {
            let bound = binding
                .iter()
                .all(|(name, value)| proof.public_inputs.get(name) == Some(value));
            if !bound {
                return Err(format!("{} proof is bound to another presentation", proof.circuit_id));
            }
            if !self.engine.verify(proof, &proof.public_inputs) {
                return Err(format!("{} proof does not verify", proof.circuit_id));
            }
        }

        for predicate in required {
            let proven = presentation.predicate_proofs.iter().any(|proof| {
                self.circuit_kind(proof).is_some_and(|kind| kind.proves(predicate))
                    && predicate.is_stated_by(&proof.public_inputs)
            });
            if !proven {
                return Err(format!("no proof of {}", predicate));
            }
        }
        Ok(())
    }

    fn circuit_kind(&self, proof: &ZkProof) -> Option<&CircuitKind> {
        self.engine.circuits().get(&proof.circuit_id).map(|c| &c.kind)
    }
}

/// Public inputs tying a proof to one credential and one verifier exchange.
fn binding_inputs(
    credential_id: &str,
    issuer: &Did,
    claim_root: &str,
    challenge: &str,
    audience: &Did,
) -> PublicInputs {
    PublicInputs::new()
        .with(inputs::CREDENTIAL_ID, credential_id)
        .with(inputs::ISSUER, issuer.as_str())
        .with(inputs::CLAIM_ROOT, claim_root)
        .with(inputs::CHALLENGE, challenge)
        .with(inputs::AUDIENCE, audience.as_str())
}

fn disclosed_value(claims: &Claims) -> serde_json::Value {
    serde_json::Value::Object(
        claims
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect(),
    )
}

fn open_commitments(credential: &Credential) -> Result<ClaimCommitmentSet, DisclosureError> {
    let mut seed: [u8; 32] = hex::decode(&credential.claim_commitments.salt_seed)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| DisclosureError::InvalidCommitments("salt seed must be 32 hex bytes".into()))?;
    let commitments = ClaimCommitmentSet::new(&seed, &credential.claims);
    seed.zeroize();
    if hex::encode(commitments.root()) != credential.claim_commitments.root {
        return Err(DisclosureError::InvalidCommitments(format!(
            "claims of {} do not fold to its claim root",
            credential.id
        )));
    }
    Ok(commitments)
}
