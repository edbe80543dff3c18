use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use attest_core::{CircuitId, KeyType, PublicInputs, VerificationKey, ZkProof};
use attest_crypto::{verify_with_key_type, Commitment, Hash, Transcript};
use attest_trust::KeyStore;
use rand::RngCore;
use zeroize::Zeroize;

use crate::circuit::{Circuit, CircuitTable};
use crate::error::ProofError;
use crate::witness::Witness;

const TRANSCRIPT_DOMAIN: &str = "attest zk proof v1";

const COMMITMENT_OFFSET: usize = 1;
const CHALLENGE_OFFSET: usize = COMMITMENT_OFFSET + 32;
const SIGNATURE_OFFSET: usize = CHALLENGE_OFFSET + 32;
/// version ‖ commitment ‖ challenge ‖ signature
pub const PROOF_LEN: usize = SIGNATURE_OFFSET + 64;

/// Generates and verifies proofs for the circuits of a [`CircuitTable`].
///
/// Challenges are signed with the circuit's proving key from the key store,
/// so verification needs only the published [`VerificationKey`].
pub struct ProofEngine {
    circuits: Arc<CircuitTable>,
    keys: Arc<KeyStore>,
}

impl ProofEngine {
    pub fn new(circuits: CircuitTable, keys: Arc<KeyStore>) -> Self {
        Self {
            circuits: Arc::new(circuits),
            keys,
        }
    }

    pub fn circuits(&self) -> &CircuitTable {
        &self.circuits
    }

    fn circuit(&self, id: &CircuitId) -> Result<&Circuit, ProofError> {
        self.circuits
            .get(id)
            .ok_or_else(|| ProofError::CircuitNotFound(id.clone()))
    }

    /// Published verification key, creating the proving key on first use.
    pub fn verification_key(&self, circuit_id: &CircuitId) -> Result<VerificationKey, ProofError> {
        self.circuit(circuit_id)?;
        self.keys.circuit_key(circuit_id);
        Ok(self.keys.verification_key(circuit_id)?)
    }

    /// Check the witness against the circuit and sign the statement with the circuit key.
    pub fn generate_proof(
        &self,
        circuit_id: &CircuitId,
        witness: &Witness,
        public_inputs: &PublicInputs,
    ) -> Result<ZkProof, ProofError> {
        self.generate_proof_until(circuit_id, witness, public_inputs, &AtomicBool::new(false))
    }

    /// Generation that stops with [`ProofError::Cancelled`] once `cancelled`
    /// is raised. Checked between constraints and before signing.
    pub fn generate_proof_until(
        &self,
        circuit_id: &CircuitId,
        witness: &Witness,
        public_inputs: &PublicInputs,
        cancelled: &AtomicBool,
    ) -> Result<ZkProof, ProofError> {
        let circuit = self.circuit(circuit_id)?;
        circuit.check_until(witness, public_inputs, cancelled)?;
        if cancelled.load(Ordering::Acquire) {
            return Err(ProofError::Cancelled);
        }

        let mut blinding = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut blinding);
        let mut digest = witness.digest();
        let commitment = Commitment::commit_with_nonce(&digest, &blinding);
        digest.zeroize();
        blinding.zeroize();

        let challenge = challenge(circuit, public_inputs, &commitment.hash)?;
        let key_id = self.keys.circuit_key(circuit_id);
        let signature = self.keys.sign(key_id, &challenge)?;

        let mut proof_value = Vec::with_capacity(PROOF_LEN);
        proof_value.push(circuit.version);
        proof_value.extend_from_slice(&commitment.hash);
        proof_value.extend_from_slice(&challenge);
        proof_value.extend_from_slice(&signature);

        tracing::debug!(circuit = %circuit_id, inputs = public_inputs.len(), "generated proof");
        Ok(ZkProof {
            circuit_id: circuit_id.clone(),
            public_inputs: public_inputs.clone(),
            proof_value,
            issuer_signature: None,
        })
    }

    /// Deterministic and side-effect free; malformed input yields `false`.
    pub fn verify_proof(
        &self,
        proof: &ZkProof,
        public_inputs: &PublicInputs,
        verification_key: &VerificationKey,
    ) -> bool {
        if proof.circuit_id != verification_key.circuit_id || &proof.public_inputs != public_inputs {
            return false;
        }
        let Some(circuit) = self.circuits.get(&proof.circuit_id) else {
            return false;
        };
        let bytes = &proof.proof_value;
        if bytes.len() != PROOF_LEN || bytes[0] != circuit.version || !circuit.accepts_inputs(public_inputs) {
            return false;
        }
        let Ok(commitment) = <[u8; 32]>::try_from(&bytes[COMMITMENT_OFFSET..CHALLENGE_OFFSET]) else {
            return false;
        };
        let Ok(expected) = challenge(circuit, public_inputs, &commitment) else {
            return false;
        };
        expected[..] == bytes[CHALLENGE_OFFSET..SIGNATURE_OFFSET]
            && verify_with_key_type(
                KeyType::Ed25519,
                &verification_key.public_key,
                &expected,
                &bytes[SIGNATURE_OFFSET..],
            )
            .is_ok()
    }

    /// Verify against the key store's current verification key of the proof's circuit.
    pub fn verify(&self, proof: &ZkProof, public_inputs: &PublicInputs) -> bool {
        match self.keys.verification_key(&proof.circuit_id) {
            Ok(key) => self.verify_proof(proof, public_inputs, &key),
            Err(_) => false,
        }
    }
}

fn challenge(circuit: &Circuit, public_inputs: &PublicInputs, commitment: &Hash) -> Result<Hash, ProofError> {
    let mut transcript = Transcript::new(TRANSCRIPT_DOMAIN);
    transcript.append(b"circuit", circuit.id.as_str().as_bytes());
    transcript.append(b"version", &[circuit.version]);
    transcript.append(b"inputs", &public_inputs.canonical_bytes()?);
    transcript.append(b"commitment", commitment);
    Ok(transcript.challenge())
}
