//! Proof envelopes attached to credentials, documents, and presentations.
//!
//! The variant is carried on the wire as the JSON `type` field:
//! `"DataIntegritySignature"` for signatures and `"ZeroKnowledgeProof"` for
//! circuit proofs.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::CoreError;
use crate::types::KeyType;

/// A credential or document proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Proof {
    #[serde(rename = "DataIntegritySignature")]
    Signature(SignatureProof),
    #[serde(rename = "ZeroKnowledgeProof")]
    Zk(ZkProof),
}

impl Proof {
    /// Value of the serialized `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Signature(_) => "DataIntegritySignature",
            Self::Zk(_) => "ZeroKnowledgeProof",
        }
    }
}

/// Signature by a key referenced through a verification method id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureProof {
    pub algorithm: KeyType,
    /// Verification method id, e.g. `did:ledger:abc#key-1`.
    pub verification_method: String,
    #[serde(with = "hex")]
    pub signature_value: Vec<u8>,
}

/// Stable identifier of a proof circuit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CircuitId(String);

impl CircuitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CircuitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Named public inputs of a circuit, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicInputs(BTreeMap<String, serde_json::Value>);

impl PublicInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`PublicInputs::insert`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Set an input, replacing any earlier value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }

    /// The input as a string, if present and a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    /// The input as an integer, if present and integral.
    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(|v| v.as_i64())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Inputs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }

    /// Deterministic encoding fed into proof transcripts.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(&self.0)?)
    }
}

/// Zero-knowledge proof produced by a circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkProof {
    pub circuit_id: CircuitId,
    pub public_inputs: PublicInputs,
    #[serde(with = "hex")]
    pub proof_value: Vec<u8>,
    /// Issuer signature over the credential payload. Credential proofs carry
    /// one; presentation proofs do not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_signature: Option<SignatureProof>,
}

/// Public verification key of a circuit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationKey {
    pub circuit_id: CircuitId,
    #[serde(with = "hex")]
    pub public_key: Vec<u8>,
}
