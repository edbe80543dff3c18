//! Constraints a witness must satisfy against a circuit's public inputs.

use std::collections::BTreeMap;

use attest_core::PublicInputs;
use attest_crypto::{merkle_root_from_path, root_from_leaves, FieldElement, Hash};

use crate::circuit::{MAX_RANGE_BITS, MIN_RANGE_BITS};
use crate::error::ProofError;
use crate::witness::Witness;

/// Names of public inputs understood by the built-in circuits.
pub mod inputs {
    /// Hex Merkle root of the salted claims.
    pub const CLAIM_ROOT: &str = "claimRoot";
    /// Claims revealed in clear.
    pub const DISCLOSED: &str = "disclosed";
    /// Attribute a predicate speaks about.
    pub const ATTRIBUTE: &str = "attribute";
    pub const THRESHOLD: &str = "threshold";
    /// Allowed values for a membership predicate.
    pub const SET: &str = "set";
    pub const CREDENTIAL_ID: &str = "credentialId";
    pub const ISSUER: &str = "issuer";
    /// Verifier nonce.
    pub const CHALLENGE: &str = "challenge";
    /// Verifier DID.
    pub const AUDIENCE: &str = "audience";
}

/// Which side of the threshold a range constraint accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeDirection {
    /// `value >= threshold`
    AtLeast,
    /// `value <= threshold`
    AtMost,
}

/// One check a circuit performs over its witness and public inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// The `attribute` input names this attribute (any attribute when `None`).
    AttributeBound(Option<String>),
    /// The witness leaves fold to `claimRoot`.
    RootOpens,
    /// Every value in `disclosed` equals the witness value.
    DisclosedEqual,
    /// The signed difference to `threshold` fits in `bits` bits.
    Range { direction: RangeDirection, bits: u32 },
    /// The attribute value is one of `set`.
    Member,
}

/// Decode the hex claim root input.
pub fn claim_root(public_inputs: &PublicInputs) -> Result<Hash, ProofError> {
    let encoded = public_inputs
        .get_str(inputs::CLAIM_ROOT)
        .ok_or_else(|| ProofError::InvalidPublicInputs("missing claimRoot".into()))?;
    let bytes = hex::decode(encoded)
        .map_err(|e| ProofError::InvalidPublicInputs(format!("claimRoot: {}", e)))?;
    bytes
        .try_into()
        .map_err(|_| ProofError::InvalidPublicInputs("claimRoot must be 32 bytes".into()))
}

fn attribute(public_inputs: &PublicInputs) -> Result<&str, ProofError> {
    public_inputs
        .get_str(inputs::ATTRIBUTE)
        .ok_or_else(|| ProofError::InvalidPublicInputs("missing attribute".into()))
}

fn set(public_inputs: &PublicInputs) -> Result<Vec<&str>, ProofError> {
    public_inputs
        .get(inputs::SET)
        .and_then(|v| v.as_array())
        .and_then(|items| items.iter().map(|item| item.as_str()).collect::<Option<Vec<_>>>())
        .ok_or_else(|| ProofError::InvalidPublicInputs("set must be an array of strings".into()))
}

/// Largest magnitude a range-constrained value may have for `bits`, or
/// `None` when the width is unsupported.
fn magnitude_bound(bits: u32) -> Option<u64> {
    (MIN_RANGE_BITS..=MAX_RANGE_BITS)
        .contains(&bits)
        .then(|| 1u64 << (bits - 1))
}

impl Constraint {
    /// Generation-time check of the witness.
    pub fn check(&self, witness: &Witness, public_inputs: &PublicInputs) -> Result<(), ProofError> {
        match self {
            Self::AttributeBound(expected) => {
                let named = attribute(public_inputs)?;
                match expected {
                    Some(expected) if expected != named => Err(ProofError::InvalidPublicInputs(
                        format!("circuit is bound to {}, not {}", expected, named),
                    )),
                    _ => Ok(()),
                }
            }
            Self::RootOpens => check_root(witness, public_inputs),
            Self::DisclosedEqual => {
                let disclosed = public_inputs
                    .get(inputs::DISCLOSED)
                    .and_then(|v| v.as_object())
                    .ok_or_else(|| ProofError::InvalidPublicInputs("disclosed must be an object".into()))?;
                for (name, value) in disclosed {
                    let held = witness.value(name).ok_or_else(|| {
                        ProofError::WitnessInvalid(format!("no witness value for disclosed claim {}", name))
                    })?;
                    if &held.to_json() != value {
                        return Err(ProofError::ConstraintViolation(format!(
                            "disclosed claim {} does not match the committed value",
                            name
                        )));
                    }
                }
                Ok(())
            }
            Self::Range { direction, bits } => {
                let name = attribute(public_inputs)?;
                let value = witness
                    .value(name)
                    .and_then(|v| v.as_integer())
                    .ok_or_else(|| {
                        ProofError::WitnessInvalid(format!("{} is not an integer claim", name))
                    })?;
                let threshold = public_inputs
                    .get_i64(inputs::THRESHOLD)
                    .ok_or_else(|| ProofError::InvalidPublicInputs("missing threshold".into()))?;
                let bound = magnitude_bound(*bits).ok_or_else(|| {
                    ProofError::Internal(format!("unsupported range width of {} bits", bits))
                })?;
                if value.unsigned_abs() >= bound {
                    return Err(ProofError::WitnessInvalid(format!(
                        "{} is outside the {}-bit range",
                        name, bits
                    )));
                }
                if threshold.unsigned_abs() >= bound {
                    return Err(ProofError::InvalidPublicInputs(format!(
                        "threshold is outside the {}-bit range",
                        bits
                    )));
                }
                let (value, threshold) = (FieldElement::from_i64(value), FieldElement::from_i64(threshold));
                let (diff, relation) = match direction {
                    RangeDirection::AtLeast => (value - threshold, ">="),
                    RangeDirection::AtMost => (threshold - value, "<="),
                };
                if diff.fits_in_bits(*bits) {
                    Ok(())
                } else {
                    Err(ProofError::ConstraintViolation(format!(
                        "{} is not {} the threshold",
                        name, relation
                    )))
                }
            }
            Self::Member => {
                let name = attribute(public_inputs)?;
                let value = witness.value(name).and_then(|v| v.as_str()).ok_or_else(|| {
                    ProofError::WitnessInvalid(format!("{} is not a string claim", name))
                })?;
                if set(public_inputs)?.contains(&value) {
                    Ok(())
                } else {
                    Err(ProofError::ConstraintViolation(format!(
                        "{} is not in the allowed set",
                        name
                    )))
                }
            }
        }
    }

    /// Verification-time check that the public inputs are well formed.
    pub fn accepts_inputs(&self, public_inputs: &PublicInputs) -> bool {
        match self {
            Self::AttributeBound(expected) => match (attribute(public_inputs), expected) {
                (Ok(named), Some(expected)) => named == expected,
                (Ok(_), None) => true,
                (Err(_), _) => false,
            },
            Self::RootOpens => claim_root(public_inputs).is_ok(),
            Self::DisclosedEqual => public_inputs
                .get(inputs::DISCLOSED)
                .is_some_and(|v| v.is_object()),
            Self::Range { bits, .. } => magnitude_bound(*bits).is_some_and(|bound| {
                public_inputs
                    .get_i64(inputs::THRESHOLD)
                    .is_some_and(|t| t.unsigned_abs() < bound)
            }),
            Self::Member => set(public_inputs).is_ok(),
        }
    }
}

fn check_root(witness: &Witness, public_inputs: &PublicInputs) -> Result<(), ProofError> {
    let root = claim_root(public_inputs)?;
    if witness.is_empty() {
        return Err(ProofError::WitnessInvalid("empty witness".into()));
    }

    if witness.has_paths() {
        for name in witness.claims().keys() {
            let leaf = witness
                .leaf(name)
                .ok_or_else(|| ProofError::WitnessInvalid(format!("missing salt for {}", name)))?;
            let path = witness
                .path(name)
                .ok_or_else(|| ProofError::WitnessInvalid(format!("missing inclusion path for {}", name)))?;
            if merkle_root_from_path(&leaf, path) != root {
                return Err(ProofError::ConstraintViolation(format!(
                    "claim {} does not open to the claim root",
                    name
                )));
            }
        }
        return Ok(());
    }

    let mut leaves = BTreeMap::new();
    for name in witness.claims().keys() {
        let leaf = witness
            .leaf(name)
            .ok_or_else(|| ProofError::WitnessInvalid(format!("missing salt for {}", name)))?;
        leaves.insert(name.clone(), leaf);
    }
    if root_from_leaves(&leaves) == root {
        Ok(())
    } else {
        Err(ProofError::ConstraintViolation(
            "claims do not fold to the claim root".into(),
        ))
    }
}
