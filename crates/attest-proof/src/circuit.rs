use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use attest_core::{CircuitId, PublicInputs};
use serde::{Deserialize, Serialize};

use crate::constraints::{inputs, Constraint, RangeDirection};
use crate::error::ProofError;
use crate::predicate::Predicate;
use crate::witness::Witness;

/// Range width used unless configured otherwise.
pub const DEFAULT_RANGE_BITS: u32 = 48;
/// Range widths a circuit may use. Beyond 62 bits a negative difference can
/// wrap into the accepted range of the field.
pub const MIN_RANGE_BITS: u32 = 2;
pub const MAX_RANGE_BITS: u32 = 62;

/// Disclosed claims open the committed root.
pub const CLAIM_DISCLOSURE_V1: &str = "claim-disclosure-v1";
/// Issuer commitment to the claim root.
pub const CLAIM_COMMITMENT_V1: &str = "claim-commitment-v1";
/// Age at or above a threshold.
pub const AGE_AT_LEAST_V1: &str = "age-at-least-v1";
/// Birth date before a cutoff.
pub const BORN_BEFORE_V1: &str = "born-before-v1";
/// Residency in a set of countries.
pub const RESIDENCY_IN_SET_V1: &str = "residency-in-set-v1";
pub const RANGE_AT_LEAST_V1: &str = "range-at-least-v1";
pub const RANGE_AT_MOST_V1: &str = "range-at-most-v1";
pub const SET_MEMBERSHIP_V1: &str = "set-membership-v1";

/// What a circuit proves. Predicate kinds bound to `None` accept any attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CircuitKind {
    /// Disclosed claims are part of a committed claim set.
    ClaimDisclosure,
    /// Knowledge of every claim behind a claim root.
    ClaimCommitment,
    AtLeast { attribute: Option<String> },
    AtMost { attribute: Option<String> },
    SetMembership { attribute: Option<String> },
}

impl CircuitKind {
    fn bound_attribute(&self) -> Option<&Option<String>> {
        match self {
            Self::AtLeast { attribute } | Self::AtMost { attribute } | Self::SetMembership { attribute } => {
                Some(attribute)
            }
            Self::ClaimDisclosure | Self::ClaimCommitment => None,
        }
    }

    /// Whether this kind can prove `predicate`.
    pub fn proves(&self, predicate: &Predicate) -> bool {
        let same_shape = matches!(
            (self, predicate),
            (Self::AtLeast { .. }, Predicate::AtLeast { .. })
                | (Self::AtMost { .. }, Predicate::AtMost { .. })
                | (Self::SetMembership { .. }, Predicate::MemberOf { .. })
        );
        same_shape
            && match self.bound_attribute() {
                Some(Some(bound)) => bound == predicate.attribute(),
                _ => true,
            }
    }
}

/// An immutable, versioned circuit definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Circuit {
    pub id: CircuitId,
    pub version: u8,
    pub kind: CircuitKind,
    pub range_bits: u32,
}

impl Circuit {
    pub fn new(id: impl Into<String>, kind: CircuitKind) -> Self {
        Self {
            id: CircuitId::new(id),
            version: 1,
            kind,
            range_bits: DEFAULT_RANGE_BITS,
        }
    }

    /// Override the range width. Widths outside the supported bounds make every proof fail.
    pub fn with_range_bits(mut self, bits: u32) -> Self {
        self.range_bits = bits;
        self
    }

    /// Constraints checked for this circuit, in order.
    pub fn constraints(&self) -> Vec<Constraint> {
        let range = |direction| Constraint::Range {
            direction,
            bits: self.range_bits,
        };
        match &self.kind {
            CircuitKind::ClaimDisclosure => vec![Constraint::RootOpens, Constraint::DisclosedEqual],
            CircuitKind::ClaimCommitment => vec![Constraint::RootOpens],
            CircuitKind::AtLeast { attribute } => vec![
                Constraint::AttributeBound(attribute.clone()),
                Constraint::RootOpens,
                range(RangeDirection::AtLeast),
            ],
            CircuitKind::AtMost { attribute } => vec![
                Constraint::AttributeBound(attribute.clone()),
                Constraint::RootOpens,
                range(RangeDirection::AtMost),
            ],
            CircuitKind::SetMembership { attribute } => vec![
                Constraint::AttributeBound(attribute.clone()),
                Constraint::RootOpens,
                Constraint::Member,
            ],
        }
    }

    /// Public input names the circuit reads.
    pub fn required_inputs(&self) -> &'static [&'static str] {
        match self.kind {
            CircuitKind::ClaimDisclosure => &[inputs::CLAIM_ROOT, inputs::DISCLOSED],
            CircuitKind::ClaimCommitment => &[inputs::CLAIM_ROOT],
            CircuitKind::AtLeast { .. } | CircuitKind::AtMost { .. } => {
                &[inputs::CLAIM_ROOT, inputs::ATTRIBUTE, inputs::THRESHOLD]
            }
            CircuitKind::SetMembership { .. } => &[inputs::CLAIM_ROOT, inputs::ATTRIBUTE, inputs::SET],
        }
    }

    /// Check every constraint. The first failure is returned.
    pub fn check(&self, witness: &Witness, public_inputs: &PublicInputs) -> Result<(), ProofError> {
        self.check_until(witness, public_inputs, &AtomicBool::new(false))
    }

    /// Like [`Circuit::check`], but gives up between constraints once
    /// `cancelled` is raised.
    pub fn check_until(
        &self,
        witness: &Witness,
        public_inputs: &PublicInputs,
        cancelled: &AtomicBool,
    ) -> Result<(), ProofError> {
        if let Some(missing) = self
            .required_inputs()
            .iter()
            .find(|name| public_inputs.get(name).is_none())
        {
            return Err(ProofError::InvalidPublicInputs(format!(
                "{} requires public input {}",
                self.id, missing
            )));
        }
        for constraint in self.constraints() {
            if cancelled.load(Ordering::Acquire) {
                return Err(ProofError::Cancelled);
            }
            constraint.check(witness, public_inputs)?;
        }
        Ok(())
    }

    /// Shape check used by verification; never fails.
    pub fn accepts_inputs(&self, public_inputs: &PublicInputs) -> bool {
        self.required_inputs()
            .iter()
            .all(|name| public_inputs.get(name).is_some())
            && self
                .constraints()
                .iter()
                .all(|constraint| constraint.accepts_inputs(public_inputs))
    }
}

/// Circuits loaded once at startup. Read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct CircuitTable {
    circuits: HashMap<CircuitId, Circuit>,
}

impl CircuitTable {
    /// Later circuits replace earlier ones with the same id.
    pub fn new(circuits: Vec<Circuit>) -> Self {
        Self {
            circuits: circuits.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    /// The built-in circuits.
    pub fn standard(range_bits: u32) -> Self {
        let attr = |name: &str| Some(name.to_string());
        Self::new(
            vec![
                Circuit::new(CLAIM_DISCLOSURE_V1, CircuitKind::ClaimDisclosure),
                Circuit::new(CLAIM_COMMITMENT_V1, CircuitKind::ClaimCommitment),
                Circuit::new(AGE_AT_LEAST_V1, CircuitKind::AtLeast { attribute: attr("age") }),
                Circuit::new(BORN_BEFORE_V1, CircuitKind::AtMost { attribute: attr("birthDate") }),
                Circuit::new(
                    RESIDENCY_IN_SET_V1,
                    CircuitKind::SetMembership { attribute: attr("country") },
                ),
                Circuit::new(RANGE_AT_LEAST_V1, CircuitKind::AtLeast { attribute: None }),
                Circuit::new(RANGE_AT_MOST_V1, CircuitKind::AtMost { attribute: None }),
                Circuit::new(SET_MEMBERSHIP_V1, CircuitKind::SetMembership { attribute: None }),
            ]
            .into_iter()
            .map(|c| c.with_range_bits(range_bits))
            .collect(),
        )
    }

    pub fn get(&self, id: &CircuitId) -> Option<&Circuit> {
        self.circuits.get(id)
    }

    /// Circuit ids in sorted order.
    pub fn ids(&self) -> Vec<&CircuitId> {
        let mut ids: Vec<&CircuitId> = self.circuits.keys().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    pub fn len(&self) -> usize {
        self.circuits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.circuits.is_empty()
    }

    fn first_of(&self, kind: &CircuitKind) -> Option<&Circuit> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.circuits.get(id))
            .find(|c| &c.kind == kind)
    }

    /// The circuit used for selective disclosure.
    pub fn disclosure(&self) -> Option<&Circuit> {
        self.first_of(&CircuitKind::ClaimDisclosure)
    }

    /// The circuit used when issuing ZK credentials.
    pub fn commitment(&self) -> Option<&Circuit> {
        self.first_of(&CircuitKind::ClaimCommitment)
    }

    /// Circuit proving `predicate`: one bound to its attribute, else a generic one.
    pub fn for_predicate(&self, predicate: &Predicate) -> Option<&Circuit> {
        let candidates: Vec<&Circuit> = self
            .ids()
            .into_iter()
            .filter_map(|id| self.circuits.get(id))
            .filter(|c| c.kind.proves(predicate))
            .collect();
        candidates
            .iter()
            .find(|c| matches!(c.kind.bound_attribute(), Some(Some(_))))
            .or_else(|| candidates.first())
            .copied()
    }
}
