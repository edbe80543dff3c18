use std::collections::BTreeSet;

use attest_proof::Predicate;
use serde::{Deserialize, Serialize};

/// What a verifier asks the holder to reveal or prove.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisclosureRequest {
    /// Claims revealed in clear.
    #[serde(default)]
    pub attributes: BTreeSet<String>,
    /// Statements proven without revealing the claim.
    #[serde(default)]
    pub predicates: Vec<Predicate>,
}

impl DisclosureRequest {
    /// An empty request: nothing disclosed, nothing proven.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reveal `attribute` in clear.
    pub fn disclose(mut self, attribute: impl Into<String>) -> Self {
        self.attributes.insert(attribute.into());
        self
    }

    /// Prove `predicate` without revealing the attribute.
    pub fn prove(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Every claim the request touches.
    pub fn referenced_attributes(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .map(String::as_str)
            .chain(self.predicates.iter().map(Predicate::attribute))
    }
}
