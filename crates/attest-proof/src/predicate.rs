use std::fmt;

use attest_core::PublicInputs;
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use crate::constraints::inputs;

/// A statement about one claim, proven without revealing the claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Predicate {
    AtLeast { attribute: String, threshold: i64 },
    AtMost { attribute: String, threshold: i64 },
    MemberOf { attribute: String, set: Vec<String> },
}

impl Predicate {
    /// `attribute >= threshold`.
    pub fn at_least(attribute: impl Into<String>, threshold: i64) -> Self {
        Self::AtLeast {
            attribute: attribute.into(),
            threshold,
        }
    }

    /// `attribute <= threshold`.
    pub fn at_most(attribute: impl Into<String>, threshold: i64) -> Self {
        Self::AtMost {
            attribute: attribute.into(),
            threshold,
        }
    }

    /// Set membership. The set is stored sorted and deduplicated.
    pub fn member_of<I, S>(attribute: impl Into<String>, set: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set: Vec<String> = set.into_iter().map(Into::into).collect();
        set.sort();
        set.dedup();
        Self::MemberOf {
            attribute: attribute.into(),
            set,
        }
    }

    /// `attribute` (a birth time in seconds since epoch) lies at least `years`
    /// calendar years before `now`.
    pub fn born_before_cutoff(attribute: impl Into<String>, years: u32, now: DateTime<Utc>) -> Self {
        Self::at_most(attribute, cutoff_seconds(now, years))
    }

    pub fn attribute(&self) -> &str {
        match self {
            Self::AtLeast { attribute, .. }
            | Self::AtMost { attribute, .. }
            | Self::MemberOf { attribute, .. } => attribute,
        }
    }

    /// Public inputs stating this predicate.
    pub fn public_inputs(&self) -> PublicInputs {
        let base = PublicInputs::new().with(inputs::ATTRIBUTE, self.attribute());
        match self {
            Self::AtLeast { threshold, .. } | Self::AtMost { threshold, .. } => {
                base.with(inputs::THRESHOLD, *threshold)
            }
            Self::MemberOf { set, .. } => base.with(inputs::SET, set.clone()),
        }
    }

    /// Whether `public_inputs` state exactly this predicate.
    pub fn is_stated_by(&self, public_inputs: &PublicInputs) -> bool {
        self.public_inputs()
            .iter()
            .all(|(name, value)| public_inputs.get(name) == Some(value))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtLeast { attribute, threshold } => write!(f, "{} >= {}", attribute, threshold),
            Self::AtMost { attribute, threshold } => write!(f, "{} <= {}", attribute, threshold),
            Self::MemberOf { attribute, set } => write!(f, "{} in [{}]", attribute, set.join(", ")),
        }
    }
}

/// Whole seconds since epoch of the instant `years` calendar years before `now`.
pub fn cutoff_seconds(now: DateTime<Utc>, years: u32) -> i64 {
    now.checked_sub_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
        .timestamp()
}
