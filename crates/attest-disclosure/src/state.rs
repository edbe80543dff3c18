use std::fmt;

use attest_core::{Categorized, CredentialStatus, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::error::DisclosureError;

/// Stages of presentation verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerificationState {
    Received,
    ChallengeChecked,
    StatusChecked,
    ProofVerified,
    /// Final.
    Accepted,
    /// Final.
    Rejected,
}

impl VerificationState {
    /// `Accepted` and `Rejected` admit no further transitions.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

impl fmt::Display for VerificationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Received => write!(f, "Received"),
            Self::ChallengeChecked => write!(f, "ChallengeChecked"),
            Self::StatusChecked => write!(f, "StatusChecked"),
            Self::ProofVerified => write!(f, "ProofVerified"),
            Self::Accepted => write!(f, "Accepted"),
            Self::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Input to [`VerificationStateMachine::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationEvent {
    ChallengePassed,
    StatusPassed,
    ProofsPassed,
    Accept,
    Reject,
}

/// Verification transitions:
/// - Received → ChallengeChecked (ChallengePassed)
/// - ChallengeChecked → StatusChecked (StatusPassed)
/// - StatusChecked → ProofVerified (ProofsPassed)
/// - ProofVerified → Accepted (Accept)
/// - any non-final state → Rejected (Reject)
pub struct VerificationStateMachine;

impl VerificationStateMachine {
    /// Apply `event`, or fail if the state does not allow it.
    pub fn transition(
        current: VerificationState,
        event: VerificationEvent,
    ) -> Result<VerificationState, DisclosureError> {
        use VerificationEvent as E;
        use VerificationState as S;

        let next = match (current, event) {
            (S::Received, E::ChallengePassed) => S::ChallengeChecked,
            (S::ChallengeChecked, E::StatusPassed) => S::StatusChecked,
            (S::StatusChecked, E::ProofsPassed) => S::ProofVerified,
            (S::ProofVerified, E::Accept) => S::Accepted,
            (state, E::Reject) if !state.is_final() => S::Rejected,
            _ => {
                let to = match event {
                    E::ChallengePassed => S::ChallengeChecked,
                    E::StatusPassed => S::StatusChecked,
                    E::ProofsPassed => S::ProofVerified,
                    E::Accept => S::Accepted,
                    E::Reject => S::Rejected,
                };
                return Err(DisclosureError::InvalidTransition { from: current, to });
            }
        };
        Ok(next)
    }
}

/// Why a presentation was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum RejectionReason {
    ChallengeMismatch,
    AudienceMismatch,
    CredentialNotValid { status: CredentialStatus },
    ProofRejected { detail: String },
}

impl Categorized for RejectionReason {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::ChallengeMismatch => ErrorKind::ChallengeMismatch,
            Self::AudienceMismatch => ErrorKind::AudienceMismatch,
            Self::CredentialNotValid { .. } => ErrorKind::CredentialNotValid,
            Self::ProofRejected { .. } => ErrorKind::ProofRejected,
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChallengeMismatch => write!(f, "challenge does not match"),
            Self::AudienceMismatch => write!(f, "audience does not match"),
            Self::CredentialNotValid { status } => write!(f, "credential is {}", status),
            Self::ProofRejected { detail } => write!(f, "proof rejected: {}", detail),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum VerificationOutcome {
    Accepted,
    Rejected(RejectionReason),
}

/// Outcome of a verification plus every stage it passed through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub outcome: VerificationOutcome,
    pub stages: Vec<VerificationState>,
}

impl VerificationReport {
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, VerificationOutcome::Accepted)
    }

    /// Why the presentation was rejected, if it was.
    pub fn rejection(&self) -> Option<&RejectionReason> {
        match &self.outcome {
            VerificationOutcome::Rejected(reason) => Some(reason),
            VerificationOutcome::Accepted => None,
        }
    }
}

/// Drives one verification through the state machine, recording each stage.
#[derive(Debug)]
pub(crate) struct VerificationRun {
    state: VerificationState,
    stages: Vec<VerificationState>,
}

impl VerificationRun {
    pub(crate) fn new() -> Self {
        Self {
            state: VerificationState::Received,
            stages: vec![VerificationState::Received],
        }
    }

    pub(crate) fn advance(&mut self, event: VerificationEvent) -> Result<(), DisclosureError> {
        self.state = VerificationStateMachine::transition(self.state, event)?;
        self.stages.push(self.state);
        Ok(())
    }

    pub(crate) fn accept(mut self) -> Result<VerificationReport, DisclosureError> {
        self.advance(VerificationEvent::Accept)?;
        Ok(VerificationReport {
            outcome: VerificationOutcome::Accepted,
            stages: self.stages,
        })
    }

    pub(crate) fn reject(mut self, reason: RejectionReason) -> Result<VerificationReport, DisclosureError> {
        tracing::debug!(stage = %self.state, reason = %reason, "presentation rejected");
        self.advance(VerificationEvent::Reject)?;
        Ok(VerificationReport {
            outcome: VerificationOutcome::Rejected(reason),
            stages: self.stages,
        })
    }
}
