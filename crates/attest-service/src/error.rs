use attest_core::{Categorized, CoreError, ErrorKind};
use attest_disclosure::DisclosureError;
use attest_registry::RegistryError;
use attest_resolver::ResolveError;
use attest_trust::TrustError;

use crate::storage::StorageError;

/// Errors raised while assembling or driving the identity service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("credential not found: {0}")]
    CredentialNotFound(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Disclosure(#[from] DisclosureError),

    #[error(transparent)]
    Trust(#[from] TrustError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl Categorized for ServiceError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::CredentialNotFound(_) => ErrorKind::NotFound,
            Self::Config(_) => ErrorKind::Invalid,
            Self::Storage(_) => ErrorKind::Internal,
            Self::Resolve(e) => e.kind(),
            Self::Registry(e) => e.kind(),
            Self::Disclosure(e) => e.kind(),
            Self::Trust(e) => e.kind(),
            Self::Core(e) => e.kind(),
        }
    }
}
