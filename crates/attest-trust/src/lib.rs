//! Attest Trust & Key Store: custody of signing, key-agreement and circuit
//! proving keys behind opaque handles, plus the trust anchor snapshot.

pub mod anchors;
pub mod error;
pub mod key_store;

pub use anchors::{TrustAnchor, TrustAnchorSet, TrustStore};
pub use error::TrustError;
pub use key_store::{KeyId, KeyStore};
