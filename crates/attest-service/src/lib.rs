//! Attest Service: wires the resolver, registry, proof engine and disclosure
//! manager into one identity service configured from TOML.

pub mod config;
pub mod error;
pub mod service;
pub mod storage;

pub use config::{AttestConfig, BackendConfig};
pub use error::ServiceError;
pub use service::{IdentityService, ServiceSummary, CREDENTIAL_TYPE};
pub use storage::{RocksLedger, StorageError};
