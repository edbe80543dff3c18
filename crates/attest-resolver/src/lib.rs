//! Attest DID Resolver: method dispatch, multi-backend fallback, a versioned
//! TTL cache with single-flight resolution, and a registrar for locally
//! controlled DIDs.

pub mod backend;
pub mod cache;
pub mod document;
pub mod error;
pub mod http;
pub mod method;
pub mod registrar;
pub mod resolver;

pub use backend::{BackendError, DocumentBackend, InMemoryLedger};
pub use cache::DocumentCache;
pub use document::{
    self_certifying_id, DidDocument, DocumentMutation, ServiceEndpoint, SignaturePolicy,
    VerificationMethod,
};
pub use error::ResolveError;
pub use http::HttpBackend;
pub use method::{
    key_did, BackendChain, ChainMethodHandler, ChainOptions, FetchStrategy, KeyMethodHandler,
    MethodHandler, MethodRegistry,
};
pub use registrar::DidRegistrar;
pub use resolver::{
    DidResolver, DocumentResolver, ResolverOptions, ResolverStats, RetryPolicy,
};
