//! DID method dispatch and per-method document retrieval.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use attest_core::{Did, DidMethod, KeyType};
use attest_crypto::{multibase_decode, multibase_encode};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};

use crate::backend::{BackendError, DocumentBackend};
use crate::document::{DidDocument, SignaturePolicy, VerificationMethod};
use crate::error::ResolveError;

/// Resolution logic for one DID method.
#[async_trait]
pub trait MethodHandler: Send + Sync {
    fn method(&self) -> &DidMethod;

    /// Key types a new DID of this method may be created with.
    fn key_types(&self) -> &[KeyType];

    fn signature_policy(&self) -> SignaturePolicy;

    /// Raw bytes of the current document.
    async fn fetch(&self, did: &Did) -> Result<Vec<u8>, ResolveError>;

    async fn resolve(&self, did: &Did) -> Result<DidDocument, ResolveError> {
        let bytes = self.fetch(did).await?;
        let document = DidDocument::from_bytes(&bytes)?;
        document.validate(did, self.signature_policy())?;
        Ok(document)
    }

    /// Backends new documents are published to. Empty for derived methods.
    fn backends(&self) -> &[Arc<dyn DocumentBackend>] {
        &[]
    }
}

/// `did:key` identifier for a public key: `z` + base58(multicodec ‖ key).
pub fn key_did(key_type: KeyType, public_key: &[u8]) -> Result<Did, ResolveError> {
    let mut bytes = key_type.multicodec_prefix().to_vec();
    bytes.extend_from_slice(public_key);
    Ok(Did::from_parts(&DidMethod::Key, &multibase_encode(&bytes))?)
}

/// `did:key`: the document is derived from the identifier itself.
pub struct KeyMethodHandler {
    method: DidMethod,
}

impl KeyMethodHandler {
    pub fn new() -> Self {
        Self { method: DidMethod::Key }
    }

    /// Build the document straight from the key encoded in the identifier.
    pub fn derive(did: &Did) -> Result<DidDocument, ResolveError> {
        let id = did.method_specific_id();
        let decoded = multibase_decode(id)
            .map_err(|e| ResolveError::InvalidDocument(format!("{}: {}", did, e)))?;
        let (key_type, public_key) = KeyType::split_multicodec(&decoded).ok_or_else(|| {
            ResolveError::InvalidDocument(format!("{}: unknown multicodec prefix", did))
        })?;
        let vm = VerificationMethod::new(did, id, key_type, public_key);
        let mut document = DidDocument::new(did.clone(), vec![vm]);
        document.updated = DateTime::<Utc>::UNIX_EPOCH;
        Ok(document)
    }
}

impl Default for KeyMethodHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MethodHandler for KeyMethodHandler {
    fn method(&self) -> &DidMethod {
        &self.method
    }

    fn key_types(&self) -> &[KeyType] {
        &[KeyType::Ed25519, KeyType::Secp256k1, KeyType::X25519]
    }

    fn signature_policy(&self) -> SignaturePolicy {
        SignaturePolicy::Optional
    }

    async fn fetch(&self, did: &Did) -> Result<Vec<u8>, ResolveError> {
        Self::derive(did)?.to_bytes()
    }

    async fn resolve(&self, did: &Did) -> Result<DidDocument, ResolveError> {
        let document = Self::derive(did)?;
        document.validate(did, SignaturePolicy::Optional)?;
        Ok(document)
    }
}

/// How a chain walks its backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    /// One backend at a time, by priority.
    Sequential,
    /// Up to `max_in_flight` backends at once; first valid document wins.
    Race { max_in_flight: usize },
}

/// Timeouts and racing limits for a [`BackendChain`].
#[derive(Debug, Clone)]
pub struct ChainOptions {
    pub call_timeout: Duration,
    /// Race once the chain holds more backends than this.
    pub race_threshold: usize,
    pub race_max_in_flight: usize,
}

impl Default for ChainOptions {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(2),
            race_threshold: 3,
            race_max_in_flight: 2,
        }
    }
}

enum Attempt {
    Found(Vec<u8>, DidDocument),
    Absent,
    Invalid(String),
    Failed(ResolveError),
}

/// Priority-ordered backends for one method.
pub struct BackendChain {
    backends: Vec<Arc<dyn DocumentBackend>>,
    options: ChainOptions,
}

impl BackendChain {
    pub fn new(backends: Vec<Arc<dyn DocumentBackend>>, options: ChainOptions) -> Self {
        Self { backends, options }
    }

    pub fn backends(&self) -> &[Arc<dyn DocumentBackend>] {
        &self.backends
    }

    /// Strategy picked from the backend count and `race_threshold`.
    pub fn strategy(&self) -> FetchStrategy {
        if self.backends.len() > self.options.race_threshold {
            FetchStrategy::Race {
                max_in_flight: self.options.race_max_in_flight.max(1),
            }
        } else {
            FetchStrategy::Sequential
        }
    }

    async fn attempt(
        &self,
        backend: &Arc<dyn DocumentBackend>,
        did: &Did,
        policy: SignaturePolicy,
    ) -> Attempt {
        let name = backend.name();
        let fetched = match tokio::time::timeout(self.options.call_timeout, backend.fetch(did)).await {
            Err(_) => return Attempt::Failed(ResolveError::BackendTimeout(name.to_string())),
            Ok(result) => result,
        };
        match fetched {
            Ok(None) => Attempt::Absent,
            Ok(Some(bytes)) => {
                match DidDocument::from_bytes(&bytes).and_then(|doc| {
                    doc.validate(did, policy)?;
                    Ok(doc)
                }) {
                    Ok(doc) => Attempt::Found(bytes, doc),
                    Err(e) => {
                        tracing::warn!(backend = name, did = %did, error = %e, "backend returned invalid document");
                        Attempt::Invalid(e.to_string())
                    }
                }
            }
            Err(BackendError::Timeout(msg)) => {
                Attempt::Failed(ResolveError::BackendTimeout(format!("{}: {}", name, msg)))
            }
            Err(e) => Attempt::Failed(ResolveError::BackendUnavailable(format!("{}: {}", name, e))),
        }
    }

    /// First valid document together with the bytes it was decoded from.
    pub async fn fetch_valid(
        &self,
        did: &Did,
        policy: SignaturePolicy,
    ) -> Result<(Vec<u8>, DidDocument), ResolveError> {
        if self.backends.is_empty() {
            return Err(ResolveError::BackendUnavailable(format!(
                "no backends configured for {}",
                did.method_name()
            )));
        }

        let mut failures = Vec::new();
        match self.strategy() {
            FetchStrategy::Sequential => {
                for backend in &self.backends {
                    match self.attempt(backend, did, policy).await {
                        Attempt::Found(bytes, doc) => return Ok((bytes, doc)),
                        other => {
                            tracing::debug!(backend = backend.name(), did = %did, "backend miss, trying next");
                            failures.push(other);
                        }
                    }
                }
            }
            FetchStrategy::Race { max_in_flight } => {
                let pending: Vec<BoxFuture<'_, Attempt>> = self
                    .backends
                    .iter()
                    .map(|backend| self.attempt(backend, did, policy).boxed())
                    .collect();
                let mut attempts = stream::iter(pending).buffer_unordered(max_in_flight.max(1));
                while let Some(attempt) = attempts.next().await {
                    match attempt {
                        Attempt::Found(bytes, doc) => return Ok((bytes, doc)),
                        other => failures.push(other),
                    }
                }
            }
        }
        Err(exhausted(did, failures))
    }
}

fn exhausted(did: &Did, failures: Vec<Attempt>) -> ResolveError {
    let mut invalid = None;
    let mut last_failure = None;
    for failure in failures {
        match failure {
            Attempt::Absent => return ResolveError::NotFound(did.to_string()),
            Attempt::Invalid(reason) => invalid = Some(reason),
            Attempt::Failed(e) => last_failure = Some(e),
            Attempt::Found(..) => {}
        }
    }
    match (invalid, last_failure) {
        (Some(reason), _) => ResolveError::InvalidDocument(reason),
        (None, Some(e)) => e,
        (None, None) => ResolveError::NotFound(did.to_string()),
    }
}

/// Methods whose documents live on backends (`ledger`, `web`, or registered ones).
pub struct ChainMethodHandler {
    method: DidMethod,
    chain: BackendChain,
    policy: SignaturePolicy,
    key_types: Vec<KeyType>,
}

impl ChainMethodHandler {
    pub fn new(method: DidMethod, chain: BackendChain, policy: SignaturePolicy, key_types: Vec<KeyType>) -> Self {
        Self {
            method,
            chain,
            policy,
            key_types,
        }
    }

    /// Chain-anchored, self-signed documents.
    pub fn ledger(chain: BackendChain) -> Self {
        Self::new(
            DidMethod::Ledger,
            chain,
            SignaturePolicy::SelfCertifying,
            vec![KeyType::Ed25519, KeyType::Secp256k1],
        )
    }

    /// Hosted documents without an embedded signature.
    pub fn web(chain: BackendChain) -> Self {
        Self::new(
            DidMethod::Web,
            chain,
            SignaturePolicy::Optional,
            vec![KeyType::Ed25519, KeyType::Secp256k1, KeyType::X25519],
        )
    }

    pub fn chain(&self) -> &BackendChain {
        &self.chain
    }
}

#[async_trait]
impl MethodHandler for ChainMethodHandler {
    fn method(&self) -> &DidMethod {
        &self.method
    }

    fn key_types(&self) -> &[KeyType] {
        &self.key_types
    }

    fn signature_policy(&self) -> SignaturePolicy {
        self.policy
    }

    async fn fetch(&self, did: &Did) -> Result<Vec<u8>, ResolveError> {
        let (bytes, _) = self.chain.fetch_valid(did, self.policy).await?;
        Ok(bytes)
    }

    async fn resolve(&self, did: &Did) -> Result<DidDocument, ResolveError> {
        let (_, document) = self.chain.fetch_valid(did, self.policy).await?;
        Ok(document)
    }

    fn backends(&self) -> &[Arc<dyn DocumentBackend>] {
        self.chain.backends()
    }
}

/// Closed set of built-in methods plus a table of registered ones.
pub struct MethodRegistry {
    key: Arc<dyn MethodHandler>,
    ledger: Option<Arc<dyn MethodHandler>>,
    web: Option<Arc<dyn MethodHandler>>,
    others: HashMap<String, Arc<dyn MethodHandler>>,
}

impl MethodRegistry {
    /// Registry that only knows `did:key`.
    pub fn new() -> Self {
        Self {
            key: Arc::new(KeyMethodHandler::new()),
            ledger: None,
            web: None,
            others: HashMap::new(),
        }
    }

    /// Add a handler, replacing any earlier one for the same method.
    pub fn register(&mut self, handler: Arc<dyn MethodHandler>) {
        match handler.method().clone() {
            DidMethod::Key => self.key = handler,
            DidMethod::Ledger => self.ledger = Some(handler),
            DidMethod::Web => self.web = Some(handler),
            DidMethod::Other(name) => {
                self.others.insert(name, handler);
            }
        }
    }

    /// Builder form of [`MethodRegistry::register`].
    pub fn with(mut self, handler: Arc<dyn MethodHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Handler for `method`, or `UnsupportedMethod`.
    pub fn handler(&self, method: &DidMethod) -> Result<Arc<dyn MethodHandler>, ResolveError> {
        let handler = match method {
            DidMethod::Key => Some(&self.key),
            DidMethod::Ledger => self.ledger.as_ref(),
            DidMethod::Web => self.web.as_ref(),
            DidMethod::Other(name) => self.others.get(name),
        };
        handler
            .cloned()
            .ok_or_else(|| ResolveError::MethodUnsupported(method.as_str().to_string()))
    }

    /// Registered method names, sorted.
    pub fn methods(&self) -> Vec<String> {
        let mut names = vec![DidMethod::Key.as_str().to_string()];
        if self.ledger.is_some() {
            names.push(DidMethod::Ledger.as_str().to_string());
        }
        if self.web.is_some() {
            names.push(DidMethod::Web.as_str().to_string());
        }
        let mut others: Vec<String> = self.others.keys().cloned().collect();
        others.sort();
        names.extend(others);
        names
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}
