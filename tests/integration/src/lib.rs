//! Shared fixtures for the cross-crate integration tests.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use attest_core::{ClaimValue, Claims, Did, DidMethod, KeyType};
use attest_disclosure::SelectiveDisclosureManager;
use attest_proof::{CircuitTable, ProofEngine, DEFAULT_RANGE_BITS};
use attest_registry::{CredentialIssuer, CredentialRegistry, RegistryOptions};
use attest_resolver::{
    BackendChain, BackendError, ChainMethodHandler, ChainOptions, DidRegistrar, DidResolver,
    DocumentBackend, DocumentResolver, InMemoryLedger, MethodRegistry, ResolverOptions,
    RetryPolicy,
};
use attest_trust::{KeyStore, TrustStore};

const HEALTHY: u8 = 0;
const DOWN: u8 = 1;
const SLOW: u8 = 2;

/// In-memory backend whose availability can be switched while a test runs.
pub struct ScriptedBackend {
    inner: InMemoryLedger,
    mode: AtomicU8,
    delay: Duration,
    fetches: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            inner: InMemoryLedger::new(name),
            mode: AtomicU8::new(HEALTHY),
            delay,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn healthy(&self) {
        self.mode.store(HEALTHY, Ordering::SeqCst);
    }

    /// Fail every call as unavailable.
    pub fn down(&self) {
        self.mode.store(DOWN, Ordering::SeqCst);
    }

    /// Sleep for the configured delay before answering.
    pub fn slow(&self) {
        self.mode.store(SLOW, Ordering::SeqCst);
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentBackend for ScriptedBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn fetch(&self, did: &Did) -> Result<Option<Vec<u8>>, BackendError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.mode.load(Ordering::SeqCst) {
            DOWN => Err(BackendError::Unavailable(format!("{} is down", self.name()))),
            SLOW => {
                tokio::time::sleep(self.delay).await;
                self.inner.fetch(did).await
            }
            _ => self.inner.fetch(did).await,
        }
    }

    async fn publish(&self, did: &Did, version: u64, document: Vec<u8>) -> Result<(), BackendError> {
        if self.mode.load(Ordering::SeqCst) == DOWN {
            return Err(BackendError::Unavailable(format!("{} is down", self.name())));
        }
        self.inner.publish(did, version, document).await
    }
}

/// Two ledger backends in priority order plus everything built on top of them.
pub struct Harness {
    pub keys: Arc<KeyStore>,
    pub primary: Arc<ScriptedBackend>,
    pub secondary: Arc<ScriptedBackend>,
    pub resolver: DidResolver,
    pub registrar: DidRegistrar,
    pub engine: Arc<ProofEngine>,
    pub registry: Arc<CredentialRegistry>,
    pub issuer: CredentialIssuer,
    pub disclosure: SelectiveDisclosureManager,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(100))
    }

    pub fn with_delay(delay: Duration) -> Self {
        let keys = Arc::new(KeyStore::new());
        let primary = Arc::new(ScriptedBackend::new("primary", delay));
        let secondary = Arc::new(ScriptedBackend::new("secondary", delay));
        let web = Arc::new(InMemoryLedger::new("web"));

        let chain_options = ChainOptions {
            call_timeout: Duration::from_millis(500),
            ..ChainOptions::default()
        };
        let methods = MethodRegistry::new()
            .with(Arc::new(ChainMethodHandler::ledger(BackendChain::new(
                vec![primary.clone(), secondary.clone()],
                chain_options.clone(),
            ))))
            .with(Arc::new(ChainMethodHandler::web(BackendChain::new(
                vec![web],
                chain_options,
            ))));
        let resolver = DidResolver::new(
            methods,
            ResolverOptions {
                retry: RetryPolicy {
                    max_attempts: 2,
                    initial_interval: Duration::from_millis(10),
                    max_interval: Duration::from_millis(20),
                    max_elapsed: Duration::from_secs(1),
                },
                ..ResolverOptions::default()
            },
        );
        let registrar = DidRegistrar::new(Arc::clone(&keys), resolver.clone(), "example.com");
        let documents: Arc<dyn DocumentResolver> = Arc::new(resolver.clone());
        let engine = Arc::new(ProofEngine::new(
            CircuitTable::standard(DEFAULT_RANGE_BITS),
            Arc::clone(&keys),
        ));
        let registry = Arc::new(CredentialRegistry::new(
            Arc::clone(&documents),
            Arc::new(TrustStore::default()),
            Arc::clone(&engine),
            RegistryOptions::default(),
        ));
        let issuer = CredentialIssuer::new(Arc::clone(&keys), Arc::clone(&documents), Arc::clone(&engine));
        let disclosure =
            SelectiveDisclosureManager::new(Arc::clone(&engine), Arc::clone(&registry), documents);

        Self {
            keys,
            primary,
            secondary,
            resolver,
            registrar,
            engine,
            registry,
            issuer,
            disclosure,
        }
    }

    pub async fn did(&self, method: DidMethod) -> Did {
        self.registrar
            .create(&method, KeyType::Ed25519)
            .await
            .unwrap_or_else(|e| panic!("create {} DID: {}", method.as_str(), e))
            .id
            .clone()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Age 34, country US.
pub fn adult_claims() -> Claims {
    let mut claims = Claims::new();
    claims.insert("age".into(), ClaimValue::Integer(34));
    claims.insert("country".into(), ClaimValue::String("US".into()));
    claims
}
