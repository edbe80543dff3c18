//! The external interface: six identity operations returning `{kind, message}` errors.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use attest_core::{
    Categorized, Claims, Credential, Did, DidMethod, ErrorReport, KeyType, Presentation,
    RevocationEntry,
};
use attest_disclosure::{DisclosureRequest, SelectiveDisclosureManager, VerificationReport};
use attest_proof::{CircuitTable, Predicate, ProofEngine, ProofWorkerPool};
use attest_registry::{CredentialIssuer, CredentialRegistry, RegistryOptions};
use attest_resolver::{
    BackendChain, ChainMethodHandler, DidDocument, DidRegistrar, DidResolver, DocumentBackend,
    DocumentResolver, HttpBackend, InMemoryLedger, MethodRegistry, ResolverStats,
};
use attest_trust::{KeyStore, TrustStore};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{AttestConfig, BackendConfig};
use crate::error::ServiceError;
use crate::storage::RocksLedger;

/// Credential type stamped on credentials issued through the service.
pub const CREDENTIAL_TYPE: &str = "IdentityCredential";

/// Snapshot of what the service is configured with and has seen.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceSummary {
    pub methods: Vec<String>,
    pub circuits: Vec<String>,
    pub proof_workers: usize,
    pub trust_anchors: usize,
    pub credentials: usize,
    pub revocations: usize,
    pub resolver: ResolverStats,
}

/// Identity operations over one resolver, registry and proof engine.
pub struct IdentityService {
    trust: Arc<TrustStore>,
    resolver: DidResolver,
    registrar: DidRegistrar,
    engine: Arc<ProofEngine>,
    pool: Arc<ProofWorkerPool>,
    registry: Arc<CredentialRegistry>,
    issuer: CredentialIssuer,
    disclosure: SelectiveDisclosureManager,
    resolve_timeout: Duration,
}

impl IdentityService {
    /// Build the service. Must be called from within a Tokio runtime.
    pub fn new(config: &AttestConfig) -> Result<Self, ServiceError> {
        config.validate()?;
        let keys = Arc::new(KeyStore::new());
        let trust = Arc::new(TrustStore::new(config.trust.anchors.clone())?);

        let mut opened: HashMap<String, Arc<dyn DocumentBackend>> = HashMap::new();
        let ledger = backends(config, &config.resolver.ledger, &mut opened)?;
        let web = backends(config, &config.resolver.web, &mut opened)?;
        let chain_options = config.resolver.chain_options();
        let methods = MethodRegistry::new()
            .with(Arc::new(ChainMethodHandler::ledger(BackendChain::new(
                ledger,
                chain_options.clone(),
            ))))
            .with(Arc::new(ChainMethodHandler::web(BackendChain::new(web, chain_options))));
        let resolver = DidResolver::new(methods, config.resolver.resolver_options());
        let registrar = DidRegistrar::new(
            Arc::clone(&keys),
            resolver.clone(),
            config.resolver.web_domain.clone(),
        );
        let documents: Arc<dyn DocumentResolver> = Arc::new(resolver.clone());

        let engine = Arc::new(ProofEngine::new(
            CircuitTable::standard(config.proofs.range_bits),
            Arc::clone(&keys),
        ));
        let pool = Arc::new(ProofWorkerPool::new(
            Arc::clone(&engine),
            config.proofs.workers,
            config.proofs.queue_capacity,
        ));
        let registry = Arc::new(CredentialRegistry::new(
            Arc::clone(&documents),
            Arc::clone(&trust),
            Arc::clone(&engine),
            RegistryOptions {
                require_anchor: config.trust.require_anchor,
            },
        ));
        let issuer = CredentialIssuer::new(keys, Arc::clone(&documents), Arc::clone(&engine));
        let disclosure =
            SelectiveDisclosureManager::new(Arc::clone(&engine), Arc::clone(&registry), documents)
                .with_pool(Arc::clone(&pool), config.proofs.timeout());

        tracing::info!(
            methods = ?resolver.methods().methods(),
            circuits = engine.circuits().len(),
            workers = pool.worker_count(),
            "identity service ready"
        );
        Ok(Self {
            trust,
            resolver,
            registrar,
            engine,
            pool,
            registry,
            issuer,
            disclosure,
            resolve_timeout: config.resolver.resolve_timeout(),
        })
    }

    /// Create a DID controlled by a freshly generated key.
    pub async fn create_did(&self, method: &DidMethod, key_type: KeyType) -> Result<DidDocument, ErrorReport> {
        let document = self.registrar.create(method, key_type).await.map_err(report)?;
        Ok(DidDocument::clone(&document))
    }

    /// Resolve a DID given as a string.
    pub async fn resolve_did(&self, did: &str) -> Result<DidDocument, ErrorReport> {
        let did = Did::parse(did).map_err(report)?;
        let document = self
            .resolver
            .resolve_with_timeout(&did, self.resolve_timeout)
            .await
            .map_err(report)?;
        Ok(DidDocument::clone(&document))
    }

    /// Issue a credential with a key held for `issuer` and record it.
    pub async fn issue_credential(
        &self,
        issuer: &Did,
        subject: &Did,
        claims: Claims,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Credential, ErrorReport> {
        let credential = self
            .issuer
            .issue(issuer, subject, CREDENTIAL_TYPE, claims, expires_at)
            .await
            .map_err(report)?;
        self.registry.issue(credential.clone()).await.map_err(report)?;
        Ok(credential)
    }

    /// Revoke a credential. Repeating the call returns the original entry.
    pub fn revoke_credential(&self, credential_id: &str, reason: &str) -> Result<RevocationEntry, ErrorReport> {
        let outcome = self.registry.revoke(credential_id, reason).map_err(report)?;
        Ok(outcome.entry().clone())
    }

    /// Build a presentation of a registered credential, disclosing `disclose` and proving `prove`.
    pub async fn build_presentation(
        &self,
        credential_id: &str,
        attributes: &[&str],
        predicates: Vec<Predicate>,
        challenge: &str,
        audience: &Did,
    ) -> Result<Presentation, ErrorReport> {
        let credential = self
            .registry
            .get(credential_id)
            .ok_or_else(|| report(ServiceError::CredentialNotFound(credential_id.to_string())))?;
        let request = DisclosureRequest {
            attributes: attributes.iter().map(|a| a.to_string()).collect(),
            predicates,
        };
        self.disclosure
            .build_presentation(&credential, &request, challenge, audience)
            .await
            .map_err(report)
    }

    /// Verify a presentation against the expected nonce and audience.
    pub async fn verify_presentation(
        &self,
        presentation: &Presentation,
        challenge: &str,
        audience: &Did,
    ) -> Result<VerificationReport, ErrorReport> {
        self.verify_presentation_requiring(presentation, challenge, audience, &[])
            .await
    }

    /// Verify and additionally require a proof of each of `required`.
    pub async fn verify_presentation_requiring(
        &self,
        presentation: &Presentation,
        challenge: &str,
        audience: &Did,
        required: &[Predicate],
    ) -> Result<VerificationReport, ErrorReport> {
        self.disclosure
            .verify_presentation_with(presentation, challenge, audience, required)
            .await
            .map_err(report)
    }

    pub fn credential(&self, credential_id: &str) -> Option<Arc<Credential>> {
        self.registry.get(credential_id)
    }

    pub fn summary(&self) -> ServiceSummary {
        ServiceSummary {
            methods: self.resolver.methods().methods(),
            circuits: self
                .engine
                .circuits()
                .ids()
                .into_iter()
                .map(|id| id.to_string())
                .collect(),
            proof_workers: self.pool.worker_count(),
            trust_anchors: self.trust.snapshot().len(),
            credentials: self.registry.len(),
            revocations: self.registry.revocations().len(),
            resolver: self.resolver.stats(),
        }
    }
}

fn report(err: impl Into<ServiceError>) -> ErrorReport {
    let err = err.into();
    let report = err.report();
    tracing::debug!(kind = %report.kind, error = %report.message, "operation failed");
    report
}

fn backends(
    config: &AttestConfig,
    entries: &[BackendConfig],
    opened: &mut HashMap<String, Arc<dyn DocumentBackend>>,
) -> Result<Vec<Arc<dyn DocumentBackend>>, ServiceError> {
    entries
        .iter()
        .map(|entry| -> Result<Arc<dyn DocumentBackend>, ServiceError> {
            if let Some(backend) = opened.get(entry.name()) {
                return Ok(Arc::clone(backend));
            }
            let backend: Arc<dyn DocumentBackend> = match entry {
                BackendConfig::Memory { name } => Arc::new(InMemoryLedger::new(name.clone())),
                BackendConfig::Http { name, url } => Arc::new(
                    HttpBackend::new(name.clone(), url, config.resolver.chain_options().call_timeout)
                        .map_err(|e| ServiceError::Config(format!("backend {}: {}", name, e)))?,
                ),
                BackendConfig::Rocksdb { name } => Arc::new(RocksLedger::open(
                    name.clone(),
                    &config.storage.data_dir.join(name),
                )?),
            };
            opened.insert(entry.name().to_string(), Arc::clone(&backend));
            Ok(backend)
        })
        .collect()
}
