use std::sync::Arc;

use attest_core::{ClaimValue, Claims, Did, DidMethod, KeyType};
use attest_proof::{CircuitTable, ProofEngine, DEFAULT_RANGE_BITS};
use attest_resolver::{
    BackendChain, ChainMethodHandler, ChainOptions, DidRegistrar, DidResolver, DocumentResolver,
    InMemoryLedger, MethodRegistry, ResolverOptions,
};
use attest_trust::{KeyStore, TrustAnchor, TrustStore};
use chrono::{Duration, Utc};

use crate::issuer::CredentialIssuer;
use crate::registry::{CredentialRegistry, RegistryOptions};

pub(crate) struct Fixture {
    pub keys: Arc<KeyStore>,
    pub trust: Arc<TrustStore>,
    pub engine: Arc<ProofEngine>,
    pub resolver: DidResolver,
    pub registrar: DidRegistrar,
}

impl Fixture {
    pub fn new() -> Self {
        let keys = Arc::new(KeyStore::new());
        let ledger = Arc::new(InMemoryLedger::new("ledger"));
        let methods = MethodRegistry::new().with(Arc::new(ChainMethodHandler::ledger(
            BackendChain::new(vec![ledger], ChainOptions::default()),
        )));
        let resolver = DidResolver::new(methods, ResolverOptions::default());
        Self {
            registrar: DidRegistrar::new(Arc::clone(&keys), resolver.clone(), "example.com"),
            engine: Arc::new(ProofEngine::new(
                CircuitTable::standard(DEFAULT_RANGE_BITS),
                Arc::clone(&keys),
            )),
            trust: Arc::new(TrustStore::default()),
            keys,
            resolver,
        }
    }

    fn document_resolver(&self) -> Arc<dyn DocumentResolver> {
        Arc::new(self.resolver.clone())
    }

    pub async fn ledger_issuer(&self, key_type: KeyType) -> Did {
        self.registrar
            .create(&DidMethod::Ledger, key_type)
            .await
            .unwrap()
            .id
            .clone()
    }

    pub fn holder(&self) -> Did {
        Did::parse("did:key:z6MkholderPlaceholder").unwrap()
    }

    pub fn issuer(&self) -> CredentialIssuer {
        CredentialIssuer::new(
            Arc::clone(&self.keys),
            self.document_resolver(),
            Arc::clone(&self.engine),
        )
    }

    pub fn registry(&self, options: RegistryOptions) -> CredentialRegistry {
        CredentialRegistry::new(
            self.document_resolver(),
            Arc::clone(&self.trust),
            Arc::clone(&self.engine),
            options,
        )
    }

    pub fn anchor(&self, did: &Did, key_type: KeyType, public_key_multibase: String) -> TrustAnchor {
        TrustAnchor {
            issuer_did: did.clone(),
            key_type,
            public_key_multibase,
            valid_from: Utc::now() - Duration::days(1),
            valid_until: Utc::now() + Duration::days(1),
        }
    }
}

pub(crate) fn claims() -> Claims {
    let mut claims = Claims::new();
    claims.insert("age".into(), ClaimValue::Integer(34));
    claims.insert("country".into(), ClaimValue::String("US".into()));
    claims
}
