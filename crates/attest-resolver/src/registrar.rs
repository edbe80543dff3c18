//! Creation and update of DIDs whose keys are held by the local key store.

use std::sync::Arc;

use attest_core::{Did, DidMethod, KeyType, SignatureProof};
use attest_trust::{KeyId, KeyStore};

use crate::backend::BackendError;
use crate::document::{self_certifying_id, DidDocument, DocumentMutation, VerificationMethod};
use crate::error::ResolveError;
use crate::method::{key_did, MethodHandler};
use crate::resolver::DidResolver;

/// Creates and updates DIDs whose keys live in the local key store.
pub struct DidRegistrar {
    keys: Arc<KeyStore>,
    resolver: DidResolver,
    web_domain: String,
}

impl DidRegistrar {
    pub fn new(keys: Arc<KeyStore>, resolver: DidResolver, web_domain: impl Into<String>) -> Self {
        Self {
            keys,
            resolver,
            web_domain: web_domain.into(),
        }
    }

    pub fn resolver(&self) -> &DidResolver {
        &self.resolver
    }

    /// Generate a key, derive the DID and publish version 1 of its document.
    pub async fn create(&self, method: &DidMethod, key_type: KeyType) -> Result<Arc<DidDocument>, ResolveError> {
        let handler = self.resolver.methods().handler(method)?;
        if !handler.key_types().contains(&key_type) {
            return Err(ResolveError::UnsupportedKeyType {
                method: method.as_str().to_string(),
                key_type: key_type.to_string(),
            });
        }

        let key_id = self.keys.generate(key_type)?;
        match self.establish(handler.as_ref(), method, key_type, key_id).await {
            Ok(document) => {
                tracing::info!(did = %document.id, key_type = %key_type, "created DID");
                Ok(document)
            }
            Err(e) => {
                // Never bound to a DID, so the fresh key controls nothing.
                self.keys.remove(key_id);
                Err(e)
            }
        }
    }

    async fn establish(
        &self,
        handler: &dyn MethodHandler,
        method: &DidMethod,
        key_type: KeyType,
        key_id: KeyId,
    ) -> Result<Arc<DidDocument>, ResolveError> {
        let public_key = self.keys.public_key(key_id)?;
        let did = match method {
            DidMethod::Key => key_did(key_type, &public_key)?,
            DidMethod::Ledger => Did::from_parts(method, &self_certifying_id(&public_key))?,
            DidMethod::Web => Did::from_parts(
                method,
                &format!("{}:{}", self.web_domain, uuid::Uuid::now_v7().simple()),
            )?,
            DidMethod::Other(_) => Did::from_parts(method, &uuid::Uuid::now_v7().simple().to_string())?,
        };

        if *method == DidMethod::Key {
            let document = self.resolver.resolve(&did).await?;
            self.keys.bind_did(&did, key_id)?;
            return Ok(document);
        }

        let vm = VerificationMethod::new(&did, "key-1", key_type, &public_key);
        let mut document = DidDocument::new(did.clone(), vec![vm]);
        self.sign(handler, &mut document, key_id)?;
        self.publish(handler, &document).await?;
        self.keys.bind_did(&did, key_id)?;
        Ok(self.resolver.cache().insert(document))
    }

    /// Apply a mutation to the current document and publish the next version.
    pub async fn update(&self, did: &Did, mutation: DocumentMutation) -> Result<Arc<DidDocument>, ResolveError> {
        let method = did.method();
        if method == DidMethod::Key {
            return Err(ResolveError::InvalidDid(format!(
                "{} is derived from its key and cannot be updated",
                did
            )));
        }
        let handler = self.resolver.methods().handler(&method)?;
        let key_id = self.keys.signing_key_for(did)?;

        self.resolver.invalidate(did);
        let current = self.resolver.resolve(did).await?;
        let mut next = DidDocument::clone(&current);
        next.apply(mutation)?;
        self.sign(handler.as_ref(), &mut next, key_id)?;
        next.validate(did, handler.signature_policy())?;
        self.publish(handler.as_ref(), &next).await?;

        self.resolver.invalidate(did);
        tracing::info!(did = %did, version = next.version, "updated DID document");
        Ok(self.resolver.cache().insert(next))
    }

    fn sign(&self, handler: &dyn MethodHandler, document: &mut DidDocument, key_id: KeyId) -> Result<(), ResolveError> {
        if !handler.signature_policy().requires_signature() {
            return Ok(());
        }
        let public_key = self.keys.public_key(key_id)?;
        let vm = document
            .verification_methods
            .iter()
            .find(|vm| vm.public_key().ok().as_deref() == Some(public_key.as_slice()))
            .ok_or_else(|| {
                ResolveError::InvalidDocument(format!(
                    "{} no longer lists its controlling key",
                    document.id
                ))
            })?;
        let algorithm = vm.key_type().ok_or_else(|| {
            ResolveError::InvalidDocument(format!("unknown key type {}", vm.method_type))
        })?;
        let verification_method = vm.id.clone();

        document.proof = None;
        let signature_value = self.keys.sign(key_id, &document.signing_payload()?)?;
        document.proof = Some(SignatureProof {
            algorithm,
            verification_method,
            signature_value,
        });
        Ok(())
    }

    /// Publish to every backend of the method. Succeeds if any backend accepted.
    async fn publish(&self, handler: &dyn MethodHandler, document: &DidDocument) -> Result<(), ResolveError> {
        let backends = handler.backends();
        if backends.is_empty() {
            return Err(ResolveError::BackendUnavailable(format!(
                "no backends configured for {}",
                handler.method().as_str()
            )));
        }

        let bytes = document.to_bytes()?;
        let mut accepted = 0usize;
        let mut last_error = None;
        for backend in backends {
            match backend.publish(&document.id, document.version, bytes.clone()).await {
                Ok(()) => accepted += 1,
                Err(e) => {
                    tracing::warn!(backend = backend.name(), did = %document.id, error = %e, "publish failed");
                    last_error = Some(e);
                }
            }
        }
        match (accepted, last_error) {
            (0, Some(BackendError::Rejected(msg))) => Err(ResolveError::PublishRejected(msg)),
            (0, Some(BackendError::Timeout(msg))) => Err(ResolveError::BackendTimeout(msg)),
            (0, Some(BackendError::Unavailable(msg))) => Err(ResolveError::BackendUnavailable(msg)),
            _ => Ok(()),
        }
    }
}
