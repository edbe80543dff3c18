use std::collections::HashSet;

use attest_core::{Did, KeyType, SignatureProof};
use attest_crypto::{hash, multibase_decode, multibase_encode, verify_with_key_type, Hash};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// JSON-LD context of every document.
pub const DID_CONTEXT: &str = "https://www.w3.org/ns/did/v1";

/// A public key owned by a DID document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// e.g. `did:ledger:abc#key-1`
    pub id: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub controller: Did,
    pub public_key_multibase: String,
}

impl VerificationMethod {
    /// Method with id `<controller>#<fragment>`.
    pub fn new(controller: &Did, fragment: &str, key_type: KeyType, public_key: &[u8]) -> Self {
        Self {
            id: format!("{}#{}", controller, fragment),
            method_type: key_type.verification_method_type().to_string(),
            controller: controller.clone(),
            public_key_multibase: multibase_encode(public_key),
        }
    }

    pub fn key_type(&self) -> Option<KeyType> {
        KeyType::from_verification_method_type(&self.method_type)
    }

    /// Decode the multibase public key.
    pub fn public_key(&self) -> Result<Vec<u8>, ResolveError> {
        multibase_decode(&self.public_key_multibase).map_err(|e| {
            ResolveError::InvalidDocument(format!("verification method {}: {}", self.id, e))
        })
    }
}

/// A service endpoint advertised by a DID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEndpoint {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub service_endpoint: String,
}

/// Changes applied to a document. Every applied mutation bumps the version.
#[derive(Debug, Clone)]
pub enum DocumentMutation {
    AddService(ServiceEndpoint),
    RemoveService(String),
    AddVerificationMethod(VerificationMethod),
    RemoveVerificationMethod(String),
}

/// Whether a document must carry a self-signature to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    /// Signed by the key the identifier was derived from. That key is in
    /// every version, so each update is signed by a key of its predecessor.
    SelfCertifying,
    Required,
    /// Verified only when present.
    Optional,
}

impl SignaturePolicy {
    pub fn requires_signature(self) -> bool {
        !matches!(self, Self::Optional)
    }
}

/// Method-specific id of a self-certifying DID controlled by `public_key`.
pub fn self_certifying_id(public_key: &[u8]) -> String {
    multibase_encode(&hash(public_key)[..16])
}

/// W3C DID Document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocument {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: Did,
    #[serde(rename = "verificationMethod")]
    pub verification_methods: Vec<VerificationMethod>,
    /// Kept sorted by id.
    #[serde(rename = "service", default)]
    pub services: Vec<ServiceEndpoint>,
    pub version: u64,
    pub updated: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<SignatureProof>,
}

impl DidDocument {
    /// Version 1 of a document.
    pub fn new(id: Did, verification_methods: Vec<VerificationMethod>) -> Self {
        Self {
            context: vec![DID_CONTEXT.to_string()],
            id,
            verification_methods,
            services: Vec::new(),
            version: 1,
            updated: Utc::now(),
            proof: None,
        }
    }

    /// Parse a JSON document.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ResolveError> {
        serde_json::from_slice(bytes)
            .map_err(|e| ResolveError::InvalidDocument(format!("malformed document: {}", e)))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ResolveError> {
        serde_json::to_vec(self).map_err(|e| ResolveError::Internal(e.to_string()))
    }

    /// Canonical bytes covered by the self-signature: the document without `proof`.
    pub fn signing_payload(&self) -> Result<Vec<u8>, ResolveError> {
        let mut unsigned = self.clone();
        unsigned.proof = None;
        unsigned.to_bytes()
    }

    /// Content address of this version.
    pub fn content_hash(&self) -> Result<Hash, ResolveError> {
        Ok(hash(&self.signing_payload()?))
    }

    /// Look up a verification method by its full id.
    pub fn verification_method(&self, id: &str) -> Option<&VerificationMethod> {
        self.verification_methods.iter().find(|vm| vm.id == id)
    }

    /// First method whose key can sign.
    pub fn primary_signing_method(&self) -> Option<&VerificationMethod> {
        self.verification_methods
            .iter()
            .find(|vm| vm.key_type().is_some_and(|kt| kt.can_sign()))
    }

    /// Structural and cryptographic validation of a fetched document.
    pub fn validate(&self, expected: &Did, policy: SignaturePolicy) -> Result<(), ResolveError> {
        if &self.id != expected {
            return Err(ResolveError::InvalidDocument(format!(
                "document id {} does not match {}",
                self.id, expected
            )));
        }
        if self.verification_methods.is_empty() {
            return Err(ResolveError::InvalidDocument(
                "document has no verification methods".into(),
            ));
        }
        if self.version == 0 {
            return Err(ResolveError::InvalidDocument("document version must start at 1".into()));
        }

        let prefix = format!("{}#", self.id);
        let mut seen = HashSet::new();
        for vm in &self.verification_methods {
            if !vm.id.starts_with(&prefix) || !seen.insert(vm.id.as_str()) {
                return Err(ResolveError::InvalidDocument(format!(
                    "bad verification method id {}",
                    vm.id
                )));
            }
            let key_type = vm.key_type().ok_or_else(|| {
                ResolveError::InvalidDocument(format!("unknown key type {}", vm.method_type))
            })?;
            let key = vm.public_key()?;
            if let Some(expected_len) = expected_key_len(key_type) {
                if key.len() != expected_len {
                    return Err(ResolveError::InvalidDocument(format!(
                        "{} key in {} must be {} bytes, got {}",
                        key_type,
                        vm.id,
                        expected_len,
                        key.len()
                    )));
                }
            } else if key.is_empty() {
                return Err(ResolveError::InvalidDocument(format!("empty key in {}", vm.id)));
            }
        }

        let mut services = HashSet::new();
        if !self.services.iter().all(|s| services.insert(s.id.as_str())) {
            return Err(ResolveError::InvalidDocument("duplicate service id".into()));
        }

        match (&self.proof, policy) {
            (Some(_), SignaturePolicy::SelfCertifying) => {
                self.verify_proof()?;
                self.verify_inception_key()
            }
            (Some(_), _) => self.verify_proof(),
            (None, SignaturePolicy::Optional) => Ok(()),
            (None, _) => Err(ResolveError::InvalidDocument(
                "missing self-signature".into(),
            )),
        }
    }

    /// The proof key must be the one the identifier was derived from.
    fn verify_inception_key(&self) -> Result<(), ResolveError> {
        let signer = self
            .proof
            .as_ref()
            .and_then(|proof| self.verification_method(&proof.verification_method))
            .ok_or_else(|| ResolveError::InvalidDocument("missing self-signature".into()))?;
        if self_certifying_id(&signer.public_key()?) != self.id.method_specific_id() {
            return Err(ResolveError::InvalidDocument(format!(
                "{} is not controlled by {}",
                self.id, signer.id
            )));
        }
        Ok(())
    }

    /// Check the embedded self-signature against the document's own key.
    pub fn verify_proof(&self) -> Result<(), ResolveError> {
        let proof = self
            .proof
            .as_ref()
            .ok_or_else(|| ResolveError::InvalidDocument("missing self-signature".into()))?;
        let vm = self.verification_method(&proof.verification_method).ok_or_else(|| {
            ResolveError::InvalidDocument(format!(
                "proof references unknown method {}",
                proof.verification_method
            ))
        })?;
        if vm.key_type() != Some(proof.algorithm) {
            return Err(ResolveError::InvalidDocument(format!(
                "proof algorithm {} does not match {}",
                proof.algorithm, vm.method_type
            )));
        }
        verify_with_key_type(
            proof.algorithm,
            &vm.public_key()?,
            &self.signing_payload()?,
            &proof.signature_value,
        )
        .map_err(|e| ResolveError::InvalidDocument(format!("self-signature: {}", e)))
    }

    /// Apply a mutation, bump the version and drop the now stale proof.
    pub fn apply(&mut self, mutation: DocumentMutation) -> Result<(), ResolveError> {
        match mutation {
            DocumentMutation::AddService(service) => {
                self.services.retain(|s| s.id != service.id);
                self.services.push(service);
                self.services.sort_by(|a, b| a.id.cmp(&b.id));
            }
            DocumentMutation::RemoveService(id) => {
                let before = self.services.len();
                self.services.retain(|s| s.id != id);
                if self.services.len() == before {
                    return Err(ResolveError::InvalidDocument(format!("no service {}", id)));
                }
            }
            DocumentMutation::AddVerificationMethod(vm) => {
                if self.verification_method(&vm.id).is_some() {
                    return Err(ResolveError::InvalidDocument(format!(
                        "verification method {} already exists",
                        vm.id
                    )));
                }
                self.verification_methods.push(vm);
            }
            DocumentMutation::RemoveVerificationMethod(id) => {
                if self.verification_methods.len() == 1 {
                    return Err(ResolveError::InvalidDocument(
                        "cannot remove the last verification method".into(),
                    ));
                }
                let before = self.verification_methods.len();
                self.verification_methods.retain(|vm| vm.id != id);
                if self.verification_methods.len() == before {
                    return Err(ResolveError::InvalidDocument(format!(
                        "no verification method {}",
                        id
                    )));
                }
            }
        }
        self.version += 1;
        self.updated = Utc::now();
        self.proof = None;
        Ok(())
    }
}

fn expected_key_len(key_type: KeyType) -> Option<usize> {
    match key_type {
        KeyType::Ed25519 | KeyType::X25519 => Some(32),
        KeyType::Secp256k1 => Some(33),
        KeyType::Rsa => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attest_crypto::{sign, KeyPair};

    fn signed_document(kp: &KeyPair) -> DidDocument {
        let did = Did::parse("did:ledger:abc").unwrap();
        let vm = VerificationMethod::new(&did, "key-1", KeyType::Ed25519, kp.public_key().as_bytes());
        let mut doc = DidDocument::new(did, vec![vm]);
        let payload = doc.signing_payload().unwrap();
        doc.proof = Some(SignatureProof {
            algorithm: KeyType::Ed25519,
            verification_method: doc.verification_methods[0].id.clone(),
            signature_value: sign(&payload, kp).to_bytes().to_vec(),
        });
        doc
    }

    #[test]
    fn test_wire_format_follows_w3c_names() {
        let doc = signed_document(&KeyPair::generate());
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["@context"][0], DID_CONTEXT);
        assert_eq!(json["id"], "did:ledger:abc");
        assert_eq!(json["verificationMethod"][0]["type"], "Ed25519VerificationKey2020");
        assert!(json["verificationMethod"][0]["publicKeyMultibase"]
            .as_str()
            .unwrap()
            .starts_with('z'));
        assert!(json["service"].as_array().unwrap().is_empty());
        assert_eq!(json["proof"]["type"], serde_json::Value::Null);
        assert_eq!(json["proof"]["algorithm"], "Ed25519");
    }

    #[test]
    fn test_bytes_roundtrip_keeps_signature_valid() {
        let doc = signed_document(&KeyPair::generate());
        let decoded = DidDocument::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, doc);
        assert!(decoded.validate(&doc.id, SignaturePolicy::Required).is_ok());
    }

    #[test]
    fn test_content_hash_stable_and_ignores_proof() {
        let kp = KeyPair::generate();
        let doc = signed_document(&kp);
        let mut unsigned = doc.clone();
        unsigned.proof = None;
        assert_eq!(doc.content_hash().unwrap(), unsigned.content_hash().unwrap());
        assert_eq!(doc.content_hash().unwrap(), doc.content_hash().unwrap());
    }

    #[test]
    fn test_validate_rejects_id_mismatch() {
        let doc = signed_document(&KeyPair::generate());
        let other = Did::parse("did:ledger:other").unwrap();
        assert!(matches!(
            doc.validate(&other, SignaturePolicy::Required),
            Err(ResolveError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_validate_rejects_empty_methods() {
        let mut doc = signed_document(&KeyPair::generate());
        doc.verification_methods.clear();
        assert!(doc.validate(&doc.id.clone(), SignaturePolicy::Optional).is_err());
    }

    #[test]
    fn test_validate_rejects_tampered_document() {
        let mut doc = signed_document(&KeyPair::generate());
        doc.version = 7;
        assert!(doc.validate(&doc.id.clone(), SignaturePolicy::Required).is_err());
    }

    #[test]
    fn test_validate_rejects_foreign_signature() {
        let mut doc = signed_document(&KeyPair::generate());
        let forged = signed_document(&KeyPair::generate());
        doc.proof = forged.proof;
        assert!(doc.validate(&doc.id.clone(), SignaturePolicy::Required).is_err());
    }

    #[test]
    fn test_missing_signature_policy() {
        let mut doc = signed_document(&KeyPair::generate());
        doc.proof = None;
        let id = doc.id.clone();
        assert!(doc.validate(&id, SignaturePolicy::Required).is_err());
        assert!(doc.validate(&id, SignaturePolicy::Optional).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_key_length() {
        let did = Did::parse("did:web:example.com").unwrap();
        let vm = VerificationMethod::new(&did, "key-1", KeyType::Secp256k1, &[2u8; 32]);
        let doc = DidDocument::new(did.clone(), vec![vm]);
        assert!(doc.validate(&did, SignaturePolicy::Optional).is_err());
    }

    #[test]
    fn test_apply_bumps_version_and_clears_proof() {
        let mut doc = signed_document(&KeyPair::generate());
        let before = doc.content_hash().unwrap();
        doc.apply(DocumentMutation::AddService(ServiceEndpoint {
            id: "did:ledger:abc#hub".into(),
            service_type: "CredentialHub".into(),
            service_endpoint: "https://hub.example.com".into(),
        }))
        .unwrap();
        assert_eq!(doc.version, 2);
        assert!(doc.proof.is_none());
        assert_ne!(doc.content_hash().unwrap(), before);
    }

    #[test]
    fn test_services_stay_sorted_and_unique() {
        let mut doc = signed_document(&KeyPair::generate());
        for id in ["did:ledger:abc#z", "did:ledger:abc#a", "did:ledger:abc#z"] {
            doc.apply(DocumentMutation::AddService(ServiceEndpoint {
                id: id.into(),
                service_type: "Hub".into(),
                service_endpoint: "https://x".into(),
            }))
            .unwrap();
        }
        let ids: Vec<&str> = doc.services.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["did:ledger:abc#a", "did:ledger:abc#z"]);
        assert_eq!(doc.version, 4);
    }

    fn self_certified_document(kp: &KeyPair) -> DidDocument {
        let did = Did::from_parts(
            &attest_core::DidMethod::Ledger,
            &self_certifying_id(kp.public_key().as_bytes()),
        )
        .unwrap();
        let vm = VerificationMethod::new(&did, "key-1", KeyType::Ed25519, kp.public_key().as_bytes());
        let mut doc = DidDocument::new(did, vec![vm]);
        let payload = doc.signing_payload().unwrap();
        doc.proof = Some(SignatureProof {
            algorithm: KeyType::Ed25519,
            verification_method: doc.verification_methods[0].id.clone(),
            signature_value: sign(&payload, kp).to_bytes().to_vec(),
        });
        doc
    }

    #[test]
    fn test_self_certifying_accepts_inception_key() {
        let doc = self_certified_document(&KeyPair::generate());
        assert!(doc.validate(&doc.id, SignaturePolicy::SelfCertifying).is_ok());
        // The hard-coded id of the other fixtures is not derived from any key.
        let plain = signed_document(&KeyPair::generate());
        assert!(plain.validate(&plain.id, SignaturePolicy::Required).is_ok());
        assert!(plain.validate(&plain.id, SignaturePolicy::SelfCertifying).is_err());
    }

    #[test]
    fn test_self_certifying_rejects_substituted_key() {
        let owner = self_certified_document(&KeyPair::generate());
        let did = owner.id.clone();

        // Well-formed and correctly signed, but by a key that does not own the DID.
        let intruder = KeyPair::generate();
        let vm = VerificationMethod::new(&did, "key-1", KeyType::Ed25519, intruder.public_key().as_bytes());
        let mut forged = DidDocument::new(did.clone(), vec![vm]);
        forged.version = 2;
        let payload = forged.signing_payload().unwrap();
        forged.proof = Some(SignatureProof {
            algorithm: KeyType::Ed25519,
            verification_method: forged.verification_methods[0].id.clone(),
            signature_value: sign(&payload, &intruder).to_bytes().to_vec(),
        });
        assert!(forged.verify_proof().is_ok());
        assert!(matches!(
            forged.validate(&did, SignaturePolicy::SelfCertifying),
            Err(ResolveError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_self_certifying_update_signed_by_added_key_rejected() {
        let owner = KeyPair::generate();
        let mut doc = self_certified_document(&owner);
        let added = KeyPair::generate();
        let vm = VerificationMethod::new(&doc.id, "key-2", KeyType::Ed25519, added.public_key().as_bytes());
        doc.apply(DocumentMutation::AddVerificationMethod(vm)).unwrap();

        let payload = doc.signing_payload().unwrap();
        doc.proof = Some(SignatureProof {
            algorithm: KeyType::Ed25519,
            verification_method: doc.verification_methods[1].id.clone(),
            signature_value: sign(&payload, &added).to_bytes().to_vec(),
        });
        assert!(doc.validate(&doc.id.clone(), SignaturePolicy::SelfCertifying).is_err());

        doc.proof = Some(SignatureProof {
            algorithm: KeyType::Ed25519,
            verification_method: doc.verification_methods[0].id.clone(),
            signature_value: sign(&payload, &owner).to_bytes().to_vec(),
        });
        assert!(doc.validate(&doc.id.clone(), SignaturePolicy::SelfCertifying).is_ok());
    }

    #[test]
    fn test_failed_mutation_leaves_version() {
        let mut doc = signed_document(&KeyPair::generate());
        let id = doc.verification_methods[0].id.clone();
        assert!(doc.apply(DocumentMutation::RemoveVerificationMethod(id)).is_err());
        assert!(doc.apply(DocumentMutation::RemoveService("nope".into())).is_err());
        assert_eq!(doc.version, 1);
    }
}
