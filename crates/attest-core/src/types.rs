use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Decentralized Identifier.
/// Format: `did:<method>:<method-specific-id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    /// Parse and validate a DID URI.
    pub fn parse(uri: impl Into<String>) -> Result<Self, CoreError> {
        let uri = uri.into();
        let rest = uri.strip_prefix("did:").ok_or_else(|| {
            CoreError::InvalidDid(format!("DID must start with 'did:', got: {}", uri))
        })?;
        let (method, id) = rest.split_once(':').ok_or_else(|| {
            CoreError::InvalidDid(format!(
                "DID must have format 'did:<method>:<id>', got: {}",
                uri
            ))
        })?;
        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(CoreError::InvalidDid(format!(
                "invalid method name '{}' in {}",
                method, uri
            )));
        }
        if id.is_empty() || id.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidDid(format!(
                "invalid method-specific id in {}",
                uri
            )));
        }
        Ok(Self(uri))
    }

    /// Build a DID from a method and a method-specific identifier.
    pub fn from_parts(method: &DidMethod, id: &str) -> Result<Self, CoreError> {
        Self::parse(format!("did:{}:{}", method.as_str(), id))
    }

    /// The full identifier, `did:<method>:<id>`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The method segment as a closed variant.
    pub fn method(&self) -> DidMethod {
        DidMethod::from_name(self.method_name())
    }

    /// Method segment, e.g. `ledger`.
    pub fn method_name(&self) -> &str {
        self.0[4..].split(':').next().unwrap_or_default()
    }

    /// Everything after the method segment.
    pub fn method_specific_id(&self) -> &str {
        let offset = 4 + self.method_name().len() + 1;
        &self.0[offset..]
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Did {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Did {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

/// DID methods with built-in handlers, plus names served by registered handlers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DidMethod {
    /// Self-describing: the document is derived from the identifier.
    Key,
    /// Chain-anchored documents carrying an embedded self-signature.
    Ledger,
    /// Hosted documents.
    Web,
    Other(String),
}

impl DidMethod {
    /// Unknown names become [`DidMethod::Other`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "key" => Self::Key,
            "ledger" => Self::Ledger,
            "web" => Self::Web,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Key => "key",
            Self::Ledger => "ledger",
            Self::Web => "web",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for DidMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DidMethod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(CoreError::Validation("empty DID method".into()));
        }
        Ok(Self::from_name(s))
    }
}

impl From<String> for DidMethod {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<DidMethod> for String {
    fn from(method: DidMethod) -> Self {
        method.as_str().to_string()
    }
}

/// Key algorithms a verification method can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    Ed25519,
    Secp256k1,
    #[serde(rename = "RSA")]
    Rsa,
    X25519,
}

impl KeyType {
    /// Every supported key type.
    pub const ALL: [KeyType; 4] = [Self::Ed25519, Self::Secp256k1, Self::Rsa, Self::X25519];

    /// W3C verification method type for this key.
    pub fn verification_method_type(&self) -> &'static str {
        match self {
            Self::Ed25519 => "Ed25519VerificationKey2020",
            Self::Secp256k1 => "EcdsaSecp256k1VerificationKey2019",
            Self::Rsa => "RsaVerificationKey2018",
            Self::X25519 => "X25519KeyAgreementKey2020",
        }
    }

    /// Key type for a verification method `type` string such as `Ed25519VerificationKey2020`.
    pub fn from_verification_method_type(vm_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kt| kt.verification_method_type() == vm_type)
    }

    /// Multicodec varint prefix used when a key is embedded in an identifier.
    pub fn multicodec_prefix(&self) -> &'static [u8] {
        match self {
            Self::Ed25519 => &[0xed, 0x01],
            Self::Secp256k1 => &[0xe7, 0x01],
            Self::Rsa => &[0x85, 0x24],
            Self::X25519 => &[0xec, 0x01],
        }
    }

    /// Split a multicodec-prefixed key into its type and raw bytes.
    pub fn split_multicodec(bytes: &[u8]) -> Option<(Self, &[u8])> {
        Self::ALL.into_iter().find_map(|kt| {
            bytes
                .strip_prefix(kt.multicodec_prefix())
                .map(|rest| (kt, rest))
        })
    }

    /// Whether keys of this type produce signatures.
    pub fn can_sign(&self) -> bool {
        !matches!(self, Self::X25519)
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519 => write!(f, "Ed25519"),
            Self::Secp256k1 => write!(f, "Secp256k1"),
            Self::Rsa => write!(f, "RSA"),
            Self::X25519 => write!(f, "X25519"),
        }
    }
}

impl FromStr for KeyType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(Self::Ed25519),
            "secp256k1" => Ok(Self::Secp256k1),
            "rsa" => Ok(Self::Rsa),
            "x25519" => Ok(Self::X25519),
            _ => Err(CoreError::Validation(format!("unknown key type: {}", s))),
        }
    }
}

/// Value of a claim within a credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl ClaimValue {
    /// Canonical byte encoding used for claim commitments.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        match self {
            Self::Integer(i) => format!("i:{}", i).into_bytes(),
            Self::Boolean(b) => format!("b:{}", b).into_bytes(),
            Self::String(s) => {
                let mut out = Vec::with_capacity(s.len() + 2);
                out.extend_from_slice(b"s:");
                out.extend_from_slice(s.as_bytes());
                out
            }
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Plain JSON form, as disclosed in presentations.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Integer(i) => serde_json::Value::from(*i),
            Self::Boolean(b) => serde_json::Value::from(*b),
            Self::String(s) => serde_json::Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for ClaimValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for ClaimValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ClaimValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for ClaimValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ClaimValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Attribute name to value, ordered by name.
pub type Claims = BTreeMap<String, ClaimValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_did_parse_valid() {
        let did = Did::parse("did:ledger:abc123").unwrap();
        assert_eq!(did.as_str(), "did:ledger:abc123");
        assert_eq!(did.method(), DidMethod::Ledger);
        assert_eq!(did.method_specific_id(), "abc123");
    }

    #[test]
    fn test_did_method_specific_id_keeps_colons() {
        let did = Did::parse("did:web:example.com:users:alice").unwrap();
        assert_eq!(did.method(), DidMethod::Web);
        assert_eq!(did.method_specific_id(), "example.com:users:alice");
    }

    #[test]
    fn test_did_parse_rejects_malformed() {
        assert!(Did::parse("ledger:abc").is_err());
        assert!(Did::parse("did:abc").is_err());
        assert!(Did::parse("did::abc").is_err());
        assert!(Did::parse("did:Key:abc").is_err());
        assert!(Did::parse("did:key:").is_err());
        assert!(Did::parse("did:key:a b").is_err());
    }

    #[test]
    fn test_did_other_method() {
        let did = Did::parse("did:peer2:xyz").unwrap();
        assert_eq!(did.method(), DidMethod::Other("peer2".into()));
        assert_eq!(did.method_name(), "peer2");
    }

    #[test]
    fn test_did_serde_validates() {
        let did: Did = serde_json::from_str("\"did:key:z6Mk\"").unwrap();
        assert_eq!(did.method(), DidMethod::Key);
        assert!(serde_json::from_str::<Did>("\"not-a-did\"").is_err());
    }

    #[test]
    fn test_key_type_vm_type_roundtrip() {
        for kt in KeyType::ALL {
            let vm_type = kt.verification_method_type();
            assert_eq!(KeyType::from_verification_method_type(vm_type), Some(kt));
        }
        assert_eq!(KeyType::from_verification_method_type("Unknown2030"), None);
    }

    #[test]
    fn test_key_type_multicodec_split() {
        let mut bytes = KeyType::Secp256k1.multicodec_prefix().to_vec();
        bytes.extend_from_slice(&[7u8; 33]);
        let (kt, raw) = KeyType::split_multicodec(&bytes).unwrap();
        assert_eq!(kt, KeyType::Secp256k1);
        assert_eq!(raw.len(), 33);
    }

    #[test]
    fn test_key_type_from_str() {
        assert_eq!("ed25519".parse::<KeyType>().unwrap(), KeyType::Ed25519);
        assert_eq!("RSA".parse::<KeyType>().unwrap(), KeyType::Rsa);
        assert!("dsa".parse::<KeyType>().is_err());
    }

    #[test]
    fn test_claim_value_untagged_serde() {
        let claims: Claims = serde_json::from_str(r#"{"age":34,"country":"US","kyc":true}"#).unwrap();
        assert_eq!(claims["age"], ClaimValue::Integer(34));
        assert_eq!(claims["country"], ClaimValue::String("US".into()));
        assert_eq!(claims["kyc"], ClaimValue::Boolean(true));
    }

    #[test]
    fn test_claim_value_canonical_bytes_distinguish_types() {
        assert_ne!(
            ClaimValue::Integer(1).canonical_bytes(),
            ClaimValue::String("1".into()).canonical_bytes()
        );
        assert_ne!(
            ClaimValue::Boolean(true).canonical_bytes(),
            ClaimValue::String("true".into()).canonical_bytes()
        );
    }
}
