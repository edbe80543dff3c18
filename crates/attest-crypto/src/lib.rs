//! Attest Crypto: signing keys (Ed25519, secp256k1), X25519 encryption,
//! BLAKE3 hashing and Merkle paths, salted claim commitments, and the field
//! and transcript primitives the proof engine builds on.

pub mod encryption;
pub mod error;
pub mod field;
pub mod hashing;
pub mod keys;
pub mod secp256k1;
pub mod selective_disclosure;
pub mod signing;
pub mod zkp;

pub use encryption::{decrypt, encrypt, EncryptedPayload, X25519KeyPair};
pub use error::CryptoError;
pub use field::FieldElement;
pub use hashing::{
    create_commitment, hash, hash_parts, merkle_path, merkle_root, merkle_root_from_path,
    verify_commitment, Hash, MerkleStep,
};
pub use keys::{multibase_decode, multibase_encode, KeyPair, PublicKey};
pub use secp256k1::Secp256k1KeyPair;
pub use selective_disclosure::{claim_leaf, derive_salt, root_from_leaves, ClaimCommitmentSet};
pub use signing::{sign, verify, verify_with_key_type, Signature};
pub use zkp::{Commitment, Transcript};
