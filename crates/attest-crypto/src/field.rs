//! Arithmetic in the Goldilocks prime field, p = 2^64 - 2^32 + 1.
//!
//! Circuit values (integers, whole seconds since epoch) are embedded here.
//! Signed inputs map to their additive inverse, so `a - b` of two small
//! values is a small element exactly when `a >= b`.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Field modulus.
pub const MODULUS: u64 = 0xFFFF_FFFF_0000_0001;

/// Element of the prime field with modulus `2^64 - 2^32 + 1`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FieldElement(u64);

impl FieldElement {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);

    /// Reduces `value` modulo the field prime.
    pub fn new(value: u64) -> Self {
        Self(value % MODULUS)
    }

    /// Negative values map to `p - |value|`.
    pub fn from_i64(value: i64) -> Self {
        let reduced = (value as i128).rem_euclid(MODULUS as i128);
        Self(reduced as u64)
    }

    /// Reduce the first eight bytes of a hash into the field.
    pub fn from_hash(bytes: &[u8; 32]) -> Self {
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes[..8]);
        Self::new(u64::from_le_bytes(word))
    }

    /// Canonical representative in `[0, p)`.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Whether the canonical representative is below `2^bits`.
    pub fn fits_in_bits(&self, bits: u32) -> bool {
        bits >= 64 || self.0 < (1u64 << bits)
    }

    pub fn to_le_bytes(&self) -> [u8; 8] {
        self.0.to_le_bytes()
    }
}

impl Add for FieldElement {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(((self.0 as u128 + rhs.0 as u128) % MODULUS as u128) as u64)
    }
}

impl Neg for FieldElement {
    type Output = Self;

    fn neg(self) -> Self {
        if self.0 == 0 {
            self
        } else {
            Self(MODULUS - self.0)
        }
    }
}

impl Sub for FieldElement {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Mul for FieldElement {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self(((self.0 as u128 * rhs.0 as u128) % MODULUS as u128) as u64)
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fp({})", self.0)
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}
