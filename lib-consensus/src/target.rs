//! Proof-of-work targets and exact rational arithmetic
//!
//! A [`Target`] is a 256-bit threshold: a block id must be numerically at or
//! below its parent's target to represent sufficient work. Smaller target
//! means more work. Cumulative chain weight (`depth`) is stored in the same
//! form: the aggregate target a single block would need to match the chain's
//! total work.
//!
//! Retargeting and weight comparison are performed as exact rationals over
//! arbitrary-precision integers, then rounded back to 256-bit form in exactly
//! one place ([`Target::from_ratio`]) so every node lands on identical bytes.

use std::cmp::Ordering;
use std::fmt;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use lib_types::BlockHash;

/// 256-bit proof-of-work threshold, big-endian.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Target([u8; 32]);

impl Target {
    /// Create a target from raw big-endian bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the underlying big-endian bytes
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether `id` represents enough work to satisfy this target.
    ///
    /// Big-endian byte comparison equals numeric comparison.
    pub fn meets(&self, id: BlockHash) -> bool {
        id.as_bytes() <= &self.0
    }

    /// The target as an arbitrary-precision integer.
    pub fn to_int(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// Convert an integer back into a target, clamping into `[1, 2²⁵⁶ − 1]`.
    ///
    /// Zero would make every comparison fail and division by the target
    /// impossible; overflow saturates at the easiest possible threshold.
    pub fn from_int_clamped(value: &BigUint) -> Self {
        let bytes = value.to_bytes_be();
        if bytes.len() > 32 {
            return Self([0xFF; 32]);
        }
        let mut out = [0u8; 32];
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        if out == [0u8; 32] {
            out[31] = 1;
        }
        Self(out)
    }

    /// The work represented by one block at this target: the rational
    /// `1 / target`.
    pub fn inverse(&self) -> Ratio {
        Ratio::from_big(BigUint::from(1u8), self.to_int())
    }

    /// Deterministic rounding of a rational into a target: truncation toward
    /// zero of `num / den`, then the clamp of [`Target::from_int_clamped`].
    pub fn from_ratio(ratio: &Ratio) -> Self {
        Self::from_int_clamped(&(ratio.num() / ratio.den()))
    }

    /// Scale this target by a rational adjustment factor.
    pub fn mul_ratio(&self, ratio: &Ratio) -> Self {
        Self::from_int_clamped(&(self.to_int() * ratio.num() / ratio.den()))
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Target({})", hex::encode(&self.0[..8]))
    }
}

/// Exact nonnegative rational.
///
/// Never normalized and never converted to floating point; equality and
/// ordering use cross-multiplication.
#[derive(Debug, Clone)]
pub struct Ratio {
    num: BigUint,
    den: BigUint,
}

impl Ratio {
    /// Build a rational from machine integers. The denominator must be
    /// nonzero.
    pub fn new(num: u64, den: u64) -> Self {
        Self::from_big(BigUint::from(num), BigUint::from(den))
    }

    /// Build a rational from arbitrary-precision parts. The denominator must
    /// be nonzero.
    pub fn from_big(num: BigUint, den: BigUint) -> Self {
        assert!(den != BigUint::from(0u8), "rational denominator must be nonzero");
        Self { num, den }
    }

    /// Numerator
    pub fn num(&self) -> &BigUint {
        &self.num
    }

    /// Denominator
    pub fn den(&self) -> &BigUint {
        &self.den
    }

    /// Exact sum
    pub fn add(&self, other: &Ratio) -> Ratio {
        Ratio {
            num: &self.num * &other.den + &other.num * &self.den,
            den: &self.den * &other.den,
        }
    }

    /// Exact product
    pub fn mul(&self, other: &Ratio) -> Ratio {
        Ratio {
            num: &self.num * &other.num,
            den: &self.den * &other.den,
        }
    }

    /// Reciprocal. The numerator must be nonzero.
    pub fn inv(&self) -> Ratio {
        assert!(self.num != BigUint::from(0u8), "cannot invert a zero rational");
        Ratio {
            num: self.den.clone(),
            den: self.num.clone(),
        }
    }
}

impl PartialEq for Ratio {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ratio {}

impl PartialOrd for Ratio {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ratio {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.num * &other.den).cmp(&(&other.num * &self.den))
    }
}
