//! Proof-of-block-stake difficulty parameters (spec.md GLOSSARY
//! "Target / Difficulty"), supplied by the external consensus module and
//! only ever combined or converted by the indexer, never validated.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use std::ops::Add;

/// A proof-of-stake target: smaller is harder to reach. Stored as an
/// unbounded big-endian magnitude rather than a fixed-width compact form,
/// since this indexer never re-derives targets, only sums and converts them
/// for the active-stake estimator (spec.md §4.4).
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Target(pub BigUint);

impl Target {
    pub fn from_bytes_be(bytes: &[u8]) -> Self {
        Target(BigUint::from_bytes_be(bytes))
    }

    pub fn zero() -> Self {
        Target(BigUint::zero())
    }

    /// `difficulty = 2^root_depth / target`, saturating to the maximum
    /// representable difficulty when `target` is zero (an all-zero target
    /// would otherwise divide by zero; this only happens for a
    /// pathological/test root target).
    pub fn difficulty(&self, root_depth: u32) -> BigUint {
        if self.0.is_zero() {
            BigUint::one() << root_depth
        } else {
            (BigUint::one() << root_depth) / &self.0
        }
    }
}

impl Add for &Target {
    type Output = Target;

    /// The chain's target-addition operator (spec.md §4.4): targets combine
    /// by ordinary magnitude addition when pooling several blocks' targets
    /// for the estimator's sliding window.
    fn add(self, rhs: &Target) -> Target {
        Target(&self.0 + &rhs.0)
    }
}
