//! Fixed-point helpers used by the block size algorithm.

use std::fmt;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::B7;

/// Computes `x * y / z` with a 128-bit intermediate.
///
/// # Panics
///
/// If `z` is zero or the quotient does not fit in a `u64`.  Both are invariant
/// violations for consensus code and must never be silently wrapped.
pub fn muldiv(x: u64, y: u64, z: u64) -> u64 {
    match checked_muldiv(x, y, z) {
        Some(v) => v,
        None => panic!("abla: muldiv overflow or division by zero ({x} * {y} / {z})"),
    }
}

/// Checked form of [`muldiv`], returning `None` where it would panic.
pub fn checked_muldiv(x: u64, y: u64, z: u64) -> Option<u64> {
    if z == 0 {
        return None;
    }
    let res = (x as u128) * (y as u128) / (z as u128);
    u64::try_from(res).ok()
}

/// Asymmetry factor stored as a fixed-point integer scaled by [`B7`].
///
/// The raw value 192 stands for 1.5.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Ord,
    PartialOrd,
    Hash,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ZetaXB7(u64);

impl ZetaXB7 {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Returns true if the factor is strictly above 1.0.
    pub const fn is_amplifying(&self) -> bool {
        self.0 > B7
    }

    /// Returns the `(numerator, denominator)` pair of the real value.
    pub const fn fraction(&self) -> (u64, u64) {
        (self.0, B7)
    }

    /// The fractional part above one, `zeta_xb7 - 128`.
    ///
    /// Zero when the factor is not amplifying.
    pub const fn excess(&self) -> u64 {
        self.0.saturating_sub(B7)
    }

    /// Multiplies `value` by the factor.  Panics on overflow like [`muldiv`].
    pub fn amplify(&self, value: u64) -> u64 {
        muldiv(self.0, value, B7)
    }

    pub fn checked_amplify(&self, value: u64) -> Option<u64> {
        checked_muldiv(self.0, value, B7)
    }

    /// Largest sum of the two buffers for which [`Self::amplify`] can never
    /// overflow, `floor(u64::MAX / zeta_xb7) * 128`.
    pub fn max_safe_limit(&self) -> Option<u64> {
        (u64::MAX).checked_div(self.0)?.checked_mul(B7)
    }
}

impl fmt::Display for ZetaXB7 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, B7)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_muldiv_basic() {
        assert_eq!(muldiv(192, 1_000, 128), 1_500);
        assert_eq!(muldiv(u64::MAX, 128, 256), u64::MAX / 2);
        assert_eq!(muldiv(7, 3, 2), 10);
    }

    #[test]
    fn test_checked_muldiv_rejects() {
        assert_eq!(checked_muldiv(1, 1, 0), None);
        assert_eq!(checked_muldiv(u64::MAX, 2, 1), None);
        assert_eq!(checked_muldiv(u64::MAX, 2, 2), Some(u64::MAX));
    }

    #[test]
    #[should_panic(expected = "muldiv overflow")]
    fn test_muldiv_panics_on_overflow() {
        let _ = muldiv(u64::MAX, 256, 128);
    }

    #[test]
    fn test_zeta_helpers() {
        let z = ZetaXB7::from_raw(192);
        assert!(z.is_amplifying());
        assert_eq!(z.excess(), 64);
        assert_eq!(z.fraction(), (192, 128));
        assert_eq!(z.amplify(2_000), 3_000);
        assert_eq!(z.to_string(), "192/128");
        assert_eq!(z.max_safe_limit(), Some(u64::MAX / 192 * 128));

        let one = ZetaXB7::from_raw(128);
        assert!(!one.is_amplifying());
        assert_eq!(one.excess(), 0);
        assert_eq!(ZetaXB7::from_raw(0).max_safe_limit(), None);
    }

    proptest! {
        #[test]
        fn proptest_amplify_never_overflows_below_safe_limit(
            raw in 129u64..=256,
            frac in 0u64..=1_000_000,
        ) {
            let z = ZetaXB7::from_raw(raw);
            let safe = z.max_safe_limit().unwrap();
            let value = (safe as u128 * frac as u128 / 1_000_000) as u64;
            prop_assert!(z.checked_amplify(value).is_some());
        }
    }
}
