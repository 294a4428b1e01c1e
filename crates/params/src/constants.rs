//! Consensus constants shared by every network.

/// One megabyte, in the decimal sense used for block size accounting.
pub const ONE_MEGABYTE: u64 = 1_000_000;

/// Maximum allowed size for a block before the first block size increase.
pub const LEGACY_MAX_BLOCK_SIZE: u64 = ONE_MEGABYTE;

/// Default consensus block size.  Once the algorithm is active this becomes
/// the floor of the adaptive limit.
pub const DEFAULT_CONSENSUS_BLOCK_SIZE: u64 = 32 * ONE_MEGABYTE;

/// Hard network-wide ceiling on the block size limit, independent of the
/// algorithm's state.
pub const MAX_CONSENSUS_BLOCK_SIZE: u64 = 2000 * ONE_MEGABYTE;

/// Fixed-point precision (2^7) used for the asymmetry factor.
///
/// The real number 1.5 is stored as the integer 192, so multiplying a value by
/// 1.5 is `muldiv(value, 192, B7)`.
pub const B7: u64 = 1 << 7;

/// Lower bound of the asymmetry factor, real value 1.0078125.
pub const MIN_ZETA_XB7: u64 = 129;

/// Upper bound of the asymmetry factor, real value 2.0.
pub const MAX_ZETA_XB7: u64 = 256;

pub const MIN_GAMMA_RECIPROCAL: u64 = 9484;
pub const MAX_GAMMA_RECIPROCAL: u64 = 151744;

pub const MIN_DELTA: u64 = 0;
pub const MAX_DELTA: u64 = 32;

pub const MIN_THETA_RECIPROCAL: u64 = 9484;
pub const MAX_THETA_RECIPROCAL: u64 = 151744;

/// Default reciprocal of the control function "forget factor".
pub const DEFAULT_GAMMA_RECIPROCAL: u64 = 37938;

/// Default asymmetry factor (1.5).
pub const DEFAULT_ZETA_XB7: u64 = 192;

/// Default reciprocal of the elastic buffer decay rate.
pub const DEFAULT_THETA_RECIPROCAL: u64 = 37938;

/// Default elastic buffer "gear factor".
pub const DEFAULT_DELTA: u64 = 10;
