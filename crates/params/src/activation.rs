use std::{fmt, str::FromStr};

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Describes which block first carries an algorithm state.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivationRule {
    /// Active from the block at `height` onwards.
    Height { height: u64 },

    /// Active from the first block whose parent's median-time-past is at
    /// least `time`.
    MedianTime { time: u64 },
}

impl ActivationRule {
    /// Checks the rule for a block at `height`.
    ///
    /// `prev_median_time` is the parent's median-time-past, `None` for
    /// genesis.  A time rule only holds at genesis when it can't fail, that
    /// is when `time` is zero.  Height rules ignore it.
    pub fn is_active_at(&self, height: u64, prev_median_time: Option<u64>) -> bool {
        match self {
            Self::Height { height: h } => height >= *h,
            Self::MedianTime { time } => prev_median_time.map_or(*time == 0, |mtp| mtp >= *time),
        }
    }

    pub fn is_time_based(&self) -> bool {
        matches!(self, Self::MedianTime { .. })
    }
}

impl fmt::Display for ActivationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Height { height } => write!(f, "height:{height}"),
            Self::MedianTime { time } => write!(f, "mtp:{time}"),
        }
    }
}

/// Parses `height:<n>` or `mtp:<unix time>`.
impl FromStr for ActivationRule {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, val) = s
            .split_once(':')
            .ok_or_else(|| ConfigError::InvalidActivation(s.to_owned()))?;
        let val: u64 = val
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidActivation(s.to_owned()))?;
        match kind.trim() {
            "height" => Ok(Self::Height { height: val }),
            "mtp" | "time" => Ok(Self::MedianTime { time: val }),
            _ => Err(ConfigError::InvalidActivation(s.to_owned())),
        }
    }
}
