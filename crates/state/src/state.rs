//! Per-block algorithm state and the transition between blocks.

use std::fmt;

use abla_params::{AblaConfig, checked_muldiv, constants::MAX_CONSENSUS_BLOCK_SIZE};
use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::*;

use crate::errors::{StateError, StateResult};

/// Algorithm state attached to block N.
///
/// The limit for block N is `state_n.block_size_limit()`.  The limit for block
/// N + 1 is `state_n.next_block_size_limit(config)`.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
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
pub struct AblaState {
    /// Actual size in bytes of the block this state belongs to.
    #[serde(rename = "blocksize")]
    block_size: u64,

    /// Control function state, epsilon.
    #[serde(rename = "epsilon")]
    control_block_size: u64,

    /// Elastic buffer function state, beta.
    #[serde(rename = "beta")]
    elastic_buffer_size: u64,
}

impl AblaState {
    pub const fn new(block_size: u64, control_block_size: u64, elastic_buffer_size: u64) -> Self {
        Self {
            block_size,
            control_block_size,
            elastic_buffer_size,
        }
    }

    /// State for the activation block, seeded from the config's initial
    /// buffer sizes.
    pub fn initial(config: &AblaConfig, block_size: u64) -> Self {
        Self::new(block_size, config.epsilon0(), config.beta0())
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn control_block_size(&self) -> u64 {
        self.control_block_size
    }

    pub fn elastic_buffer_size(&self) -> u64 {
        self.elastic_buffer_size
    }

    /// Returns a copy with the block size replaced.
    pub fn with_block_size(&self, block_size: u64) -> Self {
        Self {
            block_size,
            ..*self
        }
    }

    pub fn to_tuple(&self) -> (u64, u64, u64) {
        (
            self.block_size,
            self.control_block_size,
            self.elastic_buffer_size,
        )
    }

    pub fn from_tuple((block_size, control, elastic): (u64, u64, u64)) -> Self {
        Self::new(block_size, control, elastic)
    }

    /// Limit for this block, capped at [`MAX_CONSENSUS_BLOCK_SIZE`].
    pub fn block_size_limit(&self) -> u64 {
        self.block_size_limit_with(false)
    }

    /// Limit for this block without the 2 GB cap.
    pub fn block_size_limit_uncapped(&self) -> u64 {
        self.block_size_limit_with(true)
    }

    pub fn block_size_limit_with(&self, disable_2gb_cap: bool) -> u64 {
        let limit = self
            .control_block_size
            .saturating_add(self.elastic_buffer_size);
        if disable_2gb_cap {
            limit
        } else {
            limit.min(MAX_CONSENSUS_BLOCK_SIZE)
        }
    }

    /// Limit for the block after this one.
    pub fn next_block_size_limit(&self, config: &AblaConfig) -> u64 {
        self.next_block_size_limit_with(config, false)
    }

    pub fn next_block_size_limit_with(&self, config: &AblaConfig, disable_2gb_cap: bool) -> u64 {
        self.next_block_state(config, 0)
            .block_size_limit_with(disable_2gb_cap)
    }

    /// Advances to the state of the next block, given that block's size.
    ///
    /// # Panics
    ///
    /// If the transition overflows, which can only happen when `self` is not
    /// valid for `config`.
    pub fn next_block_state(&self, config: &AblaConfig, next_block_size: u64) -> Self {
        match self.try_next_block_state(config, next_block_size) {
            Ok(next) => next,
            Err(e) => panic!("abla: invalid state transition from {self} with {config}: {e}"),
        }
    }

    /// Checked form of [`Self::next_block_state`].
    pub fn try_next_block_state(
        &self,
        config: &AblaConfig,
        next_block_size: u64,
    ) -> StateResult<Self> {
        let zeta = config.zeta_xb7();
        let epsilon = self.control_block_size;
        let beta = self.elastic_buffer_size;
        let limit = epsilon
            .checked_add(beta)
            .ok_or(StateError::Overflow("block_size_limit"))?;

        // The block may exceed what the state allows if the node was
        // configured with a larger excessive block size.
        let clamped = self.block_size.min(limit);
        let amplified = zeta
            .checked_amplify(clamped)
            .ok_or(StateError::Overflow("amplified_block_size"))?;
        let growing = amplified > epsilon;

        let next_epsilon = if growing {
            let bytes_to_add = amplified - epsilon;
            let bytes_max = zeta
                .checked_amplify(limit)
                .and_then(|amplified_limit| amplified_limit.checked_sub(epsilon))
                .ok_or(StateError::Overflow("bytes_max"))?;
            let scaling_offset = zeta
                .checked_amplify(beta)
                .and_then(|amplified_beta| checked_muldiv(amplified_beta, bytes_to_add, bytes_max))
                .ok_or(StateError::Overflow("scaling_offset"))?;
            let step = bytes_to_add
                .checked_sub(scaling_offset)
                .ok_or(StateError::Overflow("control_step"))?
                / config.gamma_reciprocal();
            epsilon
                .checked_add(step)
                .ok_or(StateError::Overflow("control_block_size"))?
        } else {
            let bytes_to_remove = epsilon - amplified;
            let shrunk = epsilon - bytes_to_remove / config.gamma_reciprocal();
            shrunk.max(config.epsilon0())
        };

        let decay = beta / config.theta_reciprocal();
        let next_beta = if growing {
            let bytes_to_add = next_epsilon
                .checked_sub(epsilon)
                .and_then(|d| d.checked_mul(config.delta()))
                .ok_or(StateError::Overflow("elastic_step"))?;
            (beta - decay)
                .checked_add(bytes_to_add)
                .ok_or(StateError::Overflow("elastic_buffer_size"))?
        } else {
            beta - decay
        };
        let next_beta = next_beta.max(config.beta0());

        let next = Self::new(
            next_block_size,
            next_epsilon.min(config.epsilon_max()),
            next_beta.min(config.beta_max()),
        );
        next.validate(config)?;
        Ok(next)
    }

    /// Returns true if both buffers lie within the config's bounds.
    pub fn is_valid(&self, config: &AblaConfig) -> bool {
        self.validate(config).is_ok()
    }

    pub fn validate(&self, config: &AblaConfig) -> StateResult<()> {
        let res = self.check_ranges(config);
        if let Err(e) = &res {
            debug!(state = %self, err = %e, "abla: state failed validation");
        }
        res
    }

    fn check_ranges(&self, config: &AblaConfig) -> StateResult<()> {
        if !(config.epsilon0()..=config.epsilon_max()).contains(&self.control_block_size) {
            return Err(StateError::ControlOutOfRange {
                value: self.control_block_size,
                min: config.epsilon0(),
                max: config.epsilon_max(),
            });
        }
        if !(config.beta0()..=config.beta_max()).contains(&self.elastic_buffer_size) {
            return Err(StateError::ElasticOutOfRange {
                value: self.elastic_buffer_size,
                min: config.beta0(),
                max: config.beta_max(),
            });
        }
        Ok(())
    }
}

impl From<(u64, u64, u64)> for AblaState {
    fn from(tup: (u64, u64, u64)) -> Self {
        Self::from_tuple(tup)
    }
}

impl From<AblaState> for (u64, u64, u64) {
    fn from(state: AblaState) -> Self {
        state.to_tuple()
    }
}

impl fmt::Display for AblaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AblaState(block_size={}, control_block_size={}, elastic_buffer_size={})",
            self.block_size, self.control_block_size, self.elastic_buffer_size
        )
    }
}
