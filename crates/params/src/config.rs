//! Algorithm configuration and its derived bounds.

use std::fmt;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{
    arith::{ZetaXB7, muldiv},
    constants::*,
    errors::{ConfigError, ConfigResult},
};

/// The six independent algorithm parameters, as carried in a params file.
///
/// Only the two initial buffer sizes are required; the tuning constants fall
/// back to the recommended defaults when omitted.
#[derive(
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
pub struct AblaParams {
    /// Initial control block size, also its floor.
    pub epsilon0: u64,

    /// Initial elastic buffer size, also its floor.
    pub beta0: u64,

    /// Reciprocal of the control function "forget factor".
    #[serde(default = "default_gamma_reciprocal")]
    pub gamma_reciprocal: u64,

    /// Control function "asymmetry factor".
    #[serde(default = "default_zeta_xb7")]
    pub zeta_xb7: ZetaXB7,

    /// Reciprocal of the elastic buffer decay rate.
    #[serde(default = "default_theta_reciprocal")]
    pub theta_reciprocal: u64,

    /// Elastic buffer "gear factor".
    #[serde(default = "default_delta")]
    pub delta: u64,
}

fn default_gamma_reciprocal() -> u64 {
    DEFAULT_GAMMA_RECIPROCAL
}

fn default_zeta_xb7() -> ZetaXB7 {
    ZetaXB7::from_raw(DEFAULT_ZETA_XB7)
}

fn default_theta_reciprocal() -> u64 {
    DEFAULT_THETA_RECIPROCAL
}

fn default_delta() -> u64 {
    DEFAULT_DELTA
}

impl AblaParams {
    /// Recommended parameters for a network whose default block size is
    /// `default_block_size`.  Both buffers start at half of it.
    pub fn from_default_block_size(default_block_size: u64) -> Self {
        Self {
            epsilon0: default_block_size / 2,
            beta0: default_block_size / 2,
            gamma_reciprocal: default_gamma_reciprocal(),
            zeta_xb7: default_zeta_xb7(),
            theta_reciprocal: default_theta_reciprocal(),
            delta: default_delta(),
        }
    }

    fn check_nonzero(&self) -> ConfigResult<()> {
        if self.gamma_reciprocal == 0 {
            return Err(ConfigError::ZeroParam("gamma_reciprocal"));
        }
        if self.theta_reciprocal == 0 {
            return Err(ConfigError::ZeroParam("theta_reciprocal"));
        }
        if !self.zeta_xb7.is_amplifying() {
            return Err(ConfigError::ZetaNotAmplifying(self.zeta_xb7.raw()));
        }
        Ok(())
    }
}

/// Validated algorithm configuration, one per network.
///
/// Holds the six parameters plus the derived `epsilon_max` and `beta_max`
/// bounds.  Instances only come out of [`AblaConfig::derive`],
/// [`AblaConfig::derive_fixed`] or [`AblaConfig::new_default`], all of which
/// validate.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AblaConfig {
    epsilon0: u64,
    beta0: u64,
    gamma_reciprocal: u64,
    zeta_xb7: ZetaXB7,
    theta_reciprocal: u64,
    delta: u64,
    epsilon_max: u64,
    beta_max: u64,
}

impl AblaConfig {
    /// Derives the adaptive configuration, sizing `epsilon_max` and `beta_max`
    /// so the transition's internal arithmetic can never overflow a `u64`.
    pub fn derive(params: &AblaParams) -> ConfigResult<Self> {
        params.check_nonzero()?;

        let zeta = params.zeta_xb7;
        let max_safe = zeta
            .max_safe_limit()
            .ok_or(ConfigError::DerivedOverflow("max_safe_limit"))?;

        let ratio = zeta
            .excess()
            .checked_mul(params.theta_reciprocal)
            .map(|v| v / params.gamma_reciprocal)
            .ok_or(ConfigError::DerivedOverflow("elastic_buffer_ratio"))?;
        let numerator = params
            .delta
            .checked_mul(ratio)
            .ok_or(ConfigError::DerivedOverflow("elastic_buffer_ratio_numerator"))?;
        let denominator = ratio
            .checked_add(B7)
            .ok_or(ConfigError::DerivedOverflow("elastic_buffer_ratio_denominator"))?;

        let epsilon_max = numerator
            .checked_add(denominator)
            .and_then(|div| max_safe.checked_div(div))
            .and_then(|q| q.checked_mul(denominator))
            .ok_or(ConfigError::DerivedOverflow("epsilon_max"))?;
        let beta_max = max_safe
            .checked_sub(epsilon_max)
            .ok_or(ConfigError::DerivedOverflow("beta_max"))?;

        debug!(%epsilon_max, %beta_max, "abla: auto-configured maximums");

        let config = Self::from_parts(params, epsilon_max, beta_max);
        config.validate()?;
        Ok(config)
    }

    /// Derives a fixed-size configuration where the maximums equal the
    /// initial values, so the limit never moves.
    pub fn derive_fixed(params: &AblaParams) -> ConfigResult<Self> {
        params.check_nonzero()?;
        let config = Self::from_parts(params, params.epsilon0, params.beta0);
        config.validate()?;
        Ok(config)
    }

    /// Recommended configuration for a network with the given default block
    /// size.
    pub fn new_default(default_block_size: u64, fixed_size: bool) -> ConfigResult<Self> {
        let params = AblaParams::from_default_block_size(default_block_size);
        if fixed_size {
            Self::derive_fixed(&params)
        } else {
            Self::derive(&params)
        }
    }

    fn from_parts(params: &AblaParams, epsilon_max: u64, beta_max: u64) -> Self {
        Self {
            epsilon0: params.epsilon0,
            beta0: params.beta0,
            gamma_reciprocal: params.gamma_reciprocal,
            zeta_xb7: params.zeta_xb7,
            theta_reciprocal: params.theta_reciprocal,
            delta: params.delta,
            epsilon_max,
            beta_max,
        }
    }

    /// Checks the sanity ranges of every parameter.
    pub fn validate(&self) -> ConfigResult<()> {
        let res = self.validate_inner();
        if let Err(e) = &res {
            debug!(err = %e, config = %self, "abla: config failed validation");
        }
        res
    }

    fn validate_inner(&self) -> ConfigResult<()> {
        if self.epsilon0 > self.epsilon_max {
            return Err(ConfigError::Epsilon0AboveMax {
                epsilon0: self.epsilon0,
                epsilon_max: self.epsilon_max,
            });
        }
        if self.beta0 > self.beta_max {
            return Err(ConfigError::Beta0AboveMax {
                beta0: self.beta0,
                beta_max: self.beta_max,
            });
        }

        check_range("zeta_xb7", self.zeta_xb7.raw(), MIN_ZETA_XB7, MAX_ZETA_XB7)?;
        check_range(
            "gamma_reciprocal",
            self.gamma_reciprocal,
            MIN_GAMMA_RECIPROCAL,
            MAX_GAMMA_RECIPROCAL,
        )?;
        check_range("delta", self.delta, MIN_DELTA, MAX_DELTA)?;
        check_range(
            "theta_reciprocal",
            self.theta_reciprocal,
            MIN_THETA_RECIPROCAL,
            MAX_THETA_RECIPROCAL,
        )?;

        // Lets the control size move by at least one byte per block.
        let min_epsilon0 = muldiv(self.gamma_reciprocal, B7, self.zeta_xb7.excess());
        if self.epsilon0 < min_epsilon0 {
            return Err(ConfigError::Epsilon0TooLow {
                epsilon0: self.epsilon0,
                min: min_epsilon0,
            });
        }

        Ok(())
    }

    /// Returns true if the algorithm can never move the limit away from its
    /// initial value.
    pub fn is_fixed_size(&self) -> bool {
        self.epsilon0 == self.epsilon_max && self.beta0 == self.beta_max
    }

    /// Block size limit of the initial state.
    pub fn initial_block_size_limit(&self) -> u64 {
        self.epsilon0
            .saturating_add(self.beta0)
            .min(MAX_CONSENSUS_BLOCK_SIZE)
    }

    pub fn epsilon0(&self) -> u64 {
        self.epsilon0
    }

    pub fn beta0(&self) -> u64 {
        self.beta0
    }

    pub fn gamma_reciprocal(&self) -> u64 {
        self.gamma_reciprocal
    }

    pub fn zeta_xb7(&self) -> ZetaXB7 {
        self.zeta_xb7
    }

    pub fn theta_reciprocal(&self) -> u64 {
        self.theta_reciprocal
    }

    pub fn delta(&self) -> u64 {
        self.delta
    }

    pub fn epsilon_max(&self) -> u64 {
        self.epsilon_max
    }

    pub fn beta_max(&self) -> u64 {
        self.beta_max
    }

    /// Returns the independent parameters this config was derived from.
    pub fn params(&self) -> AblaParams {
        AblaParams {
            epsilon0: self.epsilon0,
            beta0: self.beta0,
            gamma_reciprocal: self.gamma_reciprocal,
            zeta_xb7: self.zeta_xb7,
            theta_reciprocal: self.theta_reciprocal,
            delta: self.delta,
        }
    }
}

fn check_range(name: &'static str, value: u64, min: u64, max: u64) -> ConfigResult<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        })
    }
}

impl fmt::Display for AblaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AblaConfig(epsilon0={}, beta0={}, gamma_reciprocal={}, zeta_xb7={}, \
             theta_reciprocal={}, delta={}, epsilon_max={}, beta_max={})",
            self.epsilon0,
            self.beta0,
            self.gamma_reciprocal,
            self.zeta_xb7.raw(),
            self.theta_reciprocal,
            self.delta,
            self.epsilon_max,
            self.beta_max
        )
    }
}
