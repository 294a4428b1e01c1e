//! Per-network parameters and the built-in presets.

use std::{fmt, fs, path::Path, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::*;

use crate::{
    activation::ActivationRule,
    config::{AblaConfig, AblaParams},
    constants::*,
    errors::{ConfigError, ConfigResult},
    policy::BlockSizePercent,
    serde_helpers::serde_percent,
};

/// Median-time-past at which the algorithm activated on the main networks.
const MAINNET_ACTIVATION_TIME: u64 = 1_715_774_400;

/// Median-time-past at which the algorithm activated on chipnet.
const CHIPNET_ACTIVATION_TIME: u64 = 1_700_049_600;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Mainnet,
    Testnet3,
    Testnet4,
    Scalenet,
    Chipnet,
    Regtest,
}

impl NetworkKind {
    pub const ALL: [NetworkKind; 6] = [
        Self::Mainnet,
        Self::Testnet3,
        Self::Testnet4,
        Self::Scalenet,
        Self::Chipnet,
        Self::Regtest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet3 => "testnet3",
            Self::Testnet4 => "testnet4",
            Self::Scalenet => "scalenet",
            Self::Chipnet => "chipnet",
            Self::Regtest => "regtest",
        }
    }
}

impl fmt::Display for NetworkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NetworkKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|n| n.name() == s)
            .ok_or_else(|| ConfigError::Parse(format!("unknown network {s}")))
    }
}

/// Everything a node needs to run the algorithm on one network.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub network: NetworkKind,

    /// Block size limit before activation, and the floor afterwards.
    #[serde(default = "default_block_size")]
    pub default_block_size: u64,

    /// Pins the limit to `default_block_size` forever.
    #[serde(default)]
    pub fixed_size: bool,

    /// Default share of the limit filled by block templates.
    #[serde(default = "default_generated_percent", with = "serde_percent")]
    pub generated_block_size_percent: BlockSizePercent,

    pub activation: ActivationRule,

    /// Explicit algorithm parameters.  Derived from `default_block_size` when
    /// omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abla: Option<AblaParams>,
}

fn default_block_size() -> u64 {
    DEFAULT_CONSENSUS_BLOCK_SIZE
}

fn default_generated_percent() -> BlockSizePercent {
    BlockSizePercent::HALF
}

impl NetworkParams {
    /// Built-in parameters for a known network.
    pub fn preset(network: NetworkKind) -> Self {
        let (default_block_size, fixed_size, activation_time, percent) = match network {
            NetworkKind::Mainnet => (
                DEFAULT_CONSENSUS_BLOCK_SIZE,
                false,
                MAINNET_ACTIVATION_TIME,
                BlockSizePercent::HALF,
            ),
            NetworkKind::Testnet3 => (
                DEFAULT_CONSENSUS_BLOCK_SIZE,
                true,
                MAINNET_ACTIVATION_TIME,
                BlockSizePercent::HALF,
            ),
            NetworkKind::Testnet4 => (
                2 * ONE_MEGABYTE,
                true,
                MAINNET_ACTIVATION_TIME,
                BlockSizePercent::FULL,
            ),
            NetworkKind::Scalenet => (
                256 * ONE_MEGABYTE,
                false,
                MAINNET_ACTIVATION_TIME,
                // 6.25%, 16 MB of 256 MB
                BlockSizePercent::from_thousandths_unchecked(6_250),
            ),
            NetworkKind::Chipnet => (
                2 * ONE_MEGABYTE,
                false,
                CHIPNET_ACTIVATION_TIME,
                BlockSizePercent::FULL,
            ),
            NetworkKind::Regtest => (
                DEFAULT_CONSENSUS_BLOCK_SIZE,
                false,
                MAINNET_ACTIVATION_TIME,
                BlockSizePercent::HALF,
            ),
        };

        Self {
            network,
            default_block_size,
            fixed_size,
            generated_block_size_percent: percent,
            activation: ActivationRule::MedianTime {
                time: activation_time,
            },
            abla: None,
        }
    }

    /// Returns the algorithm parameters in effect.
    pub fn abla_params(&self) -> AblaParams {
        self.abla
            .clone()
            .unwrap_or_else(|| AblaParams::from_default_block_size(self.default_block_size))
    }

    /// Derives and validates the algorithm configuration, checking that the
    /// initial state's limit equals the default block size.
    pub fn abla_config(&self) -> ConfigResult<AblaConfig> {
        let params = self.abla_params();
        let config = if self.fixed_size {
            AblaConfig::derive_fixed(&params)?
        } else {
            AblaConfig::derive(&params)?
        };

        let initial = config.initial_block_size_limit();
        if initial != self.default_block_size {
            return Err(ConfigError::InitialLimitMismatch {
                expected: self.default_block_size,
                actual: initial,
            });
        }

        debug!(network = %self.network, %config, "abla: network config");
        Ok(config)
    }

    /// Block template size for a given consensus limit.
    pub fn generated_block_size(&self, limit: u64) -> u64 {
        self.generated_block_size_percent.apply(limit)
    }

    pub fn from_toml_str(s: &str) -> ConfigResult<Self> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> ConfigResult<Self> {
        serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> ConfigResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Loads a params file.  Files ending in `.json` are read as JSON, anything
    /// else as TOML.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let params = if is_json {
            Self::from_json_str(&contents)?
        } else {
            Self::from_toml_str(&contents)?
        };
        info!(path = %path.display(), network = %params.network, "loaded network params");
        Ok(params)
    }
}
