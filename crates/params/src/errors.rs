use std::io;

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parameter {0} must be nonzero")]
    ZeroParam(&'static str),

    #[error("zeta_xb7 must be above 128, got {0}")]
    ZetaNotAmplifying(u64),

    #[error("arithmetic overflow while deriving {0}")]
    DerivedOverflow(&'static str),

    #[error("initial control block size {epsilon0} above epsilon_max {epsilon_max}")]
    Epsilon0AboveMax { epsilon0: u64, epsilon_max: u64 },

    #[error("initial elastic buffer size {beta0} above beta_max {beta_max}")]
    Beta0AboveMax { beta0: u64, beta_max: u64 },

    #[error("{name} out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("epsilon0 {epsilon0} too low relative to gamma and zeta (minimum {min})")]
    Epsilon0TooLow { epsilon0: u64, min: u64 },

    #[error("initial block size limit {actual} does not match default block size {expected}")]
    InitialLimitMismatch { expected: u64, actual: u64 },

    #[error("invalid activation rule: {0}")]
    InvalidActivation(String),

    #[error("invalid percentage: {0}")]
    InvalidPercent(String),

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("parse params: {0}")]
    Parse(String),
}
