//! Consensus parameters for the adaptive block size limit algorithm.
//!
//! [`AblaConfig`] is derived once per network from an [`AblaParams`] and then
//! passed by reference to every state transition.  [`NetworkParams`] bundles
//! it with the activation rule and mining policy, and can be read from a TOML
//! or JSON params file.

mod activation;
mod arith;
mod config;
pub mod constants;
mod errors;
mod network;
mod policy;
pub mod serde_helpers;

pub use activation::ActivationRule;
pub use arith::{ZetaXB7, checked_muldiv, muldiv};
pub use config::{AblaConfig, AblaParams};
pub use errors::{ConfigError, ConfigResult};
pub use network::{NetworkKind, NetworkParams};
pub use policy::BlockSizePercent;
