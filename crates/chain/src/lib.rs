//! Chain-side bookkeeping for the adaptive block size limit.
//!
//! [`AblaChainTracker`] follows the active chain, finds the activation block
//! under the configured [`ActivationRule`](abla_params::ActivationRule) and
//! stores an [`AblaState`](abla_state::AblaState) for every block from there
//! to the tip.  States survive reorgs and are recomputed from the activation
//! block whenever the rule changes.

mod activation;
mod block_id;
mod db;
mod errors;
mod index;
mod tracker;

pub use activation::{ActivationBlockTracker, rule_holds};
pub use block_id::BlockId;
pub use db::{AblaStateDatabase, DbError, DbResult, MemAblaStateDb};
pub use errors::{ChainError, ChainResult};
pub use index::{BlockIndex, HeaderEntry, MEDIAN_TIME_SPAN};
pub use tracker::{AblaChainTracker, TipChange};
