//! Adaptive block size limit state.
//!
//! Every block from activation onwards carries an [`AblaState`].  The state of
//! block N + 1 is a pure function of block N's state, block N + 1's size and
//! the network's [`AblaConfig`](abla_params::AblaConfig).  All arithmetic is
//! integer and checked; a transition that would overflow is a broken
//! invariant and panics.

mod errors;
mod lookahead;
mod state;
mod view;

pub use errors::{StateError, StateResult};
pub use state::AblaState;
pub use view::AblaStateView;
