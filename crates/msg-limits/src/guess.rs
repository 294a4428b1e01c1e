use std::sync::atomic::{AtomicU64, Ordering};

use abla_params::AblaConfig;
use abla_state::AblaState;
use tracing::*;

use crate::{LOOKAHEAD_BLOCKS, message::MessageKind};

/// Worst-case block size limit [`LOOKAHEAD_BLOCKS`] past the current tip.
///
/// Written by the chain side whenever the tip moves and read lock-free by
/// the networking side.
#[derive(Debug)]
pub struct LookaheadGuess {
    value: AtomicU64,
}

impl LookaheadGuess {
    pub fn new(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }

    /// Guess for a chain where the algorithm is not yet active.
    pub fn for_config(config: &AblaConfig) -> Self {
        Self::new(Self::compute(config, None))
    }

    /// Projects the limit from `tip_state`, or from the initial state when the
    /// tip carries none.
    pub fn compute(config: &AblaConfig, tip_state: Option<&AblaState>) -> u64 {
        let state = tip_state
            .copied()
            .unwrap_or_else(|| AblaState::initial(config, 0));
        state.calc_lookahead_block_size_limit(config, LOOKAHEAD_BLOCKS)
    }

    /// Recomputes and publishes the guess for a new tip.
    pub fn update(&self, config: &AblaConfig, tip_height: u64, tip_state: Option<&AblaState>) -> u64 {
        let guess = Self::compute(config, tip_state);
        self.value.store(guess, Ordering::Release);
        info!("lookahead-blocksize-guess for tip height {tip_height} to {guess}");
        guess
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }

    /// Largest block-like message currently accepted.
    pub fn max_block_message_size(&self) -> u64 {
        self.get().saturating_mul(2)
    }

    pub fn is_oversized(&self, msg_size: u64, kind: MessageKind) -> bool {
        crate::is_oversized(msg_size, kind, self.get())
    }
}
