use abla_params::AblaConfig;
use serde::{Deserialize, Serialize};

use crate::state::AblaState;

/// Per-block algorithm fields as reported to RPC consumers.
///
/// The two limits never drop below the node's configured block size.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct AblaStateView {
    pub blocksize: u64,
    pub epsilon: u64,
    pub beta: u64,
    pub blocksizelimit: u64,
    pub nextblocksizelimit: u64,
}

impl AblaStateView {
    pub fn new(state: &AblaState, config: &AblaConfig, configured_floor: u64) -> Self {
        Self {
            blocksize: state.block_size(),
            epsilon: state.control_block_size(),
            beta: state.elastic_buffer_size(),
            blocksizelimit: state.block_size_limit().max(configured_floor),
            nextblocksizelimit: state.next_block_size_limit(config).max(configured_floor),
        }
    }

    pub fn state(&self) -> AblaState {
        AblaState::new(self.blocksize, self.epsilon, self.beta)
    }
}
