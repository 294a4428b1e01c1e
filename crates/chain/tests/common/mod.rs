#![allow(dead_code, reason = "not every test binary uses every helper")]

use abla_chain::{AblaChainTracker, BlockId, HeaderEntry, MemAblaStateDb};
use abla_params::{AblaConfig, ActivationRule, constants::DEFAULT_CONSENSUS_BLOCK_SIZE};
use abla_state::AblaState;

pub fn config() -> AblaConfig {
    AblaConfig::new_default(DEFAULT_CONSENSUS_BLOCK_SIZE, false).unwrap()
}

pub fn time_at(height: u64) -> u64 {
    1_000 + 600 * height
}

/// Deterministic spread of sizes, some above the initial limit.
pub fn size_at(height: u64) -> u64 {
    height.wrapping_mul(2_654_435_761) % 48_000_000
}

pub type Tracker = AblaChainTracker<MemAblaStateDb>;

pub fn tracker(rule: ActivationRule) -> Tracker {
    AblaChainTracker::new(config(), rule, MemAblaStateDb::new())
}

/// Indexes and connects `sizes.len()` blocks on top of the tip, with ids
/// starting at `first_id` and timestamps from `time`.
pub fn extend(
    tracker: &mut Tracker,
    first_id: u64,
    sizes: &[u64],
    time: impl Fn(u64) -> u64,
) -> Vec<BlockId> {
    let mut ids = Vec::new();
    for (i, size) in sizes.iter().enumerate() {
        let id = BlockId::from_u64(first_id + i as u64);
        let entry = match tracker.tip() {
            Some(tip) => {
                let parent = *tracker.index().get(&tip).unwrap();
                HeaderEntry::child_of(&parent, id, time(parent.height() + 1), *size)
            }
            None => HeaderEntry::genesis(id, time(0), *size),
        };
        tracker.add_header(entry).unwrap();
        tracker.connect_block(id).unwrap();
        ids.push(id);
    }
    ids
}

/// Indexes a branch on top of `parent` without connecting it.
pub fn add_branch(
    tracker: &mut Tracker,
    parent: BlockId,
    first_id: u64,
    sizes: &[u64],
    time: impl Fn(u64) -> u64,
) -> Vec<BlockId> {
    let mut prev = *tracker.index().get(&parent).unwrap();
    let mut ids = Vec::new();
    for (i, size) in sizes.iter().enumerate() {
        let id = BlockId::from_u64(first_id + i as u64);
        let entry = HeaderEntry::child_of(&prev, id, time(prev.height() + 1), *size);
        tracker.add_header(entry).unwrap();
        ids.push(id);
        prev = entry;
    }
    ids
}

/// States obtained by treating the first size as the activation block's.
pub fn fold(config: &AblaConfig, sizes: &[u64]) -> Vec<AblaState> {
    let mut out: Vec<AblaState> = Vec::with_capacity(sizes.len());
    for size in sizes {
        let next = match out.last() {
            Some(prev) => prev.next_block_state(config, *size),
            None => AblaState::initial(config, *size),
        };
        out.push(next);
    }
    out
}

/// States of the active chain's blocks, lowest first.
pub fn chain_states(tracker: &Tracker) -> Vec<Option<AblaState>> {
    tracker
        .active_chain()
        .iter()
        .map(|id| tracker.state_for(id).unwrap())
        .collect()
}
