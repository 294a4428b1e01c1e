use abla_params::ActivationRule;

use crate::{
    BlockId,
    errors::ChainResult,
    index::{BlockIndex, HeaderEntry},
};

/// Returns true if `rule` holds for the block.  Time rules look at the
/// parent's median-time-past.
pub fn rule_holds(
    index: &BlockIndex,
    rule: &ActivationRule,
    entry: &HeaderEntry,
) -> ChainResult<bool> {
    let prev_median_time = match entry.parent() {
        Some(parent) if rule.is_time_based() => Some(index.median_time_past(&parent)?),
        Some(_) => Some(0),
        None => None,
    };
    Ok(rule.is_active_at(entry.height(), prev_median_time))
}

/// Finds and caches the activation block, the earliest block on a chain for
/// which the activation rule holds.
///
/// The cache remembers the last block queried along with its answer, so
/// walking forward along one chain only looks at the new blocks.  The cache
/// must be reset whenever the rule changes.
#[derive(Clone, Debug, Default)]
pub struct ActivationBlockTracker {
    checked: Option<BlockId>,
    activation: Option<BlockId>,
}

impl ActivationBlockTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.checked = None;
        self.activation = None;
    }

    /// Activation block found by the last query.
    pub fn cached(&self) -> Option<BlockId> {
        self.activation
    }

    /// Returns the activation block of the chain ending at `id`, which may be
    /// `id` itself, or `None` if the rule holds for no block on it.
    pub fn activation_block(
        &mut self,
        index: &BlockIndex,
        rule: &ActivationRule,
        id: BlockId,
    ) -> ChainResult<Option<BlockId>> {
        let mut earliest = None;
        let mut cur = Some(id);
        while let Some(cid) = cur {
            if Some(cid) == self.checked {
                // Everything below here was already scanned.
                earliest = self.activation.or(earliest);
                break;
            }
            if Some(cid) == self.activation {
                earliest = Some(cid);
                break;
            }

            let entry = index.entry(&cid)?;
            if rule_holds(index, rule, entry)? {
                earliest = Some(cid);
            }
            cur = entry.parent();
        }

        self.checked = Some(id);
        self.activation = earliest;
        Ok(earliest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear(times: &[u64]) -> BlockIndex {
        let mut index = BlockIndex::new();
        let mut prev = HeaderEntry::genesis(BlockId::from_u64(0), times[0], 0);
        index.insert(prev).unwrap();
        for (i, t) in times.iter().enumerate().skip(1) {
            let e = HeaderEntry::child_of(&prev, BlockId::from_u64(i as u64), *t, 0);
            index.insert(e).unwrap();
            prev = e;
        }
        index
    }

    #[test]
    fn test_height_rule() {
        let index = linear(&[0; 10]);
        let rule = ActivationRule::Height { height: 4 };
        let mut tracker = ActivationBlockTracker::new();

        assert_eq!(
            tracker.activation_block(&index, &rule, BlockId::from_u64(3)).unwrap(),
            None
        );
        assert_eq!(
            tracker.activation_block(&index, &rule, BlockId::from_u64(4)).unwrap(),
            Some(BlockId::from_u64(4))
        );
        assert_eq!(
            tracker.activation_block(&index, &rule, BlockId::from_u64(9)).unwrap(),
            Some(BlockId::from_u64(4))
        );
        assert_eq!(tracker.cached(), Some(BlockId::from_u64(4)));
    }

    #[test]
    fn test_genesis_activation() {
        let index = linear(&[500, 600, 700]);
        let mut tracker = ActivationBlockTracker::new();

        let rule = ActivationRule::MedianTime { time: 0 };
        assert_eq!(
            tracker.activation_block(&index, &rule, BlockId::from_u64(2)).unwrap(),
            Some(BlockId::from_u64(0))
        );

        // Genesis time alone doesn't activate genesis, only its child.
        let rule = ActivationRule::MedianTime { time: 500 };
        tracker.reset();
        assert_eq!(
            tracker.activation_block(&index, &rule, BlockId::from_u64(0)).unwrap(),
            None
        );
        assert_eq!(
            tracker.activation_block(&index, &rule, BlockId::from_u64(2)).unwrap(),
            Some(BlockId::from_u64(1))
        );

        // Block 1's median is 600.
        let rule = ActivationRule::MedianTime { time: 501 };
        tracker.reset();
        assert_eq!(
            tracker.activation_block(&index, &rule, BlockId::from_u64(2)).unwrap(),
            Some(BlockId::from_u64(2))
        );
    }

    #[test]
    fn test_time_rule_uses_parent_median() {
        // Times 100, 200, ..., 2000.
        let times: Vec<u64> = (1..=20).map(|i| i * 100).collect();
        let index = linear(&times);
        let rule = ActivationRule::MedianTime { time: 800 };

        // Block 12's own median is 800 but its parent's is 700.
        assert_eq!(index.median_time_past(&BlockId::from_u64(12)).unwrap(), 800);
        assert_eq!(index.median_time_past(&BlockId::from_u64(11)).unwrap(), 700);
        let b12 = *index.get(&BlockId::from_u64(12)).unwrap();
        let b13 = *index.get(&BlockId::from_u64(13)).unwrap();
        assert!(!rule_holds(&index, &rule, &b12).unwrap());
        assert!(rule_holds(&index, &rule, &b13).unwrap());

        let mut tracker = ActivationBlockTracker::new();
        assert_eq!(
            tracker.activation_block(&index, &rule, BlockId::from_u64(19)).unwrap(),
            Some(BlockId::from_u64(13))
        );
    }

    #[test]
    fn test_incremental_scan_matches_fresh() {
        let times: Vec<u64> = (0..30).map(|i| 1_000 + i * 37).collect();
        let index = linear(&times);
        let rule = ActivationRule::MedianTime { time: 1_500 };

        let mut walking = ActivationBlockTracker::new();
        for i in 0..30 {
            let id = BlockId::from_u64(i);
            let walked = walking.activation_block(&index, &rule, id).unwrap();
            let fresh = ActivationBlockTracker::new()
                .activation_block(&index, &rule, id)
                .unwrap();
            assert_eq!(walked, fresh, "height {i}");
        }
    }

    #[test]
    fn test_switching_branches() {
        let mut index = linear(&[0; 6]);
        let b2 = *index.get(&BlockId::from_u64(2)).unwrap();
        let mut prev = b2;
        for i in 0..5 {
            let e = HeaderEntry::child_of(&prev, BlockId::from_u64(100 + i), 0, 0);
            index.insert(e).unwrap();
            prev = e;
        }

        let rule = ActivationRule::Height { height: 4 };
        let mut tracker = ActivationBlockTracker::new();
        assert_eq!(
            tracker.activation_block(&index, &rule, BlockId::from_u64(5)).unwrap(),
            Some(BlockId::from_u64(4))
        );
        // Side branch: heights 3..=7 are ids 100..=104.
        assert_eq!(
            tracker.activation_block(&index, &rule, BlockId::from_u64(104)).unwrap(),
            Some(BlockId::from_u64(101))
        );
    }
}
