//! Attaches algorithm states to the blocks of the active chain.

use std::sync::Arc;

use abla_msg_limits::LookaheadGuess;
use abla_params::{AblaConfig, ActivationRule};
use abla_state::{AblaState, AblaStateView};
use tracing::*;

use crate::{
    BlockId,
    activation::ActivationBlockTracker,
    db::{AblaStateDatabase, DbError},
    errors::{ChainError, ChainResult},
    index::{BlockIndex, HeaderEntry},
};

/// Blocks removed and added by a tip change.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TipChange {
    /// Deepest block shared by the old and new chains.
    pub fork_point: Option<BlockId>,

    /// Blocks removed from the old chain, tip first.
    pub disconnected: Vec<BlockId>,

    /// Blocks added from the new chain, lowest first.
    pub connected: Vec<BlockId>,
}

/// Tracks the active chain and keeps a state stored for every block from
/// the activation block up to the tip.
///
/// Mutations take `&mut self` and are expected to happen under the host's
/// chain-tip lock.
#[derive(Debug)]
pub struct AblaChainTracker<D> {
    config: AblaConfig,
    rule: ActivationRule,
    index: BlockIndex,
    db: D,

    /// Active chain, position is height.
    chain: Vec<BlockId>,

    activation: ActivationBlockTracker,
    guess: Option<Arc<LookaheadGuess>>,

    /// Set once `rule` is recorded in the db.
    rule_recorded: bool,
}

impl<D: AblaStateDatabase> AblaChainTracker<D> {
    /// Creates a tracker over an empty store.  Use [`Self::resume`] for a
    /// populated one.
    pub fn new(config: AblaConfig, rule: ActivationRule, db: D) -> Self {
        Self {
            config,
            rule,
            index: BlockIndex::new(),
            db,
            chain: Vec::new(),
            activation: ActivationBlockTracker::new(),
            guess: None,
            rule_recorded: false,
        }
    }

    /// Rebuilds a tracker over a previously persisted chain.
    ///
    /// Every stored state is discarded and the active chain replayed if the
    /// store was built under a rule other than `rule`.  Otherwise the states
    /// are still checked at the activation boundary and replayed if they
    /// don't match it.
    pub fn resume(
        config: AblaConfig,
        rule: ActivationRule,
        index: BlockIndex,
        db: D,
        chain: Vec<BlockId>,
    ) -> ChainResult<Self> {
        for (height, id) in chain.iter().enumerate() {
            let entry = index.entry(id)?;
            if entry.height() != height as u64 {
                return Err(ChainError::BadHeight {
                    id: *id,
                    expected: height as u64,
                    got: entry.height(),
                });
            }
        }

        let mut tracker = Self {
            config,
            rule,
            index,
            db,
            chain,
            activation: ActivationBlockTracker::new(),
            guess: None,
            rule_recorded: false,
        };

        let recorded = tracker.db.get_activation_rule()?;
        if recorded != Some(rule) {
            warn!(
                ?recorded,
                %rule,
                "abla: stored states built under another rule, recomputing"
            );
            tracker.recompute_from_activation()?;
        } else if tracker.stored_states_consistent()? {
            tracker.rule_recorded = true;
            debug!(tip_height = ?tracker.tip_height(), "abla: stored states consistent");
        } else {
            warn!(rule = %tracker.rule, "abla: stored states stale, recomputing");
            tracker.recompute_from_activation()?;
        }
        Ok(tracker)
    }

    /// Splits the tracker into what [`Self::resume`] takes back.
    pub fn into_parts(self) -> (BlockIndex, D, Vec<BlockId>) {
        (self.index, self.db, self.chain)
    }

    /// Publishes the lookahead guess into `guess` on every tip change.
    pub fn with_lookahead_guess(mut self, guess: Arc<LookaheadGuess>) -> Self {
        self.guess = Some(guess);
        self
    }

    pub fn config(&self) -> &AblaConfig {
        &self.config
    }

    pub fn rule(&self) -> &ActivationRule {
        &self.rule
    }

    pub fn index(&self) -> &BlockIndex {
        &self.index
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    pub fn active_chain(&self) -> &[BlockId] {
        &self.chain
    }

    pub fn tip(&self) -> Option<BlockId> {
        self.chain.last().copied()
    }

    pub fn tip_height(&self) -> Option<u64> {
        self.chain.len().checked_sub(1).map(|h| h as u64)
    }

    /// Indexes a header so it can later be connected.
    pub fn add_header(&mut self, entry: HeaderEntry) -> ChainResult<()> {
        self.index.insert(entry)
    }

    /// Activation block of the active chain, if any.
    pub fn activation_block(&mut self) -> ChainResult<Option<BlockId>> {
        match self.tip() {
            Some(tip) => self
                .activation
                .activation_block(&self.index, &self.rule, tip),
            None => Ok(None),
        }
    }

    /// Connects an indexed block on top of the tip and returns its state, or
    /// `None` if the algorithm is not active yet.
    pub fn connect_block(&mut self, id: BlockId) -> ChainResult<Option<AblaState>> {
        let state = self.push_block(id)?;
        self.publish_guess()?;
        Ok(state)
    }

    /// Moves the tip back by one block.  Stored states are kept.
    pub fn disconnect_tip(&mut self) -> ChainResult<BlockId> {
        let id = self.pop_tip()?;
        self.publish_guess()?;
        Ok(id)
    }

    /// Makes `id` the tip, disconnecting back to the fork point and
    /// connecting the new branch from there.
    ///
    /// If a block of the new branch fails to connect, the old chain is
    /// restored and the error returned.
    pub fn set_tip(&mut self, id: BlockId) -> ChainResult<TipChange> {
        let mut branch = Vec::new();
        let mut cur = Some(id);
        while let Some(cid) = cur {
            let entry = self.index.entry(&cid)?;
            if self.chain.get(entry.height() as usize) == Some(&cid) {
                break;
            }
            branch.push(cid);
            cur = entry.parent();
        }
        let fork_point = cur;

        let keep = match fork_point {
            Some(f) => self.index.entry(&f)?.height() as usize + 1,
            None => 0,
        };
        let mut disconnected = Vec::new();
        while self.chain.len() > keep {
            disconnected.push(self.pop_tip()?);
        }

        branch.reverse();
        for cid in &branch {
            if let Err(e) = self.push_block(*cid) {
                warn!(
                    id = %cid,
                    err = %e,
                    "abla: failed to connect branch, restoring old chain"
                );
                self.chain.truncate(keep);
                self.chain.extend(disconnected.iter().rev());
                self.publish_guess()?;
                return Err(e);
            }
        }

        if !disconnected.is_empty() {
            info!(
                fork_point = ?fork_point,
                disconnected = disconnected.len(),
                connected = branch.len(),
                "abla: reorganized active chain"
            );
        }
        self.publish_guess()?;

        Ok(TipChange {
            fork_point,
            disconnected,
            connected: branch,
        })
    }

    /// Switches to a new activation rule, discarding every stored state and
    /// replaying the active chain under it.
    pub fn set_activation_rule(&mut self, rule: ActivationRule) -> ChainResult<usize> {
        info!(old = %self.rule, new = %rule, "abla: changing activation rule");
        self.rule = rule;
        self.recompute_from_activation()
    }

    /// Discards every stored state and recomputes states for the active chain
    /// from its activation block to the tip.  Returns the number of states
    /// written.
    pub fn recompute_from_activation(&mut self) -> ChainResult<usize> {
        let cleared = self.db.clear()?;
        self.activation.reset();
        self.db.put_activation_rule(self.rule)?;
        self.rule_recorded = true;

        let Some(activation) = self.activation_block()? else {
            info!(%cleared, "abla: not active on the current chain");
            self.publish_guess()?;
            return Ok(0);
        };

        let start = self.index.entry(&activation)?.height();
        self.replay_from(start)?;
        let written = self.chain.len() - start as usize;

        info!(
            activation_height = start,
            %written,
            %cleared,
            "abla: recomputed states from activation block"
        );
        self.publish_guess()?;
        Ok(written)
    }

    pub fn state_for(&self, id: &BlockId) -> ChainResult<Option<AblaState>> {
        Ok(self.db.get_state(*id)?)
    }

    /// State of the active chain's block at `height`.
    pub fn state_at_height(&self, height: u64) -> ChainResult<Option<AblaState>> {
        match self.chain.get(height as usize) {
            Some(id) => self.state_for(id),
            None => Ok(None),
        }
    }

    pub fn tip_state(&self) -> ChainResult<Option<AblaState>> {
        match self.tip() {
            Some(tip) => self.state_for(&tip),
            None => Ok(None),
        }
    }

    /// Limit for the block after the tip, never below `configured_floor`.
    ///
    /// Before activation this is just the configured size.
    pub fn next_block_size_limit(&self, configured_floor: u64) -> ChainResult<u64> {
        Ok(match self.tip_state()? {
            Some(state) => state
                .next_block_size_limit(&self.config)
                .max(configured_floor),
            None => configured_floor,
        })
    }

    pub fn view_for(
        &self,
        id: &BlockId,
        configured_floor: u64,
    ) -> ChainResult<Option<AblaStateView>> {
        Ok(self
            .state_for(id)?
            .map(|state| AblaStateView::new(&state, &self.config, configured_floor)))
    }

    fn push_block(&mut self, id: BlockId) -> ChainResult<Option<AblaState>> {
        let entry = *self.index.entry(&id)?;
        let tip = self.tip();
        if entry.parent() != tip {
            return Err(ChainError::NotExtendingTip { id, tip });
        }

        let state = self.compute_state(&entry)?;
        self.chain.push(id);

        if let Some(state) = &state {
            debug!(height = entry.height(), %state, "abla: connected block");
        }
        Ok(state)
    }

    fn pop_tip(&mut self) -> ChainResult<BlockId> {
        let id = self.chain.pop().ok_or(ChainError::EmptyChain)?;
        trace!(%id, height = self.chain.len(), "abla: disconnected block");
        Ok(id)
    }

    fn compute_state(&mut self, entry: &HeaderEntry) -> ChainResult<Option<AblaState>> {
        let id = entry.id();
        if !self.rule_recorded {
            self.db.put_activation_rule(self.rule)?;
            self.rule_recorded = true;
        }

        if let Some(cached) = self.load_valid_state(id)? {
            if cached.block_size() == entry.size() {
                return Ok(Some(cached));
            }
            warn!(
                %id,
                stored = cached.block_size(),
                actual = entry.size(),
                "abla: stored state has wrong block size, discarding"
            );
            self.db.del_state(id)?;
        }

        let parent_state = match entry.parent() {
            Some(parent) => self.load_valid_state(parent)?,
            None => None,
        };

        let state = match parent_state {
            Some(prev) => Some(prev.next_block_state(&self.config, entry.size())),
            None => {
                let activation = self
                    .activation
                    .activation_block(&self.index, &self.rule, id)?;
                match activation {
                    None => None,
                    Some(a) if a == id => {
                        info!(height = entry.height(), %id, "abla: activated");
                        Some(AblaState::initial(&self.config, entry.size()))
                    }
                    Some(a) => {
                        // The parent is the tip, so the activation block is on the active chain.
                        let start = self.index.entry(&a)?.height();
                        warn!(
                            height = entry.height(),
                            activation_height = start,
                            "abla: predecessor state missing, replaying"
                        );
                        self.replay_from(start)?
                            .map(|prev| prev.next_block_state(&self.config, entry.size()))
                    }
                }
            }
        };

        if let Some(state) = state {
            self.db.put_state(id, state)?;
        }
        Ok(state)
    }

    /// Loads a stored state, discarding it if it fails to decode or lies
    /// outside the config's bounds.
    fn load_valid_state(&self, id: BlockId) -> ChainResult<Option<AblaState>> {
        let state = match self.db.get_state(id) {
            Ok(state) => state,
            Err(DbError::Codec(_, e)) => {
                warn!(%id, err = %e, "abla: undecodable stored state, discarding");
                self.db.del_state(id)?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match state {
            Some(state) if !state.is_valid(&self.config) => {
                warn!(%id, %state, "abla: invalid stored state, discarding");
                self.db.del_state(id)?;
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Recomputes and stores states for the active chain from `start_height`
    /// to the tip, treating the block at `start_height` as the activation
    /// block.  Returns the tip's state.
    fn replay_from(&self, start_height: u64) -> ChainResult<Option<AblaState>> {
        let mut prev: Option<AblaState> = None;
        for id in self.chain.iter().skip(start_height as usize) {
            let size = self.index.entry(id)?.size();
            let state = match prev {
                None => AblaState::initial(&self.config, size),
                Some(p) => p.next_block_state(&self.config, size),
            };
            self.db.put_state(*id, state)?;
            prev = Some(state);
        }
        Ok(prev)
    }

    /// Checks the stored states at the boundary implied by the current rule.
    fn stored_states_consistent(&mut self) -> ChainResult<bool> {
        let Some(tip) = self.tip() else {
            return Ok(true);
        };
        let tip_has_state = self.load_valid_state(tip)?.is_some();

        let Some(activation) = self.activation_block()? else {
            return Ok(!tip_has_state);
        };
        if !tip_has_state {
            return Ok(false);
        }

        let entry = *self.index.entry(&activation)?;
        let expected = AblaState::initial(&self.config, entry.size());
        if self.load_valid_state(activation)? != Some(expected) {
            return Ok(false);
        }
        match entry.parent() {
            Some(parent) => Ok(self.load_valid_state(parent)?.is_none()),
            None => Ok(true),
        }
    }

    fn publish_guess(&self) -> ChainResult<()> {
        let Some(guess) = &self.guess else {
            return Ok(());
        };
        let tip_state = self.tip_state()?;
        guess.update(
            &self.config,
            self.tip_height().unwrap_or_default(),
            tip_state.as_ref(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use abla_params::constants::DEFAULT_CONSENSUS_BLOCK_SIZE;
    use parking_lot::Mutex;

    use super::*;
    use crate::{MemAblaStateDb, db::DbResult};

    /// Store that refuses to write the state of one block.
    #[derive(Debug, Default)]
    struct FailingDb {
        inner: MemAblaStateDb,
        fail_on: Mutex<Option<BlockId>>,
    }

    impl AblaStateDatabase for FailingDb {
        fn put_state(&self, id: BlockId, state: AblaState) -> DbResult<()> {
            if *self.fail_on.lock() == Some(id) {
                return Err(DbError::Other(format!("write refused for {id}")));
            }
            self.inner.put_state(id, state)
        }

        fn get_state(&self, id: BlockId) -> DbResult<Option<AblaState>> {
            self.inner.get_state(id)
        }

        fn del_state(&self, id: BlockId) -> DbResult<bool> {
            self.inner.del_state(id)
        }

        fn clear(&self) -> DbResult<usize> {
            self.inner.clear()
        }

        fn put_activation_rule(&self, rule: ActivationRule) -> DbResult<()> {
            self.inner.put_activation_rule(rule)
        }

        fn get_activation_rule(&self) -> DbResult<Option<ActivationRule>> {
            self.inner.get_activation_rule()
        }
    }

    fn config() -> AblaConfig {
        AblaConfig::new_default(DEFAULT_CONSENSUS_BLOCK_SIZE, false).unwrap()
    }

    fn add_chain<D: AblaStateDatabase>(
        tracker: &mut AblaChainTracker<D>,
        parent: Option<BlockId>,
        first_id: u64,
        n: u64,
    ) -> Vec<BlockId> {
        let mut prev = parent.map(|p| *tracker.index().get(&p).unwrap());
        let mut ids = Vec::new();
        for i in 0..n {
            let id = BlockId::from_u64(first_id + i);
            let entry = match &prev {
                Some(p) => HeaderEntry::child_of(p, id, 0, 1_000_000 * (i + 1)),
                None => HeaderEntry::genesis(id, 0, 1_000_000),
            };
            tracker.add_header(entry).unwrap();
            ids.push(id);
            prev = Some(entry);
        }
        ids
    }

    #[test]
    fn test_set_tip_failure_restores_old_chain() {
        let guess = Arc::new(LookaheadGuess::new(0));
        let mut tracker = AblaChainTracker::new(
            config(),
            ActivationRule::Height { height: 0 },
            FailingDb::default(),
        )
        .with_lookahead_guess(guess.clone());

        let main = add_chain(&mut tracker, None, 0, 6);
        for id in &main {
            tracker.connect_block(*id).unwrap();
        }
        let old_chain = tracker.active_chain().to_vec();
        let old_guess = guess.get();

        let fork = add_chain(&mut tracker, Some(main[2]), 100, 4);
        *tracker.db().fail_on.lock() = Some(fork[2]);

        let res = tracker.set_tip(fork[3]);
        assert!(matches!(res, Err(ChainError::Db(DbError::Other(_)))));
        assert_eq!(tracker.active_chain(), old_chain.as_slice());
        assert_eq!(guess.get(), old_guess);

        // The same reorg goes through once writes succeed again.
        *tracker.db().fail_on.lock() = None;
        let change = tracker.set_tip(fork[3]).unwrap();
        assert_eq!(change.fork_point, Some(main[2]));
        assert_eq!(change.connected, fork);
        assert_eq!(tracker.tip(), Some(fork[3]));
    }

    #[test]
    fn test_rule_recorded_on_first_connect() {
        let rule = ActivationRule::Height { height: 1 };
        let mut tracker = AblaChainTracker::new(config(), rule, MemAblaStateDb::new());
        assert_eq!(tracker.db().get_activation_rule().unwrap(), None);

        let ids = add_chain(&mut tracker, None, 0, 2);
        tracker.connect_block(ids[0]).unwrap();
        assert_eq!(tracker.db().get_activation_rule().unwrap(), Some(rule));

        let rule = ActivationRule::Height { height: 0 };
        tracker.set_activation_rule(rule).unwrap();
        assert_eq!(tracker.db().get_activation_rule().unwrap(), Some(rule));
    }
}
