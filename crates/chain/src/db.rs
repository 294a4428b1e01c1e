//! Storage seam for per-block algorithm states.

use std::collections::HashMap;

use abla_params::ActivationRule;
use abla_state::AblaState;
use borsh::BorshDeserialize;
use parking_lot::Mutex;
use thiserror::Error;

use crate::BlockId;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error, Clone)]
pub enum DbError {
    /// Stored bytes did not decode as a state.
    #[error("codec error for block {0}: {1}")]
    Codec(BlockId, String),

    #[error("{0}")]
    Other(String),
}

/// Persists the state attached to each block, keyed by block id.
pub trait AblaStateDatabase: Send + Sync + 'static {
    /// Stores a block's state, replacing any previous one.
    fn put_state(&self, id: BlockId, state: AblaState) -> DbResult<()>;

    fn get_state(&self, id: BlockId) -> DbResult<Option<AblaState>>;

    /// Removes a block's state.  Returns true if there was one.
    fn del_state(&self, id: BlockId) -> DbResult<bool>;

    /// Removes every state and the recorded rule.  Returns how many states
    /// were removed.
    fn clear(&self) -> DbResult<usize>;

    /// Records the activation rule the stored states were computed under.
    fn put_activation_rule(&self, rule: ActivationRule) -> DbResult<()>;

    fn get_activation_rule(&self) -> DbResult<Option<ActivationRule>>;
}

/// In-memory implementation keeping the borsh encoding of each state.
#[derive(Debug, Default)]
pub struct MemAblaStateDb {
    states: Mutex<HashMap<BlockId, Vec<u8>>>,
    rule: Mutex<Option<ActivationRule>>,
}

impl MemAblaStateDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes raw bytes for a block, bypassing encoding.
    pub fn put_raw(&self, id: BlockId, bytes: Vec<u8>) {
        self.states.lock().insert(id, bytes);
    }

    pub fn len(&self) -> usize {
        self.states.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.lock().is_empty()
    }
}

impl AblaStateDatabase for MemAblaStateDb {
    fn put_state(&self, id: BlockId, state: AblaState) -> DbResult<()> {
        let bytes = borsh::to_vec(&state).map_err(|e| DbError::Codec(id, e.to_string()))?;
        self.states.lock().insert(id, bytes);
        Ok(())
    }

    fn get_state(&self, id: BlockId) -> DbResult<Option<AblaState>> {
        let tbl = self.states.lock();
        let Some(bytes) = tbl.get(&id) else {
            return Ok(None);
        };
        let state =
            AblaState::try_from_slice(bytes).map_err(|e| DbError::Codec(id, e.to_string()))?;
        Ok(Some(state))
    }

    fn del_state(&self, id: BlockId) -> DbResult<bool> {
        Ok(self.states.lock().remove(&id).is_some())
    }

    fn clear(&self) -> DbResult<usize> {
        let mut tbl = self.states.lock();
        let n = tbl.len();
        tbl.clear();
        *self.rule.lock() = None;
        Ok(n)
    }

    fn put_activation_rule(&self, rule: ActivationRule) -> DbResult<()> {
        *self.rule.lock() = Some(rule);
        Ok(())
    }

    fn get_activation_rule(&self) -> DbResult<Option<ActivationRule>> {
        Ok(*self.rule.lock())
    }
}
