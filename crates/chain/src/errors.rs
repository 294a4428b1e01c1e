use thiserror::Error;

use crate::{BlockId, db::DbError};

pub type ChainResult<T> = Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("unknown block {0}")]
    UnknownBlock(BlockId),

    #[error("block {id} has unknown parent {parent}")]
    UnknownParent { id: BlockId, parent: BlockId },

    #[error("block {0} already indexed")]
    DuplicateBlock(BlockId),

    #[error("block {id} at height {got}, expected {expected}")]
    BadHeight { id: BlockId, expected: u64, got: u64 },

    #[error("block {id} does not extend tip {tip:?}")]
    NotExtendingTip { id: BlockId, tip: Option<BlockId> },

    #[error("active chain is empty")]
    EmptyChain,

    #[error("db: {0}")]
    Db(#[from] DbError),
}
