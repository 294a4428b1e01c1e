//! In-memory arena of block headers.

use std::collections::HashMap;

use arbitrary::Arbitrary;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::{
    BlockId,
    errors::{ChainError, ChainResult},
};

/// Number of blocks, the block itself included, whose timestamps make up its
/// median-time-past.
pub const MEDIAN_TIME_SPAN: usize = 11;

/// The header fields the algorithm cares about.
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    Arbitrary,
    BorshSerialize,
    BorshDeserialize,
    Serialize,
    Deserialize,
)]
pub struct HeaderEntry {
    id: BlockId,
    parent: Option<BlockId>,
    height: u64,
    time: u64,
    size: u64,
}

impl HeaderEntry {
    pub fn new(id: BlockId, parent: Option<BlockId>, height: u64, time: u64, size: u64) -> Self {
        Self {
            id,
            parent,
            height,
            time,
            size,
        }
    }

    pub fn genesis(id: BlockId, time: u64, size: u64) -> Self {
        Self::new(id, None, 0, time, size)
    }

    /// Entry for a block on top of `parent`.
    pub fn child_of(parent: &HeaderEntry, id: BlockId, time: u64, size: u64) -> Self {
        Self::new(id, Some(parent.id), parent.height + 1, time, size)
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn parent(&self) -> Option<BlockId> {
        self.parent
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Block timestamp, unix seconds.
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Serialized block size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Headers indexed by id, by parent and by height.  Every entry's parent is
/// indexed before it.
#[derive(Debug, Default, Clone)]
pub struct BlockIndex {
    by_id: HashMap<BlockId, HeaderEntry>,
    by_parent: HashMap<BlockId, Vec<BlockId>>,
    by_height: HashMap<u64, Vec<BlockId>>,
}

impl BlockIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: HeaderEntry) -> ChainResult<()> {
        let id = entry.id();
        if self.by_id.contains_key(&id) {
            return Err(ChainError::DuplicateBlock(id));
        }

        let expected = match entry.parent() {
            None => 0,
            Some(parent) => {
                let pe = self
                    .by_id
                    .get(&parent)
                    .ok_or(ChainError::UnknownParent { id, parent })?;
                pe.height() + 1
            }
        };
        if entry.height() != expected {
            return Err(ChainError::BadHeight {
                id,
                expected,
                got: entry.height(),
            });
        }

        self.by_id.insert(id, entry);
        if let Some(parent) = entry.parent() {
            self.by_parent.entry(parent).or_default().push(id);
        }
        self.by_height.entry(entry.height()).or_default().push(id);
        Ok(())
    }

    pub fn get(&self, id: &BlockId) -> Option<&HeaderEntry> {
        self.by_id.get(id)
    }

    /// Like [`Self::get`], but a missing block is an error.
    pub fn entry(&self, id: &BlockId) -> ChainResult<&HeaderEntry> {
        self.by_id.get(id).ok_or(ChainError::UnknownBlock(*id))
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.by_id.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn children(&self, id: &BlockId) -> &[BlockId] {
        self.by_parent.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn blocks_at_height(&self, height: u64) -> &[BlockId] {
        self.by_height
            .get(&height)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Walks back from `id` to its ancestor at `height`.  Returns `None` if
    /// `height` is above the block.
    pub fn ancestor_at_height(&self, id: &BlockId, height: u64) -> ChainResult<Option<BlockId>> {
        let mut cur = *self.entry(id)?;
        if height > cur.height() {
            return Ok(None);
        }
        while cur.height() > height {
            // parents are always indexed
            let parent = cur.parent().ok_or(ChainError::UnknownBlock(cur.id()))?;
            cur = *self.entry(&parent)?;
        }
        Ok(Some(cur.id()))
    }

    pub fn is_ancestor_or_self(&self, ancestor: &BlockId, id: &BlockId) -> ChainResult<bool> {
        let height = self.entry(ancestor)?.height();
        Ok(self.ancestor_at_height(id, height)? == Some(*ancestor))
    }

    /// Deepest block that is an ancestor of (or equal to) both `a` and `b`.
    pub fn last_common_ancestor(&self, a: &BlockId, b: &BlockId) -> ChainResult<Option<BlockId>> {
        let height = self.entry(a)?.height().min(self.entry(b)?.height());
        let mut x = self.ancestor_at_height(a, height)?;
        let mut y = self.ancestor_at_height(b, height)?;
        while let (Some(xa), Some(yb)) = (x, y) {
            if xa == yb {
                return Ok(Some(xa));
            }
            x = self.entry(&xa)?.parent();
            y = self.entry(&yb)?.parent();
        }
        Ok(None)
    }

    /// Median of the timestamps of `id` and up to ten of its ancestors.
    pub fn median_time_past(&self, id: &BlockId) -> ChainResult<u64> {
        let mut times = Vec::with_capacity(MEDIAN_TIME_SPAN);
        let mut cur = Some(*id);
        while let Some(cid) = cur {
            if times.len() == MEDIAN_TIME_SPAN {
                break;
            }
            let entry = self.entry(&cid)?;
            times.push(entry.time());
            cur = entry.parent();
        }
        times.sort_unstable();
        Ok(times[times.len() / 2])
    }
}
