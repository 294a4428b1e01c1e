//! Network message size limits derived from the block size algorithm.
//!
//! A peer may send a block that is larger than the current limit if our tip
//! is behind, so the networking layer bounds incoming block-like messages by a
//! worst-case projection of the limit far enough ahead to cover any block we
//! could still be downloading.

mod guess;
mod message;

pub use guess::LookaheadGuess;
pub use message::{MessageKind, UnknownCommand, is_oversized};

/// How many blocks ahead of the tip we may be asked to download.
pub const BLOCK_DOWNLOAD_WINDOW: usize = 1024;

/// Number of blocks the lookahead projection covers.
pub const LOOKAHEAD_BLOCKS: usize = 2 * BLOCK_DOWNLOAD_WINDOW;

/// Largest non-block protocol message accepted.
pub const MAX_PROTOCOL_MESSAGE_LENGTH: u64 = 2 * 1024 * 1024;
