use std::{fmt, str::FromStr};

use thiserror::Error;

use crate::MAX_PROTOCOL_MESSAGE_LENGTH;

/// P2P message kinds, as far as size limits are concerned.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MessageKind {
    Block,
    CmpctBlock,
    BlockTxn,
    Other,
}

impl MessageKind {
    /// Maps a wire command name.  Anything that isn't block-like is `Other`.
    pub fn from_command(cmd: &str) -> Self {
        match cmd {
            "block" => Self::Block,
            "cmpctblock" => Self::CmpctBlock,
            "blocktxn" => Self::BlockTxn,
            _ => Self::Other,
        }
    }

    /// Block-like messages carry a block or a large part of one.
    pub fn is_block_like(&self) -> bool {
        !matches!(self, Self::Other)
    }
}

#[derive(Debug, Error)]
#[error("unknown message kind {0}")]
pub struct UnknownCommand(String);

/// Strict parse for operator input, unlike [`MessageKind::from_command`].
impl FromStr for MessageKind {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "block" => Ok(Self::Block),
            "cmpctblock" => Ok(Self::CmpctBlock),
            "blocktxn" => Ok(Self::BlockTxn),
            "other" => Ok(Self::Other),
            _ => Err(UnknownCommand(s.to_owned())),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Block => "block",
            Self::CmpctBlock => "cmpctblock",
            Self::BlockTxn => "blocktxn",
            Self::Other => "other",
        })
    }
}

/// Checks a message header's declared payload size against the limits.
///
/// Any message above twice the lookahead guess is rejected, and non-block
/// messages are additionally held to [`MAX_PROTOCOL_MESSAGE_LENGTH`].
pub fn is_oversized(msg_size: u64, kind: MessageKind, lookahead_guess: u64) -> bool {
    if msg_size > lookahead_guess.saturating_mul(2) {
        return true;
    }
    !kind.is_block_like() && msg_size > MAX_PROTOCOL_MESSAGE_LENGTH
}
