mod query;
mod rcon;

pub use query::*;
pub use rcon::*;

use bytes::Bytes;

use super::datatypes::{BufError, ReadBuf, WriteBuf};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// Error while serializing/deserializing the message
    #[error(transparent)]
    BufError(#[from] BufError),
    /// More entries than the count field can carry
    #[error("too many entries ({0})")]
    TooManyEntries(usize),
}

/// A payload carried inside an [`crate::packet::Envelope`].
pub trait Message: Sized {
    fn serialize(&self, buf: &mut WriteBuf) -> Result<(), MessageError>;

    fn deserialize(buf: &mut ReadBuf) -> Result<Self, MessageError>;

    fn to_bytes(&self) -> Result<Bytes, MessageError> {
        let mut buf = WriteBuf::new();
        self.serialize(&mut buf)?;
        Ok(buf.freeze())
    }

    fn from_bytes(bytes: Bytes) -> Result<Self, MessageError> {
        Self::deserialize(&mut ReadBuf::new(bytes))
    }
}

/// Opcode of RCON commands and replies.
pub const RCON_OPCODE: i8 = 0x78;

/// Kinds of query a server answers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum QueryOpcode {
    Info,
    Rules,
    Players,
    PlayersDetailed,
}

impl QueryOpcode {
    pub fn from_i8(value: i8) -> Option<Self> {
        match value {
            105 => Some(Self::Info),
            114 => Some(Self::Rules),
            99 => Some(Self::Players),
            100 => Some(Self::PlayersDetailed),
            _ => None,
        }
    }

    pub fn to_i8(self) -> i8 {
        match self {
            Self::Info => 105,
            Self::Rules => 114,
            Self::Players => 99,
            Self::PlayersDetailed => 100,
        }
    }
}

#[inline]
pub(super) fn write_count(buf: &mut WriteBuf, count: usize) -> Result<(), MessageError> {
    let count = u16::try_from(count).map_err(|_| MessageError::TooManyEntries(count))?;
    buf.write_u16(count)?;
    Ok(())
}
