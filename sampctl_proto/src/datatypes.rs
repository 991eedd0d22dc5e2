use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codepage;

macro_rules! read_guard {
    ($self:ident, $len:expr) => {
        if $self.0.remaining() < $len {
            return Err(BufError::NotEnoughData);
        }
    };
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BufError {
    /// There is no more data to read
    #[error("not enough data")]
    NotEnoughData,
    /// A length prefix is negative, or a value is too long for its prefix
    #[error("invalid length {0}")]
    InvalidLength(i64),
}

/// Width and signedness of the length prefix in front of a string.
///
/// The protocol is not consistent about it: query replies use `u8` and `u32`,
/// RCON uses `u16` and `i16`, the favourites file uses `u32`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LenPrefix {
    U8,
    U16,
    I16,
    U32,
}

impl LenPrefix {
    /// Largest length this prefix can carry.
    pub fn max_len(self) -> usize {
        match self {
            Self::U8 => u8::MAX as usize,
            Self::U16 => u16::MAX as usize,
            Self::I16 => i16::MAX as usize,
            Self::U32 => u32::MAX as usize,
        }
    }
}

/// Little-endian read cursor.
#[derive(Clone, Debug)]
pub struct ReadBuf(pub Bytes);

/// Little-endian write cursor.
#[derive(Clone, Debug)]
pub struct WriteBuf(pub BytesMut);

impl ReadBuf {
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn remaining(&self) -> usize {
        self.0.remaining()
    }
}

impl WriteBuf {
    pub fn new() -> Self {
        Self(BytesMut::new())
    }

    pub fn freeze(self) -> Bytes {
        self.0.freeze()
    }
}

impl Default for WriteBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for ReadBuf {
    fn from(val: Vec<u8>) -> Self {
        ReadBuf(Bytes::from(val))
    }
}

impl From<&[u8]> for ReadBuf {
    fn from(val: &[u8]) -> Self {
        ReadBuf(Bytes::copy_from_slice(val))
    }
}

impl ReadBuf {
    pub fn read_u8(&mut self) -> Result<u8, BufError> {
        read_guard!(self, 1);
        Ok(self.0.get_u8())
    }

    pub fn read_i8(&mut self) -> Result<i8, BufError> {
        read_guard!(self, 1);
        Ok(self.0.get_i8())
    }

    /// Any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool, BufError> {
        read_guard!(self, 1);
        Ok(self.0.get_u8() != 0)
    }

    pub fn read_i16(&mut self) -> Result<i16, BufError> {
        read_guard!(self, 2);
        Ok(self.0.get_i16_le())
    }

    pub fn read_u16(&mut self) -> Result<u16, BufError> {
        read_guard!(self, 2);
        Ok(self.0.get_u16_le())
    }

    pub fn read_i32(&mut self) -> Result<i32, BufError> {
        read_guard!(self, 4);
        Ok(self.0.get_i32_le())
    }

    pub fn read_u32(&mut self) -> Result<u32, BufError> {
        read_guard!(self, 4);
        Ok(self.0.get_u32_le())
    }

    /// Reads exactly `N` raw bytes.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BufError> {
        read_guard!(self, N);
        let mut dest = [0u8; N];
        self.0.copy_to_slice(&mut dest);
        Ok(dest)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes, BufError> {
        read_guard!(self, len);
        Ok(self.0.split_to(len))
    }

    /// Takes everything left in the buffer.
    pub fn read_rest(&mut self) -> Bytes {
        let len = self.0.remaining();
        self.0.split_to(len)
    }

    /// Reads a length-prefixed Windows-1251 string.
    pub fn read_str(&mut self, prefix: LenPrefix) -> Result<String, BufError> {
        let len = match prefix {
            LenPrefix::U8 => self.read_u8()? as usize,
            LenPrefix::U16 => self.read_u16()? as usize,
            LenPrefix::I16 => {
                let len = self.read_i16()?;
                usize::try_from(len).map_err(|_| BufError::InvalidLength(len as i64))?
            }
            LenPrefix::U32 => self.read_u32()? as usize,
        };
        let bytes = self.read_bytes(len)?;
        Ok(codepage::decode(&bytes))
    }
}

impl WriteBuf {
    pub fn write_u8(&mut self, value: u8) -> Result<(), BufError> {
        self.0.put_u8(value);
        Ok(())
    }

    pub fn write_i8(&mut self, value: i8) -> Result<(), BufError> {
        self.0.put_i8(value);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), BufError> {
        self.0.put_u8(value as u8);
        Ok(())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), BufError> {
        self.0.put_i16_le(value);
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<(), BufError> {
        self.0.put_u16_le(value);
        Ok(())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<(), BufError> {
        self.0.put_i32_le(value);
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<(), BufError> {
        self.0.put_u32_le(value);
        Ok(())
    }

    pub fn write_bytes(&mut self, value: &[u8]) -> Result<(), BufError> {
        self.0.extend_from_slice(value);
        Ok(())
    }

    /// Writes a length-prefixed Windows-1251 string.
    ///
    /// The prefix carries the encoded byte count, which may differ from the
    /// character count of `value`.
    pub fn write_str(&mut self, value: &str, prefix: LenPrefix) -> Result<(), BufError> {
        let bytes = codepage::encode(value);
        let len = bytes.len();
        if len > prefix.max_len() {
            return Err(BufError::InvalidLength(len as i64));
        }
        match prefix {
            LenPrefix::U8 => self.0.put_u8(len as u8),
            LenPrefix::U16 => self.0.put_u16_le(len as u16),
            LenPrefix::I16 => self.0.put_i16_le(len as i16),
            LenPrefix::U32 => self.0.put_u32_le(len as u32),
        }
        self.0.extend_from_slice(&bytes);
        Ok(())
    }
}
