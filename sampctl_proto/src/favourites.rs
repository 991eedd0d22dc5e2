//! The `USERDATA.DAT` favourites file.
//!
//! Layout, all integers little-endian:
//! `[magic "SAMP"][u32 version = 1][u32 count]` then per entry
//! `[u32 len + ip][u32 port][u32 len + name][u32 len + password][u32 len + rcon password]`.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::datatypes::{BufError, LenPrefix, ReadBuf, WriteBuf};
use crate::MAGIC;

/// The only file version understood.
pub const VERSION: u32 = 1;

/// A remembered server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavouriteServer {
    pub ip: String,
    pub port: u32,
    pub name: String,
    pub password: String,
    pub rcon_password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FavouritesError {
    #[error("not a favourites file (magic {0:02x?})")]
    InvalidMagic([u8; 4]),
    #[error("favourites file version {0} not supported")]
    UnsupportedVersion(u32),
    #[error("too many entries ({0})")]
    TooManyEntries(usize),
    #[error(transparent)]
    Buf(#[from] BufError),
}

impl FavouriteServer {
    /// Whether this entry points at `ip:port`.
    pub fn is(&self, ip: &str, port: u32) -> bool {
        self.ip == ip && self.port == port
    }

    fn serialize(&self, buf: &mut WriteBuf) -> Result<(), BufError> {
        buf.write_str(&self.ip, LenPrefix::U32)?;
        buf.write_u32(self.port)?;
        buf.write_str(&self.name, LenPrefix::U32)?;
        buf.write_str(&self.password, LenPrefix::U32)?;
        buf.write_str(&self.rcon_password, LenPrefix::U32)?;
        Ok(())
    }

    fn deserialize(buf: &mut ReadBuf) -> Result<Self, BufError> {
        Ok(Self {
            ip: buf.read_str(LenPrefix::U32)?,
            port: buf.read_u32()?,
            name: buf.read_str(LenPrefix::U32)?,
            password: buf.read_str(LenPrefix::U32)?,
            rcon_password: buf.read_str(LenPrefix::U32)?,
        })
    }
}

/// Reads every entry of a favourites file, in file order.
pub fn deserialize(data: Bytes) -> Result<Vec<FavouriteServer>, FavouritesError> {
    let mut buf = ReadBuf::new(data);
    let magic: [u8; 4] = buf.read_array()?;
    if magic != MAGIC {
        return Err(FavouritesError::InvalidMagic(magic));
    }
    let version = buf.read_u32()?;
    if version != VERSION {
        return Err(FavouritesError::UnsupportedVersion(version));
    }
    let count = buf.read_u32()?;
    // each entry takes at least 20 bytes, don't trust the count for allocation
    let mut servers = Vec::with_capacity((count as usize).min(buf.remaining() / 20));
    for _ in 0..count {
        servers.push(FavouriteServer::deserialize(&mut buf)?);
    }
    Ok(servers)
}

/// Writes a favourites file holding `servers`, in order.
pub fn serialize(servers: &[FavouriteServer]) -> Result<Bytes, FavouritesError> {
    let count =
        u32::try_from(servers.len()).map_err(|_| FavouritesError::TooManyEntries(servers.len()))?;
    let mut buf = WriteBuf::new();
    buf.write_bytes(&MAGIC)?;
    buf.write_u32(VERSION)?;
    buf.write_u32(count)?;
    for server in servers {
        server.serialize(&mut buf)?;
    }
    Ok(buf.freeze())
}
