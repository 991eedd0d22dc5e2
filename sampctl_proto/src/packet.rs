use std::net::Ipv4Addr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::datatypes::{BufError, ReadBuf};
use crate::MAGIC;

/// Size of the envelope header: magic, ip, port and opcode.
pub const HEADER_LEN: usize = 11;

/// The wrapper around every query and RCON datagram.
///
/// `ip` is kept numeric, as the little-endian read of the four wire bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub ip: u32,
    pub port: u16,
    pub opcode: i8,
    pub payload: Bytes,
}

/// Outcome of [`Envelope::decode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decoded {
    Envelope(Envelope),
    /// The datagram does not start with [`MAGIC`]. Not ours, not an error.
    NotMine,
}

/// Converts an address to the numeric form the envelope carries,
/// so that the octets end up on the wire in address order.
pub fn ip_to_number(addr: Ipv4Addr) -> u32 {
    u32::from_le_bytes(addr.octets())
}

impl Envelope {
    pub fn new(addr: Ipv4Addr, port: u16, opcode: i8, payload: Bytes) -> Self {
        Self {
            ip: ip_to_number(addr),
            port,
            opcode,
            payload,
        }
    }

    /// Dotted-quad rendering of [`Envelope::ip`].
    ///
    /// The most significant byte of the numeric value comes first, which is
    /// the reverse of the order [`Envelope::new`] writes. Servers rely on
    /// this asymmetry, so it stays.
    pub fn address(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.ip)
    }

    /// Writes the header and payload. The envelope has no length-limited
    /// field, so this cannot fail.
    pub fn serialize(&self, buf: &mut impl BufMut) {
        buf.put_slice(&MAGIC);
        buf.put_u32_le(self.ip);
        buf.put_u16_le(self.port);
        buf.put_i8(self.opcode);
        buf.put_slice(&self.payload);
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        self.serialize(&mut buf);
        buf.freeze()
    }

    /// Decodes a datagram.
    ///
    /// The magic is checked before anything else is read.
    pub fn decode(data: Bytes) -> Result<Decoded, BufError> {
        let mut buf = ReadBuf::new(data);
        let magic: [u8; 4] = buf.read_array()?;
        if magic != MAGIC {
            return Ok(Decoded::NotMine);
        }
        let ip = buf.read_u32()?;
        let port = buf.read_u16()?;
        let opcode = buf.read_i8()?;
        Ok(Decoded::Envelope(Self {
            ip,
            port,
            opcode,
            payload: buf.read_rest(),
        }))
    }
}

/// Encodes an envelope in one go.
pub fn encode(addr: Ipv4Addr, port: u16, opcode: i8, payload: &[u8]) -> Bytes {
    Envelope::new(addr, port, opcode, Bytes::copy_from_slice(payload)).to_bytes()
}
