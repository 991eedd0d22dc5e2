//! Wire formats spoken by SA-MP servers and clients: the packet envelope
//! shared by queries and RCON, their payloads, and the `USERDATA.DAT`
//! favourites file.
//!
//! Everything here is a pure transform over bytes. Sockets live in
//! `sampctl_core`.

pub mod codepage;
pub mod datatypes;
pub mod favourites;
pub mod message;
pub mod packet;

/// Leading bytes of every envelope and of the favourites file.
pub const MAGIC: [u8; 4] = *b"SAMP";
