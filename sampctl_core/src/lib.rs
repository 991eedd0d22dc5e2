//! Clients for SA-MP servers: the query protocol ([`QueryClient`]),
//! the remote console ([`RconClient`]), and the favourites list
//! ([`FavouriteList`]) kept by game clients.
//!
//! Wire formats live in the `sampctl_proto` crate, re-exported as [`proto`].

pub mod config;
mod favourites;
mod query;
mod rcon;
mod resolve;

pub use favourites::*;
pub use query::*;
pub use rcon::*;
pub use resolve::*;

pub use proto;
pub use proto::message::{
    Player, PlayerDetailed, QueryOpcode, RuleName, ServerInfo, ServerRule,
};

/// Receive buffer size, large enough for any UDP datagram.
pub(crate) const MAX_DATAGRAM_SIZE: usize = 65_536;
