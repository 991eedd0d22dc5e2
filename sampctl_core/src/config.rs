use std::{net::Ipv4Addr, time::Duration};

use serde::{Deserialize, Serialize};

/// Port SA-MP servers listen on unless told otherwise.
pub const DEFAULT_PORT: u16 = 7777;
/// How long a query waits for its reply.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_millis(2000);
/// How long an RCON call waits for its reply.
pub const DEFAULT_RCON_TIMEOUT: Duration = Duration::from_millis(5000);

/// Where and how to send queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    /// Server IP address. Takes precedence over `host`.
    #[serde(default)]
    pub ip: Option<Ipv4Addr>,
    /// Server host name, or a dotted quad. Falls back to loopback if neither is set.
    #[serde(default)]
    pub host: Option<String>,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Reply timeout, in milliseconds in config files.
    #[serde(
        default = "default_query_timeout",
        rename = "timeout_ms",
        with = "millis"
    )]
    pub timeout: Duration,
}

/// Target and credentials of a remote console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RconOptions {
    /// Server IP address.
    #[serde(default = "default_ip")]
    pub ip: Ipv4Addr,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Console password, sent in clear with every command.
    pub password: String,
    /// Default timeout of [`crate::RconClient::call`].
    #[serde(
        default = "default_rcon_timeout",
        rename = "timeout_ms",
        with = "millis"
    )]
    pub timeout: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            ip: None,
            host: None,
            port: DEFAULT_PORT,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

impl QueryOptions {
    pub fn with_ip(ip: Ipv4Addr, port: u16) -> Self {
        Self {
            ip: Some(ip),
            port,
            ..Self::default()
        }
    }

    pub fn with_host(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port,
            ..Self::default()
        }
    }
}

impl RconOptions {
    pub fn new(ip: Ipv4Addr, port: u16, password: impl Into<String>) -> Self {
        Self {
            ip,
            port,
            password: password.into(),
            timeout: DEFAULT_RCON_TIMEOUT,
        }
    }
}

fn default_ip() -> Ipv4Addr {
    Ipv4Addr::LOCALHOST
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_query_timeout() -> Duration {
    DEFAULT_QUERY_TIMEOUT
}

fn default_rcon_timeout() -> Duration {
    DEFAULT_RCON_TIMEOUT
}

/// Durations as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
