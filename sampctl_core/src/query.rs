use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4},
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::{net::UdpSocket, time::Instant};

use proto::{
    message::{Message, MessageError, Player, PlayerDetailed, QueryOpcode, ServerInfo, ServerRule},
    packet::{Decoded, Envelope, HEADER_LEN},
};

use crate::{
    config::QueryOptions,
    resolve::{HostResolver, SystemResolver},
    MAX_DATAGRAM_SIZE,
};

/// Servers reporting at least this many players are not asked
/// for their player list by [`QueryClient::server`].
pub const LARGE_SERVER_PLAYERS: u16 = 100;

#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The host name has no IPv4 address.
    #[error("cannot resolve ip of {0}")]
    Resolution(String),
    /// The socket could not be set up, or sending/receiving failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// No reply before the deadline.
    #[error("server {0} unavailable")]
    Timeout(SocketAddrV4),
    /// The reply is too short or its payload is malformed.
    #[error("{addr} sent invalid message: {reason}")]
    InvalidMessage { addr: SocketAddrV4, reason: String },
}

/// A decoded reply, tagged by the kind of query that was sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum QueryReply {
    Info(ServerInfo),
    Rules(Vec<ServerRule>),
    Players(Vec<Player>),
    PlayersDetailed(Vec<PlayerDetailed>),
}

/// Everything [`QueryClient::server`] gathers about a server.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub info: ServerInfo,
    pub rules: Vec<ServerRule>,
    /// Empty when the server has [`LARGE_SERVER_PLAYERS`] or more players.
    pub players: Vec<Player>,
}

/// Client of the query protocol.
///
/// Every request uses its own UDP socket, so concurrent requests
/// never see each other's replies or failures.
#[derive(Clone)]
pub struct QueryClient {
    options: QueryOptions,
    resolver: Arc<dyn HostResolver>,
}

impl QueryClient {
    pub fn new(options: QueryOptions) -> Self {
        Self::with_resolver(options, Arc::new(SystemResolver))
    }

    pub fn with_resolver(options: QueryOptions, resolver: Arc<dyn HostResolver>) -> Self {
        Self { options, resolver }
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Works out the IP address to query.
    ///
    /// `ip` wins over `host`; a `host` that already is a dotted quad skips
    /// the resolver; with neither, loopback is queried.
    pub async fn resolve(&self) -> Result<Ipv4Addr, QueryError> {
        if let Some(ip) = self.options.ip {
            return Ok(ip);
        }
        let host = match self.options.host.as_deref() {
            Some(host) => host,
            None => return Ok(Ipv4Addr::LOCALHOST),
        };
        if let Ok(ip) = host.parse::<Ipv4Addr>() {
            return Ok(ip);
        }
        self.resolver
            .resolve_v4(host)
            .await
            .ok_or_else(|| QueryError::Resolution(host.to_owned()))
    }

    /// Sends one query and decodes the reply according to `opcode`.
    pub async fn request(&self, opcode: QueryOpcode) -> Result<QueryReply, QueryError> {
        let reply = match opcode {
            QueryOpcode::Info => QueryReply::Info(self.request_as(opcode).await?),
            QueryOpcode::Rules => QueryReply::Rules(self.request_as(opcode).await?),
            QueryOpcode::Players => QueryReply::Players(self.request_as(opcode).await?),
            QueryOpcode::PlayersDetailed => {
                QueryReply::PlayersDetailed(self.request_as(opcode).await?)
            }
        };
        Ok(reply)
    }

    pub async fn server_info(&self) -> Result<ServerInfo, QueryError> {
        self.request_as(QueryOpcode::Info).await
    }

    pub async fn server_rules(&self) -> Result<Vec<ServerRule>, QueryError> {
        self.request_as(QueryOpcode::Rules).await
    }

    pub async fn server_players(&self) -> Result<Vec<Player>, QueryError> {
        self.request_as(QueryOpcode::Players).await
    }

    pub async fn server_players_detailed(&self) -> Result<Vec<PlayerDetailed>, QueryError> {
        self.request_as(QueryOpcode::PlayersDetailed).await
    }

    /// Fetches info and rules concurrently, then the player list
    /// unless the server is too crowded for it.
    pub async fn server(&self) -> Result<ServerSnapshot, QueryError> {
        let (info, rules) =
            futures::future::try_join(self.server_info(), self.server_rules()).await?;
        let players = if info.players >= LARGE_SERVER_PLAYERS {
            log::debug!(
                "Skipping player list of {} ({} players)",
                info.server_name,
                info.players
            );
            Vec::new()
        } else {
            self.server_players().await?
        };
        Ok(ServerSnapshot {
            info,
            rules,
            players,
        })
    }

    /// Measures the round trip of an info query.
    pub async fn ping(&self) -> Result<Duration, QueryError> {
        let start = Instant::now();
        self.server_info().await?;
        Ok(start.elapsed())
    }

    async fn request_as<M: Message>(&self, opcode: QueryOpcode) -> Result<M, QueryError> {
        let (addr, payload) = self.exchange(opcode).await?;
        M::from_bytes(payload).map_err(|err: MessageError| QueryError::InvalidMessage {
            addr,
            reason: err.to_string(),
        })
    }

    /// Sends the query and waits for the reply envelope.
    ///
    /// ## Returns
    ///
    /// The server address and the reply payload. The payload is not checked
    /// against `opcode`, replies don't carry anything worth checking.
    async fn exchange(&self, opcode: QueryOpcode) -> Result<(SocketAddrV4, Bytes), QueryError> {
        let ip = self.resolve().await?;
        let addr = SocketAddrV4::new(ip, self.options.port);

        let udp_sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        udp_sock.connect(addr).await?;
        let packet = Envelope::new(ip, addr.port(), opcode.to_i8(), Bytes::new()).to_bytes();
        log::trace!("Sending {:?} query to {}", opcode, addr);
        udp_sock.send(&packet).await?;

        let deadline = Instant::now() + self.options.timeout;
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        loop {
            let len = match tokio::time::timeout_at(deadline, udp_sock.recv(&mut buf)).await {
                Ok(Ok(len)) => len,
                // ICMP port unreachable surfaces here on a connected socket;
                // a closed port is a silent server, not a transport failure
                Ok(Err(err)) if err.kind() == io::ErrorKind::ConnectionRefused => {
                    log::trace!("{} refused {:?} query, still waiting", addr, opcode);
                    continue;
                }
                Ok(Err(err)) => return Err(err.into()),
                Err(_) => return Err(QueryError::Timeout(addr)),
            };
            if len < HEADER_LEN {
                return Err(QueryError::InvalidMessage {
                    addr,
                    reason: format!("{} bytes is shorter than a header", len),
                });
            }
            match Envelope::decode(Bytes::copy_from_slice(&buf[..len])) {
                Ok(Decoded::Envelope(envelope)) => {
                    log::trace!(
                        "Received {} bytes reply to {:?} query from {}",
                        len,
                        opcode,
                        addr
                    );
                    return Ok((addr, envelope.payload));
                }
                Ok(Decoded::NotMine) => {
                    log::trace!("Ignoring foreign datagram from {}", addr);
                }
                Err(err) => {
                    return Err(QueryError::InvalidMessage {
                        addr,
                        reason: err.to_string(),
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use proto::message::RuleName;

    use super::*;

    /// Answers queries on a local socket. `reply` gets the opcode and returns
    /// the datagrams to send back, in order.
    async fn spawn_responder<F>(reply: F) -> u16
    where
        F: Fn(i8) -> Vec<Vec<u8>> + Send + 'static,
    {
        let udp_sock = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = udp_sock.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            loop {
                let (len, from) = udp_sock.recv_from(&mut buf).await.unwrap();
                let data = Bytes::copy_from_slice(&buf[..len]);
                let Ok(Decoded::Envelope(request)) = Envelope::decode(data) else {
                    continue;
                };
                for datagram in reply(request.opcode) {
                    udp_sock.send_to(&datagram, from).await.unwrap();
                }
            }
        });
        port
    }

    fn envelope(port: u16, opcode: i8, payload: Bytes) -> Vec<u8> {
        Envelope::new(Ipv4Addr::LOCALHOST, port, opcode, payload)
            .to_bytes()
            .to_vec()
    }

    fn info(players: u16) -> ServerInfo {
        ServerInfo {
            closed: false,
            players,
            max_players: 500,
            server_name: "Test".to_owned(),
            game_mode_name: "Freeroam".to_owned(),
            language: "EN".to_owned(),
        }
    }

    fn rules() -> Vec<ServerRule> {
        vec![ServerRule {
            name: RuleName::Version,
            value: "0.3.7".to_owned(),
        }]
    }

    fn players() -> Vec<Player> {
        vec![Player {
            name: "Bob".to_owned(),
            score: 3,
        }]
    }

    /// A server reporting `player_count` players. Returns its port and
    /// a counter of player list queries.
    async fn fake_server(player_count: u16) -> (u16, Arc<AtomicUsize>) {
        let player_queries = Arc::new(AtomicUsize::new(0));
        let counter = player_queries.clone();
        let port = spawn_responder(move |opcode| {
            let payload = match QueryOpcode::from_i8(opcode) {
                Some(QueryOpcode::Info) => info(player_count).to_bytes(),
                Some(QueryOpcode::Rules) => rules().to_bytes(),
                Some(QueryOpcode::Players) => {
                    counter.fetch_add(1, Ordering::SeqCst);
                    players().to_bytes()
                }
                _ => return Vec::new(),
            };
            vec![envelope(7777, opcode, payload.unwrap())]
        })
        .await;
        (port, player_queries)
    }

    fn client(port: u16) -> QueryClient {
        QueryClient::new(QueryOptions {
            timeout: Duration::from_millis(500),
            ..QueryOptions::with_ip(Ipv4Addr::LOCALHOST, port)
        })
    }

    struct NoResolver;

    #[async_trait::async_trait]
    impl HostResolver for NoResolver {
        async fn resolve_v4(&self, _host: &str) -> Option<Ipv4Addr> {
            None
        }
    }

    struct PanicResolver;

    #[async_trait::async_trait]
    impl HostResolver for PanicResolver {
        async fn resolve_v4(&self, host: &str) -> Option<Ipv4Addr> {
            panic!("{} should not need resolving", host)
        }
    }

    #[tokio::test]
    async fn info_from_literal_payload() {
        let payload: &'static [u8] = &[
            0x00, 0x02, 0x00, 0x14, 0x00, //
            0x05, 0, 0, 0, b'H', b'e', b'l', b'l', b'o', //
            0x04, 0, 0, 0, b'M', b'o', b'd', b'e', //
            0x02, 0, 0, 0, b'E', b'N',
        ];
        let port = spawn_responder(move |opcode| {
            vec![envelope(7777, opcode, Bytes::from_static(payload))]
        })
        .await;
        let info = client(port).server_info().await.unwrap();
        assert_eq!(
            info,
            ServerInfo {
                closed: false,
                players: 2,
                max_players: 20,
                server_name: "Hello".to_owned(),
                game_mode_name: "Mode".to_owned(),
                language: "EN".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn request_is_tagged_by_opcode() {
        let (port, _) = fake_server(1).await;
        let reply = client(port).request(QueryOpcode::Rules).await.unwrap();
        assert_eq!(reply, QueryReply::Rules(rules()));
    }

    #[tokio::test]
    async fn server_includes_players() {
        let (port, player_queries) = fake_server(99).await;
        let snapshot = client(port).server().await.unwrap();
        assert_eq!(snapshot.info.players, 99);
        assert_eq!(snapshot.rules, rules());
        assert_eq!(snapshot.players, players());
        assert_eq!(player_queries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn server_omits_players_of_large_servers() {
        let (port, player_queries) = fake_server(100).await;
        let snapshot = client(port).server().await.unwrap();
        assert_eq!(snapshot.info.players, 100);
        assert!(snapshot.players.is_empty());
        assert_eq!(player_queries.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        // bound but never answering
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let client = QueryClient::new(QueryOptions {
            timeout: Duration::from_millis(150),
            ..QueryOptions::with_ip(Ipv4Addr::LOCALHOST, port)
        });
        let start = Instant::now();
        let res = client.server_info().await;
        assert!(matches!(res, Err(QueryError::Timeout(addr)) if addr.port() == port));
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn closed_port_times_out() {
        let closed = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = closed.local_addr().unwrap().port();
        drop(closed);
        let client = QueryClient::new(QueryOptions {
            timeout: Duration::from_millis(300),
            ..QueryOptions::with_ip(Ipv4Addr::LOCALHOST, port)
        });
        let start = Instant::now();
        let res = client.server_info().await;
        assert!(matches!(res, Err(QueryError::Timeout(addr)) if addr.port() == port));
        assert!(start.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn foreign_datagrams_are_skipped() {
        let port = spawn_responder(|opcode| {
            vec![
                b"RAKNET-NOISE".to_vec(),
                envelope(7777, opcode, info(5).to_bytes().unwrap()),
            ]
        })
        .await;
        let info = client(port).server_info().await.unwrap();
        assert_eq!(info.players, 5);
    }

    #[tokio::test]
    async fn only_foreign_datagrams_time_out() {
        let port = spawn_responder(|_| vec![b"RAKNET-NOISE".to_vec()]).await;
        let res = client(port).server_info().await;
        assert!(matches!(res, Err(QueryError::Timeout(_))));
    }

    #[tokio::test]
    async fn short_reply_is_invalid() {
        let port = spawn_responder(|_| vec![b"SAMP".to_vec()]).await;
        let res = client(port).server_info().await;
        assert!(matches!(res, Err(QueryError::InvalidMessage { .. })));
    }

    #[tokio::test]
    async fn truncated_payload_is_invalid() {
        let port = spawn_responder(|opcode| {
            let payload = info(3).to_bytes().unwrap();
            vec![envelope(7777, opcode, payload.slice(..7))]
        })
        .await;
        let res = client(port).server_info().await;
        assert!(matches!(res, Err(QueryError::InvalidMessage { .. })));
    }

    #[tokio::test]
    async fn ping_measures_round_trip() {
        let (port, _) = fake_server(0).await;
        let elapsed = client(port).ping().await.unwrap();
        assert!(elapsed < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn unresolvable_host() {
        let client =
            QueryClient::with_resolver(QueryOptions::with_host("nowhere", 7777), Arc::new(NoResolver));
        let res = client.resolve().await;
        assert!(matches!(res, Err(QueryError::Resolution(host)) if host == "nowhere"));
    }

    #[tokio::test]
    async fn target_precedence() {
        let resolver: Arc<dyn HostResolver> = Arc::new(PanicResolver);

        let options = QueryOptions::default();
        let client = QueryClient::with_resolver(options, resolver.clone());
        assert_eq!(client.resolve().await.unwrap(), Ipv4Addr::LOCALHOST);

        let options = QueryOptions::with_host("192.168.0.7", 7777);
        let client = QueryClient::with_resolver(options, resolver.clone());
        assert_eq!(client.resolve().await.unwrap(), Ipv4Addr::new(192, 168, 0, 7));

        let options = QueryOptions {
            ip: Some(Ipv4Addr::new(10, 0, 0, 1)),
            host: Some("ignored.example".to_owned()),
            ..QueryOptions::default()
        };
        let client = QueryClient::with_resolver(options, resolver);
        assert_eq!(client.resolve().await.unwrap(), Ipv4Addr::new(10, 0, 0, 1));
    }
}
