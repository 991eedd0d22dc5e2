use std::{
    io,
    net::{Ipv4Addr, SocketAddrV4},
    sync::Arc,
    time::Duration,
};

use bytes::Bytes;
use tokio::{
    net::UdpSocket,
    sync::{broadcast, Semaphore},
    task::JoinHandle,
    time::Instant,
};

use proto::{
    message::{Message, MessageError, RconCommand, RconReply, RCON_OPCODE},
    packet::{ip_to_number, Decoded, Envelope},
};

use crate::{config::RconOptions, MAX_DATAGRAM_SIZE};

/// Capacity of the event channel. Slow subscribers past it lose the oldest events.
const EVENT_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum RconError {
    /// [`RconClient::connect`] was not called, or the client was disconnected.
    #[error("not connected")]
    NotConnected,
    /// The socket could not be set up, or sending/receiving failed.
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    /// No reply before the deadline.
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    /// A command could not be encoded, or a reply could not be decoded.
    #[error("malformed message: {0}")]
    Malformed(#[from] MessageError),
}

/// Something that happened on an [`RconClient`] socket.
#[derive(Debug, Clone)]
pub enum RconEvent {
    /// The socket is connected to the server.
    Connect,
    /// A line of console output.
    Message(String),
    /// Inbound data could not be handled. The socket keeps running.
    Error(Arc<RconError>),
}

/// Remote console of a single server.
///
/// Replies carry no correlation id: whichever message comes next answers
/// a [`RconClient::call`]. Calls on one client are therefore run one at a
/// time, but output triggered by [`RconClient::send`] or by the server on its
/// own may still be taken as the reply of a pending call.
pub struct RconClient {
    options: RconOptions,
    events: broadcast::Sender<RconEvent>,
    /// Single-flight permit for calls.
    call_lock: Semaphore,
    connection: Option<Connection>,
}

/// A connected socket and the task reading from it.
struct Connection {
    udp_sock: Arc<UdpSocket>,
    recv_task: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.recv_task.abort();
    }
}

impl RconClient {
    pub fn new(options: RconOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            options,
            events,
            call_lock: Semaphore::new(1),
            connection: None,
        }
    }

    pub fn options(&self) -> &RconOptions {
        &self.options
    }

    pub fn addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.options.ip, self.options.port)
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns a new subscriber to this client's events.
    ///
    /// Only events emitted after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<RconEvent> {
        self.events.subscribe()
    }

    /// Connects the socket and starts receiving. Does nothing if already connected.
    pub async fn connect(&mut self) -> Result<(), RconError> {
        if self.connection.is_some() {
            return Ok(());
        }
        let addr = self.addr();
        let udp_sock = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        udp_sock.connect(addr).await?;
        let udp_sock = Arc::new(udp_sock);
        let recv_task = tokio::spawn(run_receiver(
            udp_sock.clone(),
            addr,
            self.events.clone(),
        ));
        self.connection = Some(Connection {
            udp_sock,
            recv_task,
        });
        log::debug!("RCON connected to {}", addr);
        let _ = self.events.send(RconEvent::Connect);
        Ok(())
    }

    /// Stops receiving and releases the socket.
    pub fn disconnect(&mut self) {
        if self.connection.take().is_some() {
            log::debug!("RCON disconnected from {}", self.addr());
        }
    }

    /// Sends a command without waiting for any reply.
    pub async fn send(&self, command: &str) -> Result<(), RconError> {
        let connection = self.connection.as_ref().ok_or(RconError::NotConnected)?;
        let payload = RconCommand {
            password: self.options.password.clone(),
            command: command.to_owned(),
        }
        .to_bytes()?;
        let packet = Envelope::new(self.options.ip, self.options.port, RCON_OPCODE, payload);
        log::trace!("Sending RCON command to {}: {}", self.addr(), command);
        connection.udp_sock.send(&packet.to_bytes()).await?;
        Ok(())
    }

    /// Sends a command and waits for the next message, up to the configured timeout.
    pub async fn call(&self, command: &str) -> Result<String, RconError> {
        self.call_with_timeout(command, self.options.timeout).await
    }

    /// Sends a command and waits for the next message, up to `timeout`.
    pub async fn call_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<String, RconError> {
        let _permit = self.call_lock.acquire().await;
        // subscribe before sending so a fast reply can't be missed
        let mut rx = self.events.subscribe();
        self.send(command).await?;
        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => return Err(RconError::Timeout(timeout)),
                Ok(Ok(RconEvent::Message(text))) => return Ok(text),
                Ok(Ok(_)) => {}
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    log::warn!("RCON call lagged behind, {} events skipped", skipped);
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    return Err(RconError::NotConnected)
                }
            }
        }
    }
}

/// Reads datagrams until the task is aborted, turning them into events.
async fn run_receiver(
    udp_sock: Arc<UdpSocket>,
    addr: SocketAddrV4,
    events: broadcast::Sender<RconEvent>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let event = match udp_sock.recv(&mut buf).await {
            Ok(len) => match parse_reply(Bytes::copy_from_slice(&buf[..len]), addr) {
                Ok(Some(text)) => RconEvent::Message(text),
                Ok(None) => {
                    log::trace!("Dropping {} bytes not meant for RCON {}", len, addr);
                    continue;
                }
                Err(err) => {
                    log::warn!("Malformed RCON reply from {}: {}", addr, err);
                    RconEvent::Error(Arc::new(err.into()))
                }
            },
            Err(err) => {
                log::debug!("RCON socket error from {}: {:?}", addr, err);
                RconEvent::Error(Arc::new(err.into()))
            }
        };
        // nobody listening is fine
        let _ = events.send(event);
    }
}

/// Extracts the console text of a datagram.
///
/// ## Returns
///
/// `None` when the datagram is foreign or its ip, port or opcode
/// don't match `addr`'s RCON channel.
fn parse_reply(data: Bytes, addr: SocketAddrV4) -> Result<Option<String>, MessageError> {
    let envelope = match Envelope::decode(data)? {
        Decoded::Envelope(envelope) => envelope,
        Decoded::NotMine => return Ok(None),
    };
    if envelope.ip != ip_to_number(*addr.ip())
        || envelope.port != addr.port()
        || envelope.opcode != RCON_OPCODE
    {
        return Ok(None);
    }
    let reply = RconReply::from_bytes(envelope.payload)?;
    Ok(Some(reply.text))
}
