//! Stream multiplexer
//!
//! Carries many independent bidirectional streams over one byte connection.
//! Every frame starts with a fixed header:
//!
//! ```text
//! ┌─────────┬──────┬──────────────┬────────────┬─────────────┐
//! │ version │ kind │ stream id    │ length     │ payload     │
//! │ u8      │ u8   │ u32 BE       │ u32 BE     │ length bytes│
//! └─────────┴──────┴──────────────┴────────────┴─────────────┘
//! ```
//!
//! Clients open odd stream ids and servers even ones, so either side can open
//! streams without coordination. `Close` ends one direction of a stream,
//! `Reset` aborts both, `GoAway` ends the session.
//!
//! Each side pings the other on an interval and drops the session when the
//! peer stays silent too long. Every stream buffers a bounded number of
//! frames; a peer that overruns that window gets the stream reset.

use crate::transport::error::{TransportError, TransportResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

pub const PROTOCOL_VERSION: u8 = 0;

/// Frame header size in bytes
pub const HEADER_LEN: usize = 10;

/// Largest payload carried by one frame; longer writes are split
pub const MAX_PAYLOAD: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    Open = 0,
    Data = 1,
    Close = 2,
    Reset = 3,
    GoAway = 4,
    Ping = 5,
    Pong = 6,
}

impl TryFrom<u8> for FrameKind {
    type Error = TransportError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FrameKind::Open),
            1 => Ok(FrameKind::Data),
            2 => Ok(FrameKind::Close),
            3 => Ok(FrameKind::Reset),
            4 => Ok(FrameKind::GoAway),
            5 => Ok(FrameKind::Ping),
            6 => Ok(FrameKind::Pong),
            other => Err(TransportError::Protocol(format!(
                "unknown frame kind {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Frame {
    kind: FrameKind,
    stream_id: u32,
    payload: Vec<u8>,
}

impl Frame {
    fn control(kind: FrameKind, stream_id: u32) -> Self {
        Self {
            kind,
            stream_id,
            payload: Vec::new(),
        }
    }

    fn data(stream_id: u32, payload: Vec<u8>) -> Self {
        Self {
            kind: FrameKind::Data,
            stream_id,
            payload,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.push(PROTOCOL_VERSION);
        buf.push(self.kind as u8);
        buf.extend_from_slice(&self.stream_id.to_be_bytes());
        buf.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }
}

/// Read one frame; `None` on a clean end of stream
async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> TransportResult<Option<Frame>> {
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;
    while filled < HEADER_LEN {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(TransportError::Protocol(format!(
                "connection ended {} bytes into a frame header",
                filled
            )));
        }
        filled += n;
    }

    if header[0] != PROTOCOL_VERSION {
        return Err(TransportError::Protocol(format!(
            "unsupported version {}",
            header[0]
        )));
    }

    let kind = FrameKind::try_from(header[1])?;
    let stream_id = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);
    let len = u32::from_be_bytes([header[6], header[7], header[8], header[9]]) as usize;

    if len > MAX_PAYLOAD {
        return Err(TransportError::Protocol(format!(
            "frame payload of {} bytes exceeds {}",
            len, MAX_PAYLOAD
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    Ok(Some(Frame {
        kind,
        stream_id,
        payload,
    }))
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> TransportResult<()> {
    writer.write_all(&frame.to_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Which end of the connection this session is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    fn first_stream_id(self) -> u32 {
        match self {
            Role::Client => 1,
            Role::Server => 2,
        }
    }

    /// Whether `id` belongs to the range this side opens
    fn opens(self, id: u32) -> bool {
        (id % 2 == 1) == (self == Role::Client)
    }
}

/// Liveness and buffering limits for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Ping the peer this often; `None` disables keepalive
    pub keepalive_interval: Option<Duration>,
    /// Extra silence tolerated after a keepalive interval. Also bounds a
    /// single socket write.
    pub connection_timeout: Duration,
    /// Frames buffered per stream before the stream is reset
    pub stream_window: usize,
    /// Frames queued for the socket before the session is given up
    pub send_queue: usize,
    /// Peer-opened streams allowed at once; further opens are reset
    pub max_streams: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keepalive_interval: Some(Duration::from_secs(30)),
            connection_timeout: Duration::from_secs(10),
            stream_window: 64,
            send_queue: 1024,
            max_streams: 256,
        }
    }
}

#[derive(Debug)]
enum StreamEvent {
    Data(Vec<u8>),
    Closed,
    Reset,
}

type StreamTable = HashMap<u32, mpsc::Sender<StreamEvent>>;

/// State shared by the session, its streams and its IO tasks
struct Shared {
    id: Uuid,
    role: Role,
    config: SessionConfig,
    streams: Mutex<StreamTable>,
    outbound: mpsc::Sender<Frame>,
    next_stream_id: AtomicU32,
    last_seen: Mutex<Instant>,
    closed: watch::Sender<bool>,
}

impl Shared {
    fn streams(&self) -> MutexGuard<'_, StreamTable> {
        self.streams.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn touch(&self) {
        *self.last_seen.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Instant::now();
    }

    fn silent_for(&self) -> Duration {
        self.last_seen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .elapsed()
    }

    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn send(&self, frame: Frame) -> TransportResult<()> {
        if self.is_closed() {
            return Err(TransportError::SessionClosed);
        }
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    session_id = %self.id,
                    queued = self.config.send_queue,
                    "Peer is not draining the connection"
                );
                self.shut_down();
                Err(TransportError::SessionClosed)
            }
            Err(TrySendError::Closed(_)) => Err(TransportError::SessionClosed),
        }
    }

    fn register(&self, id: u32) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(self.config.stream_window.max(1));
        self.streams().insert(id, tx);
        rx
    }

    fn deliver(&self, id: u32, event: StreamEvent) {
        let peer_reset = matches!(event, StreamEvent::Reset);
        let finished = peer_reset || matches!(event, StreamEvent::Closed);

        let overflowed = {
            let mut streams = self.streams();
            let Some(tx) = streams.get(&id) else {
                return;
            };
            let overflowed = matches!(tx.try_send(event), Err(TrySendError::Full(_)));
            // Dropping the sender ends the inbox after its buffered frames
            if finished || overflowed {
                streams.remove(&id);
            }
            overflowed
        };

        if overflowed && !peer_reset {
            tracing::warn!(
                session_id = %self.id,
                stream_id = id,
                window = self.config.stream_window,
                "Stream window exceeded, resetting"
            );
            let _ = self.send(Frame::control(FrameKind::Reset, id));
        }
    }

    fn shut_down(&self) {
        if self.closed.send_replace(true) {
            return;
        }
        for (_, tx) in self.streams().drain() {
            let _ = tx.try_send(StreamEvent::Reset);
        }
        tracing::debug!(session_id = %self.id, "Session closed");
    }
}

/// One multiplexed connection
pub struct Session {
    shared: Arc<Shared>,
    incoming: mpsc::UnboundedReceiver<Stream>,
    reader: JoinHandle<()>,
}

impl Session {
    /// Take over `io` with the default [`SessionConfig`]
    pub fn new<T>(io: T, role: Role) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        Self::with_config(io, role, SessionConfig::default())
    }

    /// Take over `io` and start the session's reader, writer and keepalive
    /// tasks
    pub fn with_config<T>(io: T, role: Role, config: SessionConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(io);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.send_queue.max(1));
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (closed, closed_rx) = watch::channel(false);
        let keepalive_interval = config.keepalive_interval;

        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            role,
            config,
            streams: Mutex::new(HashMap::new()),
            outbound: outbound_tx,
            next_stream_id: AtomicU32::new(role.first_stream_id()),
            last_seen: Mutex::new(Instant::now()),
            closed,
        });

        let reader = tokio::spawn(read_loop(read_half, Arc::clone(&shared), incoming_tx));
        tokio::spawn(write_loop(
            write_half,
            outbound_rx,
            closed_rx,
            Arc::clone(&shared),
        ));
        if let Some(every) = keepalive_interval.filter(|d| !d.is_zero()) {
            tokio::spawn(keepalive(Arc::clone(&shared), every));
        }

        tracing::debug!(session_id = %shared.id, ?role, "Session started");

        Self {
            shared,
            incoming: incoming_rx,
            reader,
        }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    /// Open a new outbound stream
    pub fn open_stream(&self) -> TransportResult<Stream> {
        let id = self
            .shared
            .next_stream_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(2))
            .map_err(|_| TransportError::Protocol("stream ids exhausted".to_string()))?;

        let inbound = self.shared.register(id);
        if let Err(e) = self.shared.send(Frame::control(FrameKind::Open, id)) {
            self.shared.streams().remove(&id);
            return Err(e);
        }

        Ok(Stream::new(id, Arc::clone(&self.shared), inbound))
    }

    /// Next stream opened by the peer; `None` once the session is over
    pub async fn accept(&mut self) -> Option<Stream> {
        self.incoming.recv().await
    }

    /// Ask the peer to end the session
    pub fn close(&self) {
        let _ = self.shared.send(Frame::control(FrameKind::GoAway, 0));
    }

    /// Resolves once the session has ended
    pub async fn closed(&self) {
        until_closed(&mut self.shared.closed.subscribe()).await;
    }
}

async fn until_closed(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.shut_down();
        self.reader.abort();
    }
}

async fn read_loop<R>(mut reader: R, shared: Arc<Shared>, incoming: mpsc::UnboundedSender<Stream>)
where
    R: AsyncRead + Unpin,
{
    let mut closed = shared.closed.subscribe();

    loop {
        let read = tokio::select! {
            read = read_frame(&mut reader) => read,
            _ = until_closed(&mut closed) => break,
        };

        let frame = match read {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(session_id = %shared.id, "Peer closed connection");
                break;
            }
            Err(e) => {
                tracing::warn!(session_id = %shared.id, error = %e, "Session read failed");
                break;
            }
        };

        shared.touch();
        let id = frame.stream_id;
        match frame.kind {
            FrameKind::Open => {
                if id == 0 || shared.role.opens(id) {
                    tracing::warn!(
                        session_id = %shared.id,
                        stream_id = id,
                        "Peer opened a stream with an id from our range"
                    );
                    let _ = shared.send(Frame::control(FrameKind::GoAway, 0));
                    break;
                }
                let (known, open) = {
                    let streams = shared.streams();
                    (streams.contains_key(&id), streams.len())
                };
                if known {
                    let _ = shared.send(Frame::control(FrameKind::Reset, id));
                    continue;
                }
                if open >= shared.config.max_streams {
                    tracing::debug!(
                        session_id = %shared.id,
                        stream_id = id,
                        open,
                        "Too many open streams, refusing"
                    );
                    let _ = shared.send(Frame::control(FrameKind::Reset, id));
                    continue;
                }

                let inbound = shared.register(id);
                let stream = Stream::new(id, Arc::clone(&shared), inbound);
                // An unaccepted stream is dropped here and resets itself
                let _ = incoming.send(stream);
            }
            FrameKind::Data => shared.deliver(id, StreamEvent::Data(frame.payload)),
            FrameKind::Close => shared.deliver(id, StreamEvent::Closed),
            FrameKind::Reset => shared.deliver(id, StreamEvent::Reset),
            FrameKind::Ping => {
                let _ = shared.send(Frame::control(FrameKind::Pong, id));
            }
            FrameKind::Pong => {}
            FrameKind::GoAway => {
                tracing::debug!(session_id = %shared.id, "Peer sent go-away");
                break;
            }
        }
    }

    shared.shut_down();
}

/// Ping on every tick; give up once the peer has been silent for a whole
/// interval plus the connection timeout
async fn keepalive(shared: Arc<Shared>, every: Duration) {
    let mut closed = shared.closed.subscribe();
    let mut ticks = tokio::time::interval_at(Instant::now() + every, every);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let limit = every + shared.config.connection_timeout;

    loop {
        tokio::select! {
            _ = ticks.tick() => {}
            _ = until_closed(&mut closed) => return,
        }

        let silent = shared.silent_for();
        if silent > limit {
            tracing::warn!(
                session_id = %shared.id,
                silent_ms = silent.as_millis() as u64,
                "Peer stopped answering keepalives"
            );
            shared.shut_down();
            return;
        }
        if shared.send(Frame::control(FrameKind::Ping, 0)).is_err() {
            return;
        }
    }
}

async fn write_loop<W>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Frame>,
    mut closed: watch::Receiver<bool>,
    shared: Arc<Shared>,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
            _ = until_closed(&mut closed) => break,
        };

        let going_away = frame.kind == FrameKind::GoAway;
        let timeout = shared.config.connection_timeout;
        match tokio::time::timeout(timeout, write_frame(&mut writer, &frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(session_id = %shared.id, error = %e, "Session write failed");
                break;
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %shared.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Session write timed out"
                );
                break;
            }
        }
        if going_away {
            break;
        }
    }

    let _ = writer.shutdown().await;
    shared.shut_down();
}

/// One logical bidirectional stream inside a [`Session`]
///
/// Dropping a stream that was not closed resets it.
pub struct Stream {
    id: u32,
    shared: Arc<Shared>,
    inbound: mpsc::Receiver<StreamEvent>,
    remote_closed: bool,
    local_closed: bool,
    reset: bool,
}

impl Stream {
    fn new(id: u32, shared: Arc<Shared>, inbound: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            id,
            shared,
            inbound,
            remote_closed: false,
            local_closed: false,
            reset: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn session_id(&self) -> Uuid {
        self.shared.id
    }

    /// Queue `data` for the peer
    pub fn write_all(&mut self, data: &[u8]) -> TransportResult<()> {
        if self.reset {
            return Err(TransportError::StreamReset(self.id));
        }
        if self.local_closed {
            return Err(TransportError::StreamClosed(self.id));
        }

        for chunk in data.chunks(MAX_PAYLOAD) {
            self.shared.send(Frame::data(self.id, chunk.to_vec()))?;
        }
        Ok(())
    }

    /// Next chunk of data; `None` once the peer has closed its side
    pub async fn read_chunk(&mut self) -> TransportResult<Option<Vec<u8>>> {
        if self.reset {
            return Err(TransportError::StreamReset(self.id));
        }
        if self.remote_closed {
            return Ok(None);
        }

        match self.inbound.recv().await {
            Some(StreamEvent::Data(bytes)) => Ok(Some(bytes)),
            Some(StreamEvent::Closed) => {
                self.remote_closed = true;
                Ok(None)
            }
            Some(StreamEvent::Reset) | None => {
                self.reset = true;
                Err(TransportError::StreamReset(self.id))
            }
        }
    }

    /// Finish writing. The peer reads end-of-stream after any queued data.
    pub fn close(&mut self) -> TransportResult<()> {
        if self.local_closed || self.reset {
            return Ok(());
        }
        self.local_closed = true;
        self.shared.send(Frame::control(FrameKind::Close, self.id))
    }

    /// Resolves once the peer closes or resets the stream, or the session
    /// ends. Data arriving meanwhile is discarded.
    pub async fn peer_gone(&mut self) {
        if self.remote_closed || self.reset {
            return;
        }

        loop {
            match self.inbound.recv().await {
                Some(StreamEvent::Data(_)) => continue,
                Some(StreamEvent::Closed) => {
                    self.remote_closed = true;
                    return;
                }
                Some(StreamEvent::Reset) | None => {
                    self.reset = true;
                    return;
                }
            }
        }
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.shared.streams().remove(&self.id);
        if !self.local_closed && !self.reset {
            let _ = self.shared.send(Frame::control(FrameKind::Reset, self.id));
        }
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.id)
            .field("session_id", &self.shared.id)
            .field("remote_closed", &self.remote_closed)
            .field("local_closed", &self.local_closed)
            .field("reset", &self.reset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Session, Session) {
        pair_with(SessionConfig::default(), SessionConfig::default())
    }

    fn pair_with(client: SessionConfig, server: SessionConfig) -> (Session, Session) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (
            Session::with_config(a, Role::Client, client),
            Session::with_config(b, Role::Server, server),
        )
    }

    fn fast_keepalive() -> SessionConfig {
        SessionConfig {
            keepalive_interval: Some(Duration::from_millis(50)),
            connection_timeout: Duration::from_millis(50),
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_frame_header_layout() {
        let frame = Frame::data(7, b"abc".to_vec());
        let bytes = frame.to_bytes();
        assert_eq!(bytes.len(), HEADER_LEN + 3);
        assert_eq!(&bytes[..HEADER_LEN], &[0, 1, 0, 0, 0, 7, 0, 0, 0, 3]);

        let mut reader = bytes.as_slice();
        assert_eq!(read_frame(&mut reader).await.unwrap(), Some(frame));
        assert_eq!(read_frame(&mut reader).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_unknown_kind_and_version() {
        let mut bad_kind: &[u8] = &[0, 9, 0, 0, 0, 1, 0, 0, 0, 0];
        assert!(matches!(
            read_frame(&mut bad_kind).await,
            Err(TransportError::Protocol(_))
        ));

        let mut bad_version: &[u8] = &[3, 1, 0, 0, 0, 1, 0, 0, 0, 0];
        assert!(matches!(
            read_frame(&mut bad_version).await,
            Err(TransportError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_truncated_header_is_an_error() {
        let mut truncated: &[u8] = &[0, 1, 0, 0];
        assert!(matches!(
            read_frame(&mut truncated).await,
            Err(TransportError::Protocol(_))
        ));

        let mut empty: &[u8] = &[];
        assert_eq!(read_frame(&mut empty).await.unwrap(), None);
    }

    #[test]
    fn test_stream_id_parity() {
        assert!(Role::Client.opens(1));
        assert!(!Role::Client.opens(2));
        assert!(Role::Server.opens(4));
        assert!(!Role::Server.opens(5));
    }

    #[tokio::test]
    async fn test_open_accept_exchange() {
        let (client, mut server) = pair();

        let mut outbound = client.open_stream().unwrap();
        assert_eq!(outbound.id(), 1);
        outbound.write_all(b"ping").unwrap();

        let mut inbound = server.accept().await.unwrap();
        assert_eq!(inbound.id(), 1);
        assert_eq!(inbound.read_chunk().await.unwrap(), Some(b"ping".to_vec()));

        inbound.write_all(b"pong").unwrap();
        inbound.close().unwrap();

        assert_eq!(outbound.read_chunk().await.unwrap(), Some(b"pong".to_vec()));
        assert_eq!(outbound.read_chunk().await.unwrap(), None);
        assert!(matches!(
            inbound.write_all(b"late"),
            Err(TransportError::StreamClosed(1))
        ));
    }

    #[tokio::test]
    async fn test_streams_are_independent() {
        let (client, mut server) = pair();

        let mut first = client.open_stream().unwrap();
        let mut second = client.open_stream().unwrap();
        assert_eq!(second.id(), 3);
        second.write_all(b"two").unwrap();
        first.write_all(b"one").unwrap();

        let mut a = server.accept().await.unwrap();
        let mut b = server.accept().await.unwrap();
        assert_eq!(a.read_chunk().await.unwrap(), Some(b"one".to_vec()));
        assert_eq!(b.read_chunk().await.unwrap(), Some(b"two".to_vec()));
    }

    #[tokio::test]
    async fn test_server_can_open_streams() {
        let (mut client, server) = pair();

        let mut pushed = server.open_stream().unwrap();
        assert_eq!(pushed.id(), 2);
        pushed.write_all(b"hello").unwrap();

        let mut received = client.accept().await.unwrap();
        assert_eq!(received.read_chunk().await.unwrap(), Some(b"hello".to_vec()));
    }

    #[tokio::test]
    async fn test_dropped_stream_resets_peer() {
        let (client, mut server) = pair();

        let outbound = client.open_stream().unwrap();
        let mut inbound = server.accept().await.unwrap();
        drop(outbound);

        inbound.peer_gone().await;
        assert!(matches!(
            inbound.read_chunk().await,
            Err(TransportError::StreamReset(1))
        ));
    }

    #[tokio::test]
    async fn test_large_write_is_split() {
        let (client, mut server) = pair();
        let payload = vec![7u8; MAX_PAYLOAD + 10];

        let mut outbound = client.open_stream().unwrap();
        outbound.write_all(&payload).unwrap();
        outbound.close().unwrap();

        let mut inbound = server.accept().await.unwrap();
        let mut received = Vec::new();
        while let Some(chunk) = inbound.read_chunk().await.unwrap() {
            received.extend(chunk);
        }
        assert_eq!(received, payload);
    }

    #[tokio::test]
    async fn test_dropping_session_ends_peer() {
        let (client, mut server) = pair();
        let mut outbound = client.open_stream().unwrap();
        let mut inbound = server.accept().await.unwrap();

        drop(client);

        assert!(server.accept().await.is_none());
        server.closed().await;
        assert!(server.is_closed());
        inbound.peer_gone().await;
        assert!(outbound.write_all(b"x").is_err());
    }

    #[tokio::test]
    async fn test_go_away_closes_both_sides() {
        let (client, mut server) = pair();
        client.close();

        assert!(server.accept().await.is_none());
        client.closed().await;
        assert!(client.open_stream().is_err());
    }

    #[tokio::test]
    async fn test_wrong_parity_open_ends_session() {
        let (mut raw, io) = tokio::io::duplex(1024);
        let mut server = Session::new(io, Role::Server);

        // Client role must use odd ids
        write_frame(&mut raw, &Frame::control(FrameKind::Open, 2))
            .await
            .unwrap();

        assert!(server.accept().await.is_none());
        assert!(server.is_closed());
    }

    #[tokio::test]
    async fn test_stream_ids_never_wrap() {
        let (client, _server) = pair();
        client
            .shared
            .next_stream_id
            .store(u32::MAX - 2, Ordering::Relaxed);

        assert_eq!(client.open_stream().unwrap().id(), u32::MAX - 2);
        assert!(matches!(
            client.open_stream(),
            Err(TransportError::Protocol(_))
        ));
        assert!(matches!(
            client.open_stream(),
            Err(TransportError::Protocol(_))
        ));
        assert_eq!(
            client.shared.next_stream_id.load(Ordering::Relaxed),
            u32::MAX
        );
    }

    #[tokio::test]
    async fn test_silent_peer_is_dropped() {
        // Held open but never read or written
        let (_raw, io) = tokio::io::duplex(64 * 1024);
        let mut server = Session::with_config(io, Role::Server, fast_keepalive());

        let accepted = tokio::time::timeout(Duration::from_secs(5), server.accept())
            .await
            .expect("keepalive should end the session");
        assert!(accepted.is_none());
        assert!(server.is_closed());
    }

    #[tokio::test]
    async fn test_keepalive_holds_responsive_session() {
        let (client, mut server) = pair_with(fast_keepalive(), fast_keepalive());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!client.is_closed());
        assert!(!server.is_closed());

        let mut outbound = client.open_stream().unwrap();
        outbound.write_all(b"still here").unwrap();
        let mut inbound = server.accept().await.unwrap();
        assert_eq!(
            inbound.read_chunk().await.unwrap(),
            Some(b"still here".to_vec())
        );
    }

    #[tokio::test]
    async fn test_overrun_window_resets_stream() {
        let server_config = SessionConfig {
            stream_window: 2,
            ..SessionConfig::default()
        };
        let (client, mut server) = pair_with(SessionConfig::default(), server_config);

        let mut outbound = client.open_stream().unwrap();
        for chunk in [b"a", b"b", b"c", b"d", b"e"] {
            outbound.write_all(chunk).unwrap();
        }
        tokio::time::timeout(Duration::from_secs(5), outbound.peer_gone())
            .await
            .expect("server should reset the stream");

        let mut inbound = server.accept().await.unwrap();
        assert_eq!(inbound.read_chunk().await.unwrap(), Some(b"a".to_vec()));
        assert_eq!(inbound.read_chunk().await.unwrap(), Some(b"b".to_vec()));
        assert!(matches!(
            inbound.read_chunk().await,
            Err(TransportError::StreamReset(1))
        ));
    }

    #[tokio::test]
    async fn test_open_beyond_stream_limit_is_refused() {
        let server_config = SessionConfig {
            max_streams: 1,
            ..SessionConfig::default()
        };
        let (client, mut server) = pair_with(SessionConfig::default(), server_config);

        let mut first = client.open_stream().unwrap();
        let mut second = client.open_stream().unwrap();

        tokio::time::timeout(Duration::from_secs(5), second.peer_gone())
            .await
            .expect("second stream should be refused");
        assert!(matches!(
            second.read_chunk().await,
            Err(TransportError::StreamReset(3))
        ));

        first.write_all(b"ok").unwrap();
        let mut inbound = server.accept().await.unwrap();
        assert_eq!(inbound.id(), 1);
        assert_eq!(inbound.read_chunk().await.unwrap(), Some(b"ok".to_vec()));
    }
}
