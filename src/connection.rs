use std::{
    any::Any,
    fmt,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use bytes::BytesMut;
use futures::StreamExt;
use log::{debug, trace};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    sync::mpsc,
    time::{sleep_until, Instant},
};
use tokio_util::codec::{Encoder, FramedRead};

use crate::{
    component::Component,
    config::Config,
    error::{CryptoError, ProtocolError, ReadTimeout, RegistryError},
    protocol::{
        codec::{
            compression::CompressionBackend,
            minecraft_codec::{Inbound, MinecraftCodec, Outbound},
            varint::MAX_FRAME_LENGTH,
        },
        legacy,
        packet::{play::Disconnect, RawPacket},
        ProtocolVersion, State,
    },
};

use self::handler::SessionHandler;

pub mod backend;
pub mod client;
pub mod handler;
pub mod player;

const HIGH_WATER_BYTES: usize = 2 * 1024 * 1024;
const LOW_WATER_BYTES: usize = 512 * 1024;
const HIGH_WATER_COMMANDS: usize = 4096;
const LOW_WATER_COMMANDS: usize = 1024;

pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Transport for T {}

type BoxedTransport = Box<dyn Transport>;

/// The handful of scalars the connection core reads from configuration.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub read_timeout: Duration,
    pub compression_threshold: i32,
    pub compression_level: i32,
    pub compression_backend: CompressionBackend,
    pub max_frame_length: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(30),
            compression_threshold: 256,
            compression_level: -1,
            compression_backend: CompressionBackend::default(),
            max_frame_length: MAX_FRAME_LENGTH,
        }
    }
}

impl From<&Config> for ConnectionSettings {
    fn from(config: &Config) -> Self {
        Self {
            read_timeout: Duration::from_millis(config.read_timeout),
            compression_threshold: config.compression_threshold,
            compression_level: config.compression_level,
            compression_backend: config.compression_backend,
            max_frame_length: config.max_frame_length,
        }
    }
}

enum Command {
    Write(Outbound),
    Close(Option<Component>),
    Execute(Box<dyn FnOnce(&mut Connection) + Send>),
    Notify(Box<dyn Any + Send>),
}

#[derive(Default)]
struct Shared {
    pending: AtomicUsize,
    writable: AtomicBool,
    closed: AtomicBool,
}

/// Cloneable reference to a connection owned by another task. Every call is
/// queued and runs on the owning task in submission order.
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    fn send(&self, command: Command) {
        self.shared.pending.fetch_add(1, Ordering::Relaxed);
        if self.commands.send(command).is_err() {
            self.shared.pending.fetch_sub(1, Ordering::Relaxed);
        }
    }

    pub fn write(&self, packet: impl Into<Outbound>) {
        self.send(Command::Write(packet.into()));
    }

    pub fn write_raw(&self, packet: RawPacket) {
        self.send(Command::Write(Outbound::Raw(packet)));
    }

    pub fn close(&self) {
        self.send(Command::Close(None));
    }

    pub fn close_with(&self, reason: Component) {
        self.send(Command::Close(Some(reason)));
    }

    pub fn execute(&self, task: impl FnOnce(&mut Connection) + Send + 'static) {
        self.send(Command::Execute(Box::new(task)));
    }

    /// Delivers `event` to the active session handler's `user_event` hook.
    pub fn notify<E: Any + Send>(&self, event: E) {
        self.send(Command::Notify(Box::new(event)));
    }

    pub fn is_writable(&self) -> bool {
        self.shared.writable.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Relaxed) || self.commands.is_closed()
    }

    pub fn pending_commands(&self) -> usize {
        self.shared.pending.load(Ordering::Relaxed)
    }
}

/// One socket, its pipeline and its session handler. Owned by a single task
/// for its whole life, see [`Connection::run`].
pub struct Connection {
    reader: FramedRead<ReadHalf<BoxedTransport>, MinecraftCodec>,
    writer: WriteHalf<BoxedTransport>,
    out: BytesMut,
    commands: mpsc::UnboundedReceiver<Command>,
    handle: ConnectionHandle,
    settings: Arc<ConnectionSettings>,
    remote_address: SocketAddr,
    remote_address_fixed: bool,
    label: String,
    handler: Option<Box<dyn SessionHandler>>,
    pending_handler: Option<Box<dyn SessionHandler>>,
    next_version: Option<ProtocolVersion>,
    auto_read: bool,
    writable: bool,
    closing: bool,
    last_read: Instant,
    flush_deadline: Option<Instant>,
}

impl Connection {
    pub fn new(transport: impl Transport, remote_address: SocketAddr, codec: MinecraftCodec, settings: Arc<ConnectionSettings>) -> Self {
        let transport: BoxedTransport = Box::new(transport);
        let (reader, writer) = tokio::io::split(transport);
        let (sender, commands) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared { writable: AtomicBool::new(true), ..Default::default() });

        Self {
            reader: FramedRead::new(reader, codec),
            writer,
            out: BytesMut::with_capacity(8192),
            commands,
            handle: ConnectionHandle { commands: sender, shared },
            settings,
            remote_address,
            remote_address_fixed: false,
            label: remote_address.to_string(),
            handler: None,
            pending_handler: None,
            next_version: None,
            auto_read: true,
            writable: true,
            closing: false,
            last_read: Instant::now(),
            flush_deadline: None,
        }
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle.clone()
    }

    pub fn settings(&self) -> &Arc<ConnectionSettings> {
        &self.settings
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.remote_address
    }

    /// Replaces the peer address with the one announced by a PROXY header.
    /// Only the first call has an effect.
    pub fn set_remote_address(&mut self, address: SocketAddr) -> bool {
        if self.remote_address_fixed {
            return false;
        }
        debug!("{} is proxied for {}", self.remote_address, address);
        if self.label == self.remote_address.to_string() {
            self.label = address.to_string();
        }
        self.remote_address = address;
        self.remote_address_fixed = true;
        true
    }

    /// Prefixes further log lines with the player name instead of the address.
    pub fn set_player_name(&mut self, name: &str) {
        self.label = format!("[{name}]");
    }

    pub fn codec(&self) -> &MinecraftCodec {
        self.reader.decoder()
    }

    pub fn codec_mut(&mut self) -> &mut MinecraftCodec {
        self.reader.decoder_mut()
    }

    pub fn state(&self) -> State {
        self.codec().state()
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.codec().protocol_version()
    }

    /// Switches both directions to the registries of `state`, picking up a
    /// version stored with [`Connection::set_next_protocol_version`].
    pub fn set_state(&mut self, state: State) -> Result<(), RegistryError> {
        let version = self.next_version.unwrap_or(self.protocol_version());
        self.codec_mut().set_state_and_version(state, version)?;
        self.next_version = None;
        Ok(())
    }

    pub fn set_protocol_version(&mut self, version: ProtocolVersion) -> Result<(), RegistryError> {
        self.codec_mut().set_protocol_version(version)
    }

    pub fn set_next_protocol_version(&mut self, version: ProtocolVersion) {
        self.next_version = Some(version);
    }

    pub fn enable_compression(&mut self, threshold: i32) -> Result<(), ProtocolError> {
        let (backend, level) = (self.settings.compression_backend, self.settings.compression_level);
        self.codec_mut().set_compression(threshold, backend, level)
    }

    pub fn enable_encryption(&mut self, secret: &[u8]) -> Result<(), CryptoError> {
        self.codec_mut().enable_encryption(secret)
    }

    pub fn set_auto_read(&mut self, auto_read: bool) {
        if auto_read && !self.auto_read {
            self.last_read = Instant::now();
        }
        self.auto_read = auto_read;
    }

    pub fn is_auto_read(&self) -> bool {
        self.auto_read
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    /// Encodes `packet` into the outbound buffer. Writes after `close` are dropped.
    pub fn write(&mut self, packet: impl Into<Outbound>) -> Result<(), ProtocolError> {
        if self.closing {
            return Ok(());
        }
        self.reader.decoder_mut().encode(packet.into(), &mut self.out)
    }

    pub fn write_raw(&mut self, packet: RawPacket) -> Result<(), ProtocolError> {
        self.write(Outbound::Raw(packet))
    }

    /// Flushes what is already buffered, then closes the transport. The
    /// flush gets its own read-timeout window, however long reads were paused.
    pub fn close(&mut self) {
        if !self.closing {
            self.closing = true;
            self.flush_deadline = Some(Instant::now() + self.settings.read_timeout);
        }
    }

    /// Sends the disconnect message the current phase understands, then closes.
    pub fn close_with(&mut self, reason: &Component) {
        let result = match (self.state(), self.protocol_version()) {
            (_, ProtocolVersion::Legacy) => self.write(Outbound::Legacy(legacy::disconnect(&reason.to_legacy_string()))),
            (State::Login | State::Play, _) => self.write(Disconnect::new(reason)),
            _ => Ok(()),
        };
        if let Err(err) = result {
            debug!("{}: unable to send disconnect: {}", self, err);
        }
        self.close();
    }

    /// Installs `handler` once the current callback returns: the previous
    /// handler is deactivated first, then the new one activated.
    pub fn set_session_handler(&mut self, handler: impl SessionHandler + 'static) {
        self.pending_handler = Some(Box::new(handler));
    }

    pub async fn run(mut self) {
        self.swap_handler();
        self.with_handler(|handler, conn| handler.connected(conn));

        loop {
            self.update_writability();
            if self.closing && self.out.is_empty() {
                break;
            }

            let reading = self.auto_read && !self.closing;
            let accepting = !self.closing;
            let flushing = !self.out.is_empty();
            let timed = !self.settings.read_timeout.is_zero() && (reading || self.closing);
            let deadline = match self.flush_deadline {
                Some(deadline) => deadline,
                None => self.last_read + self.settings.read_timeout,
            };

            tokio::select! {
                command = self.commands.recv(), if accepting => {
                    if let Some(command) = command {
                        self.process(command);
                    }
                }
                written = self.writer.write_buf(&mut self.out), if flushing => match written {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(err) => {
                        debug!("{}: write failed: {}", self, err);
                        break;
                    }
                },
                item = self.reader.next(), if reading => match item {
                    Some(Ok(item)) => {
                        self.last_read = Instant::now();
                        self.inbound(item);
                    }
                    Some(Err(err)) => self.inbound_error(err),
                    None => break,
                },
                _ = sleep_until(deadline), if timed => {
                    if self.closing {
                        break;
                    }
                    self.exception(ReadTimeout.into());
                }
            }
        }

        self.closing = true;
        self.handle.shared.closed.store(true, Ordering::Relaxed);
        self.commands.close();
        if let Err(err) = self.writer.shutdown().await {
            trace!("{}: shutdown failed: {}", self, err);
        }
        self.with_handler(|handler, conn| {
            handler.disconnected(conn);
            Ok(())
        });
    }

    fn process(&mut self, command: Command) {
        self.handle.shared.pending.fetch_sub(1, Ordering::Relaxed);
        match command {
            Command::Write(packet) => {
                if let Err(err) = self.write(packet) {
                    self.exception(err.into());
                }
            }
            Command::Close(None) => self.close(),
            Command::Close(Some(reason)) => self.close_with(&reason),
            Command::Execute(task) => {
                task(self);
                self.swap_handler();
            }
            Command::Notify(event) => self.with_handler(|handler, conn| handler.user_event(conn, event)),
        }
    }

    fn inbound(&mut self, item: Inbound) {
        match item {
            Inbound::ProxyHeader(source) => {
                if let Some(source) = source {
                    self.set_remote_address(source);
                }
            }
            Inbound::Packet(packet) => self.with_handler(|handler, conn| handler::dispatch(handler, conn, packet)),
            Inbound::Raw(packet) => self.with_handler(|handler, conn| handler.handle_unknown(conn, packet)),
            Inbound::LegacyPing(ping) => self.with_handler(|handler, conn| handler.handle_legacy_ping(conn, ping)),
            Inbound::LegacyHandshake => self.with_handler(|handler, conn| handler.handle_legacy_handshake(conn)),
        }
    }

    fn inbound_error(&mut self, err: ProtocolError) {
        if err.is_frame_corruption() {
            debug!("{}: closing after corrupt frame: {}", self, err);
            self.close();
        } else {
            self.exception(err.into());
        }
    }

    fn exception(&mut self, cause: anyhow::Error) {
        match self.handler.take() {
            Some(mut handler) => {
                handler.exception(self, &cause);
                self.handler = Some(handler);
                self.swap_handler();
            }
            None => {
                debug!("{}: {:#}", self, cause);
                self.close();
            }
        }
    }

    fn with_handler(&mut self, f: impl FnOnce(&mut dyn SessionHandler, &mut Connection) -> anyhow::Result<()>) {
        let Some(mut handler) = self.handler.take() else {
            trace!("{}: dropping event, no session handler", self);
            return;
        };
        if let Err(err) = f(handler.as_mut(), self) {
            handler.exception(self, &err);
        }
        self.handler = Some(handler);
        self.swap_handler();
    }

    fn swap_handler(&mut self) {
        while let Some(mut next) = self.pending_handler.take() {
            if let Some(mut previous) = self.handler.take() {
                previous.deactivated(self);
            }
            if let Err(err) = next.activated(self) {
                next.exception(self, &err);
            }
            self.handler = Some(next);
        }
    }

    fn update_writability(&mut self) {
        let buffered = self.out.len();
        let pending = self.handle.pending_commands();
        let writable = if self.writable {
            buffered <= HIGH_WATER_BYTES && pending <= HIGH_WATER_COMMANDS
        } else {
            buffered < LOW_WATER_BYTES && pending < LOW_WATER_COMMANDS
        };

        if writable != self.writable {
            trace!("{}: writable {}", self, writable);
            self.writable = writable;
            self.handle.shared.writable.store(writable, Ordering::Relaxed);
            self.with_handler(|handler, conn| {
                handler.writability_changed(conn);
                Ok(())
            });
        }
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::{BufMut, Bytes};
    use tokio::io::{AsyncWriteExt, DuplexStream};

    use super::*;
    use crate::protocol::{
        packet::{
            handshake::Handshake,
            status::{StatusPing, StatusResponse},
            Packet, PacketType,
        },
        Direction,
    };

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: &'static str,
        log: Log,
        next: Option<Box<Recorder>>,
    }

    impl Recorder {
        fn new(name: &'static str, log: &Log) -> Self {
            Self { name, log: log.clone(), next: None }
        }

        fn record(&self, event: impl fmt::Display) {
            self.log.lock().unwrap().push(format!("{} {}", self.name, event));
        }
    }

    impl SessionHandler for Recorder {
        fn activated(&mut self, _: &mut Connection) -> anyhow::Result<()> {
            self.record("activated");
            Ok(())
        }

        fn deactivated(&mut self, _: &mut Connection) {
            self.record("deactivated");
        }

        fn connected(&mut self, _: &mut Connection) -> anyhow::Result<()> {
            self.record("connected");
            Ok(())
        }

        fn disconnected(&mut self, _: &mut Connection) {
            self.record("disconnected");
        }

        fn exception(&mut self, conn: &mut Connection, cause: &anyhow::Error) {
            self.record(format!("exception {cause}"));
            conn.close();
        }

        fn writability_changed(&mut self, conn: &mut Connection) {
            self.record(format!("writable {}", conn.is_writable()));
        }

        fn handle_handshake(&mut self, conn: &mut Connection, _: &Handshake) -> anyhow::Result<bool> {
            self.record("handshake");
            if let Some(next) = self.next.take() {
                conn.set_session_handler(*next);
            }
            Ok(true)
        }

        fn handle_unknown(&mut self, _: &mut Connection, packet: RawPacket) -> anyhow::Result<()> {
            self.record(format!("unknown {:#04x}", packet.id));
            Ok(())
        }
    }

    fn address() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn connection(stream: DuplexStream, settings: ConnectionSettings) -> Connection {
        Connection::new(stream, address(), MinecraftCodec::new(Direction::Serverbound), Arc::new(settings))
    }

    fn handshake() -> Handshake {
        Handshake { protocol: 756, server_address: "localhost".to_owned(), port: 25577, next_state: 1 }
    }

    fn client_bytes(packets: impl IntoIterator<Item = Outbound>) -> Vec<u8> {
        let mut codec = MinecraftCodec::new(Direction::Clientbound);
        let mut dst = BytesMut::new();
        for packet in packets {
            codec.encode(packet, &mut dst).unwrap();
        }
        dst.to_vec()
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn handler_swap_deactivates_before_activating() {
        let (mut client, server) = tokio::io::duplex(4096);
        let log = Log::default();
        let mut first = Recorder::new("a", &log);
        first.next = Some(Box::new(Recorder::new("b", &log)));

        let mut conn = connection(server, ConnectionSettings::default());
        conn.set_session_handler(first);
        let task = tokio::spawn(conn.run());

        client.write_all(&client_bytes([handshake().into(), handshake().into()])).await.unwrap();
        drop(client);
        task.await.unwrap();

        assert_eq!(
            entries(&log),
            [
                "a activated",
                "a connected",
                "a handshake",
                "a deactivated",
                "b activated",
                "b handshake",
                "b disconnected",
            ]
        );
    }

    #[tokio::test]
    async fn unknown_packets_keep_connection_open() {
        let (mut client, server) = tokio::io::duplex(4096);
        let log = Log::default();
        let mut conn = connection(server, ConnectionSettings::default());
        conn.set_session_handler(Recorder::new("a", &log));
        let task = tokio::spawn(conn.run());

        let raw = RawPacket::new(0x7F, Bytes::from_static(&[0x7F, 0x01, 0x02]));
        client.write_all(&client_bytes([Outbound::Raw(raw), handshake().into()])).await.unwrap();
        drop(client);
        task.await.unwrap();

        assert_eq!(
            entries(&log),
            ["a activated", "a connected", "a unknown 0x7f", "a handshake", "a disconnected"]
        );
    }

    #[tokio::test]
    async fn handle_writes_arrive_in_order_before_close() {
        let (client, server) = tokio::io::duplex(64);
        let mut conn = connection(server, ConnectionSettings::default());
        conn.codec_mut().set_state_and_version(State::Status, ProtocolVersion::V1_17_1).unwrap();
        let handle = conn.handle();
        let task = tokio::spawn(conn.run());

        handle.write(StatusResponse { status: "{}".to_owned() });
        handle.write(StatusPing { payload: 42 });
        handle.close();
        handle.write(StatusPing { payload: 43 });

        let mut codec = MinecraftCodec::new(Direction::Clientbound);
        codec.set_state_and_version(State::Status, ProtocolVersion::V1_17_1).unwrap();
        let received: Vec<_> = FramedRead::new(client, codec).map(Result::unwrap).collect().await;
        task.await.unwrap();

        assert_eq!(
            received,
            [
                Inbound::Packet(PacketType::StatusResponse(StatusResponse { status: "{}".to_owned() })),
                Inbound::Packet(PacketType::StatusPing(StatusPing { payload: 42 })),
            ]
        );
        assert!(handle.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_connections_time_out() {
        let (_client, server) = tokio::io::duplex(64);
        let log = Log::default();
        let settings = ConnectionSettings { read_timeout: Duration::from_millis(50), ..Default::default() };
        let mut conn = connection(server, settings);
        conn.set_session_handler(Recorder::new("a", &log));
        tokio::spawn(conn.run()).await.unwrap();

        assert!(entries(&log).contains(&"a exception read timed out".to_owned()));
    }

    #[tokio::test]
    async fn writability_has_hysteresis() {
        let (_client, server) = tokio::io::duplex(64);
        let log = Log::default();
        let mut conn = connection(server, ConnectionSettings::default());
        conn.set_session_handler(Recorder::new("a", &log));
        conn.swap_handler();

        let chunk = RawPacket::new(0x00, Bytes::from(vec![0u8; 64 * 1024]));
        while conn.out.len() <= HIGH_WATER_BYTES {
            conn.write_raw(chunk.clone()).unwrap();
        }
        conn.update_writability();
        assert!(!conn.is_writable());
        assert!(!conn.handle().is_writable());

        conn.out.truncate(LOW_WATER_BYTES);
        conn.update_writability();
        assert!(!conn.is_writable());

        conn.out.truncate(LOW_WATER_BYTES - 1);
        conn.update_writability();
        assert!(conn.is_writable());
        assert_eq!(entries(&log), ["a activated", "a writable false", "a writable true"]);
    }

    #[tokio::test]
    async fn next_version_applies_with_state() {
        let (_client, server) = tokio::io::duplex(64);
        let mut conn = connection(server, ConnectionSettings::default());
        conn.set_next_protocol_version(ProtocolVersion::V1_12_2);
        assert_eq!(conn.protocol_version(), ProtocolVersion::Unknown);

        conn.set_state(State::Login).unwrap();
        assert_eq!((conn.state(), conn.protocol_version()), (State::Login, ProtocolVersion::V1_12_2));
        conn.set_state(State::Play).unwrap();
        assert_eq!(conn.protocol_version(), ProtocolVersion::V1_12_2);
    }

    #[tokio::test]
    async fn remote_address_changes_once() {
        let (_client, server) = tokio::io::duplex(64);
        let mut conn = connection(server, ConnectionSettings::default());
        let proxied: SocketAddr = "203.0.113.7:40000".parse().unwrap();

        assert!(conn.set_remote_address(proxied));
        assert!(!conn.set_remote_address(address()));
        assert_eq!(conn.remote_address(), proxied);
        assert_eq!(conn.to_string(), "203.0.113.7:40000");
    }

    #[tokio::test]
    async fn compression_toggle_is_idempotent() {
        let (_client, server) = tokio::io::duplex(64);
        let mut conn = connection(server, ConnectionSettings::default());
        conn.enable_compression(-1).unwrap();
        conn.enable_compression(-1).unwrap();
        assert_eq!(conn.codec_mut().compression_threshold(), None);
        conn.enable_compression(256).unwrap();
        assert_eq!(conn.codec_mut().compression_threshold(), Some(256));
    }

    #[tokio::test]
    async fn corrupt_frames_close_quietly() {
        let (mut client, server) = tokio::io::duplex(64);
        let log = Log::default();
        let mut conn = connection(server, ConnectionSettings::default());
        conn.set_session_handler(Recorder::new("a", &log));
        let task = tokio::spawn(conn.run());

        client.write_all(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01]).await.unwrap();
        task.await.unwrap();
        assert_eq!(entries(&log), ["a activated", "a connected", "a disconnected"]);
    }

    #[tokio::test]
    async fn malformed_bodies_reach_the_handler() {
        let (mut client, server) = tokio::io::duplex(4096);
        let log = Log::default();
        let mut conn = connection(server, ConnectionSettings::default());
        conn.set_session_handler(Recorder::new("a", &log));
        let task = tokio::spawn(conn.run());

        let mut body = BytesMut::from(&[0x00][..]);
        handshake().put_buf(&mut body, Direction::Serverbound, ProtocolVersion::V1_17_1).unwrap();
        body.put_u8(0xAA);
        let frame = RawPacket::new(0x00, body.freeze());
        client.write_all(&client_bytes([Outbound::Raw(frame)])).await.unwrap();
        task.await.unwrap();

        assert_eq!(
            entries(&log),
            [
                "a activated",
                "a connected",
                "a exception 1 bytes left unread after Handshake",
                "a disconnected",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_survives_a_long_read_pause() {
        for _ in 0..20 {
            let (client, server) = tokio::io::duplex(4096);
            let settings = ConnectionSettings { read_timeout: Duration::from_millis(50), ..Default::default() };
            let mut conn = connection(server, settings);
            conn.codec_mut().set_state_and_version(State::Login, ProtocolVersion::V1_17_1).unwrap();
            conn.set_auto_read(false);
            let handle = conn.handle();
            let task = tokio::spawn(conn.run());

            tokio::time::sleep(Duration::from_millis(200)).await;
            handle.close_with(Component::text("Slow login"));

            let mut codec = MinecraftCodec::new(Direction::Clientbound);
            codec.set_state_and_version(State::Login, ProtocolVersion::V1_17_1).unwrap();
            let received: Vec<_> = FramedRead::new(client, codec).map(Result::unwrap).collect().await;
            task.await.unwrap();

            let expected = Disconnect::new(&Component::text("Slow login"));
            assert_eq!(received, [Inbound::Packet(PacketType::Disconnect(expected))]);
        }
    }
}
