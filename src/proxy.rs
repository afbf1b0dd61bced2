use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
    time::Duration,
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::net::TcpListener;

use crate::{
    auth::KeyPair,
    config::Config,
    connection::{
        client::handshake::HandshakeSessionHandler, player::ConnectedPlayer, Connection, ConnectionSettings, Transport,
    },
    error::CryptoError,
    event::{EventManager, ProxyEvent},
    protocol::{codec::minecraft_codec::MinecraftCodec, Direction, ProtocolVersion},
    status::{self, ServerPing},
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// State shared by every connection the proxy owns.
pub struct ProxyServer {
    config: Config,
    settings: Arc<ConnectionSettings>,
    events: Arc<EventManager>,
    key_pair: OnceLock<KeyPair>,
    http: reqwest::Client,
    favicon: Option<String>,
    players: Mutex<HashMap<String, Arc<ConnectedPlayer>>>,
}

impl ProxyServer {
    pub fn new(config: Config, events: EventManager) -> Result<Arc<Self>> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("building http client")?;

        Ok(Arc::new(Self {
            settings: Arc::new(ConnectionSettings::from(&config)),
            favicon: status::load_favicon(&config.favicon),
            config,
            events: Arc::new(events),
            key_pair: OnceLock::new(),
            http,
            players: Mutex::new(HashMap::new()),
        }))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &Arc<ConnectionSettings> {
        &self.settings
    }

    pub fn events(&self) -> &Arc<EventManager> {
        &self.events
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Generated on first use. Racing callers may both generate a pair but
    /// only one is ever kept.
    pub fn key_pair(&self) -> Result<&KeyPair, CryptoError> {
        if let Some(keys) = self.key_pair.get() {
            return Ok(keys);
        }
        let generated = KeyPair::generate()?;
        Ok(self.key_pair.get_or_init(|| generated))
    }

    pub fn server_ping(&self, version: ProtocolVersion) -> ServerPing {
        ServerPing::new(&self.config, version, self.player_count(), self.favicon.clone())
    }

    fn players(&self) -> MutexGuard<'_, HashMap<String, Arc<ConnectedPlayer>>> {
        self.players.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn player_count(&self) -> usize {
        self.players().len()
    }

    pub fn player(&self, username: &str) -> Option<Arc<ConnectedPlayer>> {
        self.players().get(&username.to_lowercase()).cloned()
    }

    /// Fails when a player with the same name is already online.
    pub fn register_player(&self, player: Arc<ConnectedPlayer>) -> bool {
        let mut players = self.players();
        let key = player.username.to_lowercase();
        if players.contains_key(&key) {
            return false;
        }
        players.insert(key, player);
        true
    }

    /// Removes `player` and fires [`ProxyEvent::Disconnect`], once.
    pub fn player_disconnected(&self, player: &Arc<ConnectedPlayer>) {
        let removed = {
            let mut players = self.players();
            let key = player.username.to_lowercase();
            match players.get(&key) {
                Some(registered) if Arc::ptr_eq(registered, player) => players.remove(&key).is_some(),
                _ => false,
            }
        };
        if removed {
            info!("{} has disconnected", player);
            self.events.fire_and_forget(ProxyEvent::Disconnect { username: player.username.clone(), uuid: player.uuid });
        }
    }

    /// Drives a freshly accepted client transport on its own task.
    pub fn accept(self: &Arc<Self>, transport: impl Transport, remote_address: SocketAddr) {
        let mut codec = MinecraftCodec::new(Direction::Serverbound)
            .with_max_frame_length(self.config.max_frame_length)
            .with_legacy_detection();
        if self.config.proxy_protocol {
            codec = codec.with_proxy_protocol();
        }

        let mut conn = Connection::new(transport, remote_address, codec, self.settings.clone());
        conn.set_session_handler(HandshakeSessionHandler::new(self.clone()));
        debug!("{} has connected", remote_address);
        tokio::spawn(conn.run());
    }

    pub async fn run(self: Arc<Self>) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind).await.with_context(|| format!("binding {}", self.config.bind))?;
        info!("Listening on {}", self.config.bind);

        loop {
            let (stream, address) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("Unable to accept connection: {}", err);
                    continue;
                }
            };
            if let Err(err) = stream.set_nodelay(true) {
                debug!("{}: unable to set TCP_NODELAY: {}", address, err);
            }
            self.accept(stream, address);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{future::Future, time::Duration};

    use bytes::{Bytes, BytesMut};
    use futures::{SinkExt, StreamExt};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio_util::codec::Framed;

    use super::*;
    use crate::{
        auth,
        protocol::{
            buffer::BufMutExt,
            codec::{
                compression::CompressionBackend,
                minecraft_codec::{Inbound, Outbound},
            },
            packet::{
                handshake::Handshake,
                login::{ServerLogin, ServerLoginSuccess, SetCompression},
                play::{Chat, JoinGame, PluginMessage},
                status::{StatusPing, StatusRequest, StatusResponse},
                PacketType,
            },
            State, LOGIN_ID, STATUS_ID,
        },
    };

    const ADDRESS: &str = "127.0.0.1:50000";

    fn offline_config() -> Config {
        Config { online_mode: false, favicon: "does-not-exist.png".into(), ..Default::default() }
    }

    async fn within<T>(future: impl Future<Output = T>) -> T {
        tokio::time::timeout(Duration::from_secs(10), future).await.expect("test timed out")
    }

    fn client(proxy: &Arc<ProxyServer>) -> Framed<tokio::io::DuplexStream, MinecraftCodec> {
        let (ours, theirs) = tokio::io::duplex(64 * 1024);
        proxy.accept(theirs, ADDRESS.parse().unwrap());
        Framed::new(ours, MinecraftCodec::new(Direction::Clientbound))
    }

    async fn next_packet<T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin>(
        framed: &mut Framed<T, MinecraftCodec>,
    ) -> PacketType {
        match framed.next().await {
            Some(Ok(Inbound::Packet(packet))) => packet,
            other => panic!("expected a packet, got {:?}", other.map(|r| r.map(|_| ()))),
        }
    }

    fn handshake(version: ProtocolVersion, next_state: i32) -> Handshake {
        Handshake { protocol: version.protocol(), server_address: "localhost".to_owned(), port: 25577, next_state }
    }

    #[tokio::test]
    async fn answers_status_and_ping() {
        let proxy = ProxyServer::new(Config { motd: "welcome".to_owned(), ..offline_config() }, EventManager::new()).unwrap();
        let mut framed = client(&proxy);

        within(async {
            framed.send(Outbound::from(handshake(ProtocolVersion::V1_16_4, STATUS_ID))).await.unwrap();
            framed.codec_mut().set_state_and_version(State::Status, ProtocolVersion::V1_16_4).unwrap();
            framed.send(Outbound::from(StatusRequest)).await.unwrap();

            let PacketType::StatusResponse(StatusResponse { status }) = next_packet(&mut framed).await else {
                panic!("expected a status response");
            };
            let ping: ServerPing = serde_json::from_str(&status).unwrap();
            assert_eq!(ping.version.protocol, ProtocolVersion::V1_16_4.protocol());
            assert_eq!(ping.description, crate::component::Component::text("welcome"));
            assert_eq!(ping.players.online, 0);

            framed.send(Outbound::from(StatusPing { payload: 1234 })).await.unwrap();
            assert_eq!(next_packet(&mut framed).await, PacketType::StatusPing(StatusPing { payload: 1234 }));
            assert!(framed.next().await.is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn rejects_unsupported_login_versions() {
        let proxy = ProxyServer::new(offline_config(), EventManager::new()).unwrap();
        let mut framed = client(&proxy);

        within(async {
            let mut old = handshake(ProtocolVersion::MINIMUM, LOGIN_ID);
            old.protocol = 1;
            framed.send(Outbound::from(old)).await.unwrap();
            framed.codec_mut().set_state_and_version(State::Login, ProtocolVersion::MINIMUM).unwrap();

            let PacketType::Disconnect(disconnect) = next_packet(&mut framed).await else {
                panic!("expected a disconnect");
            };
            assert!(disconnect.reason().to_legacy_string().starts_with("Outdated client!"));
            assert!(framed.next().await.is_none());
        })
        .await;
    }

    #[tokio::test]
    async fn answers_legacy_pings() {
        let proxy = ProxyServer::new(Config { motd: "old".to_owned(), ..offline_config() }, EventManager::new()).unwrap();
        let (mut ours, theirs) = tokio::io::duplex(1024);
        proxy.accept(theirs, ADDRESS.parse().unwrap());

        within(async {
            ours.write_all(&[0xFE]).await.unwrap();
            let mut response = Vec::new();
            ours.read_to_end(&mut response).await.unwrap();

            assert_eq!(response[0], 0xFF);
            let units: Vec<u16> = response[3..].chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
            assert_eq!(String::from_utf16_lossy(&units), "old§0§500");
        })
        .await;
    }

    #[tokio::test]
    async fn players_register_once() {
        let proxy = ProxyServer::new(offline_config(), EventManager::new()).unwrap();
        let (transport, _peer) = tokio::io::duplex(16);
        let conn = Connection::new(transport, ADDRESS.parse().unwrap(), MinecraftCodec::new(Direction::Serverbound), proxy.settings().clone());

        let player = |name: &str| {
            Arc::new(ConnectedPlayer::new(
                auth::GameProfile::offline(name),
                ADDRESS.parse().unwrap(),
                ProtocolVersion::MAXIMUM,
                None,
                conn.handle(),
            ))
        };

        let steve = player("Steve");
        assert!(proxy.register_player(steve.clone()));
        assert!(!proxy.register_player(player("steve")));
        assert_eq!(proxy.player_count(), 1);
        assert!(proxy.player("STEVE").is_some());

        proxy.player_disconnected(&player("Steve"));
        assert_eq!(proxy.player_count(), 1);
        proxy.player_disconnected(&steve);
        assert_eq!(proxy.player_count(), 0);
    }

    /// Client and backend both speak through the proxy: login, join, chat
    /// forwarding, brand rewriting and teardown.
    #[tokio::test]
    async fn relays_between_client_and_backend() {
        let backend_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = offline_config();
        config.servers.insert("lobby".to_owned(), backend_listener.local_addr().unwrap());
        let proxy = ProxyServer::new(config, EventManager::new()).unwrap();
        let version = ProtocolVersion::V1_17_1;

        let backend = tokio::spawn(async move {
            let (stream, _) = backend_listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, MinecraftCodec::new(Direction::Serverbound));

            let PacketType::Handshake(handshake) = next_packet(&mut framed).await else { panic!("expected handshake") };
            assert_eq!(handshake.protocol, version.protocol());
            assert_eq!(handshake.next_state, LOGIN_ID);
            framed.codec_mut().set_state_and_version(State::Login, version).unwrap();

            let PacketType::ServerLogin(login) = next_packet(&mut framed).await else { panic!("expected login start") };
            assert_eq!(login.username, "steve");
            framed
                .send(Outbound::from(ServerLoginSuccess { uuid: auth::offline_uuid("steve"), username: "steve".to_owned() }))
                .await
                .unwrap();
            framed.codec_mut().set_state(State::Play).unwrap();
            framed.send(Outbound::from(JoinGame { entity_id: 7, rest: Bytes::from_static(b"world") })).await.unwrap();

            let PacketType::Chat(chat) = next_packet(&mut framed).await else { panic!("expected chat") };
            assert_eq!(chat.message, "hello");

            let mut brand = BytesMut::new();
            brand.put_string("vanilla");
            framed
                .send(Outbound::from(PluginMessage { channel: "minecraft:brand".to_owned(), data: brand.freeze() }))
                .await
                .unwrap();

            assert!(framed.next().await.is_none());
        });

        let mut framed = client(&proxy);
        within(async {
            framed.send(Outbound::from(handshake(version, LOGIN_ID))).await.unwrap();
            framed.codec_mut().set_state_and_version(State::Login, version).unwrap();
            framed.send(Outbound::from(ServerLogin { username: "steve".to_owned() })).await.unwrap();

            assert_eq!(next_packet(&mut framed).await, PacketType::SetCompression(SetCompression { threshold: 256 }));
            framed.codec_mut().set_compression(256, CompressionBackend::default(), -1).unwrap();

            let success = ServerLoginSuccess { uuid: auth::offline_uuid("steve"), username: "steve".to_owned() };
            assert_eq!(next_packet(&mut framed).await, PacketType::ServerLoginSuccess(success));
            framed.codec_mut().set_state(State::Play).unwrap();

            let PacketType::JoinGame(join) = next_packet(&mut framed).await else { panic!("expected join game") };
            assert_eq!(join.entity_id, 7);
            assert_eq!(&join.rest[..], b"world");
            assert_eq!(proxy.player_count(), 1);

            framed.send(Outbound::from(Chat::serverbound("hello"))).await.unwrap();

            let PacketType::PluginMessage(brand) = next_packet(&mut framed).await else { panic!("expected brand") };
            let mut expected = BytesMut::new();
            expected.put_string(&format!("vanilla ({})", env!("CARGO_PKG_NAME")));
            assert_eq!(brand.data, expected.freeze());

            drop(framed);
            backend.await.unwrap();
        })
        .await;
    }

    #[tokio::test]
    async fn unreachable_backends_disconnect_the_player() {
        let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = unused.local_addr().unwrap();
        drop(unused);

        let mut config = offline_config();
        config.compression_threshold = -1;
        config.servers.insert("lobby".to_owned(), address);
        let proxy = ProxyServer::new(config, EventManager::new()).unwrap();
        let version = ProtocolVersion::V1_12_2;
        let mut framed = client(&proxy);

        within(async {
            framed.send(Outbound::from(handshake(version, LOGIN_ID))).await.unwrap();
            framed.codec_mut().set_state_and_version(State::Login, version).unwrap();
            framed.send(Outbound::from(ServerLogin { username: "alex".to_owned() })).await.unwrap();

            assert!(matches!(next_packet(&mut framed).await, PacketType::ServerLoginSuccess(_)));
            framed.codec_mut().set_state(State::Play).unwrap();

            let PacketType::Disconnect(disconnect) = next_packet(&mut framed).await else { panic!("expected disconnect") };
            assert!(disconnect.reason().to_legacy_string().contains("lobby"));
            assert!(framed.next().await.is_none());
            while proxy.player_count() > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
    }
}
