//! Outbound connections from the proxy to backend servers on behalf of a
//! player.

use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::{Context, Result};
use log::debug;
use tokio::{net::TcpStream, sync::oneshot, time::timeout};

use crate::{
    component::Component,
    config::PlayerInfoForwarding,
    protocol::{
        codec::minecraft_codec::MinecraftCodec,
        packet::{handshake::Handshake, login::ServerLogin, play::JoinGame},
        Direction, State, LOGIN_ID,
    },
    proxy::ProxyServer,
};

use self::login::BackendLoginSessionHandler;

use super::{player::ConnectedPlayer, Connection, ConnectionHandle};

pub mod login;
pub mod play;
pub mod transition;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A backend connection that reached the play phase.
pub struct BackendConnection {
    pub id: u64,
    pub server: String,
    pub handle: ConnectionHandle,
}

/// Signals from a backend connection task to its player's client task.
pub enum BackendEvent {
    Joined { backend: BackendConnection, join_game: JoinGame },
    Kicked { id: u64, reason: Component },
    Lost { id: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectResult {
    Success,
    Kicked(Component),
    Failed(String),
}

/// Sender for the outcome of one connection attempt; the first completion wins.
pub(crate) struct Completion(Option<oneshot::Sender<ConnectResult>>);

impl Completion {
    pub(crate) fn complete(&mut self, result: ConnectResult) {
        if let Some(sender) = self.0.take() {
            let _ = sender.send(result);
        }
    }

    pub(crate) fn take(&mut self) -> Completion {
        Completion(self.0.take())
    }
}

/// Connects `player` to `server` and resolves once the backend sent
/// JoinGame, kicked the player, or failed.
pub async fn connect(proxy: &Arc<ProxyServer>, player: &Arc<ConnectedPlayer>, server: &str) -> ConnectResult {
    let (sender, receiver) = oneshot::channel();
    if let Err(err) = start(proxy, player, server, Completion(Some(sender))).await {
        return ConnectResult::Failed(format!("{err:#}"));
    }
    receiver.await.unwrap_or_else(|_| ConnectResult::Failed("connection closed".to_owned()))
}

async fn start(proxy: &Arc<ProxyServer>, player: &Arc<ConnectedPlayer>, server: &str, completion: Completion) -> Result<()> {
    let address = proxy.config().server(server).with_context(|| format!("unknown server {server}"))?;
    let connect_timeout = Duration::from_millis(proxy.config().connect_timeout);
    let stream = timeout(connect_timeout, TcpStream::connect(address))
        .await
        .with_context(|| format!("connecting to {address} timed out"))?
        .with_context(|| format!("connecting to {address}"))?;
    if let Err(err) = stream.set_nodelay(true) {
        debug!("{}: unable to set TCP_NODELAY: {}", address, err);
    }

    let codec = MinecraftCodec::new(Direction::Clientbound).with_max_frame_length(proxy.config().max_frame_length);
    let mut conn = Connection::new(stream, address, codec, proxy.settings().clone());
    conn.set_player_name(&format!("{player} -> {server}"));

    let version = player.protocol_version;
    conn.set_protocol_version(version)?;
    conn.write(Handshake {
        protocol: version.protocol(),
        server_address: handshake_address(proxy.config().player_info_forwarding, player, address),
        port: address.port(),
        next_state: LOGIN_ID,
    })?;
    conn.set_state(State::Login)?;
    conn.write(ServerLogin { username: player.username.clone() })?;

    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    conn.set_session_handler(BackendLoginSessionHandler::new(proxy.clone(), player.clone(), server.to_owned(), id, completion));
    tokio::spawn(conn.run());
    Ok(())
}

/// Legacy forwarding packs the player's address and identity into the
/// handshake host field, NUL separated.
fn handshake_address(forwarding: PlayerInfoForwarding, player: &ConnectedPlayer, backend: SocketAddr) -> String {
    let host = backend.ip().to_string();
    match forwarding {
        PlayerInfoForwarding::None => host,
        PlayerInfoForwarding::Legacy => {
            let mut address = format!("{}\0{}\0{}", host, player.remote_address.ip(), player.uuid.simple());
            if !player.properties.is_empty() {
                if let Ok(properties) = serde_json::to_string(&player.properties) {
                    address.push('\0');
                    address.push_str(&properties);
                }
            }
            address
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::duplex;

    use super::*;
    use crate::{
        auth::{GameProfile, Property},
        connection::ConnectionSettings,
        protocol::ProtocolVersion,
    };

    fn player(properties: Vec<Property>) -> ConnectedPlayer {
        let (transport, _) = duplex(16);
        let conn = Connection::new(
            transport,
            "10.0.0.5:4000".parse().unwrap(),
            MinecraftCodec::new(Direction::Serverbound),
            Arc::new(ConnectionSettings::default()),
        );
        let mut profile = GameProfile::offline("steve");
        profile.properties = properties;
        ConnectedPlayer::new(profile, "10.0.0.5:4000".parse().unwrap(), ProtocolVersion::MAXIMUM, None, conn.handle())
    }

    #[tokio::test]
    async fn legacy_forwarding_packs_identity() {
        let backend = "127.0.0.1:30066".parse().unwrap();
        let steve = player(Vec::new());

        assert_eq!(handshake_address(PlayerInfoForwarding::None, &steve, backend), "127.0.0.1");
        assert_eq!(
            handshake_address(PlayerInfoForwarding::Legacy, &steve, backend),
            format!("127.0.0.1\x0010.0.0.5\x00{}", steve.uuid.simple())
        );

        let textured = player(vec![Property { name: "textures".to_owned(), value: "abc".to_owned(), signature: None }]);
        let address = handshake_address(PlayerInfoForwarding::Legacy, &textured, backend);
        assert!(address.ends_with("\x00[{\"name\":\"textures\",\"value\":\"abc\"}]"));
    }

    #[tokio::test]
    async fn completion_fires_once() {
        let (sender, receiver) = oneshot::channel();
        let mut completion = Completion(Some(sender));
        let mut moved = completion.take();
        completion.complete(ConnectResult::Failed("ignored".to_owned()));
        moved.complete(ConnectResult::Success);
        moved.complete(ConnectResult::Failed("ignored".to_owned()));
        assert_eq!(receiver.await.unwrap(), ConnectResult::Success);
    }
}
