use std::sync::Arc;

use anyhow::{bail, ensure, Result};
use bytes::Bytes;
use log::{debug, error, info};

use crate::{
    auth::{self, GameProfile, VERIFY_TOKEN_LENGTH},
    component::Component,
    connection::{handler::SessionHandler, player::ConnectedPlayer, Connection},
    event::{EventResult, ProxyEvent},
    protocol::{
        packet::{
            login::{EncryptionRequest, EncryptionResponse, ServerLogin, ServerLoginSuccess, SetCompression},
            PacketType, RawPacket,
        },
        ProtocolVersion, State,
    },
    proxy::ProxyServer,
};

use super::initial::{connect_initial, InitialConnectSessionHandler};

/// Results of the async steps of a login, delivered back through
/// [`crate::connection::ConnectionHandle::notify`].
enum LoginEvent {
    PreLogin(EventResult),
    Authenticated(Result<Option<GameProfile>>),
}

pub struct LoginSessionHandler {
    proxy: Arc<ProxyServer>,
    version: ProtocolVersion,
    virtual_host: Option<String>,
    username: Option<String>,
    verify_token: Option<[u8; VERIFY_TOKEN_LENGTH]>,
}

impl LoginSessionHandler {
    pub fn new(proxy: Arc<ProxyServer>, version: ProtocolVersion, virtual_host: Option<String>) -> Self {
        Self { proxy, version, virtual_host, username: None, verify_token: None }
    }

    fn username(&self) -> Result<&str> {
        match &self.username {
            Some(username) => Ok(username),
            None => bail!("no login start received"),
        }
    }

    fn pre_login_allowed(&mut self, conn: &mut Connection) -> Result<()> {
        conn.set_auto_read(true);
        if !self.proxy.config().online_mode {
            let profile = GameProfile::offline(self.username()?);
            return self.finish(conn, profile);
        }

        let verify_token: [u8; VERIFY_TOKEN_LENGTH] = rand::random();
        self.verify_token = Some(verify_token);
        conn.write(EncryptionRequest {
            server_id: String::new(),
            public_key: Bytes::copy_from_slice(self.proxy.key_pair()?.public_key()),
            verify_token: Bytes::copy_from_slice(&verify_token),
        })?;
        Ok(())
    }

    fn authenticated(&mut self, conn: &mut Connection, result: Result<Option<GameProfile>>) -> Result<()> {
        match result {
            Ok(Some(profile)) => {
                conn.set_auto_read(true);
                self.finish(conn, profile)
            }
            Ok(None) => {
                info!("{}: {} failed session verification", conn, self.username()?);
                conn.close_with(&Component::text("This server is in online mode, you must be logged in to play."));
                Ok(())
            }
            Err(err) => {
                error!("{}: unable to authenticate {}: {:#}", conn, self.username()?, err);
                conn.close_with(&Component::text("Unable to authenticate you with Mojang. Please try again later."));
                Ok(())
            }
        }
    }

    fn finish(&mut self, conn: &mut Connection, profile: GameProfile) -> Result<()> {
        let player = Arc::new(ConnectedPlayer::new(
            profile,
            conn.remote_address(),
            self.version,
            self.virtual_host.take(),
            conn.handle(),
        ));
        if !self.proxy.register_player(player.clone()) {
            conn.close_with(&Component::text("You are already connected to this proxy!"));
            return Ok(());
        }
        conn.set_session_handler(InitialConnectSessionHandler::new(self.proxy.clone(), player.clone()));

        let threshold = self.proxy.settings().compression_threshold;
        if threshold >= 0 && self.version >= ProtocolVersion::V1_8 {
            conn.write(SetCompression { threshold })?;
            conn.enable_compression(threshold)?;
        }
        conn.write(ServerLoginSuccess { uuid: player.uuid, username: player.username.clone() })?;
        conn.set_state(State::Play)?;
        conn.set_player_name(&player.username);
        info!("{} ({}) has connected", player, player.remote_address);

        self.proxy
            .events()
            .fire_and_forget(ProxyEvent::LoginSuccess { username: player.username.clone(), uuid: player.uuid });
        tokio::spawn(connect_initial(self.proxy.clone(), player));
        Ok(())
    }
}

impl SessionHandler for LoginSessionHandler {
    fn exception(&mut self, conn: &mut Connection, cause: &anyhow::Error) {
        debug!("{}: login failed: {:#}", conn, cause);
        conn.close();
    }

    fn user_event(&mut self, conn: &mut Connection, event: Box<dyn std::any::Any + Send>) -> Result<()> {
        let Ok(event) = event.downcast::<LoginEvent>() else {
            return Ok(());
        };
        match *event {
            LoginEvent::PreLogin(EventResult::Allowed) => self.pre_login_allowed(conn),
            LoginEvent::PreLogin(EventResult::Denied(reason)) => {
                conn.close_with(&reason);
                Ok(())
            }
            LoginEvent::Authenticated(result) => self.authenticated(conn, result),
        }
    }

    fn handle_server_login(&mut self, conn: &mut Connection, packet: &ServerLogin) -> Result<bool> {
        ensure!(self.username.is_none(), "duplicate login start");
        if !auth::is_valid_username(&packet.username) {
            conn.close_with(&Component::text("Invalid username."));
            return Ok(true);
        }
        self.username = Some(packet.username.clone());

        let event = ProxyEvent::PreLogin { remote_address: conn.remote_address(), username: packet.username.clone() };
        let events = self.proxy.events().clone();
        let handle = conn.handle();
        conn.set_auto_read(false);
        tokio::spawn(async move {
            let result = events.fire(event).await;
            handle.notify(LoginEvent::PreLogin(result));
        });
        Ok(true)
    }

    fn handle_encryption_response(&mut self, conn: &mut Connection, packet: &EncryptionResponse) -> Result<bool> {
        let Some(expected) = self.verify_token.take() else {
            bail!("unexpected encryption response");
        };
        let keys = self.proxy.key_pair()?;
        ensure!(keys.decrypt(&packet.verify_token)? == expected, "verify token mismatch");

        let secret = keys.decrypt(&packet.shared_secret)?;
        conn.enable_encryption(&secret)?;

        let server_hash = auth::server_id_hash("", &secret, keys.public_key());
        let username = self.username()?.to_owned();
        let http = self.proxy.http().clone();
        let handle = conn.handle();
        conn.set_auto_read(false);
        tokio::spawn(async move {
            let result = auth::has_joined(&http, &username, &server_hash).await;
            handle.notify(LoginEvent::Authenticated(result));
        });
        Ok(true)
    }

    fn handle_generic(&mut self, conn: &mut Connection, packet: PacketType) -> Result<()> {
        debug!("{}: unexpected {} during login", conn, packet.kind());
        conn.close();
        Ok(())
    }

    fn handle_unknown(&mut self, conn: &mut Connection, packet: RawPacket) -> Result<()> {
        debug!("{}: unknown packet {:#04x} during login", conn, packet.id);
        conn.close();
        Ok(())
    }
}
