use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use log::{debug, warn};

use crate::{
    connection::{handler::SessionHandler, player::ConnectedPlayer, Connection},
    protocol::{
        packet::{
            login::{EncryptionRequest, LoginPluginMessage, LoginPluginResponse, ServerLoginSuccess, SetCompression},
            play::Disconnect,
        },
        State,
    },
    proxy::ProxyServer,
};

use super::{transition::TransitionSessionHandler, Completion, ConnectResult};

/// Logs the player into a backend on their behalf.
pub struct BackendLoginSessionHandler {
    proxy: Arc<ProxyServer>,
    player: Arc<ConnectedPlayer>,
    server: String,
    id: u64,
    completion: Completion,
}

impl BackendLoginSessionHandler {
    pub(crate) fn new(
        proxy: Arc<ProxyServer>,
        player: Arc<ConnectedPlayer>,
        server: String,
        id: u64,
        completion: Completion,
    ) -> Self {
        Self { proxy, player, server, id, completion }
    }
}

impl SessionHandler for BackendLoginSessionHandler {
    fn exception(&mut self, conn: &mut Connection, cause: &anyhow::Error) {
        debug!("{}: login to backend failed: {:#}", conn, cause);
        self.completion.complete(ConnectResult::Failed(format!("{cause:#}")));
        conn.close();
    }

    fn disconnected(&mut self, _: &mut Connection) {
        self.completion.complete(ConnectResult::Failed("disconnected during login".to_owned()));
    }

    fn handle_encryption_request(&mut self, conn: &mut Connection, _: &EncryptionRequest) -> Result<bool> {
        warn!("{}: {} is in online mode, set online-mode=false on the backend", conn, self.server);
        self.completion.complete(ConnectResult::Failed(format!("{} is in online mode", self.server)));
        conn.close();
        Ok(true)
    }

    fn handle_login_plugin_message(&mut self, conn: &mut Connection, packet: &LoginPluginMessage) -> Result<bool> {
        conn.write(LoginPluginResponse { id: packet.id, success: false, data: Bytes::new() })?;
        Ok(true)
    }

    fn handle_set_compression(&mut self, conn: &mut Connection, packet: &SetCompression) -> Result<bool> {
        conn.enable_compression(packet.threshold)?;
        Ok(true)
    }

    fn handle_disconnect(&mut self, conn: &mut Connection, packet: &Disconnect) -> Result<bool> {
        self.completion.complete(ConnectResult::Kicked(packet.reason()));
        conn.close();
        Ok(true)
    }

    fn handle_server_login_success(&mut self, conn: &mut Connection, _: &ServerLoginSuccess) -> Result<bool> {
        conn.set_state(State::Play)?;
        conn.set_session_handler(TransitionSessionHandler::new(
            self.proxy.clone(),
            self.player.clone(),
            self.server.clone(),
            self.id,
            self.completion.take(),
        ));
        Ok(true)
    }
}
