use std::sync::Arc;

use anyhow::Result;
use log::{debug, info};

use crate::{
    connection::{handler::SessionHandler, player::ConnectedPlayer, Connection},
    event::ProxyEvent,
    protocol::packet::play::{Disconnect, JoinGame, KeepAlive},
    proxy::ProxyServer,
};

use super::{play::BackendPlaySessionHandler, BackendConnection, BackendEvent, Completion, ConnectResult};

/// Bridges a backend from login success to its JoinGame.
pub struct TransitionSessionHandler {
    proxy: Arc<ProxyServer>,
    player: Arc<ConnectedPlayer>,
    server: String,
    id: u64,
    completion: Completion,
}

impl TransitionSessionHandler {
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

impl SessionHandler for TransitionSessionHandler {
    fn exception(&mut self, conn: &mut Connection, cause: &anyhow::Error) {
        debug!("{}: joining backend failed: {:#}", conn, cause);
        self.completion.complete(ConnectResult::Failed(format!("{cause:#}")));
        conn.close();
    }

    fn disconnected(&mut self, _: &mut Connection) {
        self.completion.complete(ConnectResult::Failed("disconnected before joining".to_owned()));
    }

    fn handle_keep_alive(&mut self, conn: &mut Connection, packet: &KeepAlive) -> Result<bool> {
        conn.write(*packet)?;
        Ok(true)
    }

    fn handle_disconnect(&mut self, conn: &mut Connection, packet: &Disconnect) -> Result<bool> {
        self.completion.complete(ConnectResult::Kicked(packet.reason()));
        conn.close();
        Ok(true)
    }

    fn handle_join_game(&mut self, conn: &mut Connection, packet: &JoinGame) -> Result<bool> {
        if !self.player.is_active() {
            self.completion.complete(ConnectResult::Failed("player disconnected".to_owned()));
            conn.close();
            return Ok(true);
        }

        let backend = BackendConnection { id: self.id, server: self.server.clone(), handle: conn.handle() };
        self.player.client().notify(BackendEvent::Joined { backend, join_game: packet.clone() });
        self.completion.complete(ConnectResult::Success);

        info!("{} has connected to {}", self.player, self.server);
        self.proxy.events().fire_and_forget(ProxyEvent::ServerConnected {
            username: self.player.username.clone(),
            server: self.server.clone(),
        });
        conn.set_session_handler(BackendPlaySessionHandler::new(self.player.clone(), self.id));
        Ok(true)
    }
}
