use std::{any::Any, sync::Arc};

use anyhow::Result;
use log::{debug, info, warn};

use crate::{
    component::Component,
    connection::{
        backend::{self, BackendEvent, ConnectResult},
        handler::SessionHandler,
        player::ConnectedPlayer,
        Connection,
    },
    protocol::packet::{PacketType, RawPacket},
    proxy::ProxyServer,
};

use super::play::ClientPlaySessionHandler;

/// Holds a logged-in client until its first backend sends JoinGame.
pub struct InitialConnectSessionHandler {
    proxy: Arc<ProxyServer>,
    player: Arc<ConnectedPlayer>,
}

impl InitialConnectSessionHandler {
    pub fn new(proxy: Arc<ProxyServer>, player: Arc<ConnectedPlayer>) -> Self {
        Self { proxy, player }
    }
}

impl SessionHandler for InitialConnectSessionHandler {
    fn exception(&mut self, conn: &mut Connection, cause: &anyhow::Error) {
        debug!("{}: exception while connecting: {:#}", conn, cause);
        conn.close();
    }

    fn disconnected(&mut self, _: &mut Connection) {
        self.proxy.player_disconnected(&self.player);
    }

    fn user_event(&mut self, conn: &mut Connection, event: Box<dyn Any + Send>) -> Result<()> {
        let Ok(event) = event.downcast::<BackendEvent>() else {
            return Ok(());
        };
        if let BackendEvent::Joined { backend, join_game } = *event {
            conn.set_session_handler(ClientPlaySessionHandler::new(self.proxy.clone(), self.player.clone(), backend));
            conn.write(join_game)?;
        }
        Ok(())
    }

    fn handle_generic(&mut self, conn: &mut Connection, packet: PacketType) -> Result<()> {
        debug!("{}: dropping {} before joining a server", conn, packet.kind());
        Ok(())
    }

    fn handle_unknown(&mut self, _: &mut Connection, _: RawPacket) -> Result<()> {
        Ok(())
    }
}

/// Tries the configured servers in order until one accepts the player.
pub async fn connect_initial(proxy: Arc<ProxyServer>, player: Arc<ConnectedPlayer>) {
    let mut last_failure = None;

    for server in &proxy.config().attempt_connection_order {
        if !player.is_active() {
            return;
        }
        match backend::connect(&proxy, &player, server).await {
            ConnectResult::Success => return,
            ConnectResult::Kicked(reason) => {
                info!("{} was kicked from {}: {}", player, server, reason.to_legacy_string());
                last_failure = Some(reason);
            }
            ConnectResult::Failed(cause) => {
                warn!("{} was unable to connect to {}: {}", player, server, cause);
                last_failure = Some(Component::text(format!("Unable to connect you to {server}. Please try again later.")));
            }
        }
    }

    player.disconnect(last_failure.unwrap_or_else(|| Component::text("No available servers.")));
}
