use std::{any::Any, sync::Arc};

use anyhow::Result;
use log::{error, info};

use crate::{
    component::{Color, Component},
    connection::{
        backend::{self, BackendConnection, BackendEvent, ConnectResult},
        handler::SessionHandler,
        player::ConnectedPlayer,
        Connection,
    },
    protocol::packet::{play::Chat, PacketType, RawPacket},
    proxy::ProxyServer,
};

const SERVER_COMMAND: &str = "/server";

/// Relays a playing client to its current backend.
pub struct ClientPlaySessionHandler {
    proxy: Arc<ProxyServer>,
    player: Arc<ConnectedPlayer>,
    backend: BackendConnection,
}

impl ClientPlaySessionHandler {
    pub fn new(proxy: Arc<ProxyServer>, player: Arc<ConnectedPlayer>, backend: BackendConnection) -> Self {
        Self { proxy, player, backend }
    }

    fn server_command(&mut self, conn: &mut Connection, target: &str) -> Result<()> {
        if target.is_empty() {
            let servers: Vec<&str> = self.proxy.config().servers.keys().map(String::as_str).collect();
            let message = format!(
                "You are currently connected to {}. Available servers: {}",
                self.backend.server,
                servers.join(", ")
            );
            conn.write(Chat::system(&Component::text(message).color(Color::Yellow)))?;
            return Ok(());
        }

        if target == self.backend.server {
            conn.write(Chat::system(&Component::text("You are already connected to this server!").color(Color::Red)))?;
            return Ok(());
        }
        if self.proxy.config().server(target).is_none() {
            conn.write(Chat::system(&Component::text(format!("Server {target} does not exist.")).color(Color::Red)))?;
            return Ok(());
        }

        conn.write(Chat::system(&Component::text(format!("Connecting you to {target}...")).color(Color::Yellow)))?;
        let (proxy, player, server) = (self.proxy.clone(), self.player.clone(), target.to_owned());
        tokio::spawn(async move {
            let failure = match backend::connect(&proxy, &player, &server).await {
                ConnectResult::Success => return,
                ConnectResult::Kicked(reason) => {
                    let mut message = Component::text(format!("Unable to connect to {server}: ")).color(Color::Red);
                    message.push(reason);
                    message
                }
                ConnectResult::Failed(cause) => {
                    info!("{} was unable to connect to {}: {}", player, server, cause);
                    Component::text(format!("Unable to connect to {server}. Try again later.")).color(Color::Red)
                }
            };
            player.send_message(&failure);
        });
        Ok(())
    }
}

impl SessionHandler for ClientPlaySessionHandler {
    fn exception(&mut self, conn: &mut Connection, cause: &anyhow::Error) {
        error!("{}: exception caught: {:#}", conn, cause);
        conn.close();
    }

    fn disconnected(&mut self, _: &mut Connection) {
        self.backend.handle.close();
        self.proxy.player_disconnected(&self.player);
    }

    fn writability_changed(&mut self, conn: &mut Connection) {
        let writable = conn.is_writable();
        self.backend.handle.execute(move |backend| backend.set_auto_read(writable));
    }

    fn user_event(&mut self, conn: &mut Connection, event: Box<dyn Any + Send>) -> Result<()> {
        let Ok(event) = event.downcast::<BackendEvent>() else {
            return Ok(());
        };
        match *event {
            BackendEvent::Joined { backend, join_game } => {
                info!("{} switched from {} to {}", self.player, self.backend.server, backend.server);
                self.backend.handle.close();
                conn.set_session_handler(ClientPlaySessionHandler::new(self.proxy.clone(), self.player.clone(), backend));
                conn.write(join_game)?;
            }
            BackendEvent::Kicked { id, reason } if id == self.backend.id => {
                info!("{} was kicked from {}: {}", self.player, self.backend.server, reason.to_legacy_string());
                conn.close_with(&reason);
            }
            BackendEvent::Lost { id } if id == self.backend.id => {
                conn.close_with(&Component::text(format!("Lost connection to {}.", self.backend.server)));
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_chat(&mut self, conn: &mut Connection, packet: &Chat) -> Result<bool> {
        let Some(rest) = packet.message.strip_prefix(SERVER_COMMAND) else {
            return Ok(false);
        };
        if !rest.is_empty() && !rest.starts_with(' ') {
            return Ok(false);
        }
        self.server_command(conn, rest.trim())?;
        Ok(true)
    }

    fn handle_generic(&mut self, _: &mut Connection, packet: PacketType) -> Result<()> {
        self.backend.handle.write(packet);
        Ok(())
    }

    fn handle_unknown(&mut self, _: &mut Connection, packet: RawPacket) -> Result<()> {
        self.backend.handle.write_raw(packet);
        Ok(())
    }
}
