use std::sync::Arc;

use anyhow::Result;
use log::error;

use crate::{
    connection::{handler::SessionHandler, player::ConnectedPlayer, Connection},
    protocol::packet::{
        play::{Disconnect, PluginMessage},
        PacketType, RawPacket,
    },
};

use super::BackendEvent;

const BRAND_SUFFIX: &str = concat!(" (", env!("CARGO_PKG_NAME"), ")");

/// Relays a joined backend to the player's client.
pub struct BackendPlaySessionHandler {
    player: Arc<ConnectedPlayer>,
    id: u64,
}

impl BackendPlaySessionHandler {
    pub fn new(player: Arc<ConnectedPlayer>, id: u64) -> Self {
        Self { player, id }
    }
}

impl SessionHandler for BackendPlaySessionHandler {
    fn activated(&mut self, conn: &mut Connection) -> Result<()> {
        if !self.player.is_active() {
            conn.close();
        }
        Ok(())
    }

    fn exception(&mut self, conn: &mut Connection, cause: &anyhow::Error) {
        error!("{}: exception caught: {:#}", conn, cause);
        conn.close();
    }

    fn disconnected(&mut self, _: &mut Connection) {
        self.player.client().notify(BackendEvent::Lost { id: self.id });
    }

    fn writability_changed(&mut self, conn: &mut Connection) {
        let writable = conn.is_writable();
        self.player.client().execute(move |client| client.set_auto_read(writable));
    }

    fn handle_disconnect(&mut self, conn: &mut Connection, packet: &Disconnect) -> Result<bool> {
        self.player.client().notify(BackendEvent::Kicked { id: self.id, reason: packet.reason() });
        conn.close();
        Ok(true)
    }

    fn handle_plugin_message(&mut self, conn: &mut Connection, packet: &PluginMessage) -> Result<bool> {
        if !packet.is_brand() {
            return Ok(false);
        }
        self.player.client().write(packet.rewrite_brand(BRAND_SUFFIX, conn.protocol_version())?);
        Ok(true)
    }

    fn handle_generic(&mut self, _: &mut Connection, packet: PacketType) -> Result<()> {
        self.player.client().write(packet);
        Ok(())
    }

    fn handle_unknown(&mut self, _: &mut Connection, packet: RawPacket) -> Result<()> {
        self.player.client().write_raw(packet);
        Ok(())
    }
}
