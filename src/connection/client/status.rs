use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::{
    connection::{handler::SessionHandler, Connection},
    protocol::{
        packet::{
            status::{StatusPing, StatusRequest, StatusResponse},
            PacketType, RawPacket,
        },
        ProtocolVersion,
    },
    proxy::ProxyServer,
};

/// Answers one status request, echoes the ping and hangs up.
pub struct StatusSessionHandler {
    proxy: Arc<ProxyServer>,
    version: ProtocolVersion,
    answered: bool,
}

impl StatusSessionHandler {
    pub fn new(proxy: Arc<ProxyServer>, version: ProtocolVersion) -> Self {
        Self { proxy, version, answered: false }
    }
}

impl SessionHandler for StatusSessionHandler {
    fn exception(&mut self, conn: &mut Connection, cause: &anyhow::Error) {
        debug!("{}: status request failed: {:#}", conn, cause);
        conn.close();
    }

    fn handle_status_request(&mut self, conn: &mut Connection, _: &StatusRequest) -> Result<bool> {
        if self.answered {
            debug!("{}: sent a second status request", conn);
            conn.close();
            return Ok(true);
        }
        self.answered = true;

        let ping = self.proxy.server_ping(self.version);
        conn.write(StatusResponse { status: serde_json::to_string(&ping)? })?;
        Ok(true)
    }

    fn handle_status_ping(&mut self, conn: &mut Connection, packet: &StatusPing) -> Result<bool> {
        conn.write(*packet)?;
        conn.close();
        Ok(true)
    }

    fn handle_generic(&mut self, conn: &mut Connection, _: PacketType) -> Result<()> {
        conn.close();
        Ok(())
    }

    fn handle_unknown(&mut self, conn: &mut Connection, _: RawPacket) -> Result<()> {
        conn.close();
        Ok(())
    }
}
