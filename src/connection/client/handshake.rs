use std::sync::Arc;

use anyhow::Result;
use log::debug;

use crate::{
    component::Component,
    connection::{handler::SessionHandler, Connection},
    event::{EventResult, ProxyEvent},
    protocol::{
        codec::minecraft_codec::Outbound,
        legacy::LegacyPing,
        packet::{handshake::Handshake, PacketType, RawPacket},
        ProtocolVersion, State, LOGIN_ID, STATUS_ID,
    },
    proxy::ProxyServer,
};

use super::{login::LoginSessionHandler, status::StatusSessionHandler};

/// First handler of every client connection.
pub struct HandshakeSessionHandler {
    proxy: Arc<ProxyServer>,
}

impl HandshakeSessionHandler {
    pub fn new(proxy: Arc<ProxyServer>) -> Self {
        Self { proxy }
    }

    fn login(&self, conn: &mut Connection, handshake: &Handshake, version: ProtocolVersion) -> Result<()> {
        conn.set_next_protocol_version(version);
        conn.set_state(State::Login)?;

        if !version.is_valid() {
            let range = ProtocolVersion::version_range_string();
            let reason = if handshake.protocol < ProtocolVersion::MINIMUM.protocol() {
                format!("Outdated client! Please use {range}")
            } else {
                format!("Outdated server! I'm still on {range}")
            };
            conn.close_with(&Component::text(reason));
            return Ok(());
        }

        let virtual_host = clean_virtual_host(&handshake.server_address);
        let next = LoginSessionHandler::new(self.proxy.clone(), version, virtual_host.clone());

        if self.proxy.events().is_empty() {
            conn.set_session_handler(next);
            return Ok(());
        }

        let event = ProxyEvent::ConnectionHandshake {
            remote_address: conn.remote_address(),
            protocol_version: version,
            virtual_host,
        };
        let events = self.proxy.events().clone();
        let handle = conn.handle();
        conn.set_auto_read(false);
        tokio::spawn(async move {
            let result = events.fire(event).await;
            handle.execute(move |conn| match result {
                EventResult::Allowed => {
                    conn.set_auto_read(true);
                    conn.set_session_handler(next);
                }
                EventResult::Denied(reason) => conn.close_with(&reason),
            });
        });
        Ok(())
    }
}

impl SessionHandler for HandshakeSessionHandler {
    fn exception(&mut self, conn: &mut Connection, cause: &anyhow::Error) {
        debug!("{}: handshake failed: {:#}", conn, cause);
        conn.close();
    }

    fn handle_handshake(&mut self, conn: &mut Connection, packet: &Handshake) -> Result<bool> {
        let version = match ProtocolVersion::from_protocol(packet.protocol) {
            version if version.is_valid() => version,
            _ => ProtocolVersion::Unknown,
        };
        match packet.next_state {
            STATUS_ID => {
                conn.set_next_protocol_version(version);
                conn.set_state(State::Status)?;
                conn.set_session_handler(StatusSessionHandler::new(self.proxy.clone(), version));
            }
            LOGIN_ID => self.login(conn, packet, version)?,
            other => {
                debug!("{}: unknown next state {}", conn, other);
                conn.close();
            }
        }
        Ok(true)
    }

    fn handle_generic(&mut self, conn: &mut Connection, packet: PacketType) -> Result<()> {
        debug!("{}: unexpected {} during handshake", conn, packet.kind());
        conn.close();
        Ok(())
    }

    fn handle_unknown(&mut self, conn: &mut Connection, packet: RawPacket) -> Result<()> {
        debug!("{}: unknown packet {:#04x} during handshake", conn, packet.id);
        conn.close();
        Ok(())
    }

    fn handle_legacy_ping(&mut self, conn: &mut Connection, ping: LegacyPing) -> Result<()> {
        conn.set_protocol_version(ProtocolVersion::Legacy)?;
        let response = self.proxy.server_ping(ProtocolVersion::MAXIMUM).legacy_response(ping.version);
        conn.write(Outbound::Legacy(response))?;
        conn.close();
        Ok(())
    }

    fn handle_legacy_handshake(&mut self, conn: &mut Connection) -> Result<()> {
        conn.set_protocol_version(ProtocolVersion::Legacy)?;
        conn.close_with(&Component::text("Your client is extremely old. Please update to a newer version of Minecraft."));
        Ok(())
    }
}

/// Strips the data Forge and similar mods append after a NUL, and the
/// trailing dot of fully qualified names.
pub fn clean_virtual_host(address: &str) -> Option<String> {
    let host = match address.find('\0') {
        Some(end) => &address[..end],
        None => address,
    };
    let host = host.strip_suffix('.').unwrap_or(host);
    (!host.is_empty()).then(|| host.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn virtual_hosts_are_cleaned() {
        assert_eq!(clean_virtual_host("play.example.com"), Some("play.example.com".to_owned()));
        assert_eq!(clean_virtual_host("play.example.com."), Some("play.example.com".to_owned()));
        assert_eq!(clean_virtual_host("play.example.com\0FML\0"), Some("play.example.com".to_owned()));
        assert_eq!(clean_virtual_host("\0FML2\0"), None);
        assert_eq!(clean_virtual_host(""), None);
    }
}
