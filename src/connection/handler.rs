use std::any::Any;

use anyhow::Result;
use log::error;

use crate::protocol::{
    legacy::LegacyPing,
    packet::{
        handshake::Handshake,
        login::{
            EncryptionRequest, EncryptionResponse, LoginPluginMessage, LoginPluginResponse, ServerLogin, ServerLoginSuccess,
            SetCompression,
        },
        play::{Chat, Disconnect, JoinGame, KeepAlive, PluginMessage},
        status::{StatusPing, StatusRequest, StatusResponse},
        PacketType, RawPacket,
    },
};

use super::Connection;

/// Phase and role specific reaction to decoded packets.
///
/// Each `handle_*` hook returns `true` when it consumed the packet. Packets
/// whose hook declined, and packets without a hook, go to `handle_generic`.
/// Frames the active registry has no decoder for go to `handle_unknown`.
#[allow(unused_variables)]
pub trait SessionHandler: Send {
    fn activated(&mut self, conn: &mut Connection) -> Result<()> {
        Ok(())
    }

    fn deactivated(&mut self, conn: &mut Connection) {}

    fn connected(&mut self, conn: &mut Connection) -> Result<()> {
        Ok(())
    }

    fn disconnected(&mut self, conn: &mut Connection) {}

    fn exception(&mut self, conn: &mut Connection, cause: &anyhow::Error) {
        error!("{}: exception caught: {:#}", conn, cause);
        conn.close();
    }

    fn writability_changed(&mut self, conn: &mut Connection) {}

    /// Receives values passed to [`super::ConnectionHandle::notify`].
    fn user_event(&mut self, conn: &mut Connection, event: Box<dyn Any + Send>) -> Result<()> {
        Ok(())
    }

    fn handle_handshake(&mut self, conn: &mut Connection, packet: &Handshake) -> Result<bool> {
        Ok(false)
    }

    fn handle_status_request(&mut self, conn: &mut Connection, packet: &StatusRequest) -> Result<bool> {
        Ok(false)
    }

    fn handle_status_response(&mut self, conn: &mut Connection, packet: &StatusResponse) -> Result<bool> {
        Ok(false)
    }

    fn handle_status_ping(&mut self, conn: &mut Connection, packet: &StatusPing) -> Result<bool> {
        Ok(false)
    }

    fn handle_server_login(&mut self, conn: &mut Connection, packet: &ServerLogin) -> Result<bool> {
        Ok(false)
    }

    fn handle_encryption_request(&mut self, conn: &mut Connection, packet: &EncryptionRequest) -> Result<bool> {
        Ok(false)
    }

    fn handle_encryption_response(&mut self, conn: &mut Connection, packet: &EncryptionResponse) -> Result<bool> {
        Ok(false)
    }

    fn handle_server_login_success(&mut self, conn: &mut Connection, packet: &ServerLoginSuccess) -> Result<bool> {
        Ok(false)
    }

    fn handle_set_compression(&mut self, conn: &mut Connection, packet: &SetCompression) -> Result<bool> {
        Ok(false)
    }

    fn handle_login_plugin_message(&mut self, conn: &mut Connection, packet: &LoginPluginMessage) -> Result<bool> {
        Ok(false)
    }

    fn handle_login_plugin_response(&mut self, conn: &mut Connection, packet: &LoginPluginResponse) -> Result<bool> {
        Ok(false)
    }

    fn handle_disconnect(&mut self, conn: &mut Connection, packet: &Disconnect) -> Result<bool> {
        Ok(false)
    }

    fn handle_keep_alive(&mut self, conn: &mut Connection, packet: &KeepAlive) -> Result<bool> {
        Ok(false)
    }

    fn handle_chat(&mut self, conn: &mut Connection, packet: &Chat) -> Result<bool> {
        Ok(false)
    }

    fn handle_plugin_message(&mut self, conn: &mut Connection, packet: &PluginMessage) -> Result<bool> {
        Ok(false)
    }

    fn handle_join_game(&mut self, conn: &mut Connection, packet: &JoinGame) -> Result<bool> {
        Ok(false)
    }

    fn handle_generic(&mut self, conn: &mut Connection, packet: PacketType) -> Result<()> {
        Ok(())
    }

    fn handle_unknown(&mut self, conn: &mut Connection, packet: RawPacket) -> Result<()> {
        Ok(())
    }

    fn handle_legacy_ping(&mut self, conn: &mut Connection, ping: LegacyPing) -> Result<()> {
        conn.close();
        Ok(())
    }

    fn handle_legacy_handshake(&mut self, conn: &mut Connection) -> Result<()> {
        conn.close();
        Ok(())
    }
}

pub fn dispatch(handler: &mut dyn SessionHandler, conn: &mut Connection, packet: PacketType) -> Result<()> {
    let handled = match &packet {
        PacketType::Handshake(p) => handler.handle_handshake(conn, p)?,
        PacketType::StatusRequest(p) => handler.handle_status_request(conn, p)?,
        PacketType::StatusResponse(p) => handler.handle_status_response(conn, p)?,
        PacketType::StatusPing(p) => handler.handle_status_ping(conn, p)?,
        PacketType::ServerLogin(p) => handler.handle_server_login(conn, p)?,
        PacketType::EncryptionRequest(p) => handler.handle_encryption_request(conn, p)?,
        PacketType::EncryptionResponse(p) => handler.handle_encryption_response(conn, p)?,
        PacketType::ServerLoginSuccess(p) => handler.handle_server_login_success(conn, p)?,
        PacketType::SetCompression(p) => handler.handle_set_compression(conn, p)?,
        PacketType::LoginPluginMessage(p) => handler.handle_login_plugin_message(conn, p)?,
        PacketType::LoginPluginResponse(p) => handler.handle_login_plugin_response(conn, p)?,
        PacketType::Disconnect(p) => handler.handle_disconnect(conn, p)?,
        PacketType::KeepAlive(p) => handler.handle_keep_alive(conn, p)?,
        PacketType::Chat(p) => handler.handle_chat(conn, p)?,
        PacketType::PluginMessage(p) => handler.handle_plugin_message(conn, p)?,
        PacketType::JoinGame(p) => handler.handle_join_game(conn, p)?,
        _ => false,
    };

    if handled {
        Ok(())
    } else {
        handler.handle_generic(conn, packet)
    }
}
