use std::{fmt, net::SocketAddr};

use uuid::Uuid;

use crate::{
    auth::{GameProfile, Property},
    component::Component,
    protocol::{packet::play::Chat, ProtocolVersion},
};

use super::ConnectionHandle;

/// A logged-in client as seen from outside its connection task.
pub struct ConnectedPlayer {
    pub username: String,
    pub uuid: Uuid,
    pub properties: Vec<Property>,
    pub remote_address: SocketAddr,
    pub protocol_version: ProtocolVersion,
    pub virtual_host: Option<String>,
    client: ConnectionHandle,
}

impl ConnectedPlayer {
    pub fn new(
        profile: GameProfile,
        remote_address: SocketAddr,
        protocol_version: ProtocolVersion,
        virtual_host: Option<String>,
        client: ConnectionHandle,
    ) -> Self {
        Self {
            username: profile.name,
            uuid: profile.id,
            properties: profile.properties,
            remote_address,
            protocol_version,
            virtual_host,
            client,
        }
    }

    pub fn client(&self) -> &ConnectionHandle {
        &self.client
    }

    pub fn is_active(&self) -> bool {
        !self.client.is_closed()
    }

    pub fn disconnect(&self, reason: Component) {
        self.client.close_with(reason);
    }

    pub fn send_message(&self, message: &Component) {
        self.client.write(Chat::system(message));
    }
}

impl fmt::Display for ConnectedPlayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}
