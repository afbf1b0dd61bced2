use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::{
    component::Component,
    error::ProtocolError,
    protocol::{
        buffer::{BufExt, BufMutExt},
        Direction, ProtocolVersion,
    },
};

use super::Packet;

type Result<T> = std::result::Result<T, ProtocolError>;

pub const CHAT_POSITION_CHAT: u8 = 0;
pub const CHAT_POSITION_SYSTEM: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    pub reason: String,
}

impl Disconnect {
    pub fn new(reason: &Component) -> Self {
        Self { reason: reason.to_json() }
    }

    pub fn reason(&self) -> Component {
        serde_json::from_str(&self.reason).unwrap_or_else(|_| Component::text(self.reason.clone()))
    }
}

impl Packet for Disconnect {
    fn from_bytes(buf: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self> {
        Ok(Self { reason: buf.get_string(262144)? })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<()> {
        buf.put_string(&self.reason);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub id: i64,
}

impl Packet for KeepAlive {
    fn from_bytes(buf: &mut Bytes, _: Direction, version: ProtocolVersion) -> Result<Self> {
        let id = if version >= ProtocolVersion::V1_12_2 {
            buf.read_i64()?
        } else if version >= ProtocolVersion::V1_8 {
            buf.get_varint()? as i64
        } else {
            buf.read_i32()? as i64
        };
        Ok(Self { id })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, version: ProtocolVersion) -> Result<()> {
        if version >= ProtocolVersion::V1_12_2 {
            buf.put_i64(self.id);
        } else if version >= ProtocolVersion::V1_8 {
            buf.put_varint(self.id as i32);
        } else {
            buf.put_i32(self.id as i32);
        }
        Ok(())
    }
}

/// Serverbound it carries the typed message, clientbound a JSON component
/// plus the position and, from 1.16, the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub message: String,
    pub position: u8,
    pub sender: Uuid,
}

impl Chat {
    pub fn serverbound(message: impl Into<String>) -> Self {
        Self { message: message.into(), position: CHAT_POSITION_CHAT, sender: Uuid::nil() }
    }

    pub fn system(message: &Component) -> Self {
        Self { message: message.to_json(), position: CHAT_POSITION_SYSTEM, sender: Uuid::nil() }
    }

    const fn max_serverbound_length(version: ProtocolVersion) -> usize {
        if version as i32 >= ProtocolVersion::V1_11 as i32 {
            256
        } else {
            100
        }
    }
}

impl Packet for Chat {
    fn from_bytes(buf: &mut Bytes, direction: Direction, version: ProtocolVersion) -> Result<Self> {
        match direction {
            Direction::Serverbound => Ok(Self::serverbound(buf.get_string(Self::max_serverbound_length(version))?)),
            Direction::Clientbound => {
                let message = buf.get_string(262144)?;
                let position = if version >= ProtocolVersion::V1_8 { buf.read_u8()? } else { CHAT_POSITION_CHAT };
                let sender = if version >= ProtocolVersion::V1_16 { buf.get_uuid()? } else { Uuid::nil() };
                Ok(Self { message, position, sender })
            }
        }
    }

    fn put_buf(&self, buf: &mut BytesMut, direction: Direction, version: ProtocolVersion) -> Result<()> {
        buf.put_string(&self.message);
        if direction == Direction::Clientbound {
            if version >= ProtocolVersion::V1_8 {
                buf.put_u8(self.position);
            }
            if version >= ProtocolVersion::V1_16 {
                buf.put_uuid(self.sender);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginMessage {
    pub channel: String,
    pub data: Bytes,
}

impl PluginMessage {
    pub fn is_brand(&self) -> bool {
        self.channel == "minecraft:brand" || self.channel == "MC|Brand"
    }

    /// Appends `suffix` to the server brand, keeping the version's string encoding.
    pub fn rewrite_brand(&self, suffix: &str, version: ProtocolVersion) -> Result<Self> {
        let mut data = self.data.clone();
        let mut brand = if version >= ProtocolVersion::V1_8 {
            data.get_string(32767)?
        } else {
            String::from_utf8(data.to_vec())?
        };
        brand.push_str(suffix);

        let mut rewritten = BytesMut::with_capacity(brand.len() + 5);
        if version >= ProtocolVersion::V1_8 {
            rewritten.put_string(&brand);
        } else {
            rewritten.put_slice(brand.as_bytes());
        }
        Ok(Self { channel: self.channel.clone(), data: rewritten.freeze() })
    }
}

impl Packet for PluginMessage {
    fn from_bytes(buf: &mut Bytes, _: Direction, version: ProtocolVersion) -> Result<Self> {
        let channel = buf.get_identifier()?;
        let data = if version >= ProtocolVersion::V1_8 {
            buf.get_rest()
        } else {
            buf.get_short_byte_array()?
        };
        Ok(Self { channel, data })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, version: ProtocolVersion) -> Result<()> {
        buf.put_string(&self.channel);
        if version >= ProtocolVersion::V1_8 {
            buf.put_slice(&self.data);
        } else {
            buf.put_short_byte_array(&self.data);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinGame {
    pub entity_id: i32,
    pub rest: Bytes,
}

impl Packet for JoinGame {
    fn from_bytes(buf: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self> {
        Ok(Self { entity_id: buf.read_i32()?, rest: buf.get_rest() })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<()> {
        buf.put_i32(self.entity_id);
        buf.put_slice(&self.rest);
        Ok(())
    }
}

/// Body of packets the proxy never inspects.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Opaque {
    pub data: Bytes,
}

impl Packet for Opaque {
    fn from_bytes(buf: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self> {
        Ok(Self { data: buf.get_rest() })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<()> {
        buf.put_slice(&self.data);
        Ok(())
    }
}
