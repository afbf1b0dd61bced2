use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::{
    error::ProtocolError,
    protocol::{
        buffer::{BufExt, BufMutExt},
        Direction, ProtocolVersion,
    },
};

use super::Packet;

type Result<T> = std::result::Result<T, ProtocolError>;

fn get_array(buf: &mut Bytes, version: ProtocolVersion) -> Result<Bytes> {
    if version >= ProtocolVersion::V1_8 {
        buf.get_byte_array()
    } else {
        buf.get_short_byte_array()
    }
}

fn put_array(buf: &mut BytesMut, bytes: &[u8], version: ProtocolVersion) {
    if version >= ProtocolVersion::V1_8 {
        buf.put_byte_array(bytes)
    } else {
        buf.put_short_byte_array(bytes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLogin {
    pub username: String,
}

impl Packet for ServerLogin {
    fn from_bytes(buf: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self> {
        Ok(Self { username: buf.get_string(16)? })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<()> {
        buf.put_string(&self.username);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionRequest {
    pub server_id: String,
    pub public_key: Bytes,
    pub verify_token: Bytes,
}

impl Packet for EncryptionRequest {
    fn from_bytes(buf: &mut Bytes, _: Direction, version: ProtocolVersion) -> Result<Self> {
        Ok(Self {
            server_id: buf.get_string(20)?,
            public_key: get_array(buf, version)?,
            verify_token: get_array(buf, version)?,
        })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, version: ProtocolVersion) -> Result<()> {
        buf.put_string(&self.server_id);
        put_array(buf, &self.public_key, version);
        put_array(buf, &self.verify_token, version);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionResponse {
    pub shared_secret: Bytes,
    pub verify_token: Bytes,
}

impl Packet for EncryptionResponse {
    fn from_bytes(buf: &mut Bytes, _: Direction, version: ProtocolVersion) -> Result<Self> {
        Ok(Self {
            shared_secret: get_array(buf, version)?,
            verify_token: get_array(buf, version)?,
        })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, version: ProtocolVersion) -> Result<()> {
        put_array(buf, &self.shared_secret, version);
        put_array(buf, &self.verify_token, version);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerLoginSuccess {
    pub uuid: Uuid,
    pub username: String,
}

impl Packet for ServerLoginSuccess {
    fn from_bytes(buf: &mut Bytes, _: Direction, version: ProtocolVersion) -> Result<Self> {
        let uuid = if version >= ProtocolVersion::V1_16 {
            buf.get_uuid()?
        } else {
            Uuid::parse_str(&buf.get_string(36)?)?
        };

        Ok(Self { uuid, username: buf.get_string(16)? })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, version: ProtocolVersion) -> Result<()> {
        if version >= ProtocolVersion::V1_16 {
            buf.put_uuid(self.uuid);
        } else if version >= ProtocolVersion::V1_7_6 {
            buf.put_string(&self.uuid.hyphenated().to_string());
        } else {
            buf.put_string(&self.uuid.simple().to_string());
        }
        buf.put_string(&self.username);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetCompression {
    pub threshold: i32,
}

impl Packet for SetCompression {
    fn from_bytes(buf: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self> {
        Ok(Self { threshold: buf.get_varint()? })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<()> {
        buf.put_varint(self.threshold);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPluginMessage {
    pub id: i32,
    pub channel: String,
    pub data: Bytes,
}

impl Packet for LoginPluginMessage {
    fn from_bytes(buf: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self> {
        Ok(Self {
            id: buf.get_varint()?,
            channel: buf.get_identifier()?,
            data: buf.get_rest(),
        })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<()> {
        buf.put_varint(self.id);
        buf.put_string(&self.channel);
        buf.put_slice(&self.data);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPluginResponse {
    pub id: i32,
    pub success: bool,
    pub data: Bytes,
}

impl Packet for LoginPluginResponse {
    fn from_bytes(buf: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self> {
        Ok(Self {
            id: buf.get_varint()?,
            success: buf.read_bool()?,
            data: buf.get_rest(),
        })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<()> {
        buf.put_varint(self.id);
        buf.put_bool(self.success);
        buf.put_slice(&self.data);
        Ok(())
    }
}
