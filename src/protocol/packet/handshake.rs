use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    error::ProtocolError,
    protocol::{
        buffer::{BufExt, BufMutExt},
        Direction, ProtocolVersion,
    },
};

use super::Packet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub protocol: i32,
    pub server_address: String,
    pub port: u16,
    pub next_state: i32,
}

impl Packet for Handshake {
    fn from_bytes(buf: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self, ProtocolError> {
        Ok(Self {
            protocol: buf.get_varint()?,
            server_address: buf.get_string(255)?,
            port: buf.read_u16()?,
            next_state: buf.get_varint()?,
        })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<(), ProtocolError> {
        buf.put_varint(self.protocol);
        buf.put_string(&self.server_address);
        buf.put_u16(self.port);
        buf.put_varint(self.next_state);
        Ok(())
    }
}
