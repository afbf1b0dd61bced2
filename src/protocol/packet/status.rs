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
pub struct StatusRequest;

impl Packet for StatusRequest {
    fn from_bytes(_: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self, ProtocolError> {
        Ok(Self)
    }

    fn put_buf(&self, _: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<(), ProtocolError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

impl Packet for StatusResponse {
    fn from_bytes(buf: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self, ProtocolError> {
        Ok(Self { status: buf.get_string(32767)? })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<(), ProtocolError> {
        buf.put_string(&self.status);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPing {
    pub payload: i64,
}

impl Packet for StatusPing {
    fn from_bytes(buf: &mut Bytes, _: Direction, _: ProtocolVersion) -> Result<Self, ProtocolError> {
        Ok(Self { payload: buf.read_i64()? })
    }

    fn put_buf(&self, buf: &mut BytesMut, _: Direction, _: ProtocolVersion) -> Result<(), ProtocolError> {
        buf.put_i64(self.payload);
        Ok(())
    }
}
