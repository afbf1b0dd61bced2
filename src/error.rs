use std::{io, string::FromUtf8Error};

use thiserror::Error;

use crate::protocol::{codec::pipeline::PipelineError, packet::PacketKind, Direction, ProtocolVersion};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("varint is too big")]
    VarIntTooBig,
    #[error("bad packet length {0}")]
    BadLength(i32),
    #[error("frame length {length} exceeds maximum of {max}")]
    FrameTooBig { length: usize, max: usize },
    #[error("packet ended early, {needed} more bytes expected")]
    EndOfPacket { needed: usize },
    #[error("{remaining} bytes left unread after {kind}")]
    TrailingBytes { kind: PacketKind, remaining: usize },
    #[error("string of {length} bytes is longer than {max}")]
    StringTooLong { length: usize, max: usize },
    #[error("negative length {0}")]
    NegativeLength(i32),
    #[error("could not get bool value from byte {0}")]
    InvalidBool(u8),
    #[error("invalid uuid: {0}")]
    InvalidUuid(#[from] uuid::Error),
    #[error(transparent)]
    Utf8(#[from] FromUtf8Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("claimed uncompressed size {size} is below threshold {threshold}")]
    BelowThreshold { size: usize, threshold: usize },
    #[error("claimed uncompressed size {size} is above cap {cap}")]
    AboveCap { size: usize, cap: usize },
    #[error("inflated {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("compression failed: {0}")]
    Compression(String),
    #[error("malformed proxy protocol header")]
    ProxyHeader,
    #[error("stage {stage} cannot process {input}")]
    StageOrder { stage: &'static str, input: &'static str },
    #[error("packet codec was removed, only raw frames can be written")]
    CodecRemoved,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// Errors that leave no trustworthy frame boundary to resynchronize on.
    /// Anything decoded inside a well formed frame is not one of them.
    pub fn is_frame_corruption(&self) -> bool {
        matches!(
            self,
            ProtocolError::VarIntTooBig
                | ProtocolError::BadLength(_)
                | ProtocolError::FrameTooBig { .. }
                | ProtocolError::ProxyHeader
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("at least one mapping must be provided for {0}")]
    NoMappings(PacketKind),
    #[error("cannot add a mapping for {0} after last valid mapping")]
    MappingAfterLastValid(PacketKind),
    #[error("last valid version of {kind} ({last}) is lower than its first version ({from})")]
    LastValidBeforeFrom { kind: PacketKind, from: ProtocolVersion, last: ProtocolVersion },
    #[error("next mapping version of {kind} ({to}) should be higher than current ({from})")]
    OutOfOrder { kind: PacketKind, from: ProtocolVersion, to: ProtocolVersion },
    #[error("{kind} is mapped from unregistered version {version:?}")]
    UnregisteredVersion { kind: PacketKind, version: ProtocolVersion },
    #[error("packet id {id:#04x} of {kind} is out of range")]
    IdOutOfRange { kind: PacketKind, id: u8 },
    #[error("can not register {kind} to id {id:#04x} for {version}, already used by {existing}")]
    IdConflict { kind: PacketKind, existing: PacketKind, id: u8, version: ProtocolVersion },
    #[error("{kind} is already registered for {version}")]
    DuplicateType { kind: PacketKind, version: ProtocolVersion },
    #[error("protocol version {0} is not supported in this phase")]
    UnsupportedVersion(ProtocolVersion),
    #[error("unable to find id for {kind} in {direction} registry")]
    UnknownPacketType { kind: PacketKind, direction: Direction },
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key length {0}, expected 16 bytes")]
    InvalidKeyLength(usize),
    #[error("encryption is already enabled")]
    AlreadyEnabled,
    #[error(transparent)]
    Rsa(#[from] rsa::Error),
    #[error("unable to encode public key: {0}")]
    KeyEncoding(String),
}

#[derive(Debug, Error)]
#[error("read timed out")]
pub struct ReadTimeout;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_framing_errors_are_corruption() {
        assert!(ProtocolError::VarIntTooBig.is_frame_corruption());
        assert!(ProtocolError::BadLength(-1).is_frame_corruption());
        assert!(ProtocolError::FrameTooBig { length: 11, max: 10 }.is_frame_corruption());

        let body = ProtocolError::TrailingBytes { kind: PacketKind::Handshake, remaining: 1 };
        assert!(!body.is_frame_corruption());
        assert!(!ProtocolError::InvalidBool(2).is_frame_corruption());
        assert!(!ProtocolError::EndOfPacket { needed: 3 }.is_frame_corruption());
        assert!(!ProtocolError::Compression("bad deflate".to_owned()).is_frame_corruption());
        assert!(!ProtocolError::CodecRemoved.is_frame_corruption());
    }
}
