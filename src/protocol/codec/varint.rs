use crate::{error::ProtocolError, protocol::buffer::MAX_VARINT_LENGTH};

pub const MAX_FRAME_LENGTH: usize = 2097151;
pub const MAX_UNCOMPRESSED_LENGTH: usize = 8 * 1024 * 1024;

/// Reads a VarInt from the front of `src` without consuming it. Returns the
/// value and its encoded length, or `None` while more bytes are needed.
#[inline(always)]
pub fn peek_varint(src: &[u8]) -> Result<Option<(i32, usize)>, ProtocolError> {
    let mut value = 0;

    for (i, &byte) in src.iter().take(MAX_VARINT_LENGTH).enumerate() {
        value |= ((byte & 0x7F) as i32) << (i * 7);

        if (byte & 0x80) != 128 {
            return Ok(Some((value, i + 1)));
        }
    }

    if src.len() < MAX_VARINT_LENGTH {
        return Ok(None);
    }
    Err(ProtocolError::VarIntTooBig)
}
