use bytes::{Buf, BufMut, Bytes};
use uuid::Uuid;

use crate::{component::Component, error::ProtocolError};

type Result<T> = std::result::Result<T, ProtocolError>;

pub const MAX_VARINT_LENGTH: usize = 5;

macro_rules! read_fixed {
    ($name:ident, $get:ident, $ty:ty) => {
        fn $name(&mut self) -> Result<$ty> {
            self.need(std::mem::size_of::<$ty>())?;
            Ok(self.$get())
        }
    };
}

pub trait BufExt: Buf {
    fn need(&self, len: usize) -> Result<()> {
        match len.checked_sub(self.remaining()) {
            Some(needed) if needed > 0 => Err(ProtocolError::EndOfPacket { needed }),
            _ => Ok(()),
        }
    }

    read_fixed!(read_u8, get_u8, u8);
    read_fixed!(read_i8, get_i8, i8);
    read_fixed!(read_u16, get_u16, u16);
    read_fixed!(read_i16, get_i16, i16);
    read_fixed!(read_i32, get_i32, i32);
    read_fixed!(read_i64, get_i64, i64);

    fn get_varint(&mut self) -> Result<i32> {
        let mut i = 0;

        for j in 0..MAX_VARINT_LENGTH {
            let b = self.read_u8()?;
            i |= ((b & 0x7F) as i32) << (j * 7);

            if (b & 0x80) != 128 {
                return Ok(i);
            }
        }

        Err(ProtocolError::VarIntTooBig)
    }

    fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0x00 => Ok(false),
            0x01 => Ok(true),
            byte => Err(ProtocolError::InvalidBool(byte)),
        }
    }

    fn get_length(&mut self) -> Result<usize> {
        let len = self.get_varint()?;
        if len < 0 {
            return Err(ProtocolError::NegativeLength(len));
        }
        self.need(len as usize)?;
        Ok(len as usize)
    }

    /// Reads a string capped at `cap` characters. The cap is checked against
    /// the byte length first, allowing up to three bytes per character.
    fn get_string(&mut self, cap: usize) -> Result<String> {
        let len = self.get_varint()?;
        if len < 0 {
            return Err(ProtocolError::NegativeLength(len));
        }
        let len = len as usize;
        if len > cap * 3 {
            return Err(ProtocolError::StringTooLong { length: len, max: cap * 3 });
        }
        self.need(len)?;

        let string = String::from_utf8(self.copy_to_bytes(len).to_vec())?;
        let chars = string.chars().count();
        if chars > cap {
            return Err(ProtocolError::StringTooLong { length: chars, max: cap });
        }
        Ok(string)
    }

    fn get_identifier(&mut self) -> Result<String> {
        self.get_string(32767)
    }

    fn get_component(&mut self, cap: usize) -> Result<Component> {
        let json = self.get_string(cap)?;
        Ok(serde_json::from_str(&json)?)
    }

    fn get_uuid(&mut self) -> Result<Uuid> {
        self.need(16)?;
        Ok(Uuid::from_u128(self.get_u128()))
    }

    fn get_byte_array(&mut self) -> Result<Bytes> {
        let len = self.get_length()?;
        Ok(self.copy_to_bytes(len))
    }

    /// Byte array with a signed short length, as sent by 1.7 clients.
    fn get_short_byte_array(&mut self) -> Result<Bytes> {
        let len = self.read_i16()?;
        if len < 0 {
            return Err(ProtocolError::NegativeLength(len as i32));
        }
        self.need(len as usize)?;
        Ok(self.copy_to_bytes(len as usize))
    }

    fn get_rest(&mut self) -> Bytes {
        self.copy_to_bytes(self.remaining())
    }
}

impl<T: Buf> BufExt for T {}

pub trait BufMutExt: BufMut {
    fn put_varint(&mut self, value: i32) {
        let value = value as u32;
        if (value & (0xFFFFFFFF << 7)) == 0 {
            self.put_u8(value as u8);
        } else if (value & (0xFFFFFFFF << 14)) == 0 {
            let w = (value & 0x7F | 0x80) << 8 | (value >> 7);
            self.put_u16(w as u16);
        } else if (value & (0xFFFFFFFF << 21)) == 0 {
            self.put_slice(&[(value & 0x7F | 0x80) as u8, ((value >> 7) & 0x7F | 0x80) as u8, (value >> 14) as u8]);
        } else if (value & (0xFFFFFFFF << 28)) == 0 {
            self.put_u32((value & 0x7F | 0x80) << 24 | (((value >> 7) & 0x7F | 0x80) << 16) | ((value >> 14) & 0x7F | 0x80) << 8 | (value >> 21));
        } else {
            self.put_slice(&[
                (value & 0x7F | 0x80) as u8,
                ((value >> 7) & 0x7F | 0x80) as u8,
                ((value >> 14) & 0x7F | 0x80) as u8,
                ((value >> 21) & 0x7F | 0x80) as u8,
                (value >> 28) as u8,
            ]);
        }
    }

    fn put_bool(&mut self, bool: bool) {
        self.put_u8(if bool { 0x01 } else { 0x00 })
    }

    fn put_string(&mut self, str: &str) {
        let str = str.as_bytes();
        self.put_varint(str.len() as i32);
        self.put_slice(str);
    }

    fn put_component(&mut self, component: &Component) -> Result<()> {
        self.put_byte_array(&serde_json::to_vec(component)?);
        Ok(())
    }

    fn put_uuid(&mut self, uuid: Uuid) {
        self.put_slice(uuid.as_bytes());
    }

    fn put_byte_array(&mut self, bytes: &[u8]) {
        self.put_varint(bytes.len() as i32);
        self.put_slice(bytes);
    }

    fn put_short_byte_array(&mut self, bytes: &[u8]) {
        self.put_i16(bytes.len() as i16);
        self.put_slice(bytes);
    }
}

impl<T: BufMut> BufMutExt for T {}

pub const fn varint_length(value: i32) -> usize {
    match value as u32 {
        0..=127 => 1,
        128..=16383 => 2,
        16384..=2097151 => 3,
        2097152..=268435455 => 4,
        _ => 5,
    }
}
