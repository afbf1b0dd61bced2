use std::io::{self, Read, Write};

use bytes::{BufMut, BytesMut};
use libdeflater::CompressionLvl;
use serde::{Deserialize, Serialize};

use crate::{
    error::ProtocolError,
    protocol::buffer::{BufExt, BufMutExt},
};

use super::varint::MAX_UNCOMPRESSED_LENGTH;

type Result<T> = std::result::Result<T, ProtocolError>;

/// Zlib implementation used by the compression stages.
pub trait Compressor: Send {
    fn compress(&mut self, src: &[u8], dst: &mut BytesMut) -> Result<()>;

    /// Inflates `src` into `dst`, which must end up exactly `size` bytes longer.
    fn decompress(&mut self, src: &[u8], dst: &mut BytesMut, size: usize) -> Result<()>;
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CompressionBackend {
    #[default]
    Libdeflate,
    Flate2,
}

impl CompressionBackend {
    /// `level` of -1 picks the backend's default.
    pub fn create(self, level: i32) -> Result<Box<dyn Compressor>> {
        Ok(match self {
            CompressionBackend::Libdeflate => Box::new(LibdeflateCompressor::new(level)?),
            CompressionBackend::Flate2 => Box::new(Flate2Compressor::new(level)),
        })
    }
}

pub struct LibdeflateCompressor {
    compressor: libdeflater::Compressor,
    decompressor: libdeflater::Decompressor,
}

impl LibdeflateCompressor {
    pub fn new(level: i32) -> Result<Self> {
        let level = match level {
            -1 => CompressionLvl::default(),
            level => CompressionLvl::new(level).map_err(|e| ProtocolError::Compression(format!("invalid level {level}: {e:?}")))?,
        };

        Ok(Self {
            compressor: libdeflater::Compressor::new(level),
            decompressor: libdeflater::Decompressor::new(),
        })
    }
}

impl Compressor for LibdeflateCompressor {
    fn compress(&mut self, src: &[u8], dst: &mut BytesMut) -> Result<()> {
        let start = dst.len();
        dst.resize(start + self.compressor.zlib_compress_bound(src.len()), 0);

        let written = self
            .compressor
            .zlib_compress(src, &mut dst[start..])
            .map_err(|e| ProtocolError::Compression(e.to_string()))?;
        dst.truncate(start + written);
        Ok(())
    }

    fn decompress(&mut self, src: &[u8], dst: &mut BytesMut, size: usize) -> Result<()> {
        let start = dst.len();
        dst.resize(start + size, 0);

        let actual = self
            .decompressor
            .zlib_decompress(src, &mut dst[start..])
            .map_err(|e| ProtocolError::Compression(e.to_string()))?;
        if actual != size {
            return Err(ProtocolError::SizeMismatch { expected: size, actual });
        }
        Ok(())
    }
}

pub struct Flate2Compressor {
    level: flate2::Compression,
}

impl Flate2Compressor {
    pub fn new(level: i32) -> Self {
        let level = match level {
            0..=9 => flate2::Compression::new(level as u32),
            _ => flate2::Compression::default(),
        };
        Self { level }
    }
}

impl Compressor for Flate2Compressor {
    fn compress(&mut self, src: &[u8], dst: &mut BytesMut) -> Result<()> {
        let mut encoder = flate2::write::ZlibEncoder::new(dst.writer(), self.level);
        encoder.write_all(src)?;
        encoder.finish()?;
        Ok(())
    }

    fn decompress(&mut self, src: &[u8], dst: &mut BytesMut, size: usize) -> Result<()> {
        let mut decoder = flate2::read::ZlibDecoder::new(src).take(size as u64 + 1);
        let actual = io::copy(&mut decoder, &mut dst.writer()).map_err(|e| ProtocolError::Compression(e.to_string()))? as usize;
        if actual != size {
            return Err(ProtocolError::SizeMismatch { expected: size, actual });
        }
        Ok(())
    }
}

/// Outbound frame stage: `VarInt 0 + body` below the threshold, otherwise
/// `VarInt uncompressed length + deflated body`.
pub struct CompressionEncoder {
    threshold: usize,
    compressor: Box<dyn Compressor>,
}

impl CompressionEncoder {
    pub fn new(threshold: usize, compressor: Box<dyn Compressor>) -> Self {
        Self { threshold, compressor }
    }

    pub fn set_threshold(&mut self, threshold: usize) {
        self.threshold = threshold;
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn encode(&mut self, frame: BytesMut) -> Result<BytesMut> {
        let mut out = BytesMut::with_capacity(frame.len() + 5);

        if frame.len() < self.threshold {
            out.put_u8(0x00);
            out.extend_from_slice(&frame);
        } else {
            out.put_varint(frame.len() as i32);
            self.compressor.compress(&frame, &mut out)?;
        }
        Ok(out)
    }
}

pub struct CompressionDecoder {
    threshold: usize,
    compressor: Box<dyn Compressor>,
}

impl CompressionDecoder {
    pub fn new(threshold: usize, compressor: Box<dyn Compressor>) -> Self {
        Self { threshold, compressor }
    }

    pub fn set_threshold(&mut self, threshold: usize) {
        self.threshold = threshold;
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn decode(&mut self, mut frame: BytesMut) -> Result<BytesMut> {
        let claimed = frame.get_varint()?;
        if claimed == 0 {
            return Ok(frame);
        }
        if claimed < 0 {
            return Err(ProtocolError::BadLength(claimed));
        }

        let size = claimed as usize;
        if size < self.threshold {
            return Err(ProtocolError::BelowThreshold { size, threshold: self.threshold });
        }
        if size > MAX_UNCOMPRESSED_LENGTH {
            return Err(ProtocolError::AboveCap { size, cap: MAX_UNCOMPRESSED_LENGTH });
        }

        let mut out = BytesMut::with_capacity(size);
        self.compressor.decompress(&frame, &mut out, size)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> BytesMut {
        (0..len).map(|i| (i % 7) as u8).collect::<Vec<_>>().as_slice().into()
    }

    fn stages(backend: CompressionBackend, threshold: usize) -> (CompressionEncoder, CompressionDecoder) {
        (
            CompressionEncoder::new(threshold, backend.create(-1).unwrap()),
            CompressionDecoder::new(threshold, backend.create(-1).unwrap()),
        )
    }

    #[test]
    fn small_frames_are_marked_uncompressed() {
        let (mut encoder, mut decoder) = stages(CompressionBackend::Libdeflate, 256);
        let encoded = encoder.encode(payload(50)).unwrap();
        assert_eq!(encoded[0], 0x00);
        assert_eq!(&encoded[1..], &payload(50)[..]);
        assert_eq!(decoder.decode(encoded).unwrap(), payload(50));
    }

    #[test]
    fn backends_interoperate() {
        for (from, to) in [
            (CompressionBackend::Libdeflate, CompressionBackend::Flate2),
            (CompressionBackend::Flate2, CompressionBackend::Libdeflate),
        ] {
            let mut encoder = CompressionEncoder::new(256, from.create(6).unwrap());
            let mut decoder = CompressionDecoder::new(256, to.create(-1).unwrap());

            let encoded = encoder.encode(payload(300)).unwrap();
            let mut header = &encoded[..];
            assert_eq!(header.get_varint().unwrap(), 300);
            assert_eq!(decoder.decode(encoded).unwrap(), payload(300));
        }
    }

    #[test]
    fn claimed_size_below_threshold_is_rejected() {
        let (mut encoder, _) = stages(CompressionBackend::Flate2, 64);
        let encoded = encoder.encode(payload(100)).unwrap();
        let mut strict = CompressionDecoder::new(128, CompressionBackend::Flate2.create(-1).unwrap());
        assert!(matches!(strict.decode(encoded), Err(ProtocolError::BelowThreshold { size: 100, threshold: 128 })));
    }

    #[test]
    fn claimed_size_above_cap_is_rejected() {
        let mut frame = BytesMut::new();
        frame.put_varint(MAX_UNCOMPRESSED_LENGTH as i32 + 1);
        frame.put_slice(&[0x78, 0x9C]);
        let (_, mut decoder) = stages(CompressionBackend::Libdeflate, 256);
        assert!(matches!(decoder.decode(frame), Err(ProtocolError::AboveCap { .. })));
    }

    #[test]
    fn lying_size_is_rejected() {
        let (mut encoder, _) = stages(CompressionBackend::Flate2, 0);
        let mut encoded = encoder.encode(payload(300)).unwrap();
        let body = encoded.split_off(2);
        let mut forged = BytesMut::new();
        forged.put_varint(400);
        forged.extend_from_slice(&body);

        for backend in [CompressionBackend::Flate2, CompressionBackend::Libdeflate] {
            let mut decoder = CompressionDecoder::new(0, backend.create(-1).unwrap());
            assert!(decoder.decode(forged.clone()).is_err());
        }
    }
}
