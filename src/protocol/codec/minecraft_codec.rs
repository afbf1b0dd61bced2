use std::net::SocketAddr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use log::trace;
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    error::{CryptoError, ProtocolError, RegistryError},
    protocol::{
        buffer::{BufExt, BufMutExt},
        legacy::{self, Detection, LegacyPing},
        packet::{PacketType, RawPacket},
        registry::{registry, ProtocolRegistry},
        Direction, ProtocolVersion, State,
    },
};

use super::{
    cipher::{CipherDecoder, CipherEncoder},
    compression::{CompressionBackend, CompressionDecoder, CompressionEncoder},
    haproxy::{self, ProxyHeader},
    pipeline::{Pipeline, StageName},
    varint::{peek_varint, MAX_FRAME_LENGTH},
};

type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Packet(PacketType),
    Raw(RawPacket),
    LegacyPing(LegacyPing),
    LegacyHandshake,
    ProxyHeader(Option<SocketAddr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Packet(PacketType),
    Raw(RawPacket),
    /// Bytes written as-is, bypassing the packet and frame stages.
    Legacy(Bytes),
}

impl<T: Into<PacketType>> From<T> for Outbound {
    fn from(packet: T) -> Self {
        Outbound::Packet(packet.into())
    }
}

pub enum InboundStage {
    ProxyProtocol,
    LegacyPing,
    Decrypt(CipherDecoder),
    FrameDecoder,
    Decompress(CompressionDecoder),
    PacketDecoder,
}

pub enum OutboundStage {
    PacketEncoder,
    Compress(CompressionEncoder),
    FrameEncoder,
    Encrypt(CipherEncoder),
}

enum Flow {
    Stream,
    Frame(BytesMut),
    Done(Inbound),
}

impl Flow {
    const fn name(&self) -> &'static str {
        match self {
            Flow::Stream => "stream",
            Flow::Frame(_) => "frame",
            Flow::Done(_) => "message",
        }
    }
}

enum OutFlow {
    Packet(PacketType),
    Frame(BytesMut),
    Written,
}

enum Step {
    Item(Inbound),
    NeedMore,
    Skip,
}

/// Per-connection pipeline: an ordered list of named inbound stages turning
/// bytes into messages and the mirrored outbound list. Registries for the
/// current phase and version are swapped as one unit.
pub struct MinecraftCodec {
    direction: Direction,
    state: State,
    version: ProtocolVersion,
    inbound_registry: &'static ProtocolRegistry,
    outbound_registry: &'static ProtocolRegistry,
    inbound: Pipeline<InboundStage>,
    outbound: Pipeline<OutboundStage>,
    decrypted: usize,
    max_frame_length: usize,
}

fn snapshots(
    state: State,
    direction: Direction,
    version: ProtocolVersion,
) -> std::result::Result<(&'static ProtocolRegistry, &'static ProtocolRegistry), RegistryError> {
    let registries = registry(state);
    let inbound = registries.directional(direction).get(version)?;
    let outbound = registries.directional(direction.opposite()).get(version)?;
    Ok((&**inbound, &**outbound))
}

impl MinecraftCodec {
    /// `direction` is the direction of packets this side receives.
    pub fn new(direction: Direction) -> Self {
        let registries = registry(State::Handshake);
        let mut inbound = Pipeline::new();
        let _ = inbound.push_back(StageName::FrameDecoder, InboundStage::FrameDecoder);
        let _ = inbound.push_back(StageName::PacketDecoder, InboundStage::PacketDecoder);
        let mut outbound = Pipeline::new();
        let _ = outbound.push_back(StageName::PacketEncoder, OutboundStage::PacketEncoder);
        let _ = outbound.push_back(StageName::FrameEncoder, OutboundStage::FrameEncoder);

        Self {
            direction,
            state: State::Handshake,
            version: ProtocolVersion::Unknown,
            inbound_registry: registries.directional(direction).first(),
            outbound_registry: registries.directional(direction.opposite()).first(),
            inbound,
            outbound,
            decrypted: 0,
            max_frame_length: MAX_FRAME_LENGTH,
        }
    }

    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    /// Adds legacy ping detection, active until the first byte arrives.
    pub fn with_legacy_detection(mut self) -> Self {
        let _ = self.inbound.push_front(StageName::LegacyPing, InboundStage::LegacyPing);
        self
    }

    pub fn with_proxy_protocol(mut self) -> Self {
        let _ = self.inbound.push_front(StageName::ProxyProtocol, InboundStage::ProxyProtocol);
        self
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.version
    }

    pub fn inbound_stages(&self) -> Vec<StageName> {
        self.inbound.names()
    }

    pub fn outbound_stages(&self) -> Vec<StageName> {
        self.outbound.names()
    }

    pub fn is_encrypted(&self) -> bool {
        self.inbound.contains(StageName::Decrypt)
    }

    pub fn compression_threshold(&mut self) -> Option<usize> {
        match self.outbound.get_mut(StageName::Compress) {
            Some(OutboundStage::Compress(stage)) => Some(stage.threshold()),
            _ => None,
        }
    }

    /// Swaps phase and version together, the codec never sees one without the other.
    /// Dropping to the legacy version is permanent: later versions are ignored.
    pub fn set_state_and_version(&mut self, state: State, version: ProtocolVersion) -> std::result::Result<(), RegistryError> {
        if self.version.is_legacy() || version.is_legacy() {
            if !version.is_legacy() {
                trace!("Ignoring {} on a legacy codec", version);
            }
            self.remove_packet_codec();
            self.state = state;
            self.version = ProtocolVersion::Legacy;
            return Ok(());
        }

        let (inbound, outbound) = snapshots(state, self.direction, version)?;
        self.inbound_registry = inbound;
        self.outbound_registry = outbound;
        self.state = state;
        self.version = version;
        Ok(())
    }

    pub fn set_state(&mut self, state: State) -> std::result::Result<(), RegistryError> {
        self.set_state_and_version(state, self.version)
    }

    pub fn set_protocol_version(&mut self, version: ProtocolVersion) -> std::result::Result<(), RegistryError> {
        self.set_state_and_version(self.state, version)
    }

    fn remove_packet_codec(&mut self) {
        self.inbound.remove(StageName::PacketDecoder);
        self.outbound.remove(StageName::PacketEncoder);
    }

    /// A negative threshold removes both compression stages; otherwise the
    /// stages are inserted, or their threshold updated when already present.
    pub fn set_compression(&mut self, threshold: i32, backend: CompressionBackend, level: i32) -> Result<()> {
        if threshold < 0 {
            self.inbound.remove(StageName::Decompress);
            self.outbound.remove(StageName::Compress);
            return Ok(());
        }

        let threshold = threshold as usize;
        match self.inbound.get_mut(StageName::Decompress) {
            Some(InboundStage::Decompress(stage)) => stage.set_threshold(threshold),
            _ => self.inbound.insert_after(
                StageName::FrameDecoder,
                StageName::Decompress,
                InboundStage::Decompress(CompressionDecoder::new(threshold, backend.create(level)?)),
            )?,
        }
        match self.outbound.get_mut(StageName::Compress) {
            Some(OutboundStage::Compress(stage)) => stage.set_threshold(threshold),
            _ => self.outbound.insert_before(
                StageName::FrameEncoder,
                StageName::Compress,
                OutboundStage::Compress(CompressionEncoder::new(threshold, backend.create(level)?)),
            )?,
        }
        Ok(())
    }

    /// Everything still buffered but not yet framed is treated as ciphertext.
    pub fn enable_encryption(&mut self, secret: &[u8]) -> std::result::Result<(), CryptoError> {
        if self.is_encrypted() {
            return Err(CryptoError::AlreadyEnabled);
        }
        let decoder = CipherDecoder::new(secret)?;
        let encoder = CipherEncoder::new(secret)?;

        self.inbound
            .insert_before(StageName::FrameDecoder, StageName::Decrypt, InboundStage::Decrypt(decoder))
            .map_err(|_| CryptoError::AlreadyEnabled)?;
        self.outbound
            .insert_after(StageName::FrameEncoder, StageName::Encrypt, OutboundStage::Encrypt(encoder))
            .map_err(|_| CryptoError::AlreadyEnabled)?;
        self.decrypted = 0;
        Ok(())
    }

    fn decode_step(&mut self, src: &mut BytesMut) -> Result<Step> {
        let mut flow = Flow::Stream;
        let mut finished = None;
        let mut index = 0;

        while let Some((name, stage)) = self.inbound.stage_mut(index) {
            index += 1;
            flow = match (stage, flow) {
                (InboundStage::ProxyProtocol, Flow::Stream) => match haproxy::parse(src)? {
                    ProxyHeader::Incomplete => return Ok(Step::NeedMore),
                    ProxyHeader::Unknown => {
                        finished = Some(name);
                        Flow::Done(Inbound::ProxyHeader(None))
                    }
                    ProxyHeader::Source(address) => {
                        finished = Some(name);
                        Flow::Done(Inbound::ProxyHeader(Some(address)))
                    }
                },
                (InboundStage::LegacyPing, Flow::Stream) => match legacy::detect(src)? {
                    Detection::Incomplete => return Ok(Step::NeedMore),
                    Detection::Modern => {
                        finished = Some(name);
                        Flow::Stream
                    }
                    Detection::Ping(ping) => {
                        finished = Some(name);
                        Flow::Done(Inbound::LegacyPing(ping))
                    }
                    Detection::Handshake => {
                        finished = Some(name);
                        Flow::Done(Inbound::LegacyHandshake)
                    }
                },
                (InboundStage::Decrypt(cipher), Flow::Stream) => {
                    if self.decrypted < src.len() {
                        cipher.decrypt(&mut src[self.decrypted..]);
                        self.decrypted = src.len();
                    }
                    Flow::Stream
                }
                (InboundStage::FrameDecoder, Flow::Stream) => {
                    let Some((length, header)) = peek_varint(src)? else {
                        return Ok(Step::NeedMore);
                    };
                    if length < 0 {
                        return Err(ProtocolError::BadLength(length));
                    }
                    let length = length as usize;
                    if length > self.max_frame_length {
                        return Err(ProtocolError::FrameTooBig { length, max: self.max_frame_length });
                    }
                    if src.len() < header + length {
                        src.reserve(header + length - src.len());
                        return Ok(Step::NeedMore);
                    }

                    src.advance(header);
                    let frame = src.split_to(length);
                    self.decrypted = self.decrypted.saturating_sub(header + length);
                    if length == 0 {
                        return Ok(Step::Skip);
                    }
                    Flow::Frame(frame)
                }
                (InboundStage::Decompress(stage), Flow::Frame(frame)) => Flow::Frame(stage.decode(frame)?),
                (InboundStage::PacketDecoder, Flow::Frame(frame)) => {
                    let raw = frame.freeze();
                    let mut body = raw.clone();
                    let id = body.get_varint()?;

                    match self.inbound_registry.decode(id, &mut body, self.version)? {
                        Some(packet) => Flow::Done(Inbound::Packet(packet)),
                        None => {
                            trace!("Passing on unknown packet {:#04x} in {} {}", id, self.state, self.version);
                            Flow::Done(Inbound::Raw(RawPacket::new(id, raw)))
                        }
                    }
                }
                (_, done @ Flow::Done(_)) => done,
                (_, flow) => return Err(ProtocolError::StageOrder { stage: name.into(), input: flow.name() }),
            };

            if finished.is_some() {
                break;
            }
        }

        if let Some(name) = finished {
            self.inbound.remove(name);
            if let Flow::Stream = flow {
                return Ok(Step::Skip);
            }
        }

        match flow {
            Flow::Done(item) => Ok(Step::Item(item)),
            Flow::Frame(frame) => {
                let buffer = frame.freeze();
                let id = (&buffer[..]).get_varint()?;
                Ok(Step::Item(Inbound::Raw(RawPacket::new(id, buffer))))
            }
            Flow::Stream => Err(ProtocolError::StageOrder { stage: "end", input: "stream" }),
        }
    }
}

impl Decoder for MinecraftCodec {
    type Item = Inbound;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Inbound>> {
        loop {
            match self.decode_step(src)? {
                Step::Item(item) => return Ok(Some(item)),
                Step::NeedMore => return Ok(None),
                Step::Skip => continue,
            }
        }
    }
}

impl Encoder<Outbound> for MinecraftCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Outbound, dst: &mut BytesMut) -> Result<()> {
        let start = dst.len();
        let mut flow = match item {
            Outbound::Packet(packet) => OutFlow::Packet(packet),
            Outbound::Raw(raw) => OutFlow::Frame(BytesMut::from(&raw.buffer[..])),
            Outbound::Legacy(bytes) => {
                dst.put_slice(&bytes);
                OutFlow::Written
            }
        };

        let mut index = 0;
        while let Some((_, stage)) = self.outbound.stage_mut(index) {
            index += 1;
            flow = match (stage, flow) {
                (OutboundStage::PacketEncoder, OutFlow::Packet(packet)) => {
                    let id = self.outbound_registry.packet_id(&packet)?;
                    let mut frame = BytesMut::with_capacity(64);
                    frame.put_varint(id as i32);
                    packet.put_buf(&mut frame, self.direction.opposite(), self.version)?;
                    OutFlow::Frame(frame)
                }
                (OutboundStage::Compress(stage), OutFlow::Frame(frame)) => OutFlow::Frame(stage.encode(frame)?),
                (OutboundStage::FrameEncoder, OutFlow::Frame(frame)) => {
                    dst.reserve(frame.len() + 5);
                    dst.put_varint(frame.len() as i32);
                    dst.put_slice(&frame);
                    OutFlow::Written
                }
                (OutboundStage::Encrypt(cipher), OutFlow::Written) => {
                    cipher.encrypt(&mut dst[start..]);
                    OutFlow::Written
                }
                // The packet encoder leads the chain, any other stage seeing a
                // packet means it was removed.
                (_, OutFlow::Packet(_)) => return Err(ProtocolError::CodecRemoved),
                (_, pass @ (OutFlow::Frame(_) | OutFlow::Written)) => pass,
            };
        }

        match flow {
            OutFlow::Written => Ok(()),
            OutFlow::Packet(_) => Err(ProtocolError::CodecRemoved),
            OutFlow::Frame(_) => Err(ProtocolError::StageOrder { stage: "end", input: "frame" }),
        }
    }
}
