use std::fmt;

use bytes::{Bytes, BytesMut};
use strum::{EnumIter, IntoStaticStr};

use crate::error::ProtocolError;

use self::{
    handshake::Handshake,
    login::{
        EncryptionRequest, EncryptionResponse, LoginPluginMessage, LoginPluginResponse, ServerLogin, ServerLoginSuccess,
        SetCompression,
    },
    play::{Chat, Disconnect, JoinGame, KeepAlive, Opaque, PluginMessage},
    status::{StatusPing, StatusRequest, StatusResponse},
};

use super::{Direction, ProtocolVersion};

pub mod handshake;
pub mod login;
pub mod play;
pub mod status;

pub trait Packet: Sized {
    fn from_bytes(buf: &mut Bytes, direction: Direction, version: ProtocolVersion) -> Result<Self, ProtocolError>;

    fn put_buf(&self, buf: &mut BytesMut, direction: Direction, version: ProtocolVersion) -> Result<(), ProtocolError>;
}

/// A frame whose id has no decoder in the active registry. The payload is
/// kept verbatim, id included, so it can be forwarded without re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub id: i32,
    pub buffer: Bytes,
}

impl RawPacket {
    pub fn new(id: i32, buffer: Bytes) -> Self {
        Self { id, buffer }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

macro_rules! packets {
    (
        typed { $($kind:ident($ty:ty)),* $(,)? }
        opaque { $($opaque:ident),* $(,)? }
    ) => {
        /// Tag of every packet type the registries know about.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
        pub enum PacketKind {
            $($kind,)*
            $($opaque,)*
        }

        #[derive(Debug, Clone, PartialEq)]
        pub enum PacketType {
            $($kind($ty),)*
            $($opaque(Opaque),)*
        }

        impl PacketType {
            pub const fn kind(&self) -> PacketKind {
                match self {
                    $(PacketType::$kind(_) => PacketKind::$kind,)*
                    $(PacketType::$opaque(_) => PacketKind::$opaque,)*
                }
            }

            pub fn put_buf(&self, buf: &mut BytesMut, direction: Direction, version: ProtocolVersion) -> Result<(), ProtocolError> {
                match self {
                    $(PacketType::$kind(packet) => packet.put_buf(buf, direction, version),)*
                    $(PacketType::$opaque(packet) => packet.put_buf(buf, direction, version),)*
                }
            }
        }

        impl PacketKind {
            /// Decodes a frame body whose id was already consumed.
            pub fn decode(self, buf: &mut Bytes, direction: Direction, version: ProtocolVersion) -> Result<PacketType, ProtocolError> {
                let packet = match self {
                    $(PacketKind::$kind => PacketType::$kind(<$ty>::from_bytes(buf, direction, version)?),)*
                    $(PacketKind::$opaque => PacketType::$opaque(Opaque::from_bytes(buf, direction, version)?),)*
                };
                if !buf.is_empty() {
                    return Err(ProtocolError::TrailingBytes { kind: self, remaining: buf.len() });
                }
                Ok(packet)
            }

            pub const fn is_opaque(self) -> bool {
                matches!(self, $(PacketKind::$opaque)|*)
            }
        }

        $(
            impl From<$ty> for PacketType {
                fn from(packet: $ty) -> Self {
                    PacketType::$kind(packet)
                }
            }
        )*
    };
}

packets! {
    typed {
        Handshake(Handshake),
        StatusRequest(StatusRequest),
        StatusResponse(StatusResponse),
        StatusPing(StatusPing),
        ServerLogin(ServerLogin),
        EncryptionRequest(EncryptionRequest),
        EncryptionResponse(EncryptionResponse),
        ServerLoginSuccess(ServerLoginSuccess),
        SetCompression(SetCompression),
        LoginPluginMessage(LoginPluginMessage),
        LoginPluginResponse(LoginPluginResponse),
        Disconnect(Disconnect),
        KeepAlive(KeepAlive),
        Chat(Chat),
        PluginMessage(PluginMessage),
        JoinGame(JoinGame),
    }
    opaque {
        ClientSettings,
        TabCompleteRequest,
        TabCompleteResponse,
        AvailableCommands,
        Respawn,
        ResourcePackRequest,
        ResourcePackResponse,
        HeaderAndFooter,
        BossBar,
        LegacyTitle,
        TitleSubtitle,
        TitleText,
        TitleActionbar,
        TitleTimes,
        TitleClear,
        PlayerListItem,
    }
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.into())
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind(), f)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;
    use uuid::Uuid;

    use super::{
        play::{CHAT_POSITION_CHAT, CHAT_POSITION_SYSTEM},
        *,
    };
    use crate::protocol::{
        buffer::{BufExt, BufMutExt},
        registry::registry,
        ProtocolVersion::*,
        State,
    };

    const PLAYER: Uuid = Uuid::from_u128(0x069a79f4_44e9_4726_a5be_fca90e38aaf5);

    /// A packet as it comes back out of the decoder for `direction` and
    /// `version`, so fields the version drops are already at their defaults.
    fn sample(kind: PacketKind, direction: Direction, version: ProtocolVersion) -> PacketType {
        match kind {
            PacketKind::Handshake => Handshake {
                protocol: version.protocol(),
                server_address: "play.example.com".to_owned(),
                port: 25565,
                next_state: 2,
            }
            .into(),
            PacketKind::StatusRequest => StatusRequest.into(),
            PacketKind::StatusResponse => StatusResponse { status: r#"{"description":"A server"}"#.to_owned() }.into(),
            PacketKind::StatusPing => StatusPing { payload: 0x0102_0304_0506_0708 }.into(),
            PacketKind::ServerLogin => ServerLogin { username: "Notch".to_owned() }.into(),
            PacketKind::EncryptionRequest => EncryptionRequest {
                server_id: String::new(),
                public_key: Bytes::from_static(&[0x30, 0x81, 0x9F, 0x30]),
                verify_token: Bytes::from_static(&[1, 2, 3, 4]),
            }
            .into(),
            PacketKind::EncryptionResponse => EncryptionResponse {
                shared_secret: Bytes::from_static(&[9; 16]),
                verify_token: Bytes::from_static(&[1, 2, 3, 4]),
            }
            .into(),
            PacketKind::ServerLoginSuccess => ServerLoginSuccess { uuid: PLAYER, username: "Notch".to_owned() }.into(),
            PacketKind::SetCompression => SetCompression { threshold: 256 }.into(),
            PacketKind::LoginPluginMessage => LoginPluginMessage {
                id: 7,
                channel: "example:login".to_owned(),
                data: Bytes::from_static(&[1, 2]),
            }
            .into(),
            PacketKind::LoginPluginResponse => {
                LoginPluginResponse { id: 7, success: true, data: Bytes::from_static(&[3]) }.into()
            }
            PacketKind::Disconnect => Disconnect { reason: r#"{"text":"Bye"}"#.to_owned() }.into(),
            PacketKind::KeepAlive => {
                let id = if version >= V1_12_2 { 1 << 40 } else { 42 };
                KeepAlive { id }.into()
            }
            PacketKind::Chat => match direction {
                Direction::Serverbound => Chat::serverbound("/server lobby").into(),
                Direction::Clientbound => Chat {
                    message: r#"{"text":"hello"}"#.to_owned(),
                    position: if version >= V1_8 { CHAT_POSITION_SYSTEM } else { CHAT_POSITION_CHAT },
                    sender: if version >= V1_16 { PLAYER } else { Uuid::nil() },
                }
                .into(),
            },
            PacketKind::PluginMessage => {
                let mut data = BytesMut::new();
                data.put_string("vanilla");
                PluginMessage { channel: "minecraft:brand".to_owned(), data: data.freeze() }.into()
            }
            PacketKind::JoinGame => JoinGame { entity_id: 7, rest: Bytes::from_static(&[0, 1, 2]) }.into(),
            opaque => {
                assert!(opaque.is_opaque(), "{opaque} needs a sample");
                let mut body = Bytes::from_static(&[0xCA, 0xFE, 0x00]);
                opaque.decode(&mut body, direction, version).unwrap()
            }
        }
    }

    fn frame(id: u8, packet: &PacketType, direction: Direction, version: ProtocolVersion) -> Bytes {
        let mut frame = BytesMut::new();
        frame.put_varint(id as i32);
        packet.put_buf(&mut frame, direction, version).unwrap();
        frame.freeze()
    }

    #[test]
    fn registered_packets_round_trip() {
        let (mut decoded, mut passed_raw) = (0, 0);

        for state in State::iter() {
            for direction in Direction::iter() {
                let packets = registry(state).directional(direction);
                for version in ProtocolVersion::supported() {
                    let snapshot = packets.get(version).unwrap();
                    for kind in PacketKind::iter() {
                        let Ok(id) = snapshot.id_of(kind) else { continue };
                        let packet = sample(kind, direction, version);
                        let mut body = frame(id, &packet, direction, version);
                        assert_eq!(body.get_varint().unwrap(), id as i32);
                        let remaining = body.len();

                        let context = format!("{kind} {direction} {state} {version}");
                        match snapshot.decode(id as i32, &mut body, version).unwrap() {
                            Some(back) => {
                                assert_eq!(back, packet, "{context}");
                                decoded += 1;
                            }
                            None => {
                                assert_eq!(snapshot.kind_of(id as i32), None, "{context}");
                                assert_eq!(body.len(), remaining, "{context} consumed while passed on");
                                passed_raw += 1;
                            }
                        }
                    }
                }
            }
        }

        assert!(decoded > 0 && passed_raw > 0);
    }

    #[test]
    fn chat_fields_follow_version() {
        let chat = Chat { message: r#"{"text":"hi"}"#.to_owned(), position: CHAT_POSITION_SYSTEM, sender: PLAYER };
        let encoded = |version| {
            let mut buf = BytesMut::new();
            chat.put_buf(&mut buf, Direction::Clientbound, version).unwrap();
            buf.freeze()
        };
        let message_len = 1 + chat.message.len();

        let old = encoded(V1_7_6);
        assert_eq!(old.len(), message_len);
        let back = Chat::from_bytes(&mut old.clone(), Direction::Clientbound, V1_7_6).unwrap();
        assert_eq!((back.position, back.sender), (CHAT_POSITION_CHAT, Uuid::nil()));

        let positioned = encoded(V1_15_2);
        assert_eq!(positioned.len(), message_len + 1);
        assert_eq!(positioned[message_len], CHAT_POSITION_SYSTEM);

        let with_sender = encoded(V1_16);
        assert_eq!(with_sender.len(), message_len + 1 + 16);
        assert_eq!(&with_sender[message_len + 1..], PLAYER.as_bytes());

        let mut serverbound = BytesMut::new();
        chat.put_buf(&mut serverbound, Direction::Serverbound, V1_16).unwrap();
        assert_eq!(serverbound.len(), message_len);
    }

    #[test]
    fn login_success_uuid_format_follows_version() {
        let success = ServerLoginSuccess { uuid: PLAYER, username: "Notch".to_owned() };
        let uuid_field = |version| {
            let mut buf = BytesMut::new();
            success.put_buf(&mut buf, Direction::Clientbound, version).unwrap();
            buf.truncate(buf.len() - 1 - success.username.len());
            buf.freeze()
        };

        let mut simple = uuid_field(V1_7_2);
        assert_eq!(simple.get_string(36).unwrap(), "069a79f444e94726a5befca90e38aaf5");
        let mut hyphenated = uuid_field(V1_7_6);
        assert_eq!(hyphenated.get_string(36).unwrap(), "069a79f4-44e9-4726-a5be-fca90e38aaf5");
        assert_eq!(&uuid_field(V1_16)[..], PLAYER.as_bytes());
    }

    #[test]
    fn client_settings_stay_opaque() {
        let play = registry(State::Play);
        for (version, id) in [(V1_7_6, 0x15), (V1_12, 0x05), (V1_17_1, 0x05)] {
            let snapshot = play.serverbound.get(version).unwrap();
            assert_eq!(snapshot.id_of(PacketKind::ClientSettings), Ok(id), "{version}");

            let mut body = Bytes::from_static(b"\x05en_us\x0c\x00\x01\x7f\x01");
            let decoded = snapshot.decode(id as i32, &mut body, version).unwrap();
            let expected = PacketType::ClientSettings(Opaque { data: Bytes::from_static(b"\x05en_us\x0c\x00\x01\x7f\x01") });
            assert_eq!(decoded, Some(expected), "{version}");
        }
    }

    #[test]
    fn old_keep_alive_ids_are_narrower() {
        let mut buf = BytesMut::new();
        KeepAlive { id: 42 }.put_buf(&mut buf, Direction::Clientbound, V1_7_6).unwrap();
        assert_eq!(&buf[..], &[0, 0, 0, 42]);
        buf.clear();
        KeepAlive { id: 42 }.put_buf(&mut buf, Direction::Clientbound, V1_8).unwrap();
        assert_eq!(&buf[..], &[42]);
        buf.clear();
        KeepAlive { id: 42 }.put_buf(&mut buf, Direction::Clientbound, V1_12_2).unwrap();
        assert_eq!(buf.len(), 8);
    }
}
