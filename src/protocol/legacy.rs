use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

const PING_ID: u8 = 0xFE;
const HANDSHAKE_ID: u8 = 0x02;
const DISCONNECT_ID: u8 = 0xFF;
const PLUGIN_MESSAGE_ID: u8 = 0xFA;
const PING_HOST_CHANNEL: &str = "MC|PingHost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyVersion {
    /// Beta 1.8 to 1.3, a lone `0xFE`.
    V1_3,
    /// 1.4 and 1.5, `0xFE 0x01`.
    V1_4,
    /// 1.6, `0xFE 0x01` followed by an `MC|PingHost` plugin message.
    V1_6,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyPing {
    pub version: LegacyVersion,
    pub protocol: Option<u8>,
    pub virtual_host: Option<(String, u16)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Modern,
    Incomplete,
    Ping(LegacyPing),
    Handshake,
}

/// Inspects the first bytes of a client stream. On a legacy match the
/// consumed bytes are removed from `src`.
pub fn detect(src: &mut BytesMut) -> Result<Detection, ProtocolError> {
    match src.first() {
        None => Ok(Detection::Incomplete),
        Some(&HANDSHAKE_ID) => {
            src.clear();
            Ok(Detection::Handshake)
        }
        Some(&PING_ID) => detect_ping(src),
        Some(_) => Ok(Detection::Modern),
    }
}

fn detect_ping(src: &mut BytesMut) -> Result<Detection, ProtocolError> {
    let ping = match src.len() {
        1 => LegacyPing { version: LegacyVersion::V1_3, protocol: None, virtual_host: None },
        2 if src[1] == 0x01 => LegacyPing { version: LegacyVersion::V1_4, protocol: None, virtual_host: None },
        _ if src[1] == 0x01 && src[2] == PLUGIN_MESSAGE_ID => match read_ping_host(&src[3..])? {
            Some(ping) => ping,
            None => return Ok(Detection::Incomplete),
        },
        _ => LegacyPing { version: LegacyVersion::V1_4, protocol: None, virtual_host: None },
    };

    src.clear();
    Ok(Detection::Ping(ping))
}

fn read_ping_host(mut buf: &[u8]) -> Result<Option<LegacyPing>, ProtocolError> {
    if buf.remaining() < 2 {
        return Ok(None);
    }
    let channel_len = buf.get_u16() as usize * 2;
    if buf.remaining() < channel_len + 2 {
        return Ok(None);
    }
    let channel = read_utf16(&buf[..channel_len]);
    buf.advance(channel_len);
    let data_len = buf.get_u16() as usize;
    if buf.remaining() < data_len {
        return Ok(None);
    }
    if channel != PING_HOST_CHANNEL || data_len < 7 {
        return Err(ProtocolError::BadLength(data_len as i32));
    }

    let protocol = buf.get_u8();
    let host_len = buf.get_u16() as usize * 2;
    if buf.remaining() < host_len + 4 {
        return Err(ProtocolError::EndOfPacket { needed: host_len + 4 - buf.remaining() });
    }
    let host = read_utf16(&buf[..host_len]);
    buf.advance(host_len);
    let port = buf.get_i32();

    Ok(Some(LegacyPing {
        version: LegacyVersion::V1_6,
        protocol: Some(protocol),
        virtual_host: Some((host, port as u16)),
    }))
}

fn read_utf16(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
    String::from_utf16_lossy(&units)
}

/// Kick packet understood by every pre-Netty client.
pub fn disconnect(reason: &str) -> Bytes {
    let units: Vec<u16> = reason.encode_utf16().collect();
    let mut buf = BytesMut::with_capacity(3 + units.len() * 2);
    buf.put_u8(DISCONNECT_ID);
    buf.put_u16(units.len() as u16);
    for unit in units {
        buf.put_u16(unit);
    }
    buf.freeze()
}

pub struct LegacyStatus<'a> {
    pub protocol: i32,
    pub version_name: &'a str,
    pub motd: &'a str,
    pub online: usize,
    pub max: usize,
}

pub fn ping_response(version: LegacyVersion, status: &LegacyStatus) -> Bytes {
    let reason = match version {
        LegacyVersion::V1_3 => {
            let motd: String = strip_formatting(status.motd);
            format!("{}§{}§{}", motd, status.online, status.max)
        }
        LegacyVersion::V1_4 | LegacyVersion::V1_6 => format!(
            "§1\0{}\0{}\0{}\0{}\0{}",
            status.protocol, status.version_name, status.motd, status.online, status.max
        ),
    };
    disconnect(&reason)
}

fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(u16::to_be_bytes).collect()
    }

    fn ping_host(host: &str, port: i32) -> BytesMut {
        let mut data = BytesMut::new();
        data.put_u8(74);
        data.put_u16(host.encode_utf16().count() as u16);
        data.put_slice(&utf16(host));
        data.put_i32(port);

        let mut buf = BytesMut::new();
        buf.put_slice(&[PING_ID, 0x01, PLUGIN_MESSAGE_ID]);
        buf.put_u16(PING_HOST_CHANNEL.len() as u16);
        buf.put_slice(&utf16(PING_HOST_CHANNEL));
        buf.put_u16(data.len() as u16);
        buf.put_slice(&data);
        buf
    }

    #[test]
    fn detects_each_ping_variant() {
        let mut v1_3 = BytesMut::from(&[PING_ID][..]);
        assert!(matches!(detect(&mut v1_3).unwrap(), Detection::Ping(LegacyPing { version: LegacyVersion::V1_3, .. })));
        assert!(v1_3.is_empty());

        let mut v1_4 = BytesMut::from(&[PING_ID, 0x01][..]);
        assert!(matches!(detect(&mut v1_4).unwrap(), Detection::Ping(LegacyPing { version: LegacyVersion::V1_4, .. })));

        let mut v1_6 = ping_host("mc.example.com", 25565);
        match detect(&mut v1_6).unwrap() {
            Detection::Ping(ping) => {
                assert_eq!(ping.version, LegacyVersion::V1_6);
                assert_eq!(ping.protocol, Some(74));
                assert_eq!(ping.virtual_host, Some(("mc.example.com".to_owned(), 25565)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn partial_ping_host_waits_for_more() {
        let full = ping_host("localhost", 25565);
        let mut partial = BytesMut::from(&full[..full.len() - 3]);
        assert_eq!(detect(&mut partial).unwrap(), Detection::Incomplete);
        assert_eq!(partial.len(), full.len() - 3);
    }

    #[test]
    fn modern_and_handshake() {
        let mut modern = BytesMut::from(&[0x10, 0x00][..]);
        assert_eq!(detect(&mut modern).unwrap(), Detection::Modern);
        assert_eq!(modern.len(), 2);

        let mut handshake = BytesMut::from(&[HANDSHAKE_ID, 0x4E][..]);
        assert_eq!(detect(&mut handshake).unwrap(), Detection::Handshake);
    }

    #[test]
    fn kick_is_utf16() {
        let kick = disconnect("hi");
        assert_eq!(&kick[..], &[0xFF, 0x00, 0x02, 0x00, b'h', 0x00, b'i']);
    }

    #[test]
    fn old_clients_get_plain_motd() {
        let status = LegacyStatus { protocol: 756, version_name: "1.17.1", motd: "§aHello", online: 1, max: 20 };
        let expected = disconnect("Hello§1§20");
        assert_eq!(ping_response(LegacyVersion::V1_3, &status), expected);
        let expected = disconnect("§1\u{0}756\u{0}1.17.1\u{0}§aHello\u{0}1\u{0}20");
        assert_eq!(ping_response(LegacyVersion::V1_4, &status), expected);
    }
}
