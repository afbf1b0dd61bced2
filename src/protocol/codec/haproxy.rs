use std::net::{IpAddr, SocketAddr};

use bytes::{Buf, BytesMut};

use crate::error::ProtocolError;

const SIGNATURE: &[u8] = b"PROXY ";
/// Longest v1 line, CRLF included.
const MAX_HEADER_LENGTH: usize = 107;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyHeader {
    Incomplete,
    /// `PROXY UNKNOWN`, the sender could not tell the real source.
    Unknown,
    Source(SocketAddr),
}

/// Parses a PROXY protocol v1 header from the front of `src`, consuming it.
pub fn parse(src: &mut BytesMut) -> Result<ProxyHeader, ProtocolError> {
    let prefix = src.len().min(SIGNATURE.len());
    if src[..prefix] != SIGNATURE[..prefix] {
        return Err(ProtocolError::ProxyHeader);
    }

    let window = &src[..src.len().min(MAX_HEADER_LENGTH)];
    let end = match window.windows(2).position(|pair| pair == b"\r\n") {
        Some(end) => end,
        None if src.len() < MAX_HEADER_LENGTH => return Ok(ProxyHeader::Incomplete),
        None => return Err(ProtocolError::ProxyHeader),
    };

    let line = std::str::from_utf8(&src[..end]).map_err(|_| ProtocolError::ProxyHeader)?;
    let header = parse_line(line)?;
    src.advance(end + 2);
    Ok(header)
}

fn parse_line(line: &str) -> Result<ProxyHeader, ProtocolError> {
    let mut parts = line.split(' ').skip(1);
    match parts.next() {
        Some("UNKNOWN") => return Ok(ProxyHeader::Unknown),
        Some("TCP4") | Some("TCP6") => {}
        _ => return Err(ProtocolError::ProxyHeader),
    }

    let source: IpAddr = parts.next().and_then(|ip| ip.parse().ok()).ok_or(ProtocolError::ProxyHeader)?;
    let _destination = parts.next().ok_or(ProtocolError::ProxyHeader)?;
    let port: u16 = parts.next().and_then(|port| port.parse().ok()).ok_or(ProtocolError::ProxyHeader)?;

    Ok(ProxyHeader::Source(SocketAddr::new(source, port)))
}
