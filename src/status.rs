use std::{io::Cursor, path::Path};

use anyhow::{ensure, Result};
use base64::{engine::general_purpose, Engine};
use bytes::Bytes;
use image::{image_dimensions, io::Reader as ImageReader, ImageOutputFormat};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    component::Component,
    config::Config,
    protocol::{
        legacy::{self, LegacyStatus, LegacyVersion},
        ProtocolVersion,
    },
};

const FAVICON_SIZE: (u32, u32) = (64, 64);

/// JSON body of the status response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerPing {
    pub version: Version,
    pub players: Players,
    pub description: Component,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Version {
    pub name: String,
    pub protocol: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Players {
    pub online: usize,
    pub max: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample: Vec<SamplePlayer>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SamplePlayer {
    pub name: String,
    pub id: Uuid,
}

impl ServerPing {
    /// Answers in the client's protocol when it is supported so the client
    /// does not mark the server as incompatible.
    pub fn new(config: &Config, client_version: ProtocolVersion, online: usize, favicon: Option<String>) -> Self {
        let protocol = match client_version {
            version if version.is_valid() => version,
            _ => ProtocolVersion::MAXIMUM,
        };
        Self {
            version: Version {
                name: format!("{} {}", env!("CARGO_PKG_NAME"), ProtocolVersion::version_range_string()),
                protocol: protocol.protocol(),
            },
            players: Players { online, max: config.show_max_players, sample: Vec::new() },
            description: Component::text(config.motd.clone()),
            favicon,
        }
    }

    /// Kick packet carrying this status for pre-Netty clients.
    pub fn legacy_response(&self, version: LegacyVersion) -> Bytes {
        let motd = self.description.to_legacy_string();
        legacy::ping_response(
            version,
            &LegacyStatus {
                protocol: self.version.protocol,
                version_name: &self.version.name,
                motd: &motd,
                online: self.players.online,
                max: self.players.max,
            },
        )
    }
}

/// Reads the favicon at `path`, or `None` if it is missing or unusable.
pub fn load_favicon(path: &Path) -> Option<String> {
    if !path.exists() {
        debug!("No favicon at {}", path.display());
        return None;
    }
    match read_favicon(path) {
        Ok(favicon) => Some(favicon),
        Err(err) => {
            warn!("Unable to load favicon {}: {:#}", path.display(), err);
            None
        }
    }
}

fn read_favicon(path: &Path) -> Result<String> {
    let dimensions = image_dimensions(path)?;
    ensure!(dimensions == FAVICON_SIZE, "favicon must be 64x64 pixels, found {}x{}", dimensions.0, dimensions.1);

    let mut buffer = Vec::with_capacity(4096);
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()?
        .write_to(&mut Cursor::new(&mut buffer), ImageOutputFormat::Png)?;

    Ok(format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(buffer)))
}
