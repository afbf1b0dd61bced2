use std::{
    collections::BTreeMap,
    fs,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::{Path, PathBuf},
};

use anyhow::{bail, ensure, Context, Result};
use log::{info, LevelFilter};
use serde::{Deserialize, Serialize};

use crate::protocol::codec::{compression::CompressionBackend, varint::MAX_FRAME_LENGTH};

pub const DEFAULT_PATH: &str = "bridgehead.toml";

/// Reads the configuration at `path`, writing the defaults there first if
/// the file does not exist yet.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();

    if path.exists() {
        let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        return Ok(config);
    }

    let config = Config::default();
    fs::write(path, toml::to_string(&config)?).with_context(|| format!("writing {}", path.display()))?;
    info!("Wrote default configuration to {}", path.display());
    Ok(config)
}

/// Path from the first command line argument, or [`DEFAULT_PATH`].
pub fn config_path(mut args: impl Iterator<Item = String>) -> PathBuf {
    args.nth(1).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_PATH))
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlayerInfoForwarding {
    #[default]
    None,
    Legacy,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    pub bind: SocketAddr,
    pub motd: String,
    pub show_max_players: usize,
    pub online_mode: bool,
    pub compression_threshold: i32,
    pub compression_level: i32,
    pub compression_backend: CompressionBackend,
    /// Milliseconds.
    pub read_timeout: u64,
    /// Milliseconds.
    pub connect_timeout: u64,
    pub player_info_forwarding: PlayerInfoForwarding,
    pub proxy_protocol: bool,
    pub max_frame_length: usize,
    pub worker_threads: usize,
    pub log_level: LevelFilter,
    pub favicon: PathBuf,
    #[serde(rename = "try")]
    pub attempt_connection_order: Vec<String>,
    pub servers: BTreeMap<String, SocketAddr>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 25577),
            motd: "A bridgehead proxy".to_owned(),
            show_max_players: 500,
            online_mode: true,
            compression_threshold: 256,
            compression_level: -1,
            compression_backend: CompressionBackend::default(),
            read_timeout: 30000,
            connect_timeout: 5000,
            player_info_forwarding: PlayerInfoForwarding::default(),
            proxy_protocol: false,
            max_frame_length: MAX_FRAME_LENGTH,
            worker_threads: 0,
            log_level: LevelFilter::Info,
            favicon: PathBuf::from("server-icon.png"),
            attempt_connection_order: vec!["lobby".to_owned()],
            servers: BTreeMap::from([("lobby".to_owned(), SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 30066))]),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.servers.is_empty(), "no servers are configured");
        ensure!(!self.attempt_connection_order.is_empty(), "the try list is empty");
        for name in &self.attempt_connection_order {
            ensure!(self.servers.contains_key(name), "try list names unknown server '{name}'");
        }

        ensure!(
            self.compression_threshold >= -1,
            "compression threshold {} is out of range, use -1 to disable",
            self.compression_threshold
        );
        let max_level = match self.compression_backend {
            CompressionBackend::Libdeflate => 12,
            CompressionBackend::Flate2 => 9,
        };
        if self.compression_level != -1 && !(1..=max_level).contains(&self.compression_level) {
            bail!("compression level {} is out of range 1-{max_level}", self.compression_level);
        }
        ensure!(
            self.max_frame_length > 0 && self.max_frame_length <= MAX_FRAME_LENGTH,
            "max frame length must be between 1 and {MAX_FRAME_LENGTH}"
        );
        Ok(())
    }

    pub fn server(&self, name: &str) -> Option<SocketAddr> {
        self.servers.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid_and_round_trip() {
        let config = Config::default();
        config.validate().unwrap();

        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("try = [\"lobby\"]"));
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.bind, config.bind);
        assert_eq!(parsed.server("lobby"), config.server("lobby"));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            bind = "127.0.0.1:25565"
            compression_backend = "flate2"
            player_info_forwarding = "legacy"
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.bind.port(), 25565);
        assert_eq!(config.compression_backend, CompressionBackend::Flate2);
        assert_eq!(config.player_info_forwarding, PlayerInfoForwarding::Legacy);
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.compression_threshold, 256);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = Config { attempt_connection_order: vec!["hub".to_owned()], ..Default::default() };
        assert!(config.validate().is_err());

        config.attempt_connection_order = vec!["lobby".to_owned()];
        config.compression_backend = CompressionBackend::Flate2;
        config.compression_level = 12;
        assert!(config.validate().is_err());

        config.compression_level = -1;
        config.compression_threshold = -2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_path_from_arguments() {
        let args = ["bridgehead", "custom.toml"].map(String::from);
        assert_eq!(config_path(args.into_iter()), PathBuf::from("custom.toml"));
        assert_eq!(config_path(["bridgehead".to_owned()].into_iter()), PathBuf::from(DEFAULT_PATH));
    }
}
