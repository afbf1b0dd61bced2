use anyhow::{bail, Context, Result};
use md5::{Digest, Md5};
use num_bigint::BigInt;
use reqwest::StatusCode;
use rsa::{pkcs8::EncodePublicKey, Pkcs1v15Encrypt, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use uuid::Uuid;

use crate::error::CryptoError;

pub const VERIFY_TOKEN_LENGTH: usize = 4;

const HAS_JOINED_URL: &str = "https://sessionserver.mojang.com/session/minecraft/hasJoined";

/// RSA key pair offered to clients during the online-mode handshake.
pub struct KeyPair {
    private_key: RsaPrivateKey,
    public_der: Vec<u8>,
}

impl KeyPair {
    pub fn generate() -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024)?;
        let public_der = private_key
            .to_public_key()
            .to_public_key_der()
            .map_err(|err| CryptoError::KeyEncoding(err.to_string()))?
            .as_bytes()
            .to_vec();
        Ok(Self { private_key, public_der })
    }

    /// X.509 SubjectPublicKeyInfo, the form the client expects.
    pub fn public_key(&self) -> &[u8] {
        &self.public_der
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(self.private_key.decrypt(Pkcs1v15Encrypt, data)?)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GameProfile {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

impl GameProfile {
    pub fn offline(username: &str) -> Self {
        Self { id: offline_uuid(username), name: username.to_owned(), properties: Vec::new() }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// Minecraft's server hash: SHA-1 rendered as a signed big-endian hex number.
pub fn server_id_hash(server_id: &str, shared_secret: &[u8], public_key: &[u8]) -> String {
    let hash = Sha1::new()
        .chain_update(server_id.as_bytes())
        .chain_update(shared_secret)
        .chain_update(public_key)
        .finalize();
    BigInt::from_signed_bytes_be(&hash).to_str_radix(16)
}

pub fn offline_uuid(username: &str) -> Uuid {
    let hash = Md5::new_with_prefix(b"OfflinePlayer:")
        .chain_update(username.as_bytes())
        .finalize();
    uuid::Builder::from_md5_bytes(hash.into()).into_uuid()
}

/// Names the session server can be queried with without escaping.
pub fn is_valid_username(username: &str) -> bool {
    (1..=16).contains(&username.len()) && username.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Asks the session server whether `username` joined with `server_hash`.
/// `None` means the server answered but did not vouch for the player.
pub async fn has_joined(client: &reqwest::Client, username: &str, server_hash: &str) -> Result<Option<GameProfile>> {
    let url = format!("{HAS_JOINED_URL}?username={username}&serverId={server_hash}");
    let response = client.get(url).send().await.context("querying session server")?;

    match response.status() {
        StatusCode::OK => Ok(Some(response.json().await.context("parsing game profile")?)),
        StatusCode::NO_CONTENT => Ok(None),
        status => bail!("session server responded with {status}"),
    }
}

#[cfg(test)]
mod tests {
    use rsa::{pkcs8::DecodePublicKey, RsaPublicKey};

    use super::*;

    #[test]
    fn server_hashes_match_known_values() {
        assert_eq!(server_id_hash("Notch", &[], &[]), "4ed1f46bbe04bc756bcb17c0c7ce3e4632f06a48");
        assert_eq!(server_id_hash("jeb_", &[], &[]), "-7c9d5b0044c130109a5d7b5fb5c317c02b4e28c1");
        assert_eq!(server_id_hash("simon", &[], &[]), "88e16a1019277b15d58faf0541e11910eb756f6");
    }

    #[test]
    fn offline_uuids_are_stable_v3() {
        let uuid = offline_uuid("steve");
        assert_eq!(uuid.get_version_num(), 3);
        assert_eq!(uuid, offline_uuid("steve"));
        assert_ne!(uuid, offline_uuid("Steve"));
        assert_eq!(GameProfile::offline("steve").id, uuid);
    }

    #[test]
    fn usernames_are_validated() {
        assert!(is_valid_username("Steve_123"));
        assert!(!is_valid_username(""));
        assert!(!is_valid_username("seventeen_chars__"));
        assert!(!is_valid_username("a&serverId=x"));
    }

    #[test]
    fn decrypts_what_the_public_key_encrypted() {
        let keys = KeyPair::generate().unwrap();
        let public = RsaPublicKey::from_public_key_der(keys.public_key()).unwrap();
        let secret = b"0123456789abcdef";
        let encrypted = public.encrypt(&mut rand::thread_rng(), Pkcs1v15Encrypt, secret).unwrap();
        assert_eq!(keys.decrypt(&encrypted).unwrap(), secret);
        assert!(keys.decrypt(b"garbage").is_err());
    }

    #[test]
    fn profiles_parse_without_properties() {
        let profile: GameProfile =
            serde_json::from_str(r#"{"id":"069a79f444e94726a5befca90e38aaf5","name":"Notch"}"#).unwrap();
        assert_eq!(profile.name, "Notch");
        assert!(profile.properties.is_empty());
    }
}
