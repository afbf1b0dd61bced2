use std::slice;

use aes::{cipher::generic_array::GenericArray, Aes128};
use cfb8::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::error::CryptoError;

pub const KEY_LENGTH: usize = 16;

/// AES-128-CFB8 keyed with the shared secret as both key and IV.
pub struct CipherEncoder {
    cipher: cfb8::Encryptor<Aes128>,
}

pub struct CipherDecoder {
    cipher: cfb8::Decryptor<Aes128>,
}

fn check_key(secret: &[u8]) -> Result<(), CryptoError> {
    match secret.len() {
        KEY_LENGTH => Ok(()),
        len => Err(CryptoError::InvalidKeyLength(len)),
    }
}

impl CipherEncoder {
    pub fn new(secret: &[u8]) -> Result<Self, CryptoError> {
        check_key(secret)?;
        let cipher = cfb8::Encryptor::new_from_slices(secret, secret).map_err(|_| CryptoError::InvalidKeyLength(secret.len()))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&mut self, data: &mut [u8]) {
        for byte in data {
            self.cipher.encrypt_block_mut(GenericArray::from_mut_slice(slice::from_mut(byte)));
        }
    }
}

impl CipherDecoder {
    pub fn new(secret: &[u8]) -> Result<Self, CryptoError> {
        check_key(secret)?;
        let cipher = cfb8::Decryptor::new_from_slices(secret, secret).map_err(|_| CryptoError::InvalidKeyLength(secret.len()))?;
        Ok(Self { cipher })
    }

    pub fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data {
            self.cipher.decrypt_block_mut(GenericArray::from_mut_slice(slice::from_mut(byte)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 16] = *b"0123456789abcdef";

    #[test]
    fn round_trip() {
        let plain = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut data = plain.clone();

        CipherEncoder::new(&KEY).unwrap().encrypt(&mut data);
        assert_ne!(data, plain);
        CipherDecoder::new(&KEY).unwrap().decrypt(&mut data);
        assert_eq!(data, plain);
    }

    #[test]
    fn chunking_does_not_change_output() {
        let plain: Vec<u8> = (0..=255).collect();

        let mut whole = plain.clone();
        CipherEncoder::new(&KEY).unwrap().encrypt(&mut whole);

        let mut chunked = plain.clone();
        let mut encoder = CipherEncoder::new(&KEY).unwrap();
        for chunk in chunked.chunks_mut(7) {
            encoder.encrypt(chunk);
        }
        assert_eq!(whole, chunked);

        let mut decoder = CipherDecoder::new(&KEY).unwrap();
        let (head, tail) = chunked.split_at_mut(100);
        decoder.decrypt(head);
        decoder.decrypt(tail);
        assert_eq!(chunked, plain);
    }

    #[test]
    fn rejects_malformed_key() {
        assert!(matches!(CipherEncoder::new(&KEY[..15]), Err(CryptoError::InvalidKeyLength(15))));
        assert!(matches!(CipherDecoder::new(&[0; 32]), Err(CryptoError::InvalidKeyLength(32))));
    }
}
