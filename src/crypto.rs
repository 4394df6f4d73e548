use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};

use crate::keyring::{CryptoHandle, Direction};

/// Byte transform applied once the sensor unlocks a handle.
///
/// The public contract is string-to-string: ciphertext is carried as
/// standard base64. Both operations consume the handle and return `None`
/// on any failure rather than surfacing an error across the boundary;
/// detail goes to the log.
pub trait Crypto: Send + Sync {
    fn encrypt(&self, handle: CryptoHandle, value: &str) -> Option<String>;
    fn decrypt(&self, handle: CryptoHandle, value: &str) -> Option<String>;
}

/// Default [`Crypto`] implementation backed by AES-256-GCM.
pub struct AesGcmCrypto;

impl Crypto for AesGcmCrypto {
    fn encrypt(&self, handle: CryptoHandle, value: &str) -> Option<String> {
        match encrypt_value(&handle, value) {
            Ok(ciphertext) => Some(ciphertext),
            Err(e) => {
                log::warn!("Encryption failed: {}", e);
                None
            }
        }
    }

    fn decrypt(&self, handle: CryptoHandle, value: &str) -> Option<String> {
        match decrypt_value(&handle, value) {
            Ok(plaintext) => Some(plaintext),
            Err(e) => {
                log::warn!("Decryption failed: {}", e);
                None
            }
        }
    }
}

fn encrypt_value(handle: &CryptoHandle, value: &str) -> Result<String, String> {
    if handle.direction != Direction::Encrypt {
        return Err("Handle is not bound to the encrypt direction".to_string());
    }

    let cipher = Aes256Gcm::new((&handle.key.0).into());
    let nonce = Nonce::from_slice(&handle.iv);

    let ciphertext = cipher
        .encrypt(nonce, value.as_bytes())
        .map_err(|e| format!("AES-GCM encrypt error: {}", e))?;

    Ok(general_purpose::STANDARD.encode(ciphertext))
}

fn decrypt_value(handle: &CryptoHandle, value: &str) -> Result<String, String> {
    if handle.direction != Direction::Decrypt {
        return Err("Handle is not bound to the decrypt direction".to_string());
    }

    let ciphertext = general_purpose::STANDARD
        .decode(value)
        .map_err(|e| format!("Invalid ciphertext encoding: {}", e))?;

    let cipher = Aes256Gcm::new((&handle.key.0).into());
    let nonce = Nonce::from_slice(&handle.iv);

    let plaintext = cipher
        .decrypt(nonce, ciphertext.as_ref())
        .map_err(|e| format!("AES-GCM decrypt error: {}", e))?;

    String::from_utf8(plaintext).map_err(|e| format!("Invalid UTF-8 in decrypted value: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyring::SecretKey;

    fn test_handle(direction: Direction) -> CryptoHandle {
        CryptoHandle {
            key: SecretKey([7u8; 32]),
            iv: [9u8; 12],
            direction,
        }
    }

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let crypto = AesGcmCrypto;

        let ciphertext = crypto
            .encrypt(test_handle(Direction::Encrypt), "secret")
            .unwrap();
        let plaintext = crypto
            .decrypt(test_handle(Direction::Decrypt), &ciphertext)
            .unwrap();

        assert_eq!(plaintext, "secret");
    }

    #[test]
    fn test_ciphertext_is_base64() {
        let crypto = AesGcmCrypto;
        let ciphertext = crypto
            .encrypt(test_handle(Direction::Encrypt), "secret")
            .unwrap();

        assert!(general_purpose::STANDARD.decode(&ciphertext).is_ok());
    }

    #[test]
    fn test_decrypt_tampered_ciphertext_is_none() {
        let crypto = AesGcmCrypto;
        let ciphertext = crypto
            .encrypt(test_handle(Direction::Encrypt), "secret")
            .unwrap();

        let mut bytes = general_purpose::STANDARD.decode(&ciphertext).unwrap();
        bytes[0] ^= 0xFF;
        let tampered = general_purpose::STANDARD.encode(bytes);

        assert!(crypto
            .decrypt(test_handle(Direction::Decrypt), &tampered)
            .is_none());
    }

    #[test]
    fn test_decrypt_with_wrong_iv_is_none() {
        let crypto = AesGcmCrypto;
        let ciphertext = crypto
            .encrypt(test_handle(Direction::Encrypt), "secret")
            .unwrap();

        let mut handle = test_handle(Direction::Decrypt);
        handle.iv = [0u8; 12];

        assert!(crypto.decrypt(handle, &ciphertext).is_none());
    }

    #[test]
    fn test_decrypt_invalid_base64_is_none() {
        let crypto = AesGcmCrypto;
        assert!(crypto
            .decrypt(test_handle(Direction::Decrypt), "not base64!!!")
            .is_none());
    }

    #[test]
    fn test_direction_misuse_is_none() {
        let crypto = AesGcmCrypto;

        assert!(crypto
            .encrypt(test_handle(Direction::Decrypt), "secret")
            .is_none());
        assert!(crypto
            .decrypt(test_handle(Direction::Encrypt), "whatever")
            .is_none());
    }

    #[test]
    fn test_empty_value_round_trips() {
        let crypto = AesGcmCrypto;

        let ciphertext = crypto.encrypt(test_handle(Direction::Encrypt), "").unwrap();
        let plaintext = crypto
            .decrypt(test_handle(Direction::Decrypt), &ciphertext)
            .unwrap();

        assert_eq!(plaintext, "");
    }
}
