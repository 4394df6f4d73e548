use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use std::collections::HashMap;
use std::{fs, path::PathBuf};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::iv_store::IvStore;

pub(crate) const KEY_LEN: usize = 32;
pub(crate) const IV_LEN: usize = 12;

/// Raw AES-256 key bytes, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub(crate) struct SecretKey(pub(crate) [u8; KEY_LEN]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Direction {
    Encrypt,
    Decrypt,
}

/// An unlocked, direction-bound key ready for exactly one transform.
///
/// A handle is created fresh per operation and consumed by value when the
/// transform runs, so it can never back a second attempt.
pub struct CryptoHandle {
    pub(crate) key: SecretKey,
    pub(crate) iv: [u8; IV_LEN],
    pub(crate) direction: Direction,
}

/// Creates and loads named keys and binds them into single-use handles.
///
/// Keys live in a private base64-encoded JSON file standing in for the
/// platform key store; the IV captured at encrypt-handle creation is
/// persisted through [`IvStore`] before the handle is handed out, so a
/// later decrypt always sees the IV that produced the ciphertext.
pub struct Keyring {
    keys_path: PathBuf,
    iv_store: IvStore,
}

impl Keyring {
    pub fn new(keys_path: PathBuf, iv_store: IvStore) -> Self {
        Keyring {
            keys_path,
            iv_store,
        }
    }

    /// Handle for a plain authentication call. Any key usable in the
    /// encrypt direction suffices; no IV is persisted.
    pub fn authentication_handle(&self, key_name: &str) -> Option<CryptoHandle> {
        match self.new_encrypt_handle(key_name, false) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!(
                    "Failed to create authentication handle for '{}': {}",
                    key_name,
                    e
                );
                None
            }
        }
    }

    pub fn encryption_handle(&self, key_name: &str) -> Option<CryptoHandle> {
        match self.new_encrypt_handle(key_name, true) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Failed to create encryption handle for '{}': {}", key_name, e);
                None
            }
        }
    }

    pub fn decryption_handle(&self, key_name: &str) -> Option<CryptoHandle> {
        match self.new_decrypt_handle(key_name) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Failed to create decryption handle for '{}': {}", key_name, e);
                None
            }
        }
    }

    /// Removes a named key and its stored IV. The next encrypt for the
    /// name recreates both. Used when the enrolled credential changes and
    /// existing key material must be invalidated.
    pub fn delete_key(&self, key_name: &str) -> Result<(), String> {
        let mut keys = self.read_keys();
        keys.remove(key_name);
        self.write_keys(&keys)?;
        self.iv_store.delete_iv(key_name)
    }

    pub fn has_key(&self, key_name: &str) -> bool {
        self.read_keys().contains_key(key_name)
    }

    fn new_encrypt_handle(&self, key_name: &str, persist_iv: bool) -> Result<CryptoHandle, String> {
        let key = self.get_or_create_key(key_name)?;
        let iv: [u8; IV_LEN] = rand::thread_rng().gen();

        if persist_iv {
            // The IV must be captured now, before any bytes are
            // transformed, or a later decrypt will desynchronize.
            self.iv_store.save_iv(key_name, &iv)?;
        }

        Ok(CryptoHandle {
            key,
            iv,
            direction: Direction::Encrypt,
        })
    }

    fn new_decrypt_handle(&self, key_name: &str) -> Result<CryptoHandle, String> {
        let key = self
            .load_key(key_name)?
            .ok_or_else(|| format!("Key '{}' has never been created", key_name))?;

        let iv_bytes = self.iv_store.load_iv(key_name);
        if iv_bytes.is_empty() {
            return Err(format!("No IV stored for key '{}'", key_name));
        }

        let iv: [u8; IV_LEN] = iv_bytes
            .try_into()
            .map_err(|_| format!("Stored IV for '{}' has invalid length", key_name))?;

        Ok(CryptoHandle {
            key,
            iv,
            direction: Direction::Decrypt,
        })
    }

    fn get_or_create_key(&self, key_name: &str) -> Result<SecretKey, String> {
        if let Some(key) = self.load_key(key_name)? {
            return Ok(key);
        }

        let key_bytes: [u8; KEY_LEN] = rand::thread_rng().gen();

        let mut keys = self.read_keys();
        keys.insert(
            key_name.to_string(),
            general_purpose::STANDARD.encode(key_bytes),
        );
        self.write_keys(&keys)?;

        Ok(SecretKey(key_bytes))
    }

    fn load_key(&self, key_name: &str) -> Result<Option<SecretKey>, String> {
        let keys = self.read_keys();

        let encoded = match keys.get(key_name) {
            Some(encoded) => encoded,
            None => return Ok(None),
        };

        let bytes = general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| format!("Stored key '{}' is not valid base64: {}", key_name, e))?;

        let key_bytes: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| format!("Stored key '{}' has invalid length", key_name))?;

        Ok(Some(SecretKey(key_bytes)))
    }

    fn read_keys(&self) -> HashMap<String, String> {
        let content = match fs::read_to_string(&self.keys_path) {
            Ok(content) => content,
            Err(_) => return HashMap::new(),
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Failed to parse key store, treating as empty: {}", e);
            HashMap::new()
        })
    }

    fn write_keys(&self, keys: &HashMap<String, String>) -> Result<(), String> {
        let json = serde_json::to_string_pretty(keys)
            .map_err(|e| format!("Failed to serialize key store: {}", e))?;

        if let Some(parent) = self.keys_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create storage directory: {}", e))?;
        }

        let tmp_path = self.keys_path.with_extension("json.tmp");
        fs::write(&tmp_path, &json).map_err(|e| format!("Failed to write key store: {}", e))?;
        fs::rename(&tmp_path, &self.keys_path)
            .map_err(|e| format!("Failed to rename key store: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_keyring() -> (Keyring, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let iv_store = IvStore::new(temp_dir.path().join("ivs.json"));
        let keyring = Keyring::new(temp_dir.path().join("keys.json"), iv_store);
        (keyring, temp_dir)
    }

    #[test]
    fn test_encryption_handle_creates_key_and_persists_iv() {
        let (keyring, temp) = create_test_keyring();

        let handle = keyring.encryption_handle("k1").unwrap();
        assert_eq!(handle.direction, Direction::Encrypt);
        assert!(keyring.has_key("k1"));

        let iv_store = IvStore::new(temp.path().join("ivs.json"));
        assert_eq!(iv_store.load_iv("k1"), handle.iv.to_vec());
    }

    #[test]
    fn test_authentication_handle_persists_no_iv() {
        let (keyring, temp) = create_test_keyring();

        let handle = keyring.authentication_handle("auth-key").unwrap();
        assert_eq!(handle.direction, Direction::Encrypt);

        let iv_store = IvStore::new(temp.path().join("ivs.json"));
        assert!(iv_store.load_iv("auth-key").is_empty());
    }

    #[test]
    fn test_decryption_handle_for_unknown_key_is_none() {
        let (keyring, _temp) = create_test_keyring();
        assert!(keyring.decryption_handle("nope").is_none());
    }

    #[test]
    fn test_decryption_handle_without_stored_iv_is_none() {
        let (keyring, _temp) = create_test_keyring();

        // Key exists (authentication mode created it) but no encrypt has
        // ever persisted an IV for it.
        keyring.authentication_handle("k1").unwrap();
        assert!(keyring.decryption_handle("k1").is_none());
    }

    #[test]
    fn test_decryption_handle_uses_persisted_iv_and_same_key() {
        let (keyring, _temp) = create_test_keyring();

        let enc = keyring.encryption_handle("k1").unwrap();
        let dec = keyring.decryption_handle("k1").unwrap();

        assert_eq!(dec.direction, Direction::Decrypt);
        assert_eq!(dec.iv, enc.iv);
        assert_eq!(dec.key.0, enc.key.0);
    }

    #[test]
    fn test_key_is_reused_across_encrypt_handles() {
        let (keyring, _temp) = create_test_keyring();

        let first = keyring.encryption_handle("k1").unwrap();
        let second = keyring.encryption_handle("k1").unwrap();

        assert_eq!(first.key.0, second.key.0);
        assert_ne!(first.iv, second.iv);
    }

    #[test]
    fn test_each_encrypt_overwrites_stored_iv() {
        let (keyring, temp) = create_test_keyring();

        keyring.encryption_handle("k1").unwrap();
        let second = keyring.encryption_handle("k1").unwrap();

        let iv_store = IvStore::new(temp.path().join("ivs.json"));
        assert_eq!(iv_store.load_iv("k1"), second.iv.to_vec());
    }

    #[test]
    fn test_delete_key_removes_key_and_iv() {
        let (keyring, _temp) = create_test_keyring();

        keyring.encryption_handle("k1").unwrap();
        keyring.delete_key("k1").unwrap();

        assert!(!keyring.has_key("k1"));
        assert!(keyring.decryption_handle("k1").is_none());
    }
}
