use base64::{engine::general_purpose, Engine as _};
use std::collections::HashMap;
use std::{fs, path::PathBuf};

/// Persists the initialization vector captured for each named key.
///
/// The store is a flat key-name → base64(IV) mapping written to a private
/// JSON file. An entry is created on the first encrypt for a name and
/// overwritten on every subsequent encrypt; decrypt only ever reads it.
/// A missing entry means "key not initialized" and loads as empty bytes.
pub struct IvStore {
    store_path: PathBuf,
}

impl IvStore {
    pub fn new(store_path: PathBuf) -> Self {
        IvStore { store_path }
    }

    pub fn save_iv(&self, key_name: &str, iv: &[u8]) -> Result<(), String> {
        let mut entries = self.read_entries();
        entries.insert(key_name.to_string(), general_purpose::STANDARD.encode(iv));

        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| format!("Failed to serialize IV store: {}", e))?;

        if let Some(parent) = self.store_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create storage directory: {}", e))?;
        }

        let tmp_path = self.store_path.with_extension("json.tmp");
        fs::write(&tmp_path, &json).map_err(|e| format!("Failed to write IV store: {}", e))?;
        fs::rename(&tmp_path, &self.store_path)
            .map_err(|e| format!("Failed to rename IV store: {}", e))?;

        Ok(())
    }

    /// Returns the IV stored for `key_name`, or empty bytes if none exists.
    pub fn load_iv(&self, key_name: &str) -> Vec<u8> {
        let entries = self.read_entries();

        match entries.get(key_name) {
            Some(encoded) => general_purpose::STANDARD.decode(encoded).unwrap_or_else(|e| {
                log::warn!("Stored IV for '{}' is not valid base64: {}", key_name, e);
                Vec::new()
            }),
            None => Vec::new(),
        }
    }

    pub fn delete_iv(&self, key_name: &str) -> Result<(), String> {
        let mut entries = self.read_entries();
        if entries.remove(key_name).is_none() {
            return Ok(());
        }

        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| format!("Failed to serialize IV store: {}", e))?;

        let tmp_path = self.store_path.with_extension("json.tmp");
        fs::write(&tmp_path, &json).map_err(|e| format!("Failed to write IV store: {}", e))?;
        fs::rename(&tmp_path, &self.store_path)
            .map_err(|e| format!("Failed to rename IV store: {}", e))?;

        Ok(())
    }

    fn read_entries(&self) -> HashMap<String, String> {
        let content = match fs::read_to_string(&self.store_path) {
            Ok(content) => content,
            Err(_) => return HashMap::new(),
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Failed to parse IV store, treating as empty: {}", e);
            HashMap::new()
        })
    }
}
