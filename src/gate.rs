use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::crypto::{AesGcmCrypto, Crypto};
use crate::error::{Error, Outcome};
use crate::hardware::BiometricHardware;
use crate::iv_store::IvStore;
use crate::keyring::Keyring;
use crate::session::{Mode, OutcomeCallback, Session};

/// Reserved key name backing plain authentication calls. Any key usable in
/// the encrypt direction gates the sensor; nothing is persisted for it
/// beyond the key itself.
const AUTH_KEY_NAME: &str = "touchgate.authentication";

/// Facade over biometric authentication and sensor-gated encrypt/decrypt.
///
/// Holds at most one live session; starting any operation cancels and
/// replaces the prior one, so a caller never receives outcomes from two
/// overlapping attempts.
pub struct Touchgate {
    hardware: Arc<dyn BiometricHardware>,
    keyring: Keyring,
    crypto: Arc<dyn Crypto>,
    current: Mutex<Option<Arc<Session>>>,
}

impl Touchgate {
    pub fn new(hardware: Arc<dyn BiometricHardware>) -> Result<Self, String> {
        Builder::new(hardware).build()
    }

    pub fn builder(hardware: Arc<dyn BiometricHardware>) -> Builder {
        Builder::new(hardware)
    }

    /// Returns true if the device has biometric sensor hardware.
    pub fn has_hardware(&self) -> bool {
        self.hardware.is_hardware_detected()
    }

    /// Returns true if the user has an enrolled biometric credential.
    pub fn has_enrolled_credential(&self) -> bool {
        self.hardware.has_enrolled_credential()
    }

    /// Returns true if the device has a secure lock screen.
    pub fn has_lock_screen(&self) -> bool {
        self.hardware.is_device_secured()
    }

    /// Authenticate the user via the sensor. On success the callback
    /// receives `Success("")`.
    pub fn authenticate(&self, callback: impl Fn(Outcome) + Send + Sync + 'static) {
        self.start(
            AUTH_KEY_NAME,
            String::new(),
            Mode::Authenticate,
            Box::new(callback),
        );
    }

    /// Authenticate the user, then encrypt `value` with the named key. The
    /// IV generated for this encryption is persisted under `key_name` so a
    /// later [`decrypt`](Self::decrypt) can reverse it.
    pub fn encrypt(
        &self,
        key_name: &str,
        value: &str,
        callback: impl Fn(Outcome) + Send + Sync + 'static,
    ) {
        self.start(key_name, value.to_string(), Mode::Encrypt, Box::new(callback));
    }

    /// Authenticate the user, then decrypt `value` with the named key and
    /// its persisted IV.
    pub fn decrypt(
        &self,
        key_name: &str,
        value: &str,
        callback: impl Fn(Outcome) + Send + Sync + 'static,
    ) {
        self.start(key_name, value.to_string(), Mode::Decrypt, Box::new(callback));
    }

    /// Cancel the current authentication attempt, if any. Idempotent; the
    /// cancelled session delivers no further outcomes.
    pub fn cancel(&self) {
        if let Some(session) = self.current.lock().unwrap().as_ref() {
            session.cancel();
        }
    }

    /// Returns true if a key was ever created under `key_name`.
    pub fn has_key(&self, key_name: &str) -> bool {
        self.keyring.has_key(key_name)
    }

    /// Removes a named key and its stored IV, e.g. after the enrolled
    /// credential changed. Ciphertext produced under the old key becomes
    /// unrecoverable.
    pub fn invalidate_key(&self, key_name: &str) -> Result<(), String> {
        self.keyring.delete_key(key_name)
    }

    fn start(&self, key_name: &str, value: String, mode: Mode, callback: OutcomeCallback) {
        let mut current = self.current.lock().unwrap();
        if let Some(prior) = current.take() {
            prior.cancel();
        }

        let handle = match mode {
            Mode::Authenticate => self.keyring.authentication_handle(key_name),
            Mode::Encrypt => self.keyring.encryption_handle(key_name),
            Mode::Decrypt => self.keyring.decryption_handle(key_name),
        };

        let handle = match handle {
            Some(handle) => handle,
            None => {
                // Release the slot lock before invoking the callback so a
                // callback that re-enters the facade cannot deadlock.
                drop(current);
                log::warn!("Crypto handle not initialized for '{}'", key_name);
                callback(Outcome::Error(Error::CryptoInitialization));
                return;
            }
        };

        let session = Arc::new(Session::new(
            mode,
            value,
            handle,
            self.crypto.clone(),
            callback,
        ));
        let token = session.token();
        *current = Some(session.clone());
        drop(current);

        self.hardware.begin_authentication(token, session);
    }
}

/// Configures and builds a [`Touchgate`].
pub struct Builder {
    hardware: Arc<dyn BiometricHardware>,
    crypto: Option<Arc<dyn Crypto>>,
    storage_dir: Option<PathBuf>,
}

impl Builder {
    pub fn new(hardware: Arc<dyn BiometricHardware>) -> Self {
        Builder {
            hardware,
            crypto: None,
            storage_dir: None,
        }
    }

    /// Substitute the crypto transform. Defaults to AES-256-GCM.
    pub fn crypto(mut self, crypto: Arc<dyn Crypto>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    /// Directory for the persisted key and IV stores. Defaults to a
    /// touchgate subdirectory of the platform config directory.
    pub fn storage_dir(mut self, dir: PathBuf) -> Self {
        self.storage_dir = Some(dir);
        self
    }

    pub fn build(self) -> Result<Touchgate, String> {
        let storage_dir = match self.storage_dir {
            Some(dir) => dir,
            None => default_storage_dir()?,
        };

        let iv_store = IvStore::new(storage_dir.join("ivs.json"));
        let keyring = Keyring::new(storage_dir.join("keys.json"), iv_store);

        Ok(Touchgate {
            hardware: self.hardware,
            keyring,
            crypto: self.crypto.unwrap_or_else(|| Arc::new(AesGcmCrypto)),
            current: Mutex::new(None),
        })
    }
}

fn default_storage_dir() -> Result<PathBuf, String> {
    let config_dir = if cfg!(target_os = "windows") {
        dirs::config_dir()
            .map(|p| p.join("Touchgate"))
            .ok_or("Failed to get config dir")?
    } else if cfg!(target_os = "macos") {
        dirs::config_dir()
            .map(|p| p.join("Touchgate"))
            .ok_or("Failed to get config dir")?
    } else {
        dirs::config_dir()
            .map(|p| p.join("touchgate"))
            .ok_or("Failed to get config dir")?
    };

    Ok(config_dir)
}
