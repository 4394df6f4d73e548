use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::crypto::Crypto;
use crate::error::{Error, Outcome, Warning};
use crate::hardware::AuthenticationEvents;
use crate::keyring::CryptoHandle;

/// Which operation a session performs after the sensor match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Authenticate,
    Encrypt,
    Decrypt,
}

/// Monotonic cancellation flag shared between a session, the hardware
/// layer, and the facade. Once set it never resets.
#[derive(Clone)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub(crate) fn new() -> Self {
        CancellationToken(Arc::new(AtomicBool::new(false)))
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sets the flag. Returns true only for the single call that performed
    /// the transition, which is how a terminal event handler claims the
    /// right to deliver the one terminal outcome.
    pub(crate) fn cancel(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

pub(crate) type OutcomeCallback = Box<dyn Fn(Outcome) + Send + Sync>;

/// One in-flight biometric attempt.
///
/// The session is the event sink registered with the hardware layer. Every
/// handler reads the cancellation token before any other side effect, so a
/// race between a sensor event and an external cancel resolves in favor of
/// whichever flipped the flag first: a cancelled session never runs the
/// transform and never invokes the callback again.
pub(crate) struct Session {
    id: Uuid,
    mode: Mode,
    value: String,
    handle: Mutex<Option<CryptoHandle>>,
    crypto: Arc<dyn Crypto>,
    callback: OutcomeCallback,
    token: CancellationToken,
}

impl Session {
    pub(crate) fn new(
        mode: Mode,
        value: String,
        handle: CryptoHandle,
        crypto: Arc<dyn Crypto>,
        callback: OutcomeCallback,
    ) -> Self {
        Session {
            id: Uuid::new_v4(),
            mode,
            value,
            handle: Mutex::new(Some(handle)),
            crypto,
            callback,
            token: CancellationToken::new(),
        }
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Idempotent. Cancelling an already-cancelled or terminal session is
    /// a no-op; no outcome is delivered either way.
    pub(crate) fn cancel(&self) {
        if self.token.cancel() {
            log::debug!("Session {} cancelled", self.id);
        }
    }
}

impl AuthenticationEvents for Session {
    fn on_success(&self) {
        if !self.token.cancel() {
            log::debug!("Session {}: success after cancellation, dropped", self.id);
            return;
        }

        let outcome = match self.mode {
            Mode::Authenticate => Outcome::Success(String::new()),
            Mode::Encrypt | Mode::Decrypt => {
                let handle = self.handle.lock().unwrap().take();
                self.transform(handle)
            }
        };

        (self.callback)(outcome);
    }

    fn on_error(&self, code: u32, message: &str) {
        if !self.token.cancel() {
            log::debug!("Session {}: error after cancellation, dropped", self.id);
            return;
        }

        log::debug!("Session {}: sensor error {}: {}", self.id, code, message);
        (self.callback)(Outcome::Error(Error::from_code(code)));
    }

    fn on_help(&self, code: u32, message: &str) {
        if self.token.is_cancelled() {
            return;
        }

        log::debug!("Session {}: sensor help {}: {}", self.id, code, message);
        (self.callback)(Outcome::Warning(Warning::from_code(code)));
    }

    fn on_failed(&self) {
        if self.token.is_cancelled() {
            return;
        }

        (self.callback)(Outcome::Warning(Warning::MatchFailure));
    }
}

impl Session {
    fn transform(&self, handle: Option<CryptoHandle>) -> Outcome {
        let failure = match self.mode {
            Mode::Encrypt => Error::EncryptionFailed,
            _ => Error::DecryptionFailed,
        };

        let handle = match handle {
            Some(handle) => handle,
            None => {
                log::warn!("Session {}: crypto handle already consumed", self.id);
                return Outcome::Error(failure);
            }
        };

        let result = match self.mode {
            Mode::Encrypt => self.crypto.encrypt(handle, &self.value),
            _ => self.crypto.decrypt(handle, &self.value),
        };

        match result {
            Some(value) => Outcome::Success(value),
            None => Outcome::Error(failure),
        }
    }
}
