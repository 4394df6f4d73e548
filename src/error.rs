use serde::{Deserialize, Serialize};

/// Fatal authentication errors. Receiving one of these ends the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Error {
    /// The sensor hardware is unavailable.
    HardwareUnavailable,
    /// The sensor was unable to process the current image.
    UnableToProcess,
    /// The current request has been running too long.
    Timeout,
    /// Not enough storage remaining to complete the operation.
    NotEnoughSpace,
    /// The operation was canceled because the sensor is unavailable.
    Canceled,
    /// The sensor is locked out due to too many attempts.
    Lockout,
    /// A crypto handle could not be initialized for the requested key.
    CryptoInitialization,
    /// The value could not be encrypted with the unlocked handle.
    EncryptionFailed,
    /// The value could not be decrypted with the unlocked handle.
    DecryptionFailed,
    /// Unknown error reported by the platform.
    Unknown,
}

impl Error {
    /// Maps a platform error code to the closest error kind.
    pub(crate) fn from_code(code: u32) -> Error {
        match code {
            1 => Error::HardwareUnavailable,
            2 => Error::UnableToProcess,
            3 => Error::Timeout,
            4 => Error::NotEnoughSpace,
            5 => Error::Canceled,
            7 => Error::Lockout,
            _ => Error::Unknown,
        }
    }
}

/// Recoverable sensor events. The operation stays active and the user can
/// retry after receiving one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warning {
    /// The image acquired was good.
    GoodRead,
    /// Only a partial fingerprint image was detected.
    PartialRead,
    /// The image was too noisy to process.
    InsufficientRead,
    /// The image was too noisy due to suspected dirt on the sensor.
    DirtySensor,
    /// The image was unreadable due to lack of motion.
    TooSlow,
    /// The image was incomplete due to quick motion.
    TooFast,
    /// Fingerprint was read but not recognized.
    MatchFailure,
}

impl Warning {
    pub(crate) fn from_code(code: u32) -> Warning {
        match code {
            0 => Warning::GoodRead,
            1 => Warning::PartialRead,
            2 => Warning::InsufficientRead,
            3 => Warning::DirtySensor,
            4 => Warning::TooSlow,
            5 => Warning::TooFast,
            _ => Warning::MatchFailure,
        }
    }
}

/// A single result delivered to the caller during an authentication attempt.
///
/// A session delivers zero or more `Warning`s followed by at most one
/// terminal outcome (`Success` or `Error`). For plain authentication the
/// success value is an empty string; for encrypt/decrypt it carries the
/// transformed payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Outcome {
    Success(String),
    Warning(Warning),
    Error(Error),
}

impl Outcome {
    /// Terminal outcomes end the session; warnings do not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Success(_) | Outcome::Error(_))
    }
}
