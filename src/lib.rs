//! Biometric authentication with hardware-gated encrypt/decrypt.
//!
//! [`Touchgate`] wraps a platform biometric layer (the [`hardware`]
//! traits) and exposes three operations: plain authentication, and
//! encrypt/decrypt of a string value that only runs after a live sensor
//! match. Each call is a cancellable session delivering zero or more
//! [`Warning`]s followed by at most one terminal [`Outcome`] to a
//! callback; the [`stream`] module adapts that callback into an async
//! sequence.
//!
//! Encrypt operations capture the generated IV at key-unlock time and
//! persist it per key name, so a later decrypt for the same name always
//! reverses the most recent encryption. Keys and IVs live in private
//! JSON stores under the platform config directory (or a directory given
//! to the builder).
//!
//! The crate logs through the `log` facade and never installs a logger;
//! that is the host application's concern.

mod crypto;
mod error;
mod gate;
pub mod hardware;
mod iv_store;
mod keyring;
mod session;
pub mod stream;

pub use crypto::{AesGcmCrypto, Crypto};
pub use error::{Error, Outcome, Warning};
pub use gate::{Builder, Touchgate};
pub use hardware::{AuthenticationEvents, BiometricHardware};
pub use keyring::CryptoHandle;
pub use session::CancellationToken;
