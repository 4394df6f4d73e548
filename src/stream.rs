//! Bridges the push-callback outcome contract into a cancellable async
//! sequence.
//!
//! The bridge buffers a single pending outcome and overwrites the oldest
//! when the consumer lags behind the sensor. The sequence ends after the
//! first terminal outcome; dropping it early cancels the underlying
//! attempt, which then delivers nothing further.

use std::sync::Arc;
use tokio::sync::watch;

use crate::error::Outcome;
use crate::gate::Touchgate;

/// Authenticate the user, observing outcomes as an async sequence.
pub fn authenticate(gate: &Arc<Touchgate>) -> OutcomeStream {
    let (stream, callback) = OutcomeStream::channel(gate.clone());
    gate.authenticate(callback);
    stream
}

/// Encrypt `value` under `key_name` after a sensor match.
pub fn encrypt(gate: &Arc<Touchgate>, key_name: &str, value: &str) -> OutcomeStream {
    let (stream, callback) = OutcomeStream::channel(gate.clone());
    gate.encrypt(key_name, value, callback);
    stream
}

/// Decrypt `value` under `key_name` after a sensor match.
pub fn decrypt(gate: &Arc<Touchgate>, key_name: &str, value: &str) -> OutcomeStream {
    let (stream, callback) = OutcomeStream::channel(gate.clone());
    gate.decrypt(key_name, value, callback);
    stream
}

/// Async sequence of [`Outcome`]s for one operation.
pub struct OutcomeStream {
    rx: watch::Receiver<Option<Outcome>>,
    gate: Arc<Touchgate>,
    finished: bool,
}

impl OutcomeStream {
    fn channel(gate: Arc<Touchgate>) -> (Self, impl Fn(Outcome) + Send + Sync + 'static) {
        let (tx, rx) = watch::channel(None);

        let callback_gate = gate.clone();
        let callback = move |outcome: Outcome| {
            if tx.send(Some(outcome)).is_err() {
                // Consumer detached before the attempt finished.
                callback_gate.cancel();
            }
        };

        let stream = OutcomeStream {
            rx,
            gate,
            finished: false,
        };

        (stream, callback)
    }

    /// Next outcome, or `None` once the sequence has ended. The sequence
    /// ends after the first `Success`/`Error`, or without a terminal
    /// outcome when the operation was cancelled or replaced.
    pub async fn next(&mut self) -> Option<Outcome> {
        if self.finished {
            return None;
        }

        loop {
            if self.rx.changed().await.is_err() {
                // Producer went away without a terminal outcome.
                self.finished = true;
                return None;
            }

            let outcome = self.rx.borrow_and_update().clone();
            if let Some(outcome) = outcome {
                if outcome.is_terminal() {
                    self.finished = true;
                }
                return Some(outcome);
            }
        }
    }
}

impl Drop for OutcomeStream {
    fn drop(&mut self) {
        if !self.finished {
            self.gate.cancel();
        }
    }
}
