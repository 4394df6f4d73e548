use std::sync::Arc;

use crate::session::CancellationToken;

/// Sink for events pushed by the sensor during one authentication attempt.
///
/// Events may arrive on any thread. `on_success` and `on_error` are
/// terminal from the hardware's point of view; `on_help` and `on_failed`
/// are recoverable and may repeat.
pub trait AuthenticationEvents: Send + Sync {
    /// The sensor matched the enrolled credential.
    fn on_success(&self);

    /// A fatal sensor error; `code` is the platform error code.
    fn on_error(&self, code: u32, message: &str);

    /// A recoverable sensor condition; `code` is the platform help code.
    fn on_help(&self, code: u32, message: &str);

    /// A read completed but did not match any enrolled credential.
    fn on_failed(&self);
}

/// The platform biometric layer. Implemented by the host environment;
/// touchgate only consumes it.
pub trait BiometricHardware: Send + Sync {
    fn is_hardware_detected(&self) -> bool;

    fn has_enrolled_credential(&self) -> bool;

    fn is_device_secured(&self) -> bool;

    /// Starts listening for a single fingerprint attempt. The hardware
    /// layer must stop delivering events and release the sensor once
    /// `token` is cancelled.
    fn begin_authentication(&self, token: CancellationToken, sink: Arc<dyn AuthenticationEvents>);
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory hardware that records the registered sink and lets tests
    /// fire sensor events by hand.
    pub(crate) struct MockHardware {
        pub(crate) begin_calls: AtomicUsize,
        sink: Mutex<Option<Arc<dyn AuthenticationEvents>>>,
        token: Mutex<Option<CancellationToken>>,
    }

    impl MockHardware {
        pub(crate) fn new() -> Self {
            MockHardware {
                begin_calls: AtomicUsize::new(0),
                sink: Mutex::new(None),
                token: Mutex::new(None),
            }
        }

        pub(crate) fn fire_success(&self) {
            if let Some(sink) = self.current_sink() {
                sink.on_success();
            }
        }

        pub(crate) fn fire_error(&self, code: u32) {
            if let Some(sink) = self.current_sink() {
                sink.on_error(code, "mock error");
            }
        }

        pub(crate) fn fire_help(&self, code: u32) {
            if let Some(sink) = self.current_sink() {
                sink.on_help(code, "mock help");
            }
        }

        pub(crate) fn fire_failed(&self) {
            if let Some(sink) = self.current_sink() {
                sink.on_failed();
            }
        }

        pub(crate) fn registered_token(&self) -> Option<CancellationToken> {
            self.token.lock().unwrap().clone()
        }

        fn current_sink(&self) -> Option<Arc<dyn AuthenticationEvents>> {
            self.sink.lock().unwrap().clone()
        }
    }

    impl BiometricHardware for MockHardware {
        fn is_hardware_detected(&self) -> bool {
            true
        }

        fn has_enrolled_credential(&self) -> bool {
            true
        }

        fn is_device_secured(&self) -> bool {
            true
        }

        fn begin_authentication(
            &self,
            token: CancellationToken,
            sink: Arc<dyn AuthenticationEvents>,
        ) {
            self.begin_calls.fetch_add(1, Ordering::SeqCst);
            *self.sink.lock().unwrap() = Some(sink);
            *self.token.lock().unwrap() = Some(token);
        }
    }
}
