//! Log sinks for interception activity.
//!
//! The registry and the interception engine report what they do through a
//! [`StubLogger`]. The default sink forwards to `tracing`; tests usually swap
//! in a [`MemoryLogger`] and assert on the recorded sequence.

use parking_lot::Mutex;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// A sink accepting one log line at a time.
pub trait StubLogger: Send + Sync {
    fn log_message(&self, message: &str);
}

/// Default sink: every line becomes an `info` event on the `network_stubber` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl StubLogger for TracingLogger {
    fn log_message(&self, message: &str) {
        tracing::info!(target: "network_stubber", "{}", message);
    }
}

/// Sink that keeps every line in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    messages: Mutex<Vec<String>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines logged so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    pub fn last_message(&self) -> Option<String> {
        self.messages.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.messages.lock().clear();
    }
}

impl StubLogger for MemoryLogger {
    fn log_message(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

/// Install a global fmt subscriber capped at `level`.
///
/// Returns an error if a global subscriber is already set.
pub fn init_subscriber(level: Level) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}
