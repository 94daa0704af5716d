//! Handing stubs to a separately launched process.
//!
//! The sender serializes stubs to a JSON array and encodes it as one standard
//! base64 token, placed right after a marker argument (`-NetworkStubs` by
//! default) or in an environment variable of the same name. The receiver
//! runs [`LaunchArgumentProcessor`] at start-up, before any networking, and
//! registers whatever it finds in one batch.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use network_stubber::config::LaunchSettings;
//! use network_stubber::stub::{Stub, StubData};
//! use network_stubber::transfer::{append_launch_arguments, LaunchArgumentProcessor, LaunchOutcome};
//! use network_stubber::StubRegistry;
//!
//! let mut args = vec!["my-app".to_string()];
//! let stubs = vec![Stub::data("https://api.example.com/data", StubData::new(200, "ok"))];
//! append_launch_arguments(&mut args, &stubs).unwrap();
//!
//! let registry = Arc::new(StubRegistry::new());
//! let processor = LaunchArgumentProcessor::new(LaunchSettings::default(), registry.clone());
//! assert!(matches!(processor.process(args, |_| None), LaunchOutcome::Loaded(1)));
//! assert!(registry.can_handle("https://api.example.com/data"));
//! ```

use crate::config::{LaunchSettings, DEFAULT_MARKER};
use crate::registry::StubRegistry;
use crate::stub::Stub;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::ffi::OsString;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure to produce or read a stub payload.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("failed to serialize stubs: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not a valid stub list: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode stubs as a single transport-safe token.
pub fn encode_stubs(stubs: &[Stub]) -> Result<String, TransferError> {
    let json = serde_json::to_vec(stubs).map_err(TransferError::Encode)?;
    Ok(STANDARD.encode(json))
}

/// Inverse of [`encode_stubs`].
pub fn decode_stubs(payload: &str) -> Result<Vec<Stub>, TransferError> {
    let json = STANDARD.decode(payload.trim())?;
    serde_json::from_slice(&json).map_err(TransferError::Decode)
}

/// The marker and payload arguments for `stubs`.
pub fn launch_arguments(marker: &str, stubs: &[Stub]) -> Result<Vec<String>, TransferError> {
    Ok(vec![marker.to_string(), encode_stubs(stubs)?])
}

/// Append `-NetworkStubs <payload>` to an argument list.
pub fn append_launch_arguments(args: &mut Vec<String>, stubs: &[Stub]) -> Result<(), TransferError> {
    args.extend(launch_arguments(DEFAULT_MARKER, stubs)?);
    Ok(())
}

/// Environment variable name and value carrying `stubs`.
pub fn launch_environment(marker: &str, stubs: &[Stub]) -> Result<(String, String), TransferError> {
    Ok((marker.to_string(), encode_stubs(stubs)?))
}

/// Result of processing the launch configuration.
#[derive(Debug)]
pub enum LaunchOutcome {
    /// No payload was supplied
    Absent,
    /// This many stubs were registered
    Loaded(usize),
    /// A payload was supplied but could not be decoded; nothing was registered
    Rejected(TransferError),
}

/// Receiver side: finds the payload and fills the registry.
pub struct LaunchArgumentProcessor {
    settings: LaunchSettings,
    registry: Arc<StubRegistry>,
}

impl LaunchArgumentProcessor {
    pub fn new(settings: LaunchSettings, registry: Arc<StubRegistry>) -> Self {
        Self { settings, registry }
    }

    /// Process this process's own arguments and environment.
    pub fn process_current(&self) -> LaunchOutcome {
        self.process_os(std::env::args_os(), |name| {
            std::env::var_os(name).and_then(|value| value.into_string().ok())
        })
    }

    /// Like [`process`](Self::process), for raw OS arguments.
    ///
    /// Arguments that are not valid UTF-8 are converted lossily; they can
    /// never equal the marker or hold a base64 payload.
    pub fn process_os<I, F>(&self, args: I, env: F) -> LaunchOutcome
    where
        I: IntoIterator<Item = OsString>,
        F: Fn(&str) -> Option<String>,
    {
        let args = args.into_iter().map(|arg| {
            arg.into_string()
                .unwrap_or_else(|raw| raw.to_string_lossy().into_owned())
        });
        self.process(args, env)
    }

    /// Process an explicit argument list, with `env` looking up environment variables.
    ///
    /// Never fails: decoding problems are logged and leave the registry untouched.
    pub fn process<I, S, F>(&self, args: I, env: F) -> LaunchOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str) -> Option<String>,
    {
        let marker = self.settings.marker.as_str();

        let from_env = if self.settings.prefer_environment {
            env(marker).filter(|value| !value.trim().is_empty())
        } else {
            None
        };

        let payload = match from_env {
            Some(payload) => {
                self.verbose(|| debug!(marker, "Using stub payload from environment"));
                Some(payload)
            }
            None => {
                let args: Vec<String> = args.into_iter().map(Into::into).collect();
                self.verbose(|| debug!(count = args.len(), "Scanning launch arguments"));
                args.iter()
                    .position(|arg| arg == marker)
                    .and_then(|index| args.get(index + 1).cloned())
            }
        };

        let Some(payload) = payload else {
            self.verbose(|| info!(marker, "No stub payload in launch configuration"));
            return LaunchOutcome::Absent;
        };

        match decode_stubs(&payload) {
            Ok(stubs) => {
                let count = stubs.len();
                self.verbose(|| info!(stubs = count, "Parsed launch stubs"));
                self.registry.add_all(stubs);
                LaunchOutcome::Loaded(count)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring undecodable stub payload");
                LaunchOutcome::Rejected(e)
            }
        }
    }

    fn verbose(&self, log: impl FnOnce()) {
        if self.settings.verbose_logging {
            log();
        }
    }
}
