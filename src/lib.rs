//! Network Stubber
//!
//! Replaces real network calls in tests with deterministic, pre-declared
//! responses. A test registers stubs keyed by URL; a host transport asks the
//! interceptor whether it can answer a request and, if so, receives the
//! stubbed response through its usual completion callbacks.
//!
//! # Features
//!
//! - **Four response shapes**: full HTTP response, status + body, simulated
//!   transport error, or a bare completion
//! - **Prefix matching**: a stub target covers every URL that starts with it
//! - **Pluggable logging**: every registration and interception step is
//!   reported to an injected [`StubLogger`]
//! - **Launch transfer**: stubs built in a test driver are passed to the
//!   process under test as a base64 launch argument and registered at start-up
//!
//! # Example
//!
//! ```
//! use network_stubber::{NetworkStubber, ResponseCollector, Stub, StubData};
//!
//! let stubber = NetworkStubber::default();
//! stubber.add(Stub::data(
//!     "https://api.example.com/data",
//!     StubData::new(200, r#"{"message":"Hello!"}"#),
//! ));
//!
//! assert!(stubber.can_init("https://api.example.com/data"));
//!
//! let mut client = ResponseCollector::new();
//! stubber.start_loading("https://api.example.com/data", &mut client);
//! assert_eq!(client.response().unwrap().status, 200);
//! assert_eq!(client.body(), br#"{"message":"Hello!"}"#);
//! ```

pub mod codec;
pub mod config;
pub mod interceptor;
pub mod logger;
pub mod registry;
pub mod stub;
pub mod stubber;
pub mod transfer;

pub use codec::{StubError, StubHttpResponse, TransportError, TransportResponse};
pub use config::StubberConfig;
pub use interceptor::{
    InterceptedRequest, LoadOutcome, ResponseCollector, StubInterceptor, TransportClient,
};
pub use logger::{MemoryLogger, StubLogger, TracingLogger};
pub use registry::StubRegistry;
pub use stub::{Stub, StubData, StubKind, StubResponse, StubTarget, StubVariant};
pub use stubber::NetworkStubber;
pub use transfer::{LaunchArgumentProcessor, LaunchOutcome, TransferError};
