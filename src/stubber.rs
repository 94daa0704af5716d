//! The assembled network stubber.

use crate::config::StubberConfig;
use crate::interceptor::{InterceptedRequest, LoadOutcome, StubInterceptor, TransportClient};
use crate::logger::{StubLogger, TracingLogger};
use crate::registry::StubRegistry;
use crate::stub::Stub;
use crate::transfer::{LaunchArgumentProcessor, LaunchOutcome};
use std::sync::Arc;
use tracing::info;

/// Owns one registry and the interceptor serving from it.
///
/// Each instance is independent, so tests can run isolated stubbers in
/// parallel. Hosts that need the registry elsewhere share it through
/// [`NetworkStubber::registry`].
pub struct NetworkStubber {
    config: StubberConfig,
    registry: Arc<StubRegistry>,
    interceptor: StubInterceptor,
}

impl NetworkStubber {
    /// Create a stubber logging through `tracing`.
    pub fn new(config: StubberConfig) -> Self {
        Self::with_logger(config, Arc::new(TracingLogger))
    }

    pub fn with_logger(config: StubberConfig, logger: Arc<dyn StubLogger>) -> Self {
        let registry = Arc::new(StubRegistry::with_logger(logger));
        let interceptor = StubInterceptor::new(registry.clone());

        info!(
            marker = %config.launch.marker,
            prefer_environment = config.launch.prefer_environment,
            "Network stubber initialized"
        );

        Self {
            config,
            registry,
            interceptor,
        }
    }

    /// Create from a YAML configuration string.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        Ok(Self::new(StubberConfig::from_yaml(yaml)?))
    }

    pub fn config(&self) -> &StubberConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<StubRegistry> {
        &self.registry
    }

    pub fn interceptor(&self) -> &StubInterceptor {
        &self.interceptor
    }

    pub fn add(&self, stub: Stub) {
        self.registry.add(stub);
    }

    pub fn add_stubs(&self, stubs: impl IntoIterator<Item = Stub>) {
        self.registry.add_all(stubs);
    }

    pub fn purge(&self) {
        self.registry.purge();
    }

    pub fn can_init<R: InterceptedRequest + ?Sized>(&self, request: &R) -> bool {
        self.interceptor.can_init(request)
    }

    pub fn start_loading<R: InterceptedRequest + ?Sized>(
        &self,
        request: &R,
        client: &mut dyn TransportClient,
    ) -> LoadOutcome {
        self.interceptor.start_loading(request, client)
    }

    pub fn stop_loading<R: InterceptedRequest + ?Sized>(&self, request: &R) {
        self.interceptor.stop_loading(request)
    }

    /// Register stubs handed over through this process's launch configuration.
    ///
    /// Call once at start-up, before any request is made.
    pub fn load_launch_stubs(&self) -> LaunchOutcome {
        self.launch_processor().process_current()
    }

    /// Like [`Self::load_launch_stubs`] with an explicit argument list and environment.
    pub fn load_launch_stubs_from<I, S, F>(&self, args: I, env: F) -> LaunchOutcome
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&str) -> Option<String>,
    {
        self.launch_processor().process(args, env)
    }

    fn launch_processor(&self) -> LaunchArgumentProcessor {
        LaunchArgumentProcessor::new(self.config.launch.clone(), self.registry.clone())
    }
}

impl Default for NetworkStubber {
    fn default() -> Self {
        Self::new(StubberConfig::default())
    }
}
