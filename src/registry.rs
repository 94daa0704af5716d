//! Stub registry and request matching.
//!
//! Stubs are keyed by their exact target string. Resolution is a prefix
//! match: a stub applies to every request whose URL starts with the stub's
//! target. When several targets qualify, the first one in lexicographic order
//! wins (not the longest).

use crate::logger::{StubLogger, TracingLogger};
use crate::stub::{Stub, StubTarget};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// In-memory store of stubs, safe to share between the test driver and the
/// interception engine.
pub struct StubRegistry {
    /// Ordered by target string, which is the resolution order
    stubs: RwLock<BTreeMap<StubTarget, Stub>>,
    logger: Arc<dyn StubLogger>,
}

impl StubRegistry {
    /// Create an empty registry logging through `tracing`.
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingLogger))
    }

    pub fn with_logger(logger: Arc<dyn StubLogger>) -> Self {
        Self {
            stubs: RwLock::new(BTreeMap::new()),
            logger,
        }
    }

    pub fn logger(&self) -> &Arc<dyn StubLogger> {
        &self.logger
    }

    /// Insert a stub, replacing any stub with the same target.
    pub fn add(&self, stub: Stub) {
        let target = stub.target().clone();
        self.stubs.write().insert(target.clone(), stub);
        self.log_added(&target);
    }

    /// Insert a batch in order. Readers see either none or all of it.
    ///
    /// The iterator is drained before the lock is taken, so it may itself
    /// query this registry.
    pub fn add_all(&self, stubs: impl IntoIterator<Item = Stub>) {
        let stubs: Vec<Stub> = stubs.into_iter().collect();
        let added: Vec<StubTarget> = stubs.iter().map(|stub| stub.target().clone()).collect();
        {
            let mut map = self.stubs.write();
            for stub in stubs {
                map.insert(stub.target().clone(), stub);
            }
        }
        for target in &added {
            self.log_added(target);
        }
    }

    /// Find the stub for a request URL.
    pub fn resolve(&self, request_target: &str) -> Option<Stub> {
        self.stubs
            .read()
            .iter()
            .find(|(target, _)| target.is_prefix_of(request_target))
            .map(|(_, stub)| stub.clone())
    }

    pub fn can_handle(&self, request_target: &str) -> bool {
        self.stubs
            .read()
            .keys()
            .any(|target| target.is_prefix_of(request_target))
    }

    /// Remove every stub.
    pub fn purge(&self) {
        self.stubs.write().clear();
    }

    pub fn len(&self) -> usize {
        self.stubs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stubs.read().is_empty()
    }

    /// Registered targets in resolution order.
    pub fn targets(&self) -> Vec<StubTarget> {
        self.stubs.read().keys().cloned().collect()
    }

    fn log_added(&self, target: &StubTarget) {
        self.logger
            .log_message(&format!("URL: {} added to NetworkStubber", target));
    }
}

impl Default for StubRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StubRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StubRegistry")
            .field("targets", &self.targets())
            .finish()
    }
}
