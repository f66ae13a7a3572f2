//! Bookkeeping for resources acquired at mount.
//!
//! Every GPU object (surface, buffers, pipelines, bind groups) is recorded
//! here when created and released through the ledger at teardown. Releasing
//! a label twice is ignored, so teardown can run from any state.

use tracing::{debug, warn};

/// Label-keyed record of live resources, in acquisition order.
#[derive(Debug, Default, Clone)]
pub struct ResourceLedger {
    live: Vec<&'static str>,
    released: Vec<&'static str>,
}

impl ResourceLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly created resource. A label already live is not
    /// recorded twice.
    pub fn acquire(&mut self, label: &'static str) {
        if self.live.contains(&label) {
            warn!("Resource '{}' acquired twice, keeping a single record", label);
            return;
        }
        self.released.retain(|&l| l != label);
        self.live.push(label);
    }

    /// Mark a resource as disposed. Returns `false` if it was not live.
    pub fn release(&mut self, label: &'static str) -> bool {
        match self.live.iter().position(|&l| l == label) {
            Some(idx) => {
                self.live.remove(idx);
                self.released.push(label);
                true
            }
            None => {
                debug!("Ignoring release of '{}': not live", label);
                false
            }
        }
    }

    /// Release everything still live, newest first. Returns the labels
    /// released by this call.
    pub fn release_all(&mut self) -> Vec<&'static str> {
        let mut drained = Vec::with_capacity(self.live.len());
        while let Some(label) = self.live.pop() {
            self.released.push(label);
            drained.push(label);
        }
        drained
    }

    #[must_use]
    pub fn is_live(&self, label: &str) -> bool {
        self.live.iter().any(|&l| l == label)
    }

    #[must_use]
    pub fn live(&self) -> &[&'static str] {
        &self.live
    }

    /// Every label released so far, in release order.
    #[must_use]
    pub fn released(&self) -> &[&'static str] {
        &self.released
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
