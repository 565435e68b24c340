//! Status and snapshot sinks

use crate::error::{ReconcileError, ReconcileResult};
use crate::ports::outbound::{ConfigSnapshotSink, PassReport, StatusSink};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Keeps every reported pass outcome
#[derive(Default)]
pub struct RecordingStatusSink {
    reports: RwLock<Vec<PassReport>>,
}

impl RecordingStatusSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<PassReport> {
        self.reports.read().clone()
    }

    pub fn last(&self) -> Option<PassReport> {
        self.reports.read().last().cloned()
    }
}

#[async_trait]
impl StatusSink for RecordingStatusSink {
    async fn report(&self, report: PassReport) -> ReconcileResult<()> {
        self.reports.write().push(report);
        Ok(())
    }
}

/// Named documents with string keys, like a config map
#[derive(Default)]
pub struct InMemorySnapshotSink {
    documents: RwLock<HashMap<String, HashMap<String, String>>>,
    failing: AtomicBool,
}

impl InMemorySnapshotSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str, key: &str) -> Option<String> {
        self.documents.read().get(name)?.get(key).cloned()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConfigSnapshotSink for InMemorySnapshotSink {
    async fn publish(&self, name: &str, key: &str, document: String) -> ReconcileResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReconcileError::Sink {
                reason: format!("failed to write {}/{}", name, key),
            });
        }
        self.documents
            .write()
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), document);
        Ok(())
    }
}
