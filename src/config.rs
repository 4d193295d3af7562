//! Analytics configuration.

use serde::{Deserialize, Serialize};

use crate::Result;

/// Tunables shared by the facade, the local runtime and the result writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Number of compute workers (graph partitions).
    pub workers: usize,
    /// Pending (vertex, value) pairs a result writer buffers before flushing.
    pub write_batch_size: usize,
    /// Whole-batch retries after a failed first attempt before a flush
    /// escalates to `Error::Persistence`.
    pub write_max_retries: u32,
    /// Polls of the schema view after a result type is created.
    pub schema_visibility_checks: u32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            write_batch_size: 100,
            write_max_retries: 10,
            schema_visibility_checks: 10,
        }
    }
}

impl AnalyticsConfig {
    /// Parse from JSON; absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_write_batch_size(mut self, size: usize) -> Self {
        self.write_batch_size = size.max(1);
        self
    }

    pub fn with_write_max_retries(mut self, retries: u32) -> Self {
        self.write_max_retries = retries;
        self
    }

    pub fn with_schema_visibility_checks(mut self, checks: u32) -> Self {
        self.schema_visibility_checks = checks.max(1);
        self
    }
}
