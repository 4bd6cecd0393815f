//! Worker configuration

use serde::{Deserialize, Serialize};

/// Per-worker configuration shared by every fragment of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Threads in the local parallel engine (vertex loops)
    pub thread_num: usize,

    /// Verify the CRC of every incoming frame
    pub verify_frames: bool,

    /// Emit a debug record for every finished round
    pub log_rounds: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            thread_num: 1,
            verify_frames: true,
            log_rounds: true,
        }
    }
}

impl WorkerConfig {
    /// Create a configuration with the given local parallelism
    pub fn new(thread_num: usize) -> Self {
        Self {
            thread_num,
            ..Default::default()
        }
    }

    /// Set local parallelism
    pub fn with_thread_num(mut self, thread_num: usize) -> Self {
        self.thread_num = thread_num;
        self
    }

    /// Enable/disable CRC verification of incoming frames
    pub fn with_verify_frames(mut self, enabled: bool) -> Self {
        self.verify_frames = enabled;
        self
    }

    /// Enable/disable per-round logging
    pub fn with_log_rounds(mut self, enabled: bool) -> Self {
        self.log_rounds = enabled;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_num == 0 {
            return Err("thread_num must be at least 1".into());
        }
        Ok(())
    }
}
