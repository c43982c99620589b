//! Engine configuration.
//!
//! Every flag the original carried as a global `gflags` registry is a field
//! here instead, constructed once and threaded explicitly into the chunk
//! store, planner and search driver.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// log2(chunk size), range (10, 30).
    pub chunk_power: u8,
    /// log2(content-map arena chunk size).
    pub content_chunk_power: u8,
    pub threads: usize,
    pub max_matches: i32,
    pub timeout_ms: u64,
    pub line_limit: usize,
    /// Disables suffix-array use; every chunk is searched with `full_search`.
    pub index_enabled: bool,

    // Planner tuning, see cs-planner.
    pub min_weight: f64,
    pub max_width: usize,
    pub max_recursion: u32,
    pub max_nodes: u64,

    // Chunk store tuning.
    pub max_gap: u32,

    // Filtered searcher tuning.
    pub min_filter_ratio: u32,
    pub min_skip: u32,
    pub max_scan: usize,

    pub max_hir_nodes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chunk_power: 27,
            content_chunk_power: 22,
            threads: 4,
            max_matches: 50,
            timeout_ms: 1000,
            line_limit: 1024,
            index_enabled: true,
            min_weight: 16.0,
            max_width: 32,
            max_recursion: 10,
            max_nodes: 1 << 24,
            max_gap: 1 << 10,
            min_filter_ratio: 50,
            min_skip: 250,
            max_scan: 1 << 20,
            max_hir_nodes: 100_000,
        }
    }
}

impl Config {
    pub fn chunk_size(&self) -> usize {
        1usize << self.chunk_power
    }

    pub fn content_chunk_size(&self) -> usize {
        1usize << self.content_chunk_power
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }
}
