//! Configuration for the demo binaries.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Configuration for the `dataset_test` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetTestConfig {
    /// Directory holding the CIFAR-10 `*.bin` files.
    pub data_dir: PathBuf,
    /// Number of individual records to inspect.
    pub num_samples: usize,
    /// Number of batches to pull from each pipeline.
    pub num_batches: usize,
    pub batch_size: usize,
    /// Preprocessing threads per pipeline.
    pub num_parallel_calls: usize,
    pub seed: Option<u64>,
    /// Where to write PNG image summaries, if anywhere.
    pub summary_dir: Option<PathBuf>,
}

impl Default for DatasetTestConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("datasets/cifar10/cifar-10-batches-bin"),
            num_samples: 10,
            num_batches: 3,
            batch_size: 128,
            num_parallel_calls: 10,
            seed: None,
            summary_dir: None,
        }
    }
}

/// Configuration for the `input_bench` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub data_dir: PathBuf,
    pub batch_size: usize,
    /// Batches pulled before timing starts.
    pub warmup_batches: usize,
    /// Batches timed.
    pub num_batches: usize,
    pub num_parallel_calls: usize,
    pub prefetch_batches: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("datasets/cifar10/cifar-10-batches-bin"),
            batch_size: 128,
            warmup_batches: 5,
            num_batches: 100,
            num_parallel_calls: 10,
            prefetch_batches: 4,
        }
    }
}
