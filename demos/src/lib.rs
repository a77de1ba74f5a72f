//! CIFAR-10 pipeline demos
//!
//! Command-line tools built on `cifar10-burn`.
//!
//! ## Available tools
//!
//! - `dataset_test`: load the dataset and print per-record and per-batch statistics
//! - `input_bench`: measure the throughput of the training pipeline
//!
//! ## Usage
//!
//! ```bash
//! # Inspect the dataset
//! cargo run --bin dataset_test -- --data-dir datasets/cifar10/cifar-10-batches-bin
//!
//! # Write PNG summaries of the augmented batches
//! cargo run --bin dataset_test -- --summary-dir runs/images
//!
//! # Benchmark the training pipeline with 4 workers
//! cargo run --release --bin input_bench -- --num-parallel-calls 4
//! ```

pub mod common;
pub mod config;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

pub use common::{create_device, get_backend_name, SelectedBackend, SelectedDevice};
pub use config::{BenchConfig, DatasetTestConfig};

/// Load a JSON config file, or fall back to the type's defaults.
pub fn load_config<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T> {
    let Some(path) = path else {
        return Ok(T::default());
    };
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
