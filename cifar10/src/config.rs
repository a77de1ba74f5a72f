use std::path::PathBuf;

use burn::prelude::*;

/// Runtime settings for the CIFAR-10 input pipeline.
///
/// Saved and loaded as JSON through Burn's [`Config`] trait.
#[derive(Config, Debug)]
pub struct InputConfig {
    /// Directory holding the `*.bin` batch files.
    #[config(default = "PathBuf::from(\"datasets/cifar10/cifar-10-batches-bin\")")]
    pub data_dir: PathBuf,

    /// Number of records preprocessed concurrently.
    #[config(default = 10)]
    pub num_parallel_calls: usize,

    /// Capacity of the prefetch queue, counted in batches.
    #[config(default = 4)]
    pub prefetch_batches: usize,

    /// Reshuffle the training split on every pass over it.
    #[config(default = "true")]
    pub shuffle: bool,

    #[config(default = "None")]
    pub seed: Option<u64>,

    /// Where to write PNG image summaries. Nothing is written when unset.
    #[config(default = "None")]
    pub summary_dir: Option<PathBuf>,

    #[config(default = 100)]
    pub summary_every: usize,

    #[config(default = 3)]
    pub summary_max_images: usize,
}

impl InputConfig {
    /// Number of processed records the prefetch queue may hold.
    pub(crate) fn prefetch_records(&self, batch_size: usize) -> usize {
        self.prefetch_batches.max(1) * batch_size
    }
}
