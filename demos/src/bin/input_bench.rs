//! Measures how fast the augmented training pipeline produces batches.
//!
//! ```bash
//! cargo run --release --bin input_bench -- --batch-size 256 --num-batches 200
//! ```

use std::{path::PathBuf, time::Instant};

use anyhow::{ensure, Context, Result};
use cifar10_burn::{distorted_inputs, Cifar10Source, InputConfig};
use cifar10_demos::{
    common::{create_device, get_backend_name, init_logging},
    load_config, BenchConfig, SelectedBackend,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the CIFAR-10 binary files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Number of timed batches
    #[arg(long)]
    num_batches: Option<usize>,

    /// Preprocessing threads
    #[arg(long)]
    num_parallel_calls: Option<usize>,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let mut config: BenchConfig = load_config(args.config.as_deref())?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(num_batches) = args.num_batches {
        config.num_batches = num_batches;
    }
    if let Some(workers) = args.num_parallel_calls {
        config.num_parallel_calls = workers;
    }
    ensure!(config.batch_size > 0, "Batch size must be greater than 0");
    ensure!(config.num_batches > 0, "Number of batches must be greater than 0");

    let device = create_device();
    tracing::info!(backend = get_backend_name(), "using backend");

    let input_config = InputConfig::new()
        .with_data_dir(config.data_dir.clone())
        .with_num_parallel_calls(config.num_parallel_calls)
        .with_prefetch_batches(config.prefetch_batches);
    let source = Cifar10Source::from_config(&input_config).context("Failed to load CIFAR-10")?;

    let mut pipeline =
        distorted_inputs::<SelectedBackend>(&source, &input_config, config.batch_size, &device)
            .context("Failed to build training pipeline")?;

    for _ in 0..config.warmup_batches {
        pipeline.next_batch()?;
    }

    let start = Instant::now();
    let mut timings = Vec::with_capacity(config.num_batches);
    for _ in 0..config.num_batches {
        let batch_start = Instant::now();
        pipeline.next_batch()?;
        timings.push(batch_start.elapsed());
    }
    let total = start.elapsed();

    let batches_per_sec = config.num_batches as f32 / total.as_secs_f32();
    let slowest = timings.iter().max().copied().unwrap_or_default();
    println!(
        "Total time: {total:?}, Speed: {batches_per_sec:.2} batches/s ({:.0} images/s), slowest pull: {slowest:?}",
        batches_per_sec * config.batch_size as f32
    );

    Ok(())
}
