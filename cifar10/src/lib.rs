//! CIFAR-10 input pipeline for the Burn deep learning framework.
//!
//! Loads the CIFAR-10 binary distribution, preprocesses every record to a
//! standardized `IMAGE_SIZE x IMAGE_SIZE x 3` image and serves an endless
//! stream of fixed-size batches:
//!
//! ```no_run
//! use burn::backend::NdArray;
//! use cifar10_burn::{distorted_inputs, Cifar10Source, InputConfig};
//!
//! # fn main() -> cifar10_burn::Cifar10Result<()> {
//! let config = InputConfig::new();
//! let source = Cifar10Source::from_config(&config)?;
//! let device = Default::default();
//!
//! let mut train = distorted_inputs::<NdArray>(&source, &config, 128, &device)?;
//! let (images, labels) = train.next_batch()?.into_parts();
//! assert_eq!(images.dims(), [128, 24, 24, 3]);
//! assert_eq!(labels.dims(), [128]);
//! # Ok(())
//! # }
//! ```

pub mod augmentation;
mod config;
mod dataset;
mod error;
mod pipeline;
mod preprocessing;
mod summary;

use burn::tensor::backend::Backend;

pub use config::InputConfig;
pub use dataset::{
    Cifar10Batch, Cifar10Batcher, Cifar10Dataset, Cifar10Item, Cifar10Record, Cifar10Source, Split,
};
pub use error::{Cifar10Error, Cifar10Result};
pub use pipeline::InputPipeline;
pub use preprocessing::DataPreprocessor;
pub use summary::ImageSummary;

/// Edge length of processed images. The source images are 32 x 32; changing
/// this changes the input shape of every model trained on the pipeline.
pub const IMAGE_SIZE: usize = 24;

/// Number of CIFAR-10 classes.
pub const NUM_CLASSES: usize = 10;
pub const NUM_EXAMPLES_PER_EPOCH_FOR_TRAIN: usize = 50_000;
pub const NUM_EXAMPLES_PER_EPOCH_FOR_EVAL: usize = 10_000;

/// Edge length of the images stored in the binary files.
pub const SOURCE_IMAGE_SIZE: usize = 32;
pub const NUM_CHANNELS: usize = 3;

/// Class names in label order, as listed in `batches.meta.txt`.
pub const CLASS_NAMES: [&str; NUM_CLASSES] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Endless augmented batches from the training split.
///
/// Every image is randomly cropped, flipped and jittered in brightness and
/// contrast before standardization.
pub fn distorted_inputs<B: Backend>(
    source: &Cifar10Source,
    config: &InputConfig,
    batch_size: usize,
    device: &B::Device,
) -> Cifar10Result<InputPipeline<B>> {
    images_labels(source, Split::Train, true, config, batch_size, device)
}

/// Endless unaugmented batches for evaluation.
///
/// Reads the test split when `eval_data` is `"test"` and the training split
/// otherwise. Images are center-cropped, never distorted.
pub fn inputs<B: Backend>(
    source: &Cifar10Source,
    config: &InputConfig,
    eval_data: &str,
    batch_size: usize,
    device: &B::Device,
) -> Cifar10Result<InputPipeline<B>> {
    let split = Split::from_eval_data(eval_data);
    images_labels(source, split, false, config, batch_size, device)
}

fn images_labels<B: Backend>(
    source: &Cifar10Source,
    split: Split,
    distords: bool,
    config: &InputConfig,
    batch_size: usize,
    device: &B::Device,
) -> Cifar10Result<InputPipeline<B>> {
    InputPipeline::new(
        source.split(split),
        DataPreprocessor::new(distords),
        batch_size,
        config,
        device,
    )
}
