//! Error types for the CIFAR-10 input pipeline.
//!
//! Errors are never recovered inside the pipeline. Whatever fails while
//! loading, preprocessing or batching is handed back to the caller on the
//! pull that hit it.

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `cifar10-burn` operations.
#[derive(Error, Debug)]
pub enum Cifar10Error {
    /// Error when a dataset file cannot be read.
    #[error("Failed to read dataset file: {path}")]
    FileRead {
        /// The file that failed to read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Error when a binary batch file does not hold a whole number of records.
    #[error("Malformed CIFAR-10 batch file {path}: length {len} is not a multiple of the record size")]
    MalformedFile {
        /// The offending file.
        path: PathBuf,
        /// Its length in bytes.
        len: usize,
    },

    /// Error when a record carries a label outside `0..NUM_CLASSES`.
    #[error("Invalid label {label} in record {index}")]
    InvalidLabel {
        /// The label byte read from the file.
        label: u8,
        /// Position of the record within the split.
        index: usize,
    },

    /// Error when an image is too small for the random crop.
    #[error("Image of {height}x{width} is smaller than the {crop}x{crop} crop")]
    ImageTooSmall {
        /// Image height in pixels.
        height: usize,
        /// Image width in pixels.
        width: usize,
        /// Crop edge in pixels.
        crop: usize,
    },

    /// Error when a pixel buffer does not match its declared shape.
    #[error("Invalid image shape: expected {expected}, got {actual}")]
    InvalidImageShape {
        /// The expected shape or element count.
        expected: String,
        /// The actual shape or element count.
        actual: String,
    },

    /// Error when a split holds no records to repeat.
    #[error("The {split} split is empty")]
    EmptyDataset {
        /// Name of the empty split.
        split: String,
    },

    /// Error when the dataset returns nothing for an index it advertised.
    #[error("Dataset has no record at index {index}")]
    MissingRecord {
        /// The sampled index.
        index: usize,
    },

    /// Error when a pipeline is requested with a zero batch size.
    #[error("Batch size must be positive, got {batch_size}")]
    InvalidBatchSize {
        /// The rejected batch size.
        batch_size: usize,
    },

    /// Error when the preprocessing worker pool cannot be created.
    #[error("Failed to build preprocessing thread pool")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Error when the background producer thread cannot be started.
    #[error("Failed to spawn input producer thread")]
    ThreadSpawn {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Error when an image summary cannot be written.
    #[error("Failed to write image summary: {path}")]
    SummaryWrite {
        /// The PNG file that failed to write.
        path: PathBuf,
        /// The underlying image error.
        #[source]
        source: image::ImageError,
    },

    /// Error when the background producer stopped before a batch was complete.
    #[error("Input pipeline producer stopped unexpectedly")]
    PipelineClosed,
}

/// A specialized `Result` type for `cifar10-burn` operations.
pub type Cifar10Result<T> = Result<T, Cifar10Error>;
