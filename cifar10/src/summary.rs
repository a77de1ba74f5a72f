//! The `images` diagnostic channel.
//!
//! Every batch is reported as a `tracing` event with target
//! `cifar10::images`. When a summary directory is configured, a few images of
//! every `every`-th batch are also written as PNG files for visual
//! inspection. Nothing here changes the data handed to the caller.

use std::{
    fs,
    path::{Path, PathBuf},
};

use image::{ImageError, RgbImage};

use crate::{
    config::InputConfig,
    dataset::Cifar10Item,
    error::{Cifar10Error, Cifar10Result},
    IMAGE_SIZE,
};

/// Values below this are treated as zero when choosing the display scale.
const ZERO_THRESHOLD: f32 = 1e-6;

/// Reports produced batches on the `images` channel.
#[derive(Debug, Clone)]
pub struct ImageSummary {
    dir: Option<PathBuf>,
    every: usize,
    max_images: usize,
    step: usize,
}

impl ImageSummary {
    pub fn new(dir: Option<PathBuf>, every: usize, max_images: usize) -> Self {
        Self {
            dir,
            every: every.max(1),
            max_images,
            step: 0,
        }
    }

    pub fn from_config(config: &InputConfig) -> Self {
        Self::new(
            config.summary_dir.clone(),
            config.summary_every,
            config.summary_max_images,
        )
    }

    /// Number of batches recorded so far.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Record one batch. Returns the PNG files written, if any.
    pub fn record(&mut self, items: &[Cifar10Item]) -> Cifar10Result<Vec<PathBuf>> {
        let step = self.step;
        self.step += 1;

        let (min, max, mean) = batch_stats(items);
        tracing::info!(
            target: "cifar10::images",
            step,
            shape = ?[items.len(), IMAGE_SIZE, IMAGE_SIZE, 3],
            min,
            max,
            mean,
            "images"
        );

        match &self.dir {
            Some(dir) if step % self.every == 0 => self.write_images(dir, step, items),
            _ => Ok(Vec::new()),
        }
    }

    fn write_images(
        &self,
        dir: &Path,
        step: usize,
        items: &[Cifar10Item],
    ) -> Cifar10Result<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|e| Cifar10Error::SummaryWrite {
            path: dir.to_path_buf(),
            source: ImageError::IoError(e),
        })?;

        let side = IMAGE_SIZE as u32;
        let mut written = Vec::new();
        for (index, item) in items.iter().take(self.max_images).enumerate() {
            let path = dir.join(format!("images_{step:08}_{index}.png"));
            let image = RgbImage::from_raw(side, side, to_display_bytes(&item.input)).ok_or_else(
                || Cifar10Error::InvalidImageShape {
                    expected: format!("{IMAGE_SIZE}x{IMAGE_SIZE}x3"),
                    actual: format!("{} values", item.input.len()),
                },
            )?;
            image
                .save(&path)
                .map_err(|source| Cifar10Error::SummaryWrite {
                    path: path.clone(),
                    source,
                })?;
            written.push(path);
        }
        Ok(written)
    }
}

/// Min, max and mean over every value in the batch.
fn batch_stats(items: &[Cifar10Item]) -> (f32, f32, f32) {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for value in items.iter().flat_map(|item| item.input.iter().copied()) {
        min = min.min(value);
        max = max.max(value);
        sum += f64::from(value);
        count += 1;
    }
    if count == 0 {
        return (0.0, 0.0, 0.0);
    }
    (min, max, (sum / count as f64) as f32)
}

/// Map float values to displayable bytes.
///
/// Non-negative images are scaled so their maximum becomes 255. Images with
/// negative values are centered on 128 and scaled so the largest magnitude
/// reaches the edge of the range.
pub(crate) fn to_display_bytes(values: &[f32]) -> Vec<u8> {
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);

    let (scale, offset) = if min < 0.0 {
        let magnitude = min.abs().max(max.abs());
        let scale = if magnitude < ZERO_THRESHOLD {
            0.0
        } else {
            127.0 / magnitude
        };
        (scale, 128.0)
    } else {
        let scale = if max < ZERO_THRESHOLD { 0.0 } else { 255.0 / max };
        (scale, 0.0)
    };

    values
        .iter()
        .map(|&v| v.mul_add(scale, offset).round().clamp(0.0, 255.0) as u8)
        .collect()
}
