use rand::Rng;

use crate::{
    augmentation::{
        per_image_standardization, random_brightness, random_contrast, random_crop,
        random_flip_left_right, resize_with_crop_or_pad, to_float_image,
    },
    dataset::{Cifar10Item, Cifar10Record},
    error::Cifar10Result,
    IMAGE_SIZE,
};

const MAX_BRIGHTNESS_DELTA: f32 = 63.0;
const CONTRAST_LOWER: f32 = 0.2;
const CONTRAST_UPPER: f32 = 1.8;

/// Turns a [`Cifar10Record`] into a standardized `IMAGE_SIZE` square [`Cifar10Item`].
///
/// With `distords` set (training) the image is randomly cropped, flipped,
/// brightened and contrast-adjusted, in that order. The steps do not commute,
/// and models trained on this distribution expect exactly this order.
/// Otherwise (evaluation) the image is center-cropped or zero-padded.
/// Both modes end with per-image standardization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPreprocessor {
    distords: bool,
}

impl DataPreprocessor {
    pub const fn new(distords: bool) -> Self {
        Self { distords }
    }

    /// Preprocessor with augmentation enabled.
    pub const fn training() -> Self {
        Self::new(true)
    }

    /// Preprocessor for evaluation: deterministic, no augmentation.
    pub const fn evaluation() -> Self {
        Self::new(false)
    }

    pub const fn distords(&self) -> bool {
        self.distords
    }

    /// Process one record. The RNG is only consulted when `distords` is set.
    pub fn process<R: Rng>(&self, record: &Cifar10Record, rng: &mut R) -> Cifar10Result<Cifar10Item> {
        let size = IMAGE_SIZE as u32;
        let image = to_float_image(record)?;

        let image = if self.distords {
            let image = random_crop(&image, size, rng)?;
            let image = random_flip_left_right(image, rng);
            let image = random_brightness(image, MAX_BRIGHTNESS_DELTA, rng);
            random_contrast(image, CONTRAST_LOWER, CONTRAST_UPPER, rng)
        } else {
            resize_with_crop_or_pad(&image, size, size)
        };

        let image = per_image_standardization(image);

        Ok(Cifar10Item {
            input: image.into_raw(),
            target: record.label,
        })
    }
}
