//! Image operations used by the preprocessor.
//!
//! Images are `Rgb32FImage`s holding unnormalized pixel intensities (0..=255
//! after the cast from `u8`). Random operations take the RNG explicitly so a
//! caller can give each record its own seeded generator.
//!
//! The operations reproduce the standard CIFAR-10 training transforms:
//! 1. `random_crop` - uniform offset, crop must fit inside the image
//! 2. `random_flip_left_right` - 50% probability
//! 3. `random_brightness` - additive delta in `[-max_delta, max_delta)`
//! 4. `random_contrast` - per-channel scaling around the channel mean
//! 5. `resize_with_crop_or_pad` - centered crop and/or zero padding
//! 6. `per_image_standardization` - zero mean, unit variance per image

use image::{imageops, Rgb32FImage};
use rand::Rng;

use crate::{
    dataset::Cifar10Record,
    error::{Cifar10Error, Cifar10Result},
};

/// Cast a record's `u8` pixels to an `f32` image without rescaling.
///
/// Fails unless the buffer holds exactly `height * width * 3` values.
pub fn to_float_image(record: &Cifar10Record) -> Cifar10Result<Rgb32FImage> {
    let shape_error = || Cifar10Error::InvalidImageShape {
        expected: format!("{}x{}x3", record.height, record.width),
        actual: format!("{} values", record.image.len()),
    };
    if record.image.len() != record.height * record.width * 3 {
        return Err(shape_error());
    }

    let data: Vec<f32> = record.image.iter().map(|&v| f32::from(v)).collect();
    Rgb32FImage::from_raw(record.width as u32, record.height as u32, data).ok_or_else(shape_error)
}

/// Crop a `size x size` window at a uniformly random offset.
pub fn random_crop<R: Rng>(
    image: &Rgb32FImage,
    size: u32,
    rng: &mut R,
) -> Cifar10Result<Rgb32FImage> {
    let (width, height) = image.dimensions();
    if width < size || height < size {
        return Err(Cifar10Error::ImageTooSmall {
            height: height as usize,
            width: width as usize,
            crop: size as usize,
        });
    }

    let y = rng.random_range(0..=height - size);
    let x = rng.random_range(0..=width - size);
    Ok(imageops::crop_imm(image, x, y, size, size).to_image())
}

/// Mirror the image horizontally with probability 0.5.
pub fn random_flip_left_right<R: Rng>(image: Rgb32FImage, rng: &mut R) -> Rgb32FImage {
    if rng.random_bool(0.5) {
        imageops::flip_horizontal(&image)
    } else {
        image
    }
}

/// Add a delta drawn from `[-max_delta, max_delta)` to every value.
pub fn random_brightness<R: Rng>(
    image: Rgb32FImage,
    max_delta: f32,
    rng: &mut R,
) -> Rgb32FImage {
    let delta = rng.random_range(-max_delta..max_delta);
    adjust_brightness(image, delta)
}

/// Add `delta` to every value. No clamping: the image is not yet normalized.
pub fn adjust_brightness(mut image: Rgb32FImage, delta: f32) -> Rgb32FImage {
    for value in image.iter_mut() {
        *value += delta;
    }
    image
}

/// Scale contrast by a factor drawn from `[lower, upper)`.
pub fn random_contrast<R: Rng>(
    image: Rgb32FImage,
    lower: f32,
    upper: f32,
    rng: &mut R,
) -> Rgb32FImage {
    let factor = rng.random_range(lower..upper);
    adjust_contrast(image, factor)
}

/// For each channel, move every value away from (or towards) the channel mean:
/// `x <- (x - mean) * factor + mean`.
pub fn adjust_contrast(mut image: Rgb32FImage, factor: f32) -> Rgb32FImage {
    let pixel_count = (image.width() * image.height()) as f64;
    if pixel_count == 0.0 {
        return image;
    }

    let mut sums = [0.0f64; 3];
    for pixel in image.pixels() {
        for (sum, &value) in sums.iter_mut().zip(&pixel.0) {
            *sum += f64::from(value);
        }
    }
    let means = sums.map(|sum| (sum / pixel_count) as f32);

    for pixel in image.pixels_mut() {
        for (value, mean) in pixel.0.iter_mut().zip(means) {
            *value = (*value - mean).mul_add(factor, mean);
        }
    }
    image
}

/// Center-crop and/or zero-pad to exactly `target_height x target_width`.
///
/// Each axis is handled independently: a larger axis is cropped at offset
/// `(size - target) / 2`, a smaller one is padded with zeros at offset
/// `(target - size) / 2`.
pub fn resize_with_crop_or_pad(
    image: &Rgb32FImage,
    target_height: u32,
    target_width: u32,
) -> Rgb32FImage {
    let (width, height) = image.dimensions();

    let crop_x = width.saturating_sub(target_width) / 2;
    let crop_y = height.saturating_sub(target_height) / 2;
    let cropped = imageops::crop_imm(
        image,
        crop_x,
        crop_y,
        width.min(target_width),
        height.min(target_height),
    )
    .to_image();

    if cropped.dimensions() == (target_width, target_height) {
        return cropped;
    }

    let pad_x = target_width.saturating_sub(width) / 2;
    let pad_y = target_height.saturating_sub(height) / 2;
    let mut canvas = Rgb32FImage::new(target_width, target_height);
    imageops::replace(&mut canvas, &cropped, i64::from(pad_x), i64::from(pad_y));
    canvas
}

/// Scale the image to zero mean and unit variance using its own statistics.
///
/// The standard deviation is floored at `1 / sqrt(N)` so uniform images do
/// not divide by zero.
pub fn per_image_standardization(mut image: Rgb32FImage) -> Rgb32FImage {
    let count = image.len();
    if count == 0 {
        return image;
    }
    let n = count as f64;

    let mean = image.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let variance = image
        .iter()
        .map(|&v| {
            let d = f64::from(v) - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    let adjusted_stddev = variance.sqrt().max(1.0 / n.sqrt());

    for value in image.iter_mut() {
        *value = ((f64::from(*value) - mean) / adjusted_stddev) as f32;
    }
    image
}

/// Mean and population variance of all values, for checks and diagnostics.
pub fn moments(values: &[f32]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| f64::from(v)).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|&v| (f64::from(v) - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance)
}
