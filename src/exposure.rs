//! # Brightness Estimator
//!
//! Thermal paper has almost no tonal range, so a face that is a little too
//! dark in the camera frame prints as a black blob. The estimator measures
//! the face luminance and returns a multiplicative gain that moves it into a
//! target band.
//!
//! ## Gain Rule
//!
//! ```text
//! no face            -> 1.0
//! L == 0             -> max_gain
//! L <  target_low    -> target_low  / L
//! L >  target_high   -> target_high / L
//! otherwise          -> 1.0
//!
//! result clamped to [min_gain, max_gain]
//! ```
//!
//! `L` is the mean (or a trimmed percentile) of the face box, averaged over
//! all faces. The estimate is a pure function of its inputs.

use image::GrayImage;

use crate::config::{ExposureSettings, LuminanceStatistic};
use crate::frame::FaceRegion;

/// Summarise one face box. `None` if the box lies outside the image.
pub fn face_luminance(
    gray: &GrayImage,
    face: &FaceRegion,
    statistic: LuminanceStatistic,
) -> Option<f32> {
    let region = face.clamp_to(gray.width(), gray.height())?;

    let mut pixels = Vec::with_capacity((region.w * region.h) as usize);
    for y in region.y..region.y + region.h {
        for x in region.x..region.x + region.w {
            pixels.push(gray.get_pixel(x, y).0[0]);
        }
    }

    Some(match statistic {
        LuminanceStatistic::Mean => {
            pixels.iter().map(|&p| p as f64).sum::<f64>() as f32 / pixels.len() as f32
        }
        LuminanceStatistic::Percentile { percentile } => trimmed_percentile(pixels, percentile),
    })
}

/// Drop values outside the 5th..95th percentile, then take `percentile` of
/// what remains.
fn trimmed_percentile(mut pixels: Vec<u8>, percentile: f32) -> f32 {
    pixels.sort_unstable();
    let n = pixels.len();
    let p5 = pixels[(n * 5 / 100).min(n - 1)];
    let p95 = pixels[(n * 95 / 100).min(n - 1)];

    let trimmed: Vec<u8> = pixels
        .iter()
        .copied()
        .filter(|&p| (p5..=p95).contains(&p))
        .collect();
    let sorted = if trimmed.is_empty() { &pixels } else { &trimmed };

    let idx = ((sorted.len() as f32 * percentile / 100.0) as usize).min(sorted.len() - 1);
    sorted[idx] as f32
}

/// Gain for a luminance value under the band rule, clamped.
pub fn gain_for_luminance(luminance: f32, settings: &ExposureSettings) -> f32 {
    let gain = if luminance <= 0.0 {
        settings.max_gain
    } else if luminance < settings.target_low {
        settings.target_low / luminance
    } else if luminance > settings.target_high {
        settings.target_high / luminance
    } else {
        1.0
    };
    gain.clamp(settings.min_gain, settings.max_gain)
}

/// Exposure gain for a frame.
///
/// With `auto` disabled the configured manual gain is used (still clamped).
pub fn estimate_gain(gray: &GrayImage, faces: &[FaceRegion], settings: &ExposureSettings) -> f32 {
    if !settings.auto {
        return settings.manual_gain.clamp(settings.min_gain, settings.max_gain);
    }

    let values: Vec<f32> = faces
        .iter()
        .filter_map(|face| face_luminance(gray, face, settings.statistic))
        .collect();
    if values.is_empty() {
        return 1.0;
    }

    let luminance = values.iter().sum::<f32>() / values.len() as f32;
    gain_for_luminance(luminance, settings)
}

/// Multiply every pixel by `gain`, saturating at 255.
pub fn apply_gain(gray: &mut GrayImage, gain: f32) {
    if (gain - 1.0).abs() < f32::EPSILON {
        return;
    }
    for pixel in gray.pixels_mut() {
        pixel.0[0] = (pixel.0[0] as f32 * gain).round().clamp(0.0, 255.0) as u8;
    }
}
