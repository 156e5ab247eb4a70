//! Non-local-means denoising.
//!
//! Every output pixel is a weighted mean of the pixels in a square search
//! window around it. A candidate's weight falls off with the mean squared
//! difference between the small template patches centred on the two pixels,
//! so repeated texture reinforces itself while edges stay put.
//!
//! The colour variant works in L\*a\*b\*: lightness is filtered on its own and
//! the two chroma planes are filtered together, each with its own strength.
//!
//! Patch distances are summed with a separable sliding box per search offset,
//! which keeps the cost at `O(pixels x search_area)` rather than also paying
//! for the template area. With the `rayon` feature the image is cut into row
//! bands processed in parallel; the arithmetic per pixel is the same, so the
//! result does not depend on the thread count.

use image::{GrayImage, RgbImage};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{
    color::{LabImage, lab_to_rgb, rgb_to_lab},
    error::FramesiftError,
    utilities::{reflect_101, saturate_u8},
};

/// Rows handled per unit of work.
const BAND_ROWS: usize = 16;

/// Weights below this are dropped.
const MIN_WEIGHT: f32 = 0.001;

/// `-ln(MIN_WEIGHT)`: exponents past this cannot produce a usable weight.
const MAX_EXPONENT: f32 = 6.907_755;

/// Window sizes for the filter. Both must be odd.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Windows {
    /// Side of the comparison patch.
    pub template: usize,
    /// Side of the neighbourhood searched for similar patches.
    pub search: usize,
}

impl Windows {
    fn validate(self) -> Result<(), FramesiftError> {
        if self.template % 2 == 0 || self.search % 2 == 0 {
            return Err(FramesiftError::InvalidConfiguration(format!(
                "denoise windows must be odd, got template {} and search {}",
                self.template, self.search
            )));
        }
        Ok(())
    }
}

/// Denoise an sRGB frame with luma strength `strength` and chroma strength
/// `color_strength`. Strengths of zero leave the matching planes untouched.
pub fn denoise_colored(
    image: &RgbImage,
    strength: f32,
    color_strength: f32,
    windows: Windows,
) -> Result<RgbImage, FramesiftError> {
    windows.validate()?;
    if strength <= 0.0 && color_strength <= 0.0 {
        return Ok(image.clone());
    }

    let lab = rgb_to_lab(image);
    let mut lightness = denoise_planes(&[&lab.lightness], strength, windows)?;
    let mut chroma = denoise_planes(&[&lab.a, &lab.b], color_strength, windows)?;

    let b = chroma.pop();
    let a = chroma.pop();
    let lightness = lightness.pop();
    match (lightness, a, b) {
        (Some(lightness), Some(a), Some(b)) => lab_to_rgb(&LabImage { lightness, a, b }),
        _ => Err(FramesiftError::InvalidConfiguration(
            "denoiser returned the wrong number of planes".to_string(),
        )),
    }
}

/// Jointly denoise same-sized planes. Patch distance is averaged over the
/// template and over the planes, so `strength` means the same thing for one
/// plane or several.
pub fn denoise_planes(
    planes: &[&GrayImage],
    strength: f32,
    windows: Windows,
) -> Result<Vec<GrayImage>, FramesiftError> {
    windows.validate()?;
    let Some(first) = planes.first() else {
        return Ok(Vec::new());
    };
    let (width, height) = first.dimensions();
    if planes.iter().any(|plane| plane.dimensions() != (width, height)) {
        return Err(FramesiftError::InvalidConfiguration(
            "denoise planes must share one size".to_string(),
        ));
    }
    if width == 0 || height == 0 || strength <= 0.0 {
        return Ok(planes.iter().map(|&plane| plane.clone()).collect());
    }

    let filter = NlMeans::new(planes, strength, windows);
    let channels = planes.len();
    let band_len = BAND_ROWS * filter.width * channels;
    let mut interleaved = vec![0_u8; filter.width * filter.height * channels];

    #[cfg(feature = "rayon")]
    interleaved
        .par_chunks_mut(band_len)
        .enumerate()
        .for_each(|(band, chunk)| filter.band(band * BAND_ROWS, chunk));

    #[cfg(not(feature = "rayon"))]
    interleaved
        .chunks_mut(band_len)
        .enumerate()
        .for_each(|(band, chunk)| filter.band(band * BAND_ROWS, chunk));

    (0..channels)
        .map(|channel| {
            let samples = interleaved.iter().skip(channel).step_by(channels).copied().collect();
            GrayImage::from_raw(width, height, samples).ok_or_else(|| {
                FramesiftError::InvalidConfiguration(
                    "denoised plane has the wrong size".to_string(),
                )
            })
        })
        .collect()
}

struct NlMeans {
    /// Planes extended by `pad` mirrored pixels on every side.
    padded: Vec<Vec<u8>>,
    padded_width: usize,
    pad: usize,
    width: usize,
    height: usize,
    template_radius: usize,
    search_radius: usize,
    /// `1 / (template_area * channels * strength^2)`.
    exponent_scale: f32,
}

impl NlMeans {
    fn new(planes: &[&GrayImage], strength: f32, windows: Windows) -> Self {
        let (width, height) = planes[0].dimensions();
        let (width, height) = (width as usize, height as usize);
        let template_radius = windows.template / 2;
        let search_radius = windows.search / 2;
        let pad = template_radius + search_radius;
        let padded_width = width + 2 * pad;
        let padded_height = height + 2 * pad;

        let padded = planes
            .iter()
            .map(|plane| {
                let raw = plane.as_raw();
                let mut out = Vec::with_capacity(padded_width * padded_height);
                for y in 0..padded_height {
                    let row = reflect_101(y as isize - pad as isize, height) * width;
                    for x in 0..padded_width {
                        out.push(raw[row + reflect_101(x as isize - pad as isize, width)]);
                    }
                }
                out
            })
            .collect();

        let template_area = (windows.template * windows.template) as f32;
        let exponent_scale = 1.0 / (template_area * planes.len() as f32 * strength * strength);

        Self {
            padded,
            padded_width,
            pad,
            width,
            height,
            template_radius,
            search_radius,
            exponent_scale,
        }
    }

    /// Filter the rows starting at `first_row` into `out`, interleaved by
    /// channel.
    fn band(&self, first_row: usize, out: &mut [u8]) {
        let channels = self.padded.len();
        let rows = out.len() / (self.width * channels);
        let template = 2 * self.template_radius + 1;
        let region_width = self.width + 2 * self.template_radius;
        let region_height = rows + 2 * self.template_radius;
        // Padded coordinates of the band's top-left template corner.
        let region_x = self.pad - self.template_radius;
        let region_y = first_row + self.pad - self.template_radius;

        let mut difference = vec![0_u32; region_width * region_height];
        let mut column_sums = vec![0_u32; region_width];
        let mut weight_sums = vec![0.0_f32; rows * self.width];
        let mut accumulators = vec![0.0_f32; rows * self.width * channels];

        let radius = self.search_radius as isize;
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                self.squared_differences(
                    (region_x, region_y),
                    (dx, dy),
                    region_width,
                    &mut difference,
                );

                column_sums.fill(0);
                for row in difference.chunks_exact(region_width).take(template) {
                    for (sum, &value) in column_sums.iter_mut().zip(row) {
                        *sum += value;
                    }
                }

                for row in 0..rows {
                    if row > 0 {
                        let leaving = &difference[(row - 1) * region_width..row * region_width];
                        let entering = &difference
                            [(row + template - 1) * region_width..(row + template) * region_width];
                        for ((sum, &old), &new) in
                            column_sums.iter_mut().zip(leaving).zip(entering)
                        {
                            *sum = *sum - old + new;
                        }
                    }

                    let mut window: u32 = column_sums[..template].iter().sum();
                    let source_row = (first_row + row + self.pad) as isize + dy;
                    for x in 0..self.width {
                        if x > 0 {
                            window = window - column_sums[x - 1] + column_sums[x + template - 1];
                        }

                        let exponent = window as f32 * self.exponent_scale;
                        if exponent > MAX_EXPONENT {
                            continue;
                        }
                        let weight = (-exponent).exp();
                        if weight < MIN_WEIGHT {
                            continue;
                        }

                        let pixel = row * self.width + x;
                        weight_sums[pixel] += weight;
                        let column = ((x + self.pad) as isize + dx) as usize;
                        let source = source_row as usize * self.padded_width + column;
                        for (channel, plane) in self.padded.iter().enumerate() {
                            let sample = plane[source] as f32;
                            accumulators[pixel * channels + channel] += weight * sample;
                        }
                    }
                }
            }
        }

        for (pixel, &total) in weight_sums.iter().enumerate() {
            for channel in 0..channels {
                let index = pixel * channels + channel;
                out[index] = saturate_u8(accumulators[index] / total);
            }
        }
    }

    /// Fill `difference` with the per-pixel squared distance, summed over
    /// planes, between the region starting at `origin` and the same region
    /// shifted by `offset`.
    fn squared_differences(
        &self,
        origin: (usize, usize),
        offset: (isize, isize),
        region_width: usize,
        difference: &mut [u32],
    ) {
        let (origin_x, origin_y) = origin;
        let (dx, dy) = offset;
        difference.fill(0);
        for plane in &self.padded {
            for (row, out_row) in difference.chunks_exact_mut(region_width).enumerate() {
                let y = origin_y + row;
                let shifted_y = (y as isize + dy) as usize;
                let base = &plane[y * self.padded_width + origin_x..][..region_width];
                let start = (shifted_y * self.padded_width) as isize + origin_x as isize + dx;
                let shifted = &plane[start as usize..][..region_width];
                for ((slot, &a), &b) in out_row.iter_mut().zip(base).zip(shifted) {
                    let delta = a as i32 - b as i32;
                    *slot += (delta * delta) as u32;
                }
            }
        }
    }
}
