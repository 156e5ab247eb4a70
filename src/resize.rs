//! Area-averaging resize.
//!
//! Each destination pixel is the coverage-weighted mean of the source pixels
//! its footprint overlaps. When shrinking this averages every contributing
//! sample instead of point-sampling, which avoids aliasing on fine texture.
//!
//! Coverage weights degenerate to nearest-neighbour when an axis grows, so
//! enlarged axes use two-tap linear weights instead. The tap positions match
//! OpenCV's `INTER_AREA` on enlargement: integer factors replicate samples,
//! other factors blend the two nearest ones.

use image::RgbImage;

use crate::{error::FramesiftError, utilities::saturate_u8};

/// Source taps for one destination coordinate: `(source_index, weight)`.
type Taps = Vec<(usize, f32)>;

fn axis_taps(source_len: u32, target_len: u32) -> Vec<Taps> {
    if target_len > source_len {
        enlarging_taps(source_len, target_len)
    } else {
        coverage_taps(source_len, target_len)
    }
}

fn enlarging_taps(source_len: u32, target_len: u32) -> Vec<Taps> {
    let scale = source_len as f64 / target_len as f64;
    let inverse_scale = target_len as f64 / source_len as f64;
    let last = source_len as usize - 1;

    (0..target_len)
        .map(|index| {
            let left = (index as f64 * scale).floor();
            let fraction = (index + 1) as f64 - (left + 1.0) * inverse_scale;
            let fraction = if fraction <= 0.0 {
                0.0
            } else {
                fraction - fraction.floor()
            };
            let left_index = (left as usize).min(last);
            if fraction == 0.0 || left_index == last {
                vec![(left_index, 1.0)]
            } else {
                vec![
                    (left_index, (1.0 - fraction) as f32),
                    (left_index + 1, fraction as f32),
                ]
            }
        })
        .collect()
}

fn coverage_taps(source_len: u32, target_len: u32) -> Vec<Taps> {
    let scale = source_len as f64 / target_len as f64;
    let last = source_len as usize - 1;

    (0..target_len)
        .map(|index| {
            let start = index as f64 * scale;
            let end = (start + scale).min(source_len as f64);
            let mut taps = Vec::new();
            let mut position = start.floor();
            while position < end {
                let overlap = (end.min(position + 1.0) - start.max(position)).max(0.0);
                if overlap > 1e-9 {
                    taps.push(((position as usize).min(last), (overlap / scale) as f32));
                }
                position += 1.0;
            }
            taps
        })
        .collect()
}

/// Resize `source` to exactly `width` x `height`.
///
/// # Errors
///
/// Returns [`FramesiftError::InvalidConfiguration`] when either the target or
/// the source has a zero dimension.
pub fn resize_area(
    source: &RgbImage,
    width: u32,
    height: u32,
) -> Result<RgbImage, FramesiftError> {
    let (source_width, source_height) = source.dimensions();
    if width == 0 || height == 0 {
        return Err(FramesiftError::InvalidConfiguration(format!(
            "target size must be positive, got {width}x{height}"
        )));
    }
    if source_width == 0 || source_height == 0 {
        return Err(FramesiftError::InvalidConfiguration(format!(
            "cannot resize an empty {source_width}x{source_height} frame"
        )));
    }
    if (source_width, source_height) == (width, height) {
        return Ok(source.clone());
    }

    let column_taps = axis_taps(source_width, width);
    let row_taps = axis_taps(source_height, height);
    let raw = source.as_raw();
    let source_stride = source_width as usize * 3;
    let target_stride = width as usize * 3;

    // Horizontal pass: every source row, destination columns.
    let mut horizontal = vec![0.0_f32; source_height as usize * target_stride];
    for row in 0..source_height as usize {
        let source_row = &raw[row * source_stride..(row + 1) * source_stride];
        let out_row = &mut horizontal[row * target_stride..(row + 1) * target_stride];
        for (column, taps) in column_taps.iter().enumerate() {
            let mut sum = [0.0_f32; 3];
            for &(x, weight) in taps {
                for channel in 0..3 {
                    sum[channel] += source_row[x * 3 + channel] as f32 * weight;
                }
            }
            out_row[column * 3..column * 3 + 3].copy_from_slice(&sum);
        }
    }

    // Vertical pass.
    let mut out = vec![0_u8; height as usize * target_stride];
    for (row, taps) in row_taps.iter().enumerate() {
        let out_row = &mut out[row * target_stride..(row + 1) * target_stride];
        for (offset, slot) in out_row.iter_mut().enumerate() {
            let value: f32 = taps
                .iter()
                .map(|&(y, weight)| horizontal[y * target_stride + offset] * weight)
                .sum();
            *slot = saturate_u8(value);
        }
    }

    RgbImage::from_raw(width, height, out).ok_or_else(|| {
        FramesiftError::InvalidConfiguration(format!(
            "resized buffer does not match {width}x{height}x3"
        ))
    })
}
