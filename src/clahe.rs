//! Contrast-limited adaptive histogram equalization (CLAHE).
//!
//! The plane is split into a grid of tiles. Each tile gets its own
//! equalization curve built from a clipped histogram, and every pixel is
//! mapped by bilinearly blending the curves of the four nearest tile centres.
//! When the plane does not divide evenly into the grid it is extended on the
//! right and bottom by mirroring before histograms are taken.

use image::GrayImage;

use crate::{
    error::FramesiftError,
    utilities::{reflect_101, saturate_u8},
};

const BINS: usize = 256;

/// Equalize `plane` with a `tile_grid` x `tile_grid` tiling and the given
/// clip limit. A clip limit of zero or less disables clipping.
///
/// # Errors
///
/// Returns [`FramesiftError::InvalidConfiguration`] for an empty plane or a
/// zero tile grid.
pub fn equalize(
    plane: &GrayImage,
    tile_grid: u32,
    clip_limit: f32,
) -> Result<GrayImage, FramesiftError> {
    let (width, height) = plane.dimensions();
    if width == 0 || height == 0 {
        return Err(FramesiftError::InvalidConfiguration(
            "cannot equalize an empty plane".to_string(),
        ));
    }
    if tile_grid == 0 {
        return Err(FramesiftError::InvalidConfiguration(
            "tile grid must be at least 1x1".to_string(),
        ));
    }

    let tiles = tile_grid as usize;
    let (width, height) = (width as usize, height as usize);
    let tile_width = width.div_ceil(tiles);
    let tile_height = height.div_ceil(tiles);
    let tile_area = tile_width * tile_height;
    let samples = plane.as_raw();

    let clip = if clip_limit > 0.0 {
        Some(((clip_limit * tile_area as f32 / BINS as f32) as u32).max(1))
    } else {
        None
    };

    let mut curves = Vec::with_capacity(tiles * tiles);
    for tile_y in 0..tiles {
        for tile_x in 0..tiles {
            let mut histogram = [0_u32; BINS];
            for y in tile_y * tile_height..(tile_y + 1) * tile_height {
                let row = reflect_101(y as isize, height) * width;
                for x in tile_x * tile_width..(tile_x + 1) * tile_width {
                    let value = samples[row + reflect_101(x as isize, width)];
                    histogram[value as usize] += 1;
                }
            }
            if let Some(limit) = clip {
                clip_histogram(&mut histogram, limit);
            }
            curves.push(cumulative_curve(&histogram, tile_area));
        }
    }

    let columns = tile_blend(width, tile_width, tiles);
    let rows = tile_blend(height, tile_height, tiles);

    let mut out = Vec::with_capacity(width * height);
    for (y, row) in rows.iter().enumerate() {
        let upper = &curves[row.first * tiles..(row.first + 1) * tiles];
        let lower = &curves[row.second * tiles..(row.second + 1) * tiles];
        for (x, column) in columns.iter().enumerate() {
            let value = samples[y * width + x] as usize;
            let top = upper[column.first][value] as f32 * (1.0 - column.fraction)
                + upper[column.second][value] as f32 * column.fraction;
            let bottom = lower[column.first][value] as f32 * (1.0 - column.fraction)
                + lower[column.second][value] as f32 * column.fraction;
            out.push(saturate_u8(top * (1.0 - row.fraction) + bottom * row.fraction));
        }
    }

    GrayImage::from_raw(width as u32, height as u32, out).ok_or_else(|| {
        FramesiftError::InvalidConfiguration("equalized plane has the wrong size".to_string())
    })
}

/// Cap every bin at `limit` and spread the excess evenly, handing any
/// remainder out one count at a time across the range.
fn clip_histogram(histogram: &mut [u32; BINS], limit: u32) {
    let mut excess = 0_u32;
    for count in histogram.iter_mut() {
        if *count > limit {
            excess += *count - limit;
            *count = limit;
        }
    }

    let batch = excess / BINS as u32;
    let mut residual = excess - batch * BINS as u32;
    for count in histogram.iter_mut() {
        *count += batch;
    }

    if residual > 0 {
        let step = (BINS / residual as usize).max(1);
        let mut bin = 0;
        while bin < BINS && residual > 0 {
            histogram[bin] += 1;
            bin += step;
            residual -= 1;
        }
    }
}

fn cumulative_curve(histogram: &[u32; BINS], tile_area: usize) -> [u8; BINS] {
    let scale = (BINS - 1) as f32 / tile_area as f32;
    let mut curve = [0_u8; BINS];
    let mut running = 0_u32;
    for (bin, &count) in histogram.iter().enumerate() {
        running += count;
        curve[bin] = saturate_u8(running as f32 * scale);
    }
    curve
}

/// The two neighbouring tiles for one coordinate and the weight of the second.
struct Blend {
    first: usize,
    second: usize,
    fraction: f32,
}

fn tile_blend(len: usize, tile_len: usize, tiles: usize) -> Vec<Blend> {
    (0..len)
        .map(|position| {
            let scaled = position as f32 / tile_len as f32 - 0.5;
            let lower = scaled.floor();
            let fraction = scaled - lower;
            let lower = lower as isize;
            Blend {
                first: lower.max(0) as usize,
                second: ((lower + 1) as usize).min(tiles - 1),
                fraction,
            }
        })
        .collect()
}
