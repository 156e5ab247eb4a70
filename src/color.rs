//! Colour-space conversions used by the transform stage.
//!
//! L\*a\*b\* values use the common 8-bit encoding: `L` scaled from `0..=100`
//! to `0..=255`, `a` and `b` offset by 128. The white point is D65 and the
//! RGB input is treated as sRGB.

use std::sync::OnceLock;

use image::{GrayImage, RgbImage};

use crate::{error::FramesiftError, utilities::saturate_u8};

const WHITE_X: f32 = 0.950_456;
const WHITE_Z: f32 = 1.088_754;
const EPSILON: f32 = 0.008_856;
const KAPPA_SLOPE: f32 = 7.787;
const OFFSET: f32 = 16.0 / 116.0;

/// An image split into 8-bit L\*, a\* and b\* planes of identical size.
#[derive(Debug, Clone, PartialEq)]
pub struct LabImage {
    /// Lightness, `0..=255` for `L* = 0..=100`.
    pub lightness: GrayImage,
    /// Green–red axis, offset by 128.
    pub a: GrayImage,
    /// Blue–yellow axis, offset by 128.
    pub b: GrayImage,
}

impl LabImage {
    /// Width and height shared by all three planes.
    pub fn dimensions(&self) -> (u32, u32) {
        self.lightness.dimensions()
    }
}

fn srgb_to_linear_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0_f32; 256];
        for (value, slot) in table.iter_mut().enumerate() {
            let c = value as f32 / 255.0;
            *slot = if c <= 0.040_45 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
        }
        table
    })
}

fn linear_to_srgb(c: f32) -> f32 {
    let c = c.clamp(0.0, 1.0);
    if c <= 0.003_130_8 {
        12.92 * c
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn lab_f(t: f32) -> f32 {
    if t > EPSILON {
        t.cbrt()
    } else {
        KAPPA_SLOPE * t + OFFSET
    }
}

fn lab_f_inverse(t: f32) -> f32 {
    let cube = t * t * t;
    if cube > EPSILON {
        cube
    } else {
        (t - OFFSET) / KAPPA_SLOPE
    }
}

/// Convert sRGB to 8-bit L\*a\*b\* planes.
pub fn rgb_to_lab(image: &RgbImage) -> LabImage {
    let (width, height) = image.dimensions();
    let table = srgb_to_linear_table();
    let mut lab = LabImage {
        lightness: GrayImage::new(width, height),
        a: GrayImage::new(width, height),
        b: GrayImage::new(width, height),
    };

    let targets = lab
        .lightness
        .iter_mut()
        .zip(lab.a.iter_mut())
        .zip(lab.b.iter_mut());
    for (pixel, ((lightness, a_sample), b_sample)) in image.pixels().zip(targets) {
        let [r, g, b] = pixel.0;
        let (r, g, b) = (table[r as usize], table[g as usize], table[b as usize]);

        let x = (0.412_453 * r + 0.357_580 * g + 0.180_423 * b) / WHITE_X;
        let y = 0.212_671 * r + 0.715_160 * g + 0.072_169 * b;
        let z = (0.019_334 * r + 0.119_193 * g + 0.950_227 * b) / WHITE_Z;

        let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
        let l = 116.0 * fy - 16.0;
        let a = 500.0 * (fx - fy);
        let bb = 200.0 * (fy - fz);

        *lightness = saturate_u8(l * 255.0 / 100.0);
        *a_sample = saturate_u8(a + 128.0);
        *b_sample = saturate_u8(bb + 128.0);
    }

    lab
}

/// Convert 8-bit L\*a\*b\* planes back to sRGB.
///
/// # Errors
///
/// Returns [`FramesiftError::InvalidConfiguration`] if the three planes do
/// not share one size.
pub fn lab_to_rgb(lab: &LabImage) -> Result<RgbImage, FramesiftError> {
    let (width, height) = lab.dimensions();
    if lab.a.dimensions() != (width, height) || lab.b.dimensions() != (width, height) {
        return Err(FramesiftError::InvalidConfiguration(format!(
            "Lab planes differ in size: L {width}x{height}, a {:?}, b {:?}",
            lab.a.dimensions(),
            lab.b.dimensions()
        )));
    }

    let mut out = RgbImage::new(width, height);
    let planes = lab
        .lightness
        .as_raw()
        .iter()
        .zip(lab.a.as_raw())
        .zip(lab.b.as_raw());
    for (pixel, ((&l, &a), &b)) in out.pixels_mut().zip(planes) {
        let l = l as f32 * 100.0 / 255.0;
        let a = a as f32 - 128.0;
        let b = b as f32 - 128.0;

        let fy = (l + 16.0) / 116.0;
        let fx = fy + a / 500.0;
        let fz = fy - b / 200.0;

        let x = lab_f_inverse(fx) * WHITE_X;
        let y = lab_f_inverse(fy);
        let z = lab_f_inverse(fz) * WHITE_Z;

        let r = 3.240_479 * x - 1.537_150 * y - 0.498_535 * z;
        let g = -0.969_256 * x + 1.875_991 * y + 0.041_556 * z;
        let bl = 0.055_648 * x - 0.204_043 * y + 1.057_311 * z;

        pixel.0 = [
            saturate_u8(linear_to_srgb(r) * 255.0),
            saturate_u8(linear_to_srgb(g) * 255.0),
            saturate_u8(linear_to_srgb(bl) * 255.0),
        ];
    }

    Ok(out)
}

/// BT.601 luma, `0.299 R + 0.587 G + 0.114 B`, in 14-bit fixed point.
pub fn luminance(image: &RgbImage) -> GrayImage {
    let (width, height) = image.dimensions();
    let mut out = GrayImage::new(width, height);
    for (luma, pixel) in out.pixels_mut().zip(image.pixels()) {
        let [r, g, b] = pixel.0;
        luma.0 = [((r as u32 * 4899 + g as u32 * 9617 + b as u32 * 1868 + 8192) >> 14) as u8];
    }
    out
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Rgb, RgbImage};

    use super::{lab_to_rgb, luminance, rgb_to_lab};
    use crate::error::FramesiftError;

    #[test]
    fn grey_has_neutral_chroma() {
        let image = RgbImage::from_pixel(2, 2, Rgb([128, 128, 128]));
        let lab = rgb_to_lab(&image);
        for (&a, &b) in lab.a.as_raw().iter().zip(lab.b.as_raw()) {
            assert!((a as i32 - 128).abs() <= 1);
            assert!((b as i32 - 128).abs() <= 1);
        }
    }

    #[test]
    fn black_and_white_span_lightness() {
        let image = RgbImage::from_raw(2, 1, vec![0, 0, 0, 255, 255, 255]).unwrap();
        let lab = rgb_to_lab(&image);
        assert_eq!(lab.lightness.as_raw(), &vec![0, 255]);
    }

    #[test]
    fn lab_round_trip_is_close() {
        let image = RgbImage::from_fn(16, 16, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8])
        });
        let restored = lab_to_rgb(&rgb_to_lab(&image)).unwrap();
        for (original, back) in image.pixels().zip(restored.pixels()) {
            for channel in 0..3 {
                let delta = (original.0[channel] as i32 - back.0[channel] as i32).abs();
                assert!(delta <= 6, "{original:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn mismatched_planes_are_rejected() {
        let mut lab = rgb_to_lab(&RgbImage::new(4, 3));
        lab.b = GrayImage::new(3, 4);
        assert!(matches!(
            lab_to_rgb(&lab),
            Err(FramesiftError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn luminance_uses_bt601_weights() {
        let image = RgbImage::from_raw(3, 1, vec![255, 0, 0, 0, 255, 0, 0, 0, 255]).unwrap();
        assert_eq!(luminance(&image).as_raw(), &vec![76, 150, 29]);
    }
}
