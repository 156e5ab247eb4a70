//! Internal helpers shared by the decoder and the image kernels.

use ffmpeg_next::frame::Video as VideoFrame;

/// Copy the first plane of a packed FFmpeg frame into a tightly-packed
/// buffer, dropping any per-row stride padding.
pub(crate) fn frame_to_buffer(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    bytes_per_pixel: usize,
) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_bytes = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_bytes]);
        }
        buffer
    }
}

/// Map a possibly out-of-range coordinate onto `0..len` by mirroring
/// without repeating the edge sample (`dcb|abcdefgh|gfe`).
///
/// `len` must be non-zero.
pub(crate) fn reflect_101(index: isize, len: usize) -> usize {
    let len = len as isize;
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as usize
}

/// Round to the nearest integer and clamp into the `u8` range.
pub(crate) fn saturate_u8(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
