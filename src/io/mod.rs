//! Image file decode/encode
//!
//! Converts between files and [`PixelPlane`]s. TIFF goes through the
//! `tiff` crate so resolution and ICC profile tags survive; anything else
//! the `image` crate understands is accepted without resolution metadata.
//!
//! Samples are decoded as `(s / max)^gamma` and encoded with the inverse
//! exponent.

mod raster;
mod tiff;

pub use self::raster::{read_raster, write_raster};
pub use self::tiff::{read_tiff, write_tiff, ICC_PROFILE_TAG};

use std::path::Path;

use crate::error::{ReflFixError, Result};
use crate::plane::{BitDepth, PixelPlane, CHANNELS};

/// True for `.tif` / `.tiff` paths
pub fn is_tiff(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
}

/// Decode `path` with `gamma`, assuming `default_dpi` when it has none
pub fn read_image(path: &Path, gamma: f32, default_dpi: u32) -> Result<PixelPlane> {
    if !path.exists() {
        return Err(ReflFixError::InputNotFound(path.to_path_buf()));
    }
    if is_tiff(path) {
        read_tiff(path, gamma, default_dpi)
    } else {
        read_raster(path, gamma, default_dpi)
    }
}

/// Encode `image` at `depth`, embedding `image.profile` where supported
pub fn write_image(path: &Path, image: &PixelPlane, depth: BitDepth) -> Result<()> {
    if is_tiff(path) {
        write_tiff(path, image, depth)
    } else {
        write_raster(path, image, depth)
    }
}

/// Read an ICC profile file
pub fn read_profile(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(ReflFixError::InputNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read(path)?)
}

// ============================================================
// Sample conversion
// ============================================================

/// Lookup table mapping every integer sample to `(s / max)^gamma`
fn decode_table(max: u32, gamma: f32) -> Vec<f32> {
    let max = max as f32;
    (0..=max as u32).map(|s| (s as f32 / max).powf(gamma)).collect()
}

/// Split interleaved samples into three gamma-decoded channels
///
/// One- and two-sample pixels (gray, gray+alpha) are replicated to RGB;
/// samples past the third (alpha) are ignored.
fn deinterleave<T>(
    buf: &[T],
    samples_per_pixel: usize,
    pixels: usize,
    table: &[f32],
) -> Result<[Vec<f32>; CHANNELS]>
where
    T: Copy + Into<u32>,
{
    if buf.len() < pixels * samples_per_pixel {
        return Err(ReflFixError::UnsupportedFormat(format!(
            "expected {} samples, found {}",
            pixels * samples_per_pixel,
            buf.len()
        )));
    }
    let lookup = |s: T| table.get(s.into() as usize).copied().unwrap_or(1.0);

    let mut out = [
        Vec::with_capacity(pixels),
        Vec::with_capacity(pixels),
        Vec::with_capacity(pixels),
    ];
    for px in buf.chunks_exact(samples_per_pixel).take(pixels) {
        if samples_per_pixel >= CHANNELS {
            for (c, channel) in out.iter_mut().enumerate() {
                channel.push(lookup(px[c]));
            }
        } else {
            let v = lookup(px[0]);
            out.iter_mut().for_each(|channel| channel.push(v));
        }
    }
    Ok(out)
}

/// Encode one channel to 8 bits, carrying the rounding residual along
/// each row so flat areas keep their mean level
fn encode_channel_8(samples: &[f32], cols: usize, gamma: f32) -> Vec<u8> {
    let inv_gamma = 1.0 / gamma;
    let mut residual = 0.0f32;
    let mut out = Vec::with_capacity(samples.len());

    for (i, &v) in samples.iter().enumerate() {
        if cols > 0 && i % cols == 0 {
            residual = 0.0;
        }
        let target = (255.0 * v.clamp(0.0, 1.0).powf(inv_gamma)).clamp(0.0, 255.0);
        let mut level = (target + 0.5) as u8;
        residual += target - level as f32;
        if residual > 0.5 && level < u8::MAX {
            residual -= 1.0;
            level += 1;
        } else if residual < -0.5 && level > 0 {
            residual += 1.0;
            level -= 1;
        }
        out.push(level);
    }
    out
}

/// Encode one channel to 16 bits
fn encode_channel_16(samples: &[f32], gamma: f32) -> Vec<u16> {
    let inv_gamma = 1.0 / gamma;
    samples
        .iter()
        .map(|&v| (v.clamp(0.0, 1.0).powf(inv_gamma) * 65535.0) as u16)
        .collect()
}

/// Interleave three encoded channels into RGB pixel order
fn interleave<T: Copy>(channels: [Vec<T>; CHANNELS]) -> Vec<T> {
    let [r, g, b] = channels;
    r.iter()
        .zip(&g)
        .zip(&b)
        .flat_map(|((&r, &g), &b)| [r, g, b])
        .collect()
}

/// Encode a plane to interleaved 8-bit RGB
fn encode_rgb8(image: &PixelPlane) -> Vec<u8> {
    let cols = image.cols();
    interleave([
        encode_channel_8(image.channel(0), cols, image.gamma),
        encode_channel_8(image.channel(1), cols, image.gamma),
        encode_channel_8(image.channel(2), cols, image.gamma),
    ])
}

/// Encode a plane to interleaved 16-bit RGB
fn encode_rgb16(image: &PixelPlane) -> Vec<u16> {
    interleave([
        encode_channel_16(image.channel(0), image.gamma),
        encode_channel_16(image.channel(1), image.gamma),
        encode_channel_16(image.channel(2), image.gamma),
    ])
}

fn dimensions(image: &PixelPlane) -> Result<(u32, u32)> {
    let width = u32::try_from(image.cols())
        .map_err(|_| ReflFixError::InvalidArgument("image too wide".to_string()))?;
    let height = u32::try_from(image.rows())
        .map_err(|_| ReflFixError::InvalidArgument("image too tall".to_string()))?;
    Ok((width, height))
}
