//! Non-TIFF formats through the `image` crate
//!
//! These carry no usable resolution tag, so the configured default DPI is
//! assumed. PNG output keeps 16-bit depth; profiles are only read.

use std::path::Path;

use image::{DynamicImage, ImageBuffer, ImageDecoder, ImageReader, Rgb, RgbImage};
use tracing::{debug, warn};

use super::{decode_table, deinterleave, dimensions, encode_rgb16, encode_rgb8};
use crate::error::{ReflFixError, Result};
use crate::plane::{BitDepth, PixelPlane};

/// Decode any `image`-supported file with samples raised to `gamma`
pub fn read_raster(path: &Path, gamma: f32, default_dpi: u32) -> Result<PixelPlane> {
    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()?;
    let profile = decoder.icc_profile()?;
    let image = DynamicImage::from_decoder(decoder)?;

    let rows = image.height() as usize;
    let cols = image.width() as usize;
    let pixels = rows * cols;
    let sixteen = matches!(
        image,
        DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_)
            | DynamicImage::ImageRgb16(_)
            | DynamicImage::ImageRgba16(_)
            | DynamicImage::ImageRgb32F(_)
            | DynamicImage::ImageRgba32F(_)
    );

    let (channels, bit_depth) = if sixteen {
        let table = decode_table(u16::MAX as u32, gamma);
        let rgb = image.to_rgb16();
        (deinterleave(rgb.as_raw().as_slice(), 3, pixels, &table)?, BitDepth::Sixteen)
    } else {
        let table = decode_table(u8::MAX as u32, gamma);
        let rgb = image.to_rgb8();
        (deinterleave(rgb.as_raw().as_slice(), 3, pixels, &table)?, BitDepth::Eight)
    };

    warn!(
        path = %path.display(),
        default_dpi,
        "format has no resolution tag, assuming default"
    );
    debug!(
        path = %path.display(),
        rows,
        cols,
        bits = bit_depth.bits(),
        icc = profile.is_some(),
        "decoded image"
    );

    let mut plane = PixelPlane::from_channels(rows, cols, default_dpi, channels)?;
    plane.bit_depth = bit_depth;
    plane.gamma = gamma;
    plane.profile = profile;
    Ok(plane)
}

/// Encode `image` as RGB in the format implied by the extension
///
/// Formats without 16-bit support (JPEG and friends) fail with
/// `UnsupportedFormat` when asked for 16 bits.
pub fn write_raster(path: &Path, image: &PixelPlane, depth: BitDepth) -> Result<()> {
    let (width, height) = dimensions(image)?;
    if image.profile.is_some() {
        warn!(path = %path.display(), "ICC profile is only embedded in TIFF output, dropping");
    }

    match depth {
        BitDepth::Eight => {
            let buffer = RgbImage::from_raw(width, height, encode_rgb8(image))
                .ok_or_else(|| size_error(width, height))?;
            buffer.save(path)?;
        }
        BitDepth::Sixteen => {
            let buffer: ImageBuffer<Rgb<u16>, Vec<u16>> =
                ImageBuffer::from_raw(width, height, encode_rgb16(image))
                    .ok_or_else(|| size_error(width, height))?;
            buffer.save(path)?;
        }
    }

    debug!(path = %path.display(), bits = depth.bits(), "wrote image");
    Ok(())
}

fn size_error(width: u32, height: u32) -> ReflFixError {
    ReflFixError::GeometryMismatch(format!(
        "buffer does not match {}x{} RGB",
        width, height
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_png_16bit_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.png");
        let mut plane = PixelPlane::filled(5, 7, 300, [0.2, 0.5, 0.8]);
        plane.gamma = 2.2;

        write_raster(&path, &plane, BitDepth::Sixteen).unwrap();
        let back = read_raster(&path, 2.2, 150).unwrap();

        assert_eq!(back.rows(), 5);
        assert_eq!(back.cols(), 7);
        assert_eq!(back.dpi, 150);
        assert_eq!(back.bit_depth, BitDepth::Sixteen);
        assert!((back.get(4, 6, 1) - 0.5).abs() < 1e-3);
        assert!((back.get(0, 0, 2) - 0.8).abs() < 1e-3);
    }

    #[test]
    fn test_png_8bit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan8.png");
        let plane = PixelPlane::filled(2, 3, 300, [0.0, 1.0, 0.5]);

        write_raster(&path, &plane, BitDepth::Eight).unwrap();
        let back = read_raster(&path, 1.0, 300).unwrap();

        assert_eq!(back.bit_depth, BitDepth::Eight);
        assert_eq!(back.get(1, 2, 0), 0.0);
        assert_eq!(back.get(1, 2, 1), 1.0);
        assert!((back.get(0, 0, 2) - 0.5).abs() < 0.005);
    }

    #[test]
    fn test_jpeg_rejects_16bit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scan.jpg");
        let plane = PixelPlane::filled(2, 2, 300, [0.5; 3]);
        assert!(matches!(
            write_raster(&path, &plane, BitDepth::Sixteen),
            Err(ReflFixError::UnsupportedFormat(_))
        ));
    }
}
