//! TIFF decode/encode with resolution and ICC profile tags

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::Path;

use tiff::decoder::ifd::Value;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype, Rational, TiffEncoder, TiffValue};
use tiff::tags::{ResolutionUnit, Tag, Type};
use tiff::ColorType;
use tracing::{debug, warn};

use super::{decode_table, deinterleave, dimensions, encode_rgb16, encode_rgb8};
use crate::error::{ReflFixError, Result};
use crate::plane::{BitDepth, PixelPlane};

/// TIFF tag carrying an embedded ICC profile
pub const ICC_PROFILE_TAG: u16 = 34675;

/// ResolutionUnit value for "no absolute unit"
const RESOLUTION_UNIT_NONE: u32 = 1;

/// ResolutionUnit value for centimeters
const RESOLUTION_UNIT_CM: u32 = 3;

/// ICC profile payload, written as UNDEFINED bytes
struct IccProfile<'a>(&'a [u8]);

impl TiffValue for IccProfile<'_> {
    const BYTE_LEN: u8 = 1;
    const FIELD_TYPE: Type = Type::UNDEFINED;

    fn count(&self) -> usize {
        self.0.len()
    }

    fn data(&self) -> Cow<[u8]> {
        Cow::Borrowed(self.0)
    }
}

/// Decode a TIFF into a plane with samples raised to `gamma`
pub fn read_tiff(path: &Path, gamma: f32, default_dpi: u32) -> Result<PixelPlane> {
    let file = File::open(path)?;

    // 2400 dpi letter-size scans exceed the default buffer limits
    let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

    let (width, height) = decoder.dimensions()?;
    let color_type = decoder.colortype()?;
    let samples_per_pixel = match color_type {
        ColorType::Gray(_) => 1,
        ColorType::GrayA(_) => 2,
        ColorType::RGB(_) => 3,
        ColorType::RGBA(_) => 4,
        other => {
            return Err(ReflFixError::UnsupportedFormat(format!(
                "{}: color type {:?} not supported",
                path.display(),
                other
            )))
        }
    };

    let dpi = match read_dpi(&mut decoder)? {
        Some(dpi) => dpi,
        None => {
            warn!(path = %path.display(), default_dpi, "no resolution tag, assuming default");
            default_dpi
        }
    };
    let profile = match decoder.find_tag(Tag::Unknown(ICC_PROFILE_TAG))? {
        Some(value) => Some(profile_bytes(value)?),
        None => None,
    };

    let rows = height as usize;
    let cols = width as usize;
    let pixels = rows * cols;

    let (channels, bit_depth) = match decoder.read_image()? {
        DecodingResult::U8(buf) => {
            let table = decode_table(u8::MAX as u32, gamma);
            (deinterleave(buf.as_slice(), samples_per_pixel, pixels, &table)?, BitDepth::Eight)
        }
        DecodingResult::U16(buf) => {
            let table = decode_table(u16::MAX as u32, gamma);
            (deinterleave(buf.as_slice(), samples_per_pixel, pixels, &table)?, BitDepth::Sixteen)
        }
        _ => {
            return Err(ReflFixError::UnsupportedFormat(format!(
                "{}: only 8 and 16 bit unsigned samples are supported",
                path.display()
            )))
        }
    };

    debug!(
        path = %path.display(),
        rows,
        cols,
        dpi,
        bits = bit_depth.bits(),
        icc = profile.is_some(),
        "decoded TIFF"
    );

    let mut plane = PixelPlane::from_channels(rows, cols, dpi, channels)?;
    plane.bit_depth = bit_depth;
    plane.gamma = gamma;
    plane.profile = profile;
    Ok(plane)
}

/// Horizontal resolution in pixels per inch, if tagged
fn read_dpi<R: Read + Seek>(decoder: &mut Decoder<R>) -> Result<Option<u32>> {
    let resolution = match decoder.find_tag(Tag::XResolution)? {
        Some(Value::Rational(n, d)) if d != 0 => n as f64 / d as f64,
        Some(Value::Float(v)) => v as f64,
        Some(Value::Double(v)) => v,
        Some(Value::Unsigned(v)) => v as f64,
        Some(Value::Short(v)) => v as f64,
        _ => return Ok(None),
    };
    let unit = match decoder.find_tag(Tag::ResolutionUnit)? {
        Some(Value::Short(u)) => Some(u as u32),
        Some(Value::Unsigned(u)) => Some(u),
        _ => None,
    };

    // unit 1 is an aspect ratio, and an untagged 1/1 is an encoder placeholder
    match unit {
        Some(RESOLUTION_UNIT_NONE) => return Ok(None),
        None if resolution <= 1.0 => return Ok(None),
        _ => {}
    }

    let per_inch = if unit == Some(RESOLUTION_UNIT_CM) {
        resolution * 2.54
    } else {
        resolution
    };
    if !(per_inch.is_finite() && per_inch >= 1.0) {
        return Ok(None);
    }
    Ok(Some(per_inch.round() as u32))
}

/// Raw bytes of an ICC profile tag
///
/// Writers store tag 34675 as UNDEFINED or BYTE, which the decoder hands
/// back as different value kinds.
fn profile_bytes(value: Value) -> Result<Vec<u8>> {
    let items = match value {
        Value::List(items) => items,
        single => vec![single],
    };
    items
        .into_iter()
        .map(|item| {
            let n = match item {
                Value::Byte(b) => u64::from(b),
                other => other.into_u64()?,
            };
            u8::try_from(n).map_err(|_| {
                ReflFixError::UnsupportedFormat(format!(
                    "ICC profile tag holds non-byte value {}",
                    n
                ))
            })
        })
        .collect()
}

/// Encode `image` as an RGB TIFF at `depth`
///
/// Writes the plane's DPI as XResolution/YResolution in inches and embeds
/// `image.profile` under tag 34675 when present.
pub fn write_tiff(path: &Path, image: &PixelPlane, depth: BitDepth) -> Result<()> {
    let (width, height) = dimensions(image)?;
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    let resolution = Rational { n: image.dpi, d: 1 };

    match depth {
        BitDepth::Eight => {
            let data = encode_rgb8(image);
            let mut page = encoder.new_image::<colortype::RGB8>(width, height)?;
            page.resolution(ResolutionUnit::Inch, resolution);
            if let Some(icc) = image.profile.as_deref() {
                page.encoder()
                    .write_tag(Tag::Unknown(ICC_PROFILE_TAG), IccProfile(icc))?;
            }
            page.write_data(&data)?;
        }
        BitDepth::Sixteen => {
            let data = encode_rgb16(image);
            let mut page = encoder.new_image::<colortype::RGB16>(width, height)?;
            page.resolution(ResolutionUnit::Inch, resolution);
            if let Some(icc) = image.profile.as_deref() {
                page.encoder()
                    .write_tag(Tag::Unknown(ICC_PROFILE_TAG), IccProfile(icc))?;
            }
            page.write_data(&data)?;
        }
    }

    debug!(
        path = %path.display(),
        bits = depth.bits(),
        dpi = image.dpi,
        "wrote TIFF"
    );
    Ok(())
}
