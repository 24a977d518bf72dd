//! Three-channel float raster and its metadata

use crate::error::{ReflFixError, Result};

/// Number of color channels carried by every plane
pub const CHANNELS: usize = 3;

/// Bit depth of the container the samples were decoded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    Eight,
    #[default]
    Sixteen,
}

impl BitDepth {
    /// Map a bits-per-sample count to a depth
    pub fn from_bits(bits: u8) -> Result<Self> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            other => Err(ReflFixError::InvalidArgument(format!(
                "bit depth must be 8 or 16, got {}",
                other
            ))),
        }
    }

    /// Bits per sample
    pub fn bits(&self) -> u8 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }
}

/// Dense RGB raster of `f32` samples, one row-major buffer per channel
///
/// Samples live in the gamma-encoded domain implied by `gamma`, nominally
/// in [0, 1]. All three buffers always hold `rows * cols` samples.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelPlane {
    rows: usize,
    cols: usize,

    /// Scanner resolution in dots per inch
    pub dpi: u32,

    /// Depth of the source container
    pub bit_depth: BitDepth,

    /// Exponent applied at decode and inverted at encode
    pub gamma: f32,

    /// Opaque ICC profile bytes, passed through untouched
    pub profile: Option<Vec<u8>>,

    channels: [Vec<f32>; CHANNELS],
}

impl PixelPlane {
    /// Create a zero-filled plane
    pub fn new(rows: usize, cols: usize, dpi: u32) -> Self {
        Self::filled(rows, cols, dpi, [0.0; CHANNELS])
    }

    /// Create a plane with every sample of channel `c` set to `rgb[c]`
    pub fn filled(rows: usize, cols: usize, dpi: u32, rgb: [f32; CHANNELS]) -> Self {
        let len = rows * cols;
        Self {
            rows,
            cols,
            dpi,
            bit_depth: BitDepth::default(),
            gamma: 1.0,
            profile: None,
            channels: [vec![rgb[0]; len], vec![rgb[1]; len], vec![rgb[2]; len]],
        }
    }

    /// Build a plane from existing channel buffers
    pub fn from_channels(
        rows: usize,
        cols: usize,
        dpi: u32,
        channels: [Vec<f32>; CHANNELS],
    ) -> Result<Self> {
        let len = rows * cols;
        if let Some(bad) = channels.iter().position(|c| c.len() != len) {
            return Err(ReflFixError::GeometryMismatch(format!(
                "channel {} holds {} samples, expected {}x{} = {}",
                bad,
                channels[bad].len(),
                rows,
                cols,
                len
            )));
        }
        Ok(Self {
            rows,
            cols,
            dpi,
            bit_depth: BitDepth::default(),
            gamma: 1.0,
            profile: None,
            channels,
        })
    }

    /// Copy dpi, depth, gamma and profile from another plane
    #[must_use]
    pub fn with_metadata_of(mut self, other: &PixelPlane) -> Self {
        self.dpi = other.dpi;
        self.bit_depth = other.bit_depth;
        self.gamma = other.gamma;
        self.profile = other.profile.clone();
        self
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `other` has the same rows and cols
    pub fn same_geometry(&self, other: &PixelPlane) -> bool {
        self.rows == other.rows && self.cols == other.cols
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.rows && col < self.cols,
            "pixel ({}, {}) outside {}x{} plane",
            row,
            col,
            self.rows,
            self.cols
        );
        row * self.cols + col
    }

    /// Sample at (row, col) of `channel`
    ///
    /// Panics when the coordinate lies outside the plane.
    #[inline]
    pub fn get(&self, row: usize, col: usize, channel: usize) -> f32 {
        self.channels[channel][self.index(row, col)]
    }

    /// Overwrite the sample at (row, col) of `channel`
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, channel: usize, value: f32) {
        let i = self.index(row, col);
        self.channels[channel][i] = value;
    }

    /// Row-major samples of one channel
    pub fn channel(&self, channel: usize) -> &[f32] {
        &self.channels[channel]
    }

    /// Mutable row-major samples of one channel
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        &mut self.channels[channel]
    }

    /// All three channel buffers
    pub fn channels(&self) -> &[Vec<f32>; CHANNELS] {
        &self.channels
    }

    /// Consume the plane, returning its channel buffers
    pub fn into_channels(self) -> [Vec<f32>; CHANNELS] {
        self.channels
    }

    /// Set every sample of channel `c` to `rgb[c]`
    pub fn fill(&mut self, rgb: [f32; CHANNELS]) {
        for (channel, value) in self.channels.iter_mut().zip(rgb) {
            channel.iter_mut().for_each(|x| *x = value);
        }
    }

    /// Copy `from` into this plane with its top-left corner at (row, col)
    pub fn insert(&mut self, from: &PixelPlane, row: usize, col: usize) -> Result<()> {
        if row + from.rows > self.rows || col + from.cols > self.cols {
            return Err(ReflFixError::GeometryMismatch(format!(
                "{}x{} plane does not fit at ({}, {}) inside {}x{}",
                from.rows, from.cols, row, col, self.rows, self.cols
            )));
        }

        for (dst, src) in self.channels.iter_mut().zip(&from.channels) {
            for r in 0..from.rows {
                let d = (row + r) * self.cols + col;
                let s = r * from.cols;
                dst[d..d + from.cols].copy_from_slice(&src[s..s + from.cols]);
            }
        }
        Ok(())
    }

    /// Per-channel sum of all samples
    pub fn sum(&self) -> [f64; CHANNELS] {
        let mut out = [0.0f64; CHANNELS];
        for (acc, channel) in out.iter_mut().zip(&self.channels) {
            *acc = channel.iter().map(|&v| v as f64).sum();
        }
        out
    }

    /// Multiply every sample of every channel by `factor`
    pub fn scale(&mut self, factor: f32) {
        for channel in &mut self.channels {
            channel.iter_mut().for_each(|x| *x *= factor);
        }
    }

    /// Smallest and largest sample across all channels
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.channels
            .iter()
            .flat_map(|c| c.iter().copied())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
