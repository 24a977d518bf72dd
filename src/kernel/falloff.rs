//! Empirical glare falloff curves
//!
//! All curves were fitted against a 400 dpi reference scan of the V800/V850
//! and take an offset in reference pixels.

/// Largest offset (reference pixels) the current fits are valid for
pub const FIT_RANGE: f32 = 400.0;

/// Largest offset the legacy fit is valid for
pub const LEGACY_FIT_RANGE: f32 = 560.0;

/// Light returned at zero offset, relative to the plateau of the fits
pub const PEAK_REFLECTANCE: f32 = 0.0838;

/// Value both current fits reach at the edge of [`FIT_RANGE`]
pub const PLATEAU: f32 = 0.0579;

/// Vertical falloff fit, highest order first
const VERTICAL_COEFFS: [f32; 6] = [1.361e-15, -3.737e-12, 4.042e-09, -2.156e-06, 0.0005713, 0.0];

/// Amplitude correction applied to the vertical fit
const VERTICAL_SCALE: f32 = 0.9574;

/// Horizontal falloff fit, highest order first
const HORIZONTAL_COEFFS: [f32; 8] = [
    7.729e-20, -1.842e-16, 1.793e-13, -9.23e-11, 2.756e-08, -5.168e-06, 0.0006892, 0.0,
];

/// Legacy radial fit, highest order first (the whole curve is negated)
const LEGACY_COEFFS: [f32; 5] = [-8.72e-13, 2.002e-9, -1.674e-6, 0.0006124, -0.0838040];

/// Evaluate a polynomial with Horner's method
pub fn horner(coeffs: &[f32], x: f32) -> f32 {
    coeffs.iter().fold(0.0, |acc, &c| acc * x + c)
}

/// Cumulative vertical glare at `offset` reference pixels
pub fn vertical(offset: f32) -> f32 {
    VERTICAL_SCALE * horner(&VERTICAL_COEFFS, offset.clamp(0.0, FIT_RANGE))
}

/// Cumulative horizontal glare at `offset` reference pixels
pub fn horizontal(offset: f32) -> f32 {
    horner(&HORIZONTAL_COEFFS, offset.clamp(0.0, FIT_RANGE))
}

/// Convert a cumulative curve value to local reflected light
#[inline]
pub fn reflectance(cumulative: f32) -> f32 {
    PEAK_REFLECTANCE - (PEAK_REFLECTANCE / PLATEAU) * cumulative
}

/// Legacy radial reflectance at `offset` reference pixels
pub fn legacy(offset: f32) -> f32 {
    -horner(&LEGACY_COEFFS, offset.clamp(0.0, LEGACY_FIT_RANGE))
}
