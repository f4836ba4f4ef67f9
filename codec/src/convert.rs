//! Byte compressions used by the Cambridge frame formats.
//!
//! Pre files store each feature as one byte through a Gaussian CDF: values
//! are assumed roughly unit normal, so `byte = floor((erf(x / sqrt 2) + 1) *
//! 128)`. LNA8 files store probabilities as `floor(-24 ln p)`. Decoding goes
//! through 256-entry tables holding the value at the center of each byte's
//! interval.

use std::f64::consts::{FRAC_1_SQRT_2, SQRT_2};
use std::sync::OnceLock;

const LNA8_SCALE: f64 = 24.0;
const LNA8_VERY_SMALL: f64 = 1e-37;

/// Error function.
///
/// Rational Chebyshev approximation of `erfc` with fractional error below
/// 1.2e-7 everywhere.
pub fn erf(x: f64) -> f64 {
    let z = x.abs();
    let t = 1.0 / (1.0 + 0.5 * z);
    let poly = -z * z - 1.265_512_23
        + t * (1.000_023_68
            + t * (0.374_091_96
                + t * (0.096_784_18
                    + t * (-0.186_288_06
                        + t * (0.278_868_07
                            + t * (-1.135_203_98
                                + t * (1.488_515_87
                                    + t * (-0.822_152_23 + t * 0.170_872_77))))))));
    let erfc = t * poly.exp();
    if x >= 0.0 { 1.0 - erfc } else { erfc - 1.0 }
}

/// Inverse error function, by Newton iteration on [`erf`].
///
/// `x` must lie strictly inside `(-1, 1)`.
pub fn ierf(x: f64) -> f64 {
    const LIMIT: f64 = 1.0 / (1u32 << 20) as f64;
    let two_over_sqrt_pi = 2.0 / std::f64::consts::PI.sqrt();
    let mut curr = 0.0f64;
    for _ in 0..100 {
        let slope = two_over_sqrt_pi * (-curr * curr).exp();
        let step = (x - erf(curr)) / slope;
        curr += step;
        if step.abs() <= LIMIT {
            break;
        }
    }
    curr
}

fn pre8_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [0.0f32; 256];
        for (i, v) in t.iter_mut().enumerate() {
            *v = (SQRT_2 * ierf(2.0 * (i as f64 + 0.5) / 256.0 - 1.0)) as f32;
        }
        t
    })
}

fn lna8_table() -> &'static [f32; 256] {
    static TABLE: OnceLock<[f32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [0.0f32; 256];
        for (i, v) in t.iter_mut().enumerate() {
            *v = (-(i as f64 + 0.5) / LNA8_SCALE).exp() as f32;
        }
        t
    })
}

/// Compresses one feature value to a pre byte.
pub fn to_pre8(val: f32) -> u8 {
    let v = ((erf(val as f64 * FRAC_1_SQRT_2) + 1.0) * 128.0).floor();
    v.clamp(0.0, 255.0) as u8
}

/// Expands a pre byte.
pub fn from_pre8(byte: u8) -> f32 {
    pre8_table()[byte as usize]
}

/// Compresses one probability to an LNA8 byte.
pub fn to_lna8(val: f32) -> u8 {
    let v = (-LNA8_SCALE * (val as f64 + LNA8_VERY_SMALL).ln()).floor();
    // NaN (negative input) saturates to 0 like any other out-of-range value.
    if v.is_nan() { 0 } else { v.clamp(0.0, 255.0) as u8 }
}

/// Expands an LNA8 byte.
pub fn from_lna8(byte: u8) -> f32 {
    lna8_table()[byte as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erf_known_values() {
        assert!(erf(0.0).abs() < 1e-7);
        assert!((erf(1.0) - 0.842_700_79).abs() < 1e-6);
        assert!((erf(-0.5) + 0.520_499_88).abs() < 1e-6);
        assert!((erf(3.0) - 0.999_977_91).abs() < 1e-6);
    }

    #[test]
    fn test_ierf_inverts_erf() {
        for &x in &[-0.99, -0.5, 0.0, 0.1, 0.7, 0.995] {
            assert!((erf(ierf(x)) - x).abs() < 1e-6, "x = {}", x);
        }
    }

    #[test]
    fn test_pre8_table_centers_round_trip() {
        for b in 0..=255u8 {
            assert_eq!(to_pre8(from_pre8(b)), b);
        }
    }

    #[test]
    fn test_pre8_saturates() {
        assert_eq!(to_pre8(100.0), 255);
        assert_eq!(to_pre8(-100.0), 0);
    }

    #[test]
    fn test_lna8_round_trip_and_limits() {
        for b in 0..=255u8 {
            assert_eq!(to_lna8(from_lna8(b)), b);
        }
        assert_eq!(to_lna8(1.0), 0);
        assert_eq!(to_lna8(0.0), 255);
        assert_eq!(to_lna8(2.0), 0);
    }
}
