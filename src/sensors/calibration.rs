// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Calibration model
//!
//! Pure conversions from raw ADC codes to physical units:
//! - two-point linear calibration (HTS221 temperature and humidity)
//! - visible/IR compensated UV index (VEML6075) and its qualitative band
//! - two's-complement reconstruction of raw register values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sign extend the low `bits` bits of `raw`
///
/// If the most significant of those bits is set, `2^bits` is subtracted.
pub fn sign_extend(raw: u32, bits: u32) -> i32 {
    debug_assert!(bits > 0 && bits <= 31);
    let raw = (raw & ((1u32 << bits) - 1)) as i64;
    let value = if raw & (1i64 << (bits - 1)) != 0 {
        raw - (1i64 << bits)
    } else {
        raw
    };
    value as i32
}

/// Reconstruct a signed 16-bit code from its high and low register bytes
pub fn raw_i16(high: u8, low: u8) -> i32 {
    sign_extend(u16::from_be_bytes([high, low]) as u32, 16)
}

/// Two-point linear calibration
///
/// `value = ref_value + scale * (code - ref_code)` with the scale derived once
/// from two factory (code, value) pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearCalibration {
    ref_value: f64,
    ref_code: f64,
    scale: f64,
}

impl LinearCalibration {
    /// Build the calibration from two factory points
    ///
    /// Identical codes carry no slope information; the scale is then zero and
    /// every code maps to `value0`.
    pub fn from_points(code0: i32, value0: f64, code1: i32, value1: f64) -> Self {
        let scale = if code1 == code0 {
            0.0
        } else {
            (value1 - value0) / (code1 - code0) as f64
        };
        Self {
            ref_value: value0,
            ref_code: code0 as f64,
            scale,
        }
    }

    /// Convert a raw code into a physical value
    pub fn apply(&self, code: i32) -> f64 {
        self.ref_value + self.scale * (code as f64 - self.ref_code)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

/// Clamp a relative humidity to the physical [0, 100] %RH range
pub fn clamp_humidity(relative_humidity: f64) -> f64 {
    relative_humidity.clamp(0.0, 100.0)
}

/// VEML6075 optical coefficients
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UvCoefficients {
    /// UVA visible rejection ratio
    pub uva_visible: f64,
    /// UVA infrared rejection ratio
    pub uva_ir: f64,
    /// UVA responsivity (UV index per count)
    pub uva_responsivity: f64,
    /// UVB visible rejection ratio
    pub uvb_visible: f64,
    /// UVB infrared rejection ratio
    pub uvb_ir: f64,
    /// UVB responsivity (UV index per count)
    pub uvb_responsivity: f64,
    /// Integration time divisor relative to the 100 ms reference
    pub integration: f64,
}

impl Default for UvCoefficients {
    /// Open-air diffusor coefficients for a 100 ms responsivity reference,
    /// with the chip configured for 800 ms integration.
    fn default() -> Self {
        Self {
            uva_visible: 2.22,
            uva_ir: 1.33,
            uva_responsivity: 0.001491,
            uvb_visible: 2.95,
            uvb_ir: 1.74,
            uvb_responsivity: 0.002591,
            integration: 8.0,
        }
    }
}

/// Raw VEML6075 channel codes from one conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UvRaw {
    pub uva: u16,
    pub uvb: u16,
    /// UVCOMP1, visible compensation channel
    pub comp_visible: u16,
    /// UVCOMP2, infrared compensation channel
    pub comp_ir: u16,
}

/// Compute the UV index as the mean of the compensated UVA and UVB indexes
pub fn uv_index(raw: &UvRaw, coefficients: &UvCoefficients) -> f64 {
    let comp_visible = raw.comp_visible as f64;
    let comp_ir = raw.comp_ir as f64;

    let uva_compensated = raw.uva as f64
        - coefficients.uva_visible * comp_visible
        - coefficients.uva_ir * comp_ir;
    let uva = (uva_compensated * coefficients.uva_responsivity / coefficients.integration).max(0.0);

    let uvb_compensated = raw.uvb as f64
        - coefficients.uvb_visible * comp_visible
        - coefficients.uvb_ir * comp_ir;
    let uvb = (uvb_compensated * coefficients.uvb_responsivity / coefficients.integration).max(0.0);

    (uva + uvb) / 2.0
}

/// Qualitative UV intensity band
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum UvBand {
    Low,
    Moderate,
    High,
    VeryHigh,
    Extreme,
    Error,
}

impl UvBand {
    /// Classify a UV index over `[0,2) [2,5) [5,7) [7,10) [10,12) [12,∞)`
    pub fn classify(index: f64) -> Self {
        if index < 2.0 {
            Self::Low
        } else if index < 5.0 {
            Self::Moderate
        } else if index < 7.0 {
            Self::High
        } else if index < 10.0 {
            Self::VeryHigh
        } else if index < 12.0 {
            Self::Extreme
        } else {
            Self::Error
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::High => "High",
            Self::VeryHigh => "Very high",
            Self::Extreme => "Extreme",
            Self::Error => "Error",
        }
    }

    /// Position of the band in the ordered scale, `Low` being 0
    pub fn ordinal(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for UvBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sign_extension_16_bits() {
        assert_eq!(raw_i16(0xFF, 0x00), -256);
        assert_eq!(raw_i16(0x7F, 0xFF), 32767);
        assert_eq!(raw_i16(0x80, 0x00), -32768);
        assert_eq!(sign_extend(0x1234, 16), 0x1234);
        assert_eq!(sign_extend(65280, 16), 65280 - 65536);
    }

    #[test]
    fn test_sign_extension_24_bits() {
        assert_eq!(sign_extend(0x800000, 24), -8_388_608);
        assert_eq!(sign_extend(0xFFFFFF, 24), -1);
        assert_eq!(sign_extend(0x3F_A000, 24), 0x3F_A000);
    }

    #[test]
    fn test_two_point_calibration_hits_reference_points() {
        let calibration = LinearCalibration::from_points(300, 10.0, 800, 35.0);
        assert_eq!(calibration.apply(300), 10.0);
        assert_relative_eq!(calibration.apply(800), 35.0, epsilon = 1e-12);
        assert_relative_eq!(calibration.apply(550), 22.5, epsilon = 1e-9);
        assert_relative_eq!(calibration.apply(-200), -15.0, epsilon = 1e-9);
    }

    #[test]
    fn test_two_point_calibration_matches_formula() {
        let points = [
            (-1000, 20.0, 9000, 70.0),
            (12, -3.5, -7, 41.25),
            (32767, 100.0, -32768, 0.0),
        ];
        for (code0, value0, code1, value1) in points {
            let calibration = LinearCalibration::from_points(code0, value0, code1, value1);
            for code in [-32768, -1, 0, 1, 4242, 32767] {
                let expected = value0
                    + (value1 - value0) / (code1 - code0) as f64 * (code - code0) as f64;
                assert_relative_eq!(calibration.apply(code), expected, epsilon = 1e-9);
            }
            assert_relative_eq!(calibration.apply(code0), value0, epsilon = 1e-12);
            assert_relative_eq!(calibration.apply(code1), value1, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_degenerate_calibration_is_flat() {
        let calibration = LinearCalibration::from_points(5, 12.0, 5, 80.0);
        assert_eq!(calibration.scale(), 0.0);
        assert_eq!(calibration.apply(-30000), 12.0);
    }

    #[test]
    fn test_humidity_is_clamped() {
        let calibration = LinearCalibration::from_points(-1000, 20.0, 9000, 70.0);
        for code in [i16::MIN as i32, -5000, 0, 9000, 20000, i16::MAX as i32] {
            let humidity = clamp_humidity(calibration.apply(code));
            assert!((0.0..=100.0).contains(&humidity), "{humidity} out of range");
        }
        assert_eq!(clamp_humidity(-4.0), 0.0);
        assert_eq!(clamp_humidity(104.0), 100.0);
    }

    #[test]
    fn test_uv_index_compensation() {
        let coefficients = UvCoefficients::default();
        let raw = UvRaw {
            uva: 4000,
            uvb: 3000,
            comp_visible: 300,
            comp_ir: 200,
        };
        let uva = (4000.0 - 2.22 * 300.0 - 1.33 * 200.0) * 0.001491 / 8.0;
        let uvb = (3000.0 - 2.95 * 300.0 - 1.74 * 200.0) * 0.002591 / 8.0;
        assert_relative_eq!(uv_index(&raw, &coefficients), (uva + uvb) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uv_channels_never_go_negative() {
        let raw = UvRaw {
            uva: 10,
            uvb: 3000,
            comp_visible: 500,
            comp_ir: 500,
        };
        let coefficients = UvCoefficients::default();
        let uvb = (3000.0 - 2.95 * 500.0 - 1.74 * 500.0) * 0.002591 / 8.0;
        assert_relative_eq!(uv_index(&raw, &coefficients), uvb / 2.0, epsilon = 1e-12);

        let dark = UvRaw {
            comp_visible: 1000,
            comp_ir: 1000,
            ..Default::default()
        };
        assert_eq!(uv_index(&dark, &coefficients), 0.0);
    }

    #[test]
    fn test_uv_band_boundaries() {
        assert_eq!(UvBand::classify(0.0), UvBand::Low);
        assert_eq!(UvBand::classify(1.9), UvBand::Low);
        assert_eq!(UvBand::classify(2.0), UvBand::Moderate);
        assert_eq!(UvBand::classify(4.99), UvBand::Moderate);
        assert_eq!(UvBand::classify(5.0), UvBand::High);
        assert_eq!(UvBand::classify(7.0), UvBand::VeryHigh);
        assert_eq!(UvBand::classify(10.0), UvBand::Extreme);
        assert_eq!(UvBand::classify(11.9), UvBand::Extreme);
        assert_eq!(UvBand::classify(12.0), UvBand::Error);
        assert_eq!(UvBand::classify(f64::INFINITY), UvBand::Error);
    }

    #[test]
    fn test_uv_band_labels() {
        assert_eq!(UvBand::classify(1.9).to_string(), "Low");
        assert_eq!(UvBand::classify(8.0).to_string(), "Very high");
        assert_eq!(UvBand::classify(12.0).to_string(), "Error");
        assert!(UvBand::Low < UvBand::Extreme);
        assert_eq!(UvBand::Extreme.ordinal(), 4);
    }
}
