// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Supported chips
//!
//! Chips form a closed set. [`Chip`] selects a variant (configuration, mock
//! simulation, logging) and [`ChipDriver`] holds the constructed driver with its
//! calibration constants.

pub mod hts221;
pub mod lps22hb;
pub mod mcp23017;
pub mod veml6075;

pub use hts221::Hts221;
pub use lps22hb::Lps22hb;
pub use mcp23017::{Mcp23017, PinMode, PinSetup};
pub use veml6075::Veml6075;

use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::bus::I2CHandle;
use super::calibration::{UvBand, UvCoefficients};
use super::{DeviceError, DeviceResult, SensorKind, SensorValue};

/// Chip variant living at a bus address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chip {
    Hts221,
    Lps22hb,
    Veml6075,
    Mcp23017,
}

/// Identification register of a chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identification {
    pub register: u8,
    pub expected: u16,
    /// The register is read with a word transaction
    pub word: bool,
}

impl Chip {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hts221 => "HTS221",
            Self::Lps22hb => "LPS22HB",
            Self::Veml6075 => "VEML6075",
            Self::Mcp23017 => "MCP23017",
        }
    }

    /// Factory default I2C address
    pub fn default_address(&self) -> u8 {
        match self {
            Self::Hts221 => 0x5F,
            Self::Lps22hb => 0x5C,
            Self::Veml6075 => 0x10,
            Self::Mcp23017 => 0x20,
        }
    }

    pub fn identification(&self) -> Option<Identification> {
        match self {
            Self::Hts221 => Some(Identification {
                register: hts221::WHO_AM_I,
                expected: hts221::DEVICE_ID as u16,
                word: false,
            }),
            Self::Lps22hb => Some(Identification {
                register: lps22hb::WHO_AM_I,
                expected: lps22hb::DEVICE_ID as u16,
                word: false,
            }),
            Self::Veml6075 => Some(Identification {
                register: veml6075::ID,
                expected: veml6075::DEVICE_ID,
                word: true,
            }),
            Self::Mcp23017 => None,
        }
    }

    /// Whether this chip can report `kind`
    pub fn supports(&self, kind: SensorKind) -> bool {
        match self {
            Self::Hts221 => matches!(kind, SensorKind::Temperature | SensorKind::Humidity),
            Self::Lps22hb => matches!(kind, SensorKind::Pressure | SensorKind::Temperature),
            Self::Veml6075 => matches!(kind, SensorKind::UvIndex | SensorKind::UvIntensity),
            Self::Mcp23017 => matches!(kind, SensorKind::PinState(pin) if pin < mcp23017::PIN_COUNT),
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Construction-time settings for chips that take any
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChipSettings {
    /// VEML6075 optical coefficients
    pub uv_coefficients: UvCoefficients,
    /// MCP23017 pin directions
    pub pins: Vec<PinSetup>,
}

/// Check the identification register of `chip`
///
/// A mismatch only logs a warning: compatible silicon revisions and clones
/// report other values and still work.
pub(crate) fn identify(handle: &I2CHandle, chip: Chip) -> DeviceResult<()> {
    let Some(identification) = chip.identification() else {
        return Ok(());
    };
    let observed = if identification.word {
        handle.read_word(identification.register)?
    } else {
        handle.read_byte(identification.register)? as u16
    };
    if observed != identification.expected {
        warn!(
            "{} @ 0x{:02x}, bad device identification (0x{:04x}, expected 0x{:04x})",
            chip,
            handle.address(),
            observed,
            identification.expected
        );
    }
    Ok(())
}

/// A constructed chip driver
#[derive(Debug)]
pub enum ChipDriver {
    Hts221(Hts221),
    Lps22hb(Lps22hb),
    Veml6075(Veml6075),
    Mcp23017(Mcp23017),
}

impl ChipDriver {
    /// Identify, configure and calibrate `chip` through `handle`
    pub fn initialize(chip: Chip, handle: I2CHandle, settings: &ChipSettings) -> DeviceResult<Self> {
        identify(&handle, chip)?;
        Ok(match chip {
            Chip::Hts221 => Self::Hts221(Hts221::new(handle)?),
            Chip::Lps22hb => Self::Lps22hb(Lps22hb::new(handle)?),
            Chip::Veml6075 => Self::Veml6075(Veml6075::new(handle, settings.uv_coefficients)?),
            Chip::Mcp23017 => Self::Mcp23017(Mcp23017::new(handle, &settings.pins)?),
        })
    }

    pub fn chip(&self) -> Chip {
        match self {
            Self::Hts221(_) => Chip::Hts221,
            Self::Lps22hb(_) => Chip::Lps22hb,
            Self::Veml6075(_) => Chip::Veml6075,
            Self::Mcp23017(_) => Chip::Mcp23017,
        }
    }

    fn unsupported(&self, kind: SensorKind) -> DeviceError {
        DeviceError::UnsupportedKind {
            chip: self.chip(),
            kind,
        }
    }

    pub fn temperature(&self) -> DeviceResult<f64> {
        match self {
            Self::Hts221(chip) => chip.temperature(),
            Self::Lps22hb(chip) => chip.temperature(),
            _ => Err(self.unsupported(SensorKind::Temperature)),
        }
    }

    pub fn humidity(&self) -> DeviceResult<f64> {
        match self {
            Self::Hts221(chip) => chip.humidity(),
            _ => Err(self.unsupported(SensorKind::Humidity)),
        }
    }

    pub fn pressure(&self) -> DeviceResult<f64> {
        match self {
            Self::Lps22hb(chip) => chip.pressure(),
            _ => Err(self.unsupported(SensorKind::Pressure)),
        }
    }

    pub fn uv_index(&self) -> DeviceResult<f64> {
        match self {
            Self::Veml6075(chip) => chip.uv_index(),
            _ => Err(self.unsupported(SensorKind::UvIndex)),
        }
    }

    pub fn pin_state(&self, pin: u8) -> DeviceResult<bool> {
        match self {
            Self::Mcp23017(chip) if pin < mcp23017::PIN_COUNT => chip.read_input(pin),
            _ => Err(self.unsupported(SensorKind::PinState(pin))),
        }
    }

    /// Read and convert a single kind
    pub fn read(&self, kind: SensorKind) -> DeviceResult<SensorValue> {
        Ok(match kind {
            SensorKind::Temperature => SensorValue::Measurement(self.temperature()?),
            SensorKind::Humidity => SensorValue::Measurement(self.humidity()?),
            SensorKind::Pressure => SensorValue::Measurement(self.pressure()?),
            SensorKind::UvIndex => SensorValue::Measurement(self.uv_index()?),
            SensorKind::UvIntensity => SensorValue::Band(UvBand::classify(self.uv_index()?)),
            SensorKind::PinState(pin) => {
                SensorValue::Measurement(if self.pin_state(pin)? { 1.0 } else { 0.0 })
            }
        })
    }

    /// Read every kind of one poll pass, in order
    ///
    /// Kinds derived from the same conversion share one register read: the UV
    /// index and its intensity band come from a single set of UV channels.
    pub fn sample(&self, kinds: &[SensorKind]) -> DeviceResult<Vec<SensorValue>> {
        let mut uv_index = None;
        let mut values = Vec::with_capacity(kinds.len());
        for kind in kinds {
            let value = match kind {
                SensorKind::UvIndex | SensorKind::UvIntensity => {
                    let index = match uv_index {
                        Some(index) => index,
                        None => {
                            let index = self.uv_index()?;
                            uv_index = Some(index);
                            index
                        }
                    };
                    if *kind == SensorKind::UvIndex {
                        SensorValue::Measurement(index)
                    } else {
                        SensorValue::Band(UvBand::classify(index))
                    }
                }
                other => self.read(*other)?,
            };
            values.push(value);
        }
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_kinds() {
        assert!(Chip::Hts221.supports(SensorKind::Humidity));
        assert!(!Chip::Hts221.supports(SensorKind::Pressure));
        assert!(Chip::Lps22hb.supports(SensorKind::Temperature));
        assert!(Chip::Veml6075.supports(SensorKind::UvIntensity));
        assert!(Chip::Mcp23017.supports(SensorKind::PinState(15)));
        assert!(!Chip::Mcp23017.supports(SensorKind::PinState(16)));
    }

    #[test]
    fn test_chip_names_round_trip_through_yaml() {
        let chip: Chip = serde_yml::from_str("veml6075").unwrap();
        assert_eq!(chip, Chip::Veml6075);
        assert_eq!(chip.to_string(), "VEML6075");
        assert_eq!(chip.default_address(), 0x10);
    }
}
