// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration for the I2C bus and its sensor devices

use serde::{Deserialize, Serialize};

use crate::sensors::calibration::UvCoefficients;
use crate::sensors::chips::{Chip, ChipSettings, PinSetup};
use crate::sensors::SensorKind;

/// I2C bus section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct I2CConfig {
    #[serde(default)]
    pub bus: I2CBusConfig,

    /// Scheduler tick period in milliseconds
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,
}

impl Default for I2CConfig {
    fn default() -> Self {
        Self {
            bus: I2CBusConfig::default(),
            scan_interval_ms: default_scan_interval_ms(),
        }
    }
}

/// I2C bus driver selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct I2CBusConfig {
    /// Bus type: "native" for /dev/i2c-* or "mock" for the simulated bus
    #[serde(rename = "type", default)]
    pub bus_type: I2CBusType,

    /// Device path for the native bus (e.g., "/dev/i2c-1")
    #[serde(default = "default_bus_device")]
    pub device: String,
}

impl Default for I2CBusConfig {
    fn default() -> Self {
        Self {
            bus_type: I2CBusType::default(),
            device: default_bus_device(),
        }
    }
}

/// I2C bus type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum I2CBusType {
    /// Linux I2C character device
    #[default]
    Native,
    /// Simulated chips, no hardware needed
    Mock,
}

/// One chip on the bus and the logical sensors reading it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub chip: Chip,

    /// 7-bit I2C address, defaults to the chip's factory address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<u8>,

    /// Number of scheduler ticks between two reads
    #[serde(default = "default_decimation")]
    pub decimation: u32,

    #[serde(default)]
    pub sensors: Vec<SensorConfig>,

    /// VEML6075 optical coefficients (defaults: open-air diffusor)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uv_coefficients: Option<UvCoefficients>,

    /// MCP23017 pin setups
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pins: Vec<PinSetup>,
}

impl DeviceConfig {
    pub fn new(chip: Chip) -> Self {
        Self {
            chip,
            address: None,
            decimation: default_decimation(),
            sensors: Vec::new(),
            uv_coefficients: None,
            pins: Vec::new(),
        }
    }

    pub fn address(&self) -> u8 {
        self.address.unwrap_or_else(|| self.chip.default_address())
    }

    pub fn chip_settings(&self) -> ChipSettings {
        ChipSettings {
            uv_coefficients: self.uv_coefficients.unwrap_or_default(),
            pins: self.pins.clone(),
        }
    }
}

/// Sensor kind as written in the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKindName {
    Temperature,
    Humidity,
    Pressure,
    UvIndex,
    UvIntensity,
    PinState,
}

/// A logical sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub kind: SensorKindName,

    /// Expander pin, required for `pin_state`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<u8>,

    pub name: String,
}

impl SensorConfig {
    pub fn new(kind: SensorKindName, name: &str) -> Self {
        Self {
            kind,
            pin: None,
            name: name.to_string(),
        }
    }

    /// Resolved sensor kind, `None` for a `pin_state` without pin
    pub fn kind(&self) -> Option<SensorKind> {
        Some(match self.kind {
            SensorKindName::Temperature => SensorKind::Temperature,
            SensorKindName::Humidity => SensorKind::Humidity,
            SensorKindName::Pressure => SensorKind::Pressure,
            SensorKindName::UvIndex => SensorKind::UvIndex,
            SensorKindName::UvIntensity => SensorKind::UvIntensity,
            SensorKindName::PinState => SensorKind::PinState(self.pin?),
        })
    }
}

fn default_scan_interval_ms() -> u64 {
    100
}

fn default_bus_device() -> String {
    "/dev/i2c-1".to_string()
}

/// 100 ticks of 100 ms, one read every 10 s
fn default_decimation() -> u32 {
    100
}
