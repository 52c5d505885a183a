// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! I2C sensor polling and dispatch
//!
//! This module provides the sensor core:
//! - bus adapter abstraction shared by every device on a bus
//! - calibration model turning raw ADC codes into physical units
//! - device drivers for HTS221, LPS22HB, VEML6075 and MCP23017 chips
//! - per-device sensor registry and the decimated poll dispatcher
//! - bus manager, polling daemon and shared state for the application layer

pub mod bus;
pub mod calibration;
pub mod chips;
pub mod daemon;
pub mod device;
pub mod drivers;
pub mod manager;
pub mod registry;
pub mod shared_state;

pub use bus::{BusError, I2CBusDriver, I2CHandle, SharedBus};
pub use calibration::UvBand;
pub use chips::{Chip, ChipSettings};
pub use device::{create_device, Device, DeviceCore, PollOutcome};
pub use manager::{BusManager, PollSummary};
pub use registry::{SensorCallback, SensorRegistry};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::config::{DeviceConfig, I2CBusType, I2CConfig};

/// Physical quantity reported by a logical sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorKind {
    /// Degrees Celsius
    Temperature,
    /// Relative humidity in %
    Humidity,
    /// Hectopascal
    Pressure,
    UvIndex,
    /// Qualitative band of the UV index
    UvIntensity,
    /// Logic level of a GPIO expander input pin
    PinState(u8),
}

impl SensorKind {
    /// Unit of the reported value, if any
    pub fn unit(&self) -> Option<&'static str> {
        match self {
            Self::Temperature => Some("°C"),
            Self::Humidity => Some("%"),
            Self::Pressure => Some("hPa"),
            Self::UvIndex => Some("UV index"),
            Self::UvIntensity | Self::PinState(_) => None,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Temperature => f.write_str("temperature"),
            Self::Humidity => f.write_str("humidity"),
            Self::Pressure => f.write_str("pressure"),
            Self::UvIndex => f.write_str("uv_index"),
            Self::UvIntensity => f.write_str("uv_intensity"),
            Self::PinState(pin) => write!(f, "pin_state[{}]", pin),
        }
    }
}

/// Converted value handed to a sensor callback
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SensorValue {
    Measurement(f64),
    Band(UvBand),
}

impl SensorValue {
    /// Numeric view of the value; a band maps to its ordinal
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Measurement(value) => *value,
            Self::Band(band) => band.ordinal() as f64,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measurement(value) => write!(f, "{:.2}", value),
            Self::Band(band) => write!(f, "{}", band),
        }
    }
}

/// Lifecycle of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    Uninitialized,
    Active,
    /// A bus operation failed; the device is never polled again
    Faulted,
}

/// Errors raised by a device driver
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("I2C communication error: {0}")]
    Communication(#[from] BusError),
    #[error("{chip} does not provide {kind}")]
    UnsupportedKind { chip: Chip, kind: SensorKind },
    #[error("{chip} @ 0x{address:02X} is faulted")]
    Faulted { chip: Chip, address: u8 },
    #[error("Address 0x{address:02X} already holds a {existing}, cannot register a {requested}")]
    AddressConflict {
        address: u8,
        existing: Chip,
        requested: Chip,
    },
}

pub type DeviceResult<T> = std::result::Result<T, DeviceError>;

/// Create the bus driver selected by the configuration
///
/// The mock bus simulates every configured device so that a full daemon can
/// run without hardware.
pub fn create_bus_driver(
    config: &I2CConfig,
    devices: &[DeviceConfig],
) -> Result<Box<dyn I2CBusDriver + Send>> {
    match config.bus.bus_type {
        I2CBusType::Native => native_driver(&config.bus.device),
        I2CBusType::Mock => {
            let mut driver = drivers::MockI2CDriver::new();
            for device in devices {
                driver.add_chip(device.address(), device.chip);
            }
            Ok(Box::new(driver))
        }
    }
}

#[cfg(target_os = "linux")]
fn native_driver(device: &str) -> Result<Box<dyn I2CBusDriver + Send>> {
    Ok(Box::new(drivers::NativeI2CDriver::new(device)?))
}

#[cfg(not(target_os = "linux"))]
fn native_driver(device: &str) -> Result<Box<dyn I2CBusDriver + Send>> {
    Err(BusError::Open {
        path: device.to_string(),
        message: "native I2C access is only available on Linux".to_string(),
    }
    .into())
}
