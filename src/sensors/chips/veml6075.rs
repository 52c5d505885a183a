// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! VEML6075 UVA/UVB light sensor
//!
//! All registers are 16 bits wide and accessed with SMBus word transactions.

use crate::sensors::bus::I2CHandle;
use crate::sensors::calibration::{uv_index, UvCoefficients, UvRaw};
use crate::sensors::DeviceResult;

pub const UV_CONF: u8 = 0x00;
pub const UVA_DATA: u8 = 0x07;
pub const UVB_DATA: u8 = 0x09;
/// Visible light compensation channel
pub const UVCOMP1_DATA: u8 = 0x0A;
/// Infrared compensation channel
pub const UVCOMP2_DATA: u8 = 0x0B;
pub const ID: u8 = 0x0C;
pub const DEVICE_ID: u16 = 0x0026;

/// Power on [0] = 0, 800 ms integration time [6:4]
const UV_CONF_VALUE: u16 = 0x4 << 4;

#[derive(Debug)]
pub struct Veml6075 {
    handle: I2CHandle,
    coefficients: UvCoefficients,
}

impl Veml6075 {
    /// Power up the chip with 800 ms integration
    ///
    /// `coefficients` are fixed for the lifetime of the driver.
    pub fn new(handle: I2CHandle, coefficients: UvCoefficients) -> DeviceResult<Self> {
        handle.write_word(UV_CONF, UV_CONF_VALUE)?;
        Ok(Self {
            handle,
            coefficients,
        })
    }

    pub fn coefficients(&self) -> &UvCoefficients {
        &self.coefficients
    }

    /// Read the four channels of the last conversion
    pub fn raw(&self) -> DeviceResult<UvRaw> {
        Ok(UvRaw {
            comp_visible: self.handle.read_word(UVCOMP1_DATA)?,
            comp_ir: self.handle.read_word(UVCOMP2_DATA)?,
            uva: self.handle.read_word(UVA_DATA)?,
            uvb: self.handle.read_word(UVB_DATA)?,
        })
    }

    pub fn uv_index(&self) -> DeviceResult<f64> {
        Ok(uv_index(&self.raw()?, &self.coefficients))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::bus::SharedBus;
    use crate::sensors::chips::Chip;
    use crate::sensors::drivers::MockI2CDriver;
    use approx::assert_relative_eq;

    #[test]
    fn test_power_up_and_uv_index() {
        let driver = MockI2CDriver::new().with_chip(0x10, Chip::Veml6075);
        let control = driver.clone();
        let bus = SharedBus::new(Box::new(driver));
        let chip = Veml6075::new(bus.handle(0x10), UvCoefficients::default()).unwrap();

        assert_eq!(control.register(0x10, UV_CONF), Some(0x0040));
        let raw = chip.raw().unwrap();
        assert_eq!(
            raw,
            UvRaw {
                uva: 4000,
                uvb: 3000,
                comp_visible: 300,
                comp_ir: 200
            }
        );
        assert_relative_eq!(
            chip.uv_index().unwrap(),
            uv_index(&raw, &UvCoefficients::default())
        );
    }

    #[test]
    fn test_custom_coefficients() {
        let driver = MockI2CDriver::new().with_chip(0x10, Chip::Veml6075);
        let bus = SharedBus::new(Box::new(driver));
        let coefficients = UvCoefficients {
            uva_visible: 0.0,
            uva_ir: 0.0,
            uvb_visible: 0.0,
            uvb_ir: 0.0,
            integration: 1.0,
            ..Default::default()
        };
        let chip = Veml6075::new(bus.handle(0x10), coefficients).unwrap();
        let expected = (4000.0 * 0.001491 + 3000.0 * 0.002591) / 2.0;
        assert_relative_eq!(chip.uv_index().unwrap(), expected, epsilon = 1e-12);
    }
}
