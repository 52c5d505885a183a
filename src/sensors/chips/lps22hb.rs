// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! LPS22HB barometric pressure sensor
//!
//! No calibration is captured: pressure and temperature use fixed-point
//! scales (4096 LSB/hPa, 100 LSB/°C).

use crate::sensors::bus::I2CHandle;
use crate::sensors::DeviceResult;

pub const WHO_AM_I: u8 = 0x0F;
pub const DEVICE_ID: u8 = 0xB1;
pub const CTRL_REG1: u8 = 0x10;
pub const PRESS_OUT_XL: u8 = 0x28;
pub const PRESS_OUT_L: u8 = 0x29;
pub const PRESS_OUT_H: u8 = 0x2A;
pub const TEMP_OUT_L: u8 = 0x2B;
pub const TEMP_OUT_H: u8 = 0x2C;

/// 1 Hz output data rate [6:4], low-pass filter ODR/20 [3:2], block data update [1]
const CTRL_REG1_VALUE: u8 = (1 << 4) | (0x3 << 2) | (1 << 1);

const PRESSURE_LSB_PER_HPA: f64 = 4096.0;
const TEMPERATURE_LSB_PER_DEGC: f64 = 100.0;

#[derive(Debug)]
pub struct Lps22hb {
    handle: I2CHandle,
}

impl Lps22hb {
    pub fn new(handle: I2CHandle) -> DeviceResult<Self> {
        handle.write_byte(CTRL_REG1, CTRL_REG1_VALUE)?;
        Ok(Self { handle })
    }

    /// Pressure in hPa, from the 24-bit two's-complement output
    pub fn pressure(&self) -> DeviceResult<f64> {
        let raw = self
            .handle
            .read_signed(&[PRESS_OUT_XL, PRESS_OUT_L, PRESS_OUT_H])?;
        Ok(raw as f64 / PRESSURE_LSB_PER_HPA)
    }

    /// Temperature in degrees Celsius
    pub fn temperature(&self) -> DeviceResult<f64> {
        let raw = self.handle.read_signed(&[TEMP_OUT_L, TEMP_OUT_H])?;
        Ok(raw as f64 / TEMPERATURE_LSB_PER_DEGC)
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
    fn test_pressure_and_temperature() {
        let driver = MockI2CDriver::new().with_chip(0x5C, Chip::Lps22hb);
        let control = driver.clone();
        let bus = SharedBus::new(Box::new(driver));
        let chip = Lps22hb::new(bus.handle(0x5C)).unwrap();

        assert_eq!(control.register(0x5C, CTRL_REG1), Some(0x1E));
        assert_relative_eq!(chip.pressure().unwrap(), 1013.25, epsilon = 1e-9);
        assert_relative_eq!(chip.temperature().unwrap(), 21.5, epsilon = 1e-9);
    }

    #[test]
    fn test_negative_raw_values_are_sign_extended() {
        let driver = MockI2CDriver::new().with_chip(0x5C, Chip::Lps22hb);
        // 0xFFF000 = -4096 -> -1 hPa
        driver.set_register(0x5C, PRESS_OUT_XL, 0x00);
        driver.set_register(0x5C, PRESS_OUT_L, 0xF0);
        driver.set_register(0x5C, PRESS_OUT_H, 0xFF);
        // 0xFC18 = -1000 -> -10 degC
        driver.set_register(0x5C, TEMP_OUT_L, 0x18);
        driver.set_register(0x5C, TEMP_OUT_H, 0xFC);
        let bus = SharedBus::new(Box::new(driver));
        let chip = Lps22hb::new(bus.handle(0x5C)).unwrap();

        assert_relative_eq!(chip.pressure().unwrap(), -1.0);
        assert_relative_eq!(chip.temperature().unwrap(), -10.0);
    }
}
