// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTS221 temperature and humidity sensor
//!
//! Both quantities use the two-point factory calibration stored in the chip.

use crate::sensors::bus::I2CHandle;
use crate::sensors::calibration::{clamp_humidity, LinearCalibration};
use crate::sensors::DeviceResult;

pub const WHO_AM_I: u8 = 0x0F;
pub const DEVICE_ID: u8 = 0xBC;
pub const AV_CONF: u8 = 0x10;
pub const CTRL_REG1: u8 = 0x20;
pub const HUMIDITY_OUT_L: u8 = 0x28;
pub const HUMIDITY_OUT_H: u8 = 0x29;
pub const TEMP_OUT_L: u8 = 0x2A;
pub const TEMP_OUT_H: u8 = 0x2B;
pub const H0_RH_X2: u8 = 0x30;
pub const H1_RH_X2: u8 = 0x31;
pub const T0_DEGC_X8: u8 = 0x32;
pub const T1_DEGC_X8: u8 = 0x33;
pub const T1T0_MSB: u8 = 0x35;
pub const H0_T0_OUT_L: u8 = 0x36;
pub const H0_T0_OUT_H: u8 = 0x37;
pub const H1_T0_OUT_L: u8 = 0x3A;
pub const H1_T0_OUT_H: u8 = 0x3B;
pub const T0_OUT_L: u8 = 0x3C;
pub const T0_OUT_H: u8 = 0x3D;
pub const T1_OUT_L: u8 = 0x3E;
pub const T1_OUT_H: u8 = 0x3F;

/// Temperature averaging [5:3] 16 samples, humidity averaging [2:0] 32 samples
const AV_CONF_VALUE: u8 = (0x3 << 3) | 0x3;
/// Power up [7], block data update [2], 1 Hz output data rate [1:0]
const CTRL_REG1_VALUE: u8 = (1 << 7) | (1 << 2) | 0x1;

#[derive(Debug)]
pub struct Hts221 {
    handle: I2CHandle,
    temperature: LinearCalibration,
    humidity: LinearCalibration,
}

impl Hts221 {
    /// Configure the chip and capture its calibration
    pub fn new(handle: I2CHandle) -> DeviceResult<Self> {
        handle.write_byte(AV_CONF, AV_CONF_VALUE)?;
        handle.write_byte(CTRL_REG1, CTRL_REG1_VALUE)?;

        // T0/T1 are 10-bit values, the two MSBs of each live in T1T0_MSB
        let msb = handle.read_byte(T1T0_MSB)? as u16;
        let t0_x8 = ((msb & 0x3) << 8) | handle.read_byte(T0_DEGC_X8)? as u16;
        let t1_x8 = ((msb & 0xC) << 6) | handle.read_byte(T1_DEGC_X8)? as u16;
        let t0_out = handle.read_signed(&[T0_OUT_L, T0_OUT_H])?;
        let t1_out = handle.read_signed(&[T1_OUT_L, T1_OUT_H])?;

        let h0_x2 = handle.read_byte(H0_RH_X2)?;
        let h1_x2 = handle.read_byte(H1_RH_X2)?;
        let h0_out = handle.read_signed(&[H0_T0_OUT_L, H0_T0_OUT_H])?;
        let h1_out = handle.read_signed(&[H1_T0_OUT_L, H1_T0_OUT_H])?;

        Ok(Self {
            handle,
            temperature: LinearCalibration::from_points(
                t0_out,
                t0_x8 as f64 / 8.0,
                t1_out,
                t1_x8 as f64 / 8.0,
            ),
            humidity: LinearCalibration::from_points(
                h0_out,
                h0_x2 as f64 / 2.0,
                h1_out,
                h1_x2 as f64 / 2.0,
            ),
        })
    }

    /// Temperature in degrees Celsius
    pub fn temperature(&self) -> DeviceResult<f64> {
        let raw = self.handle.read_signed(&[TEMP_OUT_L, TEMP_OUT_H])?;
        Ok(self.temperature.apply(raw))
    }

    /// Relative humidity in %, clamped to [0, 100]
    pub fn humidity(&self) -> DeviceResult<f64> {
        let raw = self.handle.read_signed(&[HUMIDITY_OUT_L, HUMIDITY_OUT_H])?;
        Ok(clamp_humidity(self.humidity.apply(raw)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::bus::SharedBus;
    use crate::sensors::chips::Chip;
    use crate::sensors::drivers::MockI2CDriver;
    use approx::assert_relative_eq;

    fn setup() -> (MockI2CDriver, Hts221) {
        let driver = MockI2CDriver::new().with_chip(0x5F, Chip::Hts221);
        let control = driver.clone();
        let bus = SharedBus::new(Box::new(driver));
        let chip = Hts221::new(bus.handle(0x5F)).unwrap();
        (control, chip)
    }

    #[test]
    fn test_configuration_writes() {
        let (control, _chip) = setup();
        assert_eq!(control.register(0x5F, AV_CONF), Some(0x1B));
        assert_eq!(control.register(0x5F, CTRL_REG1), Some(0x85));
    }

    #[test]
    fn test_calibrated_readings() {
        let (control, chip) = setup();
        assert_relative_eq!(chip.temperature().unwrap(), 25.0, epsilon = 1e-9);
        assert_relative_eq!(chip.humidity().unwrap(), 50.0, epsilon = 1e-9);

        // -500 -> 20 + 0.02 * -500 = 10 degC
        control.set_register(0x5F, TEMP_OUT_L, 0x0C);
        control.set_register(0x5F, TEMP_OUT_H, 0xFE);
        assert_relative_eq!(chip.temperature().unwrap(), 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_humidity_clamped_at_both_ends() {
        let (control, chip) = setup();
        // 12000 -> 140 %RH before clamping
        control.set_register(0x5F, HUMIDITY_OUT_L, 0xE0);
        control.set_register(0x5F, HUMIDITY_OUT_H, 0x2E);
        assert_eq!(chip.humidity().unwrap(), 100.0);

        // -4000 -> -20 %RH before clamping
        control.set_register(0x5F, HUMIDITY_OUT_L, 0x60);
        control.set_register(0x5F, HUMIDITY_OUT_H, 0xF0);
        assert_eq!(chip.humidity().unwrap(), 0.0);
    }

    #[test]
    fn test_ten_bit_temperature_references() {
        let driver = MockI2CDriver::new().with_chip(0x5F, Chip::Hts221);
        // T0 = 0x2A0 / 8 = 84 degC, T1 = 0x340 / 8 = 104 degC
        driver.set_register(0x5F, T1T0_MSB, 0x0E);
        driver.set_register(0x5F, T0_DEGC_X8, 0xA0);
        driver.set_register(0x5F, T1_DEGC_X8, 0x40);
        let bus = SharedBus::new(Box::new(driver));
        let chip = Hts221::new(bus.handle(0x5F)).unwrap();
        assert_relative_eq!(chip.temperature().unwrap(), 89.0, epsilon = 1e-9);
    }
}
