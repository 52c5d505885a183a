// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! MCP23017 16-bit GPIO expander
//!
//! Pins 0-7 map to port A and pins 8-15 to port B (IOCON.BANK = 0 register
//! layout, A and B registers interleaved). Every pin starts as an input; the
//! configured pin setups are applied at construction.

use serde::{Deserialize, Serialize};

use crate::sensors::bus::I2CHandle;
use crate::sensors::chips::Chip;
use crate::sensors::{DeviceError, DeviceResult, SensorKind};

pub const IODIRA: u8 = 0x00;
pub const IODIRB: u8 = 0x01;
pub const GPPUA: u8 = 0x0C;
pub const GPPUB: u8 = 0x0D;
pub const GPIOA: u8 = 0x12;
pub const GPIOB: u8 = 0x13;
pub const OLATA: u8 = 0x14;
pub const OLATB: u8 = 0x15;

pub const PIN_COUNT: u8 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    #[default]
    Input,
    Output,
}

/// Direction and electrical options of one pin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinSetup {
    pub pin: u8,
    #[serde(default)]
    pub mode: PinMode,
    /// Enable the 100 kΩ pull-up (inputs only)
    #[serde(default)]
    pub pull_up: bool,
    /// Report and drive the inverted logic level
    #[serde(default)]
    pub invert_logic: bool,
}

#[derive(Debug)]
pub struct Mcp23017 {
    handle: I2CHandle,
    /// Bit n set when pin n uses inverted logic
    inverted: u16,
}

/// Register of the port holding `pin` and the pin bit within it
fn locate(base: u8, pin: u8) -> (u8, u8) {
    (base + pin / 8, pin % 8)
}

impl Mcp23017 {
    pub fn new(handle: I2CHandle, pins: &[PinSetup]) -> DeviceResult<Self> {
        handle.write_byte(IODIRA, 0xFF)?;
        handle.write_byte(IODIRB, 0xFF)?;

        let mut chip = Self {
            handle,
            inverted: 0,
        };
        for setup in pins {
            chip.set_inverted(setup.pin, setup.invert_logic)?;
            match setup.mode {
                PinMode::Input => chip.setup_input(setup.pin, setup.pull_up)?,
                PinMode::Output => chip.setup_output(setup.pin)?,
            }
        }
        Ok(chip)
    }

    fn check_pin(pin: u8) -> DeviceResult<()> {
        if pin < PIN_COUNT {
            Ok(())
        } else {
            Err(DeviceError::UnsupportedKind {
                chip: Chip::Mcp23017,
                kind: SensorKind::PinState(pin),
            })
        }
    }

    fn set_inverted(&mut self, pin: u8, inverted: bool) -> DeviceResult<()> {
        Self::check_pin(pin)?;
        if inverted {
            self.inverted |= 1 << pin;
        } else {
            self.inverted &= !(1 << pin);
        }
        Ok(())
    }

    fn is_inverted(&self, pin: u8) -> bool {
        self.inverted & (1 << pin) != 0
    }

    /// Configure `pin` as an input, optionally pulled up
    pub fn setup_input(&self, pin: u8, pull_up: bool) -> DeviceResult<()> {
        Self::check_pin(pin)?;
        let (iodir, bit) = locate(IODIRA, pin);
        self.handle.update_bit(iodir, bit, true)?;
        let (gppu, bit) = locate(GPPUA, pin);
        self.handle.update_bit(gppu, bit, pull_up)?;
        Ok(())
    }

    /// Configure `pin` as an output driven to its inactive level
    pub fn setup_output(&self, pin: u8) -> DeviceResult<()> {
        Self::check_pin(pin)?;
        self.write_output(pin, false)?;
        let (iodir, bit) = locate(IODIRA, pin);
        self.handle.update_bit(iodir, bit, false)?;
        Ok(())
    }

    /// Drive `pin` to the logical `value`
    pub fn write_output(&self, pin: u8, value: bool) -> DeviceResult<()> {
        Self::check_pin(pin)?;
        let (olat, bit) = locate(OLATA, pin);
        self.handle
            .update_bit(olat, bit, value != self.is_inverted(pin))?;
        Ok(())
    }

    /// Logical level of `pin`
    pub fn read_input(&self, pin: u8) -> DeviceResult<bool> {
        Self::check_pin(pin)?;
        let (gpio, bit) = locate(GPIOA, pin);
        let level = self.handle.read_byte(gpio)? & (1 << bit) != 0;
        Ok(level != self.is_inverted(pin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::bus::SharedBus;
    use crate::sensors::drivers::MockI2CDriver;

    fn setup(pins: &[PinSetup]) -> (MockI2CDriver, Mcp23017) {
        let driver = MockI2CDriver::new().with_chip(0x20, Chip::Mcp23017);
        let control = driver.clone();
        let bus = SharedBus::new(Box::new(driver));
        let chip = Mcp23017::new(bus.handle(0x20), pins).unwrap();
        (control, chip)
    }

    #[test]
    fn test_pin_setup_registers() {
        let pins = [
            PinSetup {
                pin: 2,
                mode: PinMode::Input,
                pull_up: true,
                invert_logic: false,
            },
            PinSetup {
                pin: 9,
                mode: PinMode::Output,
                pull_up: false,
                invert_logic: false,
            },
        ];
        let (control, _chip) = setup(&pins);
        assert_eq!(control.register(0x20, IODIRA), Some(0xFF));
        assert_eq!(control.register(0x20, GPPUA), Some(0x04));
        assert_eq!(control.register(0x20, IODIRB), Some(0xFD));
        assert_eq!(control.register(0x20, OLATB), Some(0x00));
    }

    #[test]
    fn test_inputs_and_outputs() {
        let pins = [
            PinSetup {
                pin: 0,
                mode: PinMode::Output,
                pull_up: false,
                invert_logic: false,
            },
            PinSetup {
                pin: 12,
                mode: PinMode::Input,
                pull_up: true,
                invert_logic: true,
            },
        ];
        let (control, chip) = setup(&pins);

        chip.write_output(0, true).unwrap();
        assert_eq!(control.register(0x20, OLATA), Some(0x01));
        assert!(chip.read_input(0).unwrap());

        // Pin 12 is active low
        control.set_input_levels(0x20, 1 << 12);
        assert!(!chip.read_input(12).unwrap());
        control.set_input_levels(0x20, 0);
        assert!(chip.read_input(12).unwrap());
    }

    #[test]
    fn test_inverted_output_idles_high() {
        let pins = [PinSetup {
            pin: 3,
            mode: PinMode::Output,
            pull_up: false,
            invert_logic: true,
        }];
        let (control, chip) = setup(&pins);
        assert_eq!(control.register(0x20, OLATA), Some(0x08));
        chip.write_output(3, true).unwrap();
        assert_eq!(control.register(0x20, OLATA), Some(0x00));
    }

    #[test]
    fn test_out_of_range_pin() {
        let (_control, chip) = setup(&[]);
        assert!(matches!(
            chip.read_input(16),
            Err(DeviceError::UnsupportedKind {
                kind: SensorKind::PinState(16),
                ..
            })
        ));
    }
}
