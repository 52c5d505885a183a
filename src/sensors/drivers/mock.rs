// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Mock I2C driver simulating sensor chips
//!
//! Each simulated chip is a register file answering at its bus address:
//! - HTS221 and LPS22HB: byte registers with address auto-increment
//! - VEML6075: 16-bit registers read and written as SMBus words
//! - MCP23017: byte registers (BANK=0), output latches reflected on GPIO
//!
//! Register files start with plausible factory calibration and one
//! conversion result. Tests and `--mock` runs can change registers, inject
//! read/write failures and count read transactions. Clones share the same
//! simulated bus, so a test keeps a clone to drive the copy owned by the bus.

use log::debug;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::sensors::bus::{BusError, BusResult, I2CBusDriver};
use crate::sensors::chips::{hts221, lps22hb, mcp23017, veml6075, Chip};

/// Simulated chip
#[derive(Debug, Clone)]
struct MockDevice {
    chip: Chip,
    registers: HashMap<u8, u16>,
    reads: usize,
}

impl MockDevice {
    fn new(chip: Chip) -> Self {
        let registers = match chip {
            Chip::Hts221 => hts221_registers(),
            Chip::Lps22hb => lps22hb_registers(),
            Chip::Veml6075 => veml6075_registers(),
            Chip::Mcp23017 => mcp23017_registers(),
        };
        Self {
            chip,
            registers,
            reads: 0,
        }
    }

    fn word_registers(&self) -> bool {
        self.chip == Chip::Veml6075
    }

    fn get(&self, register: u8) -> u16 {
        self.registers.get(&register).copied().unwrap_or(0)
    }

    fn read(&mut self, register: u8, length: usize) -> Vec<u8> {
        self.reads += 1;
        if self.word_registers() {
            (0..length.div_ceil(2))
                .flat_map(|offset| self.get(register.wrapping_add(offset as u8)).to_le_bytes())
                .take(length)
                .collect()
        } else {
            (0..length)
                .map(|offset| self.get(register.wrapping_add(offset as u8)) as u8)
                .collect()
        }
    }

    fn write(&mut self, register: u8, data: &[u8]) {
        if self.word_registers() {
            for (offset, chunk) in data.chunks(2).enumerate() {
                let value = match chunk {
                    [low, high] => u16::from_le_bytes([*low, *high]),
                    [low] => *low as u16,
                    _ => continue,
                };
                self.registers.insert(register.wrapping_add(offset as u8), value);
            }
        } else {
            for (offset, value) in data.iter().enumerate() {
                self.registers
                    .insert(register.wrapping_add(offset as u8), *value as u16);
            }
        }

        if self.chip == Chip::Mcp23017 {
            self.reflect_outputs();
        }
    }

    /// Output pins drive GPIO from the latch, input pins keep their level
    fn reflect_outputs(&mut self) {
        for (gpio, olat, iodir) in [
            (mcp23017::GPIOA, mcp23017::OLATA, mcp23017::IODIRA),
            (mcp23017::GPIOB, mcp23017::OLATB, mcp23017::IODIRB),
        ] {
            let inputs = self.get(iodir) as u8;
            let latch = self.get(olat) as u8;
            let level = self.get(gpio) as u8;
            self.registers
                .insert(gpio, ((level & inputs) | (latch & !inputs)) as u16);
        }
    }
}

fn hts221_registers() -> HashMap<u8, u16> {
    HashMap::from([
        (hts221::WHO_AM_I, hts221::DEVICE_ID as u16),
        // H0 = 20 %RH, H1 = 80 %RH (x2)
        (hts221::H0_RH_X2, 40),
        (hts221::H1_RH_X2, 160),
        // T0 = 20 degC, T1 = 40 degC (x8, T1 bit 8 in T1T0_MSB[3:2])
        (hts221::T0_DEGC_X8, 0xA0),
        (hts221::T1_DEGC_X8, 0x40),
        (hts221::T1T0_MSB, 0x04),
        // H0_T0_OUT = 0, H1_T0_OUT = 6000
        (hts221::H0_T0_OUT_L, 0x00),
        (hts221::H0_T0_OUT_H, 0x00),
        (hts221::H1_T0_OUT_L, 0x70),
        (hts221::H1_T0_OUT_H, 0x17),
        // T0_OUT = 0, T1_OUT = 1000
        (hts221::T0_OUT_L, 0x00),
        (hts221::T0_OUT_H, 0x00),
        (hts221::T1_OUT_L, 0xE8),
        (hts221::T1_OUT_H, 0x03),
        // 50 %RH, 25 degC
        (hts221::HUMIDITY_OUT_L, 0xB8),
        (hts221::HUMIDITY_OUT_H, 0x0B),
        (hts221::TEMP_OUT_L, 0xFA),
        (hts221::TEMP_OUT_H, 0x00),
    ])
}

fn lps22hb_registers() -> HashMap<u8, u16> {
    HashMap::from([
        (lps22hb::WHO_AM_I, lps22hb::DEVICE_ID as u16),
        // 1013.25 hPa
        (lps22hb::PRESS_OUT_XL, 0x00),
        (lps22hb::PRESS_OUT_L, 0x54),
        (lps22hb::PRESS_OUT_H, 0x3F),
        // 21.5 degC
        (lps22hb::TEMP_OUT_L, 0x66),
        (lps22hb::TEMP_OUT_H, 0x08),
    ])
}

fn veml6075_registers() -> HashMap<u8, u16> {
    HashMap::from([
        (veml6075::UV_CONF, 0x0001),
        (veml6075::UVA_DATA, 4000),
        (veml6075::UVB_DATA, 3000),
        (veml6075::UVCOMP1_DATA, 300),
        (veml6075::UVCOMP2_DATA, 200),
        (veml6075::ID, veml6075::DEVICE_ID),
    ])
}

fn mcp23017_registers() -> HashMap<u8, u16> {
    HashMap::from([(mcp23017::IODIRA, 0xFF), (mcp23017::IODIRB, 0xFF)])
}

#[derive(Debug, Default)]
struct MockBusState {
    devices: HashMap<u8, MockDevice>,
    failing_reads: HashSet<u8>,
    failing_writes: HashSet<u8>,
}

/// Mock I2C driver backed by simulated chips
#[derive(Debug, Clone, Default)]
pub struct MockI2CDriver {
    state: Arc<Mutex<MockBusState>>,
}

impl MockI2CDriver {
    /// Create an empty simulated bus
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> BusResult<MutexGuard<'_, MockBusState>> {
        self.state.lock().map_err(|_| BusError::Poisoned)
    }

    /// Attach a simulated `chip` at `address`, replacing any previous one
    pub fn add_chip(&mut self, address: u8, chip: Chip) {
        if let Ok(mut state) = self.state() {
            debug!("Mock I2C: simulating {} at 0x{:02X}", chip, address);
            state.devices.insert(address, MockDevice::new(chip));
        }
    }

    /// Builder variant of [`MockI2CDriver::add_chip`]
    pub fn with_chip(mut self, address: u8, chip: Chip) -> Self {
        self.add_chip(address, chip);
        self
    }

    /// Detach the chip at `address`; later transactions get no answer
    pub fn remove_chip(&self, address: u8) {
        if let Ok(mut state) = self.state() {
            state.devices.remove(&address);
        }
    }

    /// Set a register of the chip at `address`
    pub fn set_register(&self, address: u8, register: u8, value: u16) {
        if let Ok(mut state) = self.state() {
            if let Some(device) = state.devices.get_mut(&address) {
                device.registers.insert(register, value);
            }
        }
    }

    /// Current value of a register of the chip at `address`
    pub fn register(&self, address: u8, register: u8) -> Option<u16> {
        let state = self.state().ok()?;
        state.devices.get(&address).map(|device| device.get(register))
    }

    /// Drive the MCP23017 input pins at `address` (bit n is pin n)
    ///
    /// Pins configured as outputs keep their latched level.
    pub fn set_input_levels(&self, address: u8, levels: u16) {
        if let Ok(mut state) = self.state() {
            if let Some(device) = state.devices.get_mut(&address) {
                let [port_a, port_b] = levels.to_le_bytes();
                device.registers.insert(mcp23017::GPIOA, port_a as u16);
                device.registers.insert(mcp23017::GPIOB, port_b as u16);
                device.reflect_outputs();
            }
        }
    }

    /// Make every read at `address` fail until restored
    pub fn fail_reads_at(&self, address: u8) {
        if let Ok(mut state) = self.state() {
            state.failing_reads.insert(address);
        }
    }

    /// Make every write at `address` fail until restored
    pub fn fail_writes_at(&self, address: u8) {
        if let Ok(mut state) = self.state() {
            state.failing_writes.insert(address);
        }
    }

    /// Remove the failures injected at `address`
    pub fn restore(&self, address: u8) {
        if let Ok(mut state) = self.state() {
            state.failing_reads.remove(&address);
            state.failing_writes.remove(&address);
        }
    }

    /// Number of read transactions served by the chip at `address`
    pub fn read_count(&self, address: u8) -> usize {
        self.state()
            .ok()
            .and_then(|state| state.devices.get(&address).map(|device| device.reads))
            .unwrap_or(0)
    }
}

impl I2CBusDriver for MockI2CDriver {
    fn read(&mut self, address: u8, register: u8, length: usize) -> BusResult<Vec<u8>> {
        let mut state = self.state()?;
        if state.failing_reads.contains(&address) {
            return Err(BusError::Transaction {
                address,
                register,
                message: "simulated read failure".to_string(),
            });
        }
        let device = state
            .devices
            .get_mut(&address)
            .ok_or(BusError::DeviceNotFound { address })?;
        Ok(device.read(register, length))
    }

    fn write(&mut self, address: u8, register: u8, data: &[u8]) -> BusResult<()> {
        let mut state = self.state()?;
        if state.failing_writes.contains(&address) {
            return Err(BusError::Transaction {
                address,
                register,
                message: "simulated write failure".to_string(),
            });
        }
        let device = state
            .devices
            .get_mut(&address)
            .ok_or(BusError::DeviceNotFound { address })?;
        debug!(
            "Mock I2C: {} @ 0x{:02X} write 0x{:02X} <- {:02X?}",
            device.chip, address, register, data
        );
        device.write(register, data);
        Ok(())
    }

    fn device_present(&mut self, address: u8) -> BusResult<bool> {
        Ok(self.state()?.devices.contains_key(&address))
    }
}
