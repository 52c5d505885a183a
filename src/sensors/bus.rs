// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! I2C bus adapter abstraction
//!
//! The sensor core never talks to a physical bus directly. It goes through the
//! [`I2CBusDriver`] trait, implemented by the native Linux driver and by the
//! register-level simulation used for tests and `--mock` runs.
//!
//! A single driver instance is shared by every device living on the same bus
//! through [`SharedBus`]. Each transaction takes the bus lock for its own
//! duration only; multi-register frames are kept coherent by the per-device
//! lock, which is always taken before the bus lock.

use std::fmt;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors raised by a bus transaction
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Unable to open I2C bus {path}: {message}")]
    Open { path: String, message: String },
    #[error("No device answering at address 0x{address:02X}")]
    DeviceNotFound { address: u8 },
    #[error("I2C transaction failed at 0x{address:02X}, register 0x{register:02X}: {message}")]
    Transaction {
        address: u8,
        register: u8,
        message: String,
    },
    #[error("I2C bus I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("I2C bus lock poisoned")]
    Poisoned,
}

pub type BusResult<T> = std::result::Result<T, BusError>;

/// I2C bus driver trait for hardware abstraction
#[cfg_attr(test, mockall::automock)]
pub trait I2CBusDriver {
    /// Read `length` bytes starting at `register` of the device at `address`
    fn read(&mut self, address: u8, register: u8, length: usize) -> BusResult<Vec<u8>>;

    /// Write `data` starting at `register` of the device at `address`
    fn write(&mut self, address: u8, register: u8, data: &[u8]) -> BusResult<()>;

    /// Check if a device acknowledges `address`
    fn device_present(&mut self, address: u8) -> BusResult<bool>;
}

/// Bus driver shared by every device on one physical bus
#[derive(Clone)]
pub struct SharedBus {
    driver: Arc<Mutex<Box<dyn I2CBusDriver + Send>>>,
}

impl SharedBus {
    pub fn new(driver: Box<dyn I2CBusDriver + Send>) -> Self {
        Self {
            driver: Arc::new(Mutex::new(driver)),
        }
    }

    fn with_driver<T>(
        &self,
        transaction: impl FnOnce(&mut dyn I2CBusDriver) -> BusResult<T>,
    ) -> BusResult<T> {
        let mut driver = self.driver.lock().map_err(|_| BusError::Poisoned)?;
        transaction(&mut **driver)
    }

    /// Read a single byte register
    pub fn read_byte(&self, address: u8, register: u8) -> BusResult<u8> {
        let data = self.with_driver(|driver| driver.read(address, register, 1))?;
        data.first().copied().ok_or_else(|| BusError::Transaction {
            address,
            register,
            message: "empty read".to_string(),
        })
    }

    /// Write a single byte register
    pub fn write_byte(&self, address: u8, register: u8, value: u8) -> BusResult<()> {
        self.with_driver(|driver| driver.write(address, register, &[value]))
    }

    /// SMBus word read (least significant byte first)
    pub fn read_word(&self, address: u8, register: u8) -> BusResult<u16> {
        let data = self.with_driver(|driver| driver.read(address, register, 2))?;
        match data.as_slice() {
            [low, high, ..] => Ok(u16::from_le_bytes([*low, *high])),
            _ => Err(BusError::Transaction {
                address,
                register,
                message: format!("short word read ({} bytes)", data.len()),
            }),
        }
    }

    /// SMBus word write (least significant byte first)
    pub fn write_word(&self, address: u8, register: u8, value: u16) -> BusResult<()> {
        self.with_driver(|driver| driver.write(address, register, &value.to_le_bytes()))
    }

    pub fn device_present(&self, address: u8) -> BusResult<bool> {
        self.with_driver(|driver| driver.device_present(address))
    }

    /// Handle bound to one device address on this bus
    pub fn handle(&self, address: u8) -> I2CHandle {
        I2CHandle {
            bus: self.clone(),
            address,
        }
    }
}

/// A [`SharedBus`] bound to a single device address
#[derive(Clone)]
pub struct I2CHandle {
    bus: SharedBus,
    address: u8,
}

impl fmt::Debug for I2CHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("I2CHandle")
            .field("address", &format_args!("0x{:02X}", self.address))
            .finish()
    }
}

impl I2CHandle {
    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn read_byte(&self, register: u8) -> BusResult<u8> {
        self.bus.read_byte(self.address, register)
    }

    pub fn write_byte(&self, register: u8, value: u8) -> BusResult<()> {
        self.bus.write_byte(self.address, register, value)
    }

    pub fn read_word(&self, register: u8) -> BusResult<u16> {
        self.bus.read_word(self.address, register)
    }

    pub fn write_word(&self, register: u8, value: u16) -> BusResult<()> {
        self.bus.write_word(self.address, register, value)
    }

    /// Read a two's-complement value spread over byte registers
    ///
    /// `registers` lists the registers least significant byte first, one
    /// transaction per register. The result is sign extended over
    /// `8 * registers.len()` bits.
    pub fn read_signed(&self, registers: &[u8]) -> BusResult<i32> {
        let mut raw = 0u32;
        for (index, register) in registers.iter().enumerate() {
            raw |= (self.read_byte(*register)? as u32) << (8 * index);
        }
        Ok(super::calibration::sign_extend(
            raw,
            8 * registers.len() as u32,
        ))
    }

    /// Read-modify-write of a single bit in a byte register
    pub fn update_bit(&self, register: u8, bit: u8, set: bool) -> BusResult<()> {
        let current = self.read_byte(register)?;
        let updated = if set {
            current | (1 << bit)
        } else {
            current & !(1 << bit)
        };
        if updated != current {
            self.write_byte(register, updated)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[test]
    fn test_word_transactions_are_little_endian() {
        let mut driver = MockI2CBusDriver::new();
        driver
            .expect_read()
            .with(eq(0x10), eq(0x0C), eq(2))
            .returning(|_, _, _| Ok(vec![0x26, 0x00]));
        driver
            .expect_write()
            .withf(|address, register, data| {
                *address == 0x10 && *register == 0x00 && data == [0x40u8, 0x00].as_slice()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let bus = SharedBus::new(Box::new(driver));
        assert_eq!(bus.read_word(0x10, 0x0C).unwrap(), 0x0026);
        bus.write_word(0x10, 0x00, 0x0040).unwrap();
    }

    #[test]
    fn test_read_signed_sign_extends() {
        let mut driver = MockI2CBusDriver::new();
        driver
            .expect_read()
            .with(eq(0x5F), eq(0x2A), eq(1))
            .returning(|_, _, _| Ok(vec![0x00]));
        driver
            .expect_read()
            .with(eq(0x5F), eq(0x2B), eq(1))
            .returning(|_, _, _| Ok(vec![0xFF]));

        let handle = SharedBus::new(Box::new(driver)).handle(0x5F);
        assert_eq!(handle.read_signed(&[0x2A, 0x2B]).unwrap(), -256);
    }

    #[test]
    fn test_empty_read_is_an_error() {
        let mut driver = MockI2CBusDriver::new();
        driver.expect_read().returning(|_, _, _| Ok(vec![]));

        let bus = SharedBus::new(Box::new(driver));
        assert!(matches!(
            bus.read_byte(0x5C, 0x0F),
            Err(BusError::Transaction { register: 0x0F, .. })
        ));
    }
}
