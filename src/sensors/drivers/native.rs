// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Native I2C driver for Linux hardware
//!
//! This module provides a native I2C driver that communicates directly
//! with the I2C hardware through /dev/i2c-* devices.

use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;
use log::info;

use crate::sensors::bus::{BusError, BusResult, I2CBusDriver};

/// Native I2C driver for /dev/i2c-N
pub struct NativeI2CDriver {
    device_path: String,
    i2c: I2cdev,
}

impl NativeI2CDriver {
    /// Open the I2C character device at `device_path`
    pub fn new(device_path: &str) -> BusResult<Self> {
        let i2c = I2cdev::new(device_path).map_err(|e| BusError::Open {
            path: device_path.to_string(),
            message: e.to_string(),
        })?;
        info!("Native I2C bus {} opened", device_path);
        Ok(Self {
            device_path: device_path.to_string(),
            i2c,
        })
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }
}

impl I2CBusDriver for NativeI2CDriver {
    fn read(&mut self, address: u8, register: u8, length: usize) -> BusResult<Vec<u8>> {
        let mut buffer = vec![0u8; length];
        self.i2c
            .write_read(address, &[register], &mut buffer)
            .map_err(|e| BusError::Transaction {
                address,
                register,
                message: format!("{:?}", e),
            })?;
        Ok(buffer)
    }

    fn write(&mut self, address: u8, register: u8, data: &[u8]) -> BusResult<()> {
        let mut frame = Vec::with_capacity(data.len() + 1);
        frame.push(register);
        frame.extend_from_slice(data);
        self.i2c
            .write(address, &frame)
            .map_err(|e| BusError::Transaction {
                address,
                register,
                message: format!("{:?}", e),
            })
    }

    fn device_present(&mut self, address: u8) -> BusResult<bool> {
        let mut probe = [0u8; 1];
        Ok(self.i2c.read(address, &mut probe).is_ok())
    }
}
