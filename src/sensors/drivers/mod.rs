// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! I2C bus drivers
//!
//! This module provides the bus driver implementations:
//! - Native: direct access to /dev/i2c-* on Linux
//! - Mock: register-level chip simulation for testing and development

pub mod mock;
#[cfg(target_os = "linux")]
pub mod native;

pub use mock::MockI2CDriver;
#[cfg(target_os = "linux")]
pub use native::NativeI2CDriver;
