// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust I2C sensors library
//!
//! Polling and dispatch framework for register-addressed I2C sensors: a shared
//! bus adapter, chip drivers with factory calibration, and a decimated
//! scheduler delivering converted values to per-sensor callbacks.

pub mod config;
pub mod daemon;
pub mod sensors;
