// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! Starting, monitoring and gracefully shutting down the background tasks of
//! the sensor application.

pub mod launch_daemon;

pub use launch_daemon::{register_configured_devices, Daemon};
