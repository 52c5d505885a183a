// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Device driver and poll dispatcher
//!
//! A [`Device`] owns one chip at one bus address. Its mutable state (sensor
//! registry, decimation countdown, lifecycle state) and the chip driver live in
//! a [`DeviceCore`] behind a single non-reentrant lock. Register accessors are
//! only reachable through the locked core, so one lock acquisition covers a
//! multi-register frame, every kind read in a poll pass and the callback
//! fan-out that follows.

use log::{debug, error, info};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::bus::SharedBus;
use super::calibration::UvBand;
use super::chips::{Chip, ChipDriver, ChipSettings};
use super::registry::{SensorCallback, SensorRegistry};
use super::{DeviceError, DeviceResult, DeviceState, SensorKind};

/// Result of one `poll()` call on an active device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Decimated tick, hardware untouched
    Idle,
    /// A read pass ran and this many callbacks were invoked
    Dispatched(usize),
}

/// State guarded by the device lock
#[derive(Debug)]
pub struct DeviceCore {
    chip: Chip,
    address: u8,
    driver: ChipDriver,
    state: DeviceState,
    decimation_period: u32,
    countdown: u32,
    sensors: SensorRegistry,
    /// Communication error that faulted the device
    last_error: Option<String>,
}

impl DeviceCore {
    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn decimation_period(&self) -> u32 {
        self.decimation_period
    }

    pub fn sensors(&self) -> &SensorRegistry {
        &self.sensors
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn ensure_active(&self) -> DeviceResult<()> {
        match self.state {
            DeviceState::Active => Ok(()),
            _ => Err(DeviceError::Faulted {
                chip: self.chip,
                address: self.address,
            }),
        }
    }

    /// Run a bus operation; a communication failure faults the device
    fn guard<T>(&mut self, operation: impl FnOnce(&mut ChipDriver) -> DeviceResult<T>) -> DeviceResult<T> {
        self.ensure_active()?;
        let result = operation(&mut self.driver);
        if let Err(DeviceError::Communication(e)) = &result {
            error!(
                "{} @ 0x{:02x} faulted, no further polling: {}",
                self.chip, self.address, e
            );
            self.state = DeviceState::Faulted;
            self.last_error = Some(e.to_string());
        }
        result
    }

    pub fn temperature(&mut self) -> DeviceResult<f64> {
        self.guard(|driver| driver.temperature())
    }

    pub fn humidity(&mut self) -> DeviceResult<f64> {
        self.guard(|driver| driver.humidity())
    }

    pub fn pressure(&mut self) -> DeviceResult<f64> {
        self.guard(|driver| driver.pressure())
    }

    pub fn uv_index(&mut self) -> DeviceResult<f64> {
        self.guard(|driver| driver.uv_index())
    }

    pub fn uv_intensity(&mut self) -> DeviceResult<UvBand> {
        self.guard(|driver| driver.uv_index().map(UvBand::classify))
    }

    /// Logical level of a GPIO expander pin
    pub fn pin_state(&mut self, pin: u8) -> DeviceResult<bool> {
        self.guard(|driver| driver.pin_state(pin))
    }

    /// Drive a GPIO expander output pin
    pub fn write_output(&mut self, pin: u8, value: bool) -> DeviceResult<()> {
        self.guard(|driver| match driver {
            ChipDriver::Mcp23017(chip) => chip.write_output(pin, value),
            other => Err(DeviceError::UnsupportedKind {
                chip: other.chip(),
                kind: SensorKind::PinState(pin),
            }),
        })
    }

    /// Install or replace the sensor record for `kind`
    pub fn register_sensor(
        &mut self,
        kind: SensorKind,
        name: &str,
        callback: SensorCallback,
    ) -> DeviceResult<()> {
        if !self.chip.supports(kind) {
            return Err(DeviceError::UnsupportedKind {
                chip: self.chip,
                kind,
            });
        }
        if let Some(previous) = self.sensors.register(kind, name, callback) {
            debug!(
                "{} @ 0x{:02x}: {} sensor '{}' replaced by '{}'",
                self.chip, self.address, kind, previous, name
            );
        }
        info!(
            "Sensor '{}' ({}) attached to {} @ 0x{:02x}",
            name, kind, self.chip, self.address
        );
        Ok(())
    }

    /// Decimated read and dispatch
    ///
    /// The countdown starts at the decimation period: calls 1..N-1 return
    /// [`PollOutcome::Idle`] and call N reads every registered kind, then
    /// invokes the callbacks. Values are all read before any callback runs, so
    /// a failed read invokes none of them and faults the device.
    pub fn poll(&mut self) -> DeviceResult<PollOutcome> {
        self.ensure_active()?;

        self.countdown = self.countdown.saturating_sub(1);
        if self.countdown > 0 {
            return Ok(PollOutcome::Idle);
        }
        self.countdown = self.decimation_period;

        let kinds = self.sensors.kinds();
        let values = self.guard(|driver| driver.sample(&kinds))?;
        let delivered = self.sensors.dispatch(kinds.into_iter().zip(values));
        debug!(
            "{} @ 0x{:02x}: poll pass dispatched {} value(s)",
            self.chip, self.address, delivered
        );
        Ok(PollOutcome::Dispatched(delivered))
    }
}

/// One chip instance shared by every logical sensor at its address
#[derive(Debug)]
pub struct Device {
    chip: Chip,
    address: u8,
    core: Mutex<DeviceCore>,
}

impl Device {
    /// Identify, configure and calibrate `chip` at `address`
    ///
    /// A decimation period of 0 is treated as 1 (dispatch on every tick).
    pub fn new(
        bus: &SharedBus,
        chip: Chip,
        address: u8,
        decimation_period: u32,
    ) -> DeviceResult<Self> {
        Self::with_settings(bus, chip, address, decimation_period, &ChipSettings::default())
    }

    pub fn with_settings(
        bus: &SharedBus,
        chip: Chip,
        address: u8,
        decimation_period: u32,
        settings: &ChipSettings,
    ) -> DeviceResult<Self> {
        let driver = ChipDriver::initialize(chip, bus.handle(address), settings)?;
        let decimation_period = decimation_period.max(1);
        info!("{} @ 0x{:02x} device created", chip, address);

        Ok(Self {
            chip,
            address,
            core: Mutex::new(DeviceCore {
                chip,
                address,
                driver,
                state: DeviceState::Active,
                decimation_period,
                countdown: decimation_period,
                sensors: SensorRegistry::new(),
                last_error: None,
            }),
        })
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Take the device lock
    ///
    /// A callback that panicked while the lock was held leaves the core in a
    /// consistent state, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, DeviceCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> DeviceState {
        self.lock().state()
    }

    pub fn decimation_period(&self) -> u32 {
        self.lock().decimation_period()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error().map(str::to_string)
    }

    pub fn register_sensor(
        &self,
        kind: SensorKind,
        name: &str,
        callback: SensorCallback,
    ) -> DeviceResult<()> {
        self.lock().register_sensor(kind, name, callback)
    }

    pub fn unregister_sensor(&self, kind: SensorKind) -> Option<String> {
        self.lock().sensors.unregister(kind)
    }

    pub fn poll(&self) -> DeviceResult<PollOutcome> {
        self.lock().poll()
    }
}

/// Device factory used by configuration-time setup
pub fn create_device(
    bus: &SharedBus,
    chip: Chip,
    address: u8,
    decimation_period: u32,
) -> DeviceResult<Device> {
    Device::new(bus, chip, address, decimation_period)
}
