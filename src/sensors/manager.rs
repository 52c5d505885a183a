// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Bus manager
//!
//! Owns the devices of one bus, keyed by address. Configuration-time setup
//! asks it for the device at an address (created on first request, shared
//! afterwards) and the polling daemon drives every device through
//! [`BusManager::poll_all`].

use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::bus::SharedBus;
use super::chips::{Chip, ChipSettings};
use super::device::{Device, PollOutcome};
use super::{DeviceError, DeviceResult};

/// Per-tick counters returned by [`BusManager::poll_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Devices that ran a read pass
    pub dispatched: usize,
    /// Devices skipped by decimation
    pub idle: usize,
    /// Devices faulted, either during this tick or earlier
    pub faulted: usize,
    /// Callbacks invoked during this tick
    pub callbacks: usize,
}

pub struct BusManager {
    bus: SharedBus,
    scan_interval: Duration,
    devices: Mutex<Vec<Arc<Device>>>,
}

impl BusManager {
    pub fn new(bus: SharedBus, scan_interval: Duration) -> Self {
        info!(
            "Bus manager created, scan period={} ms",
            scan_interval.as_millis()
        );
        Self {
            bus,
            scan_interval,
            devices: Mutex::new(Vec::new()),
        }
    }

    pub fn bus(&self) -> &SharedBus {
        &self.bus
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    fn devices_lock(&self) -> MutexGuard<'_, Vec<Arc<Device>>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the device at `address`, creating it on first request
    pub fn register_device(
        &self,
        chip: Chip,
        address: u8,
        decimation_period: u32,
    ) -> DeviceResult<Arc<Device>> {
        self.register_device_with(chip, address, decimation_period, &ChipSettings::default())
    }

    /// Same as [`BusManager::register_device`] with chip settings
    ///
    /// Settings and decimation only apply when the device is created. A
    /// different decimation for an existing device is logged and ignored; a
    /// different chip at an existing address is an error. Construction
    /// failures leave nothing registered.
    pub fn register_device_with(
        &self,
        chip: Chip,
        address: u8,
        decimation_period: u32,
        settings: &ChipSettings,
    ) -> DeviceResult<Arc<Device>> {
        let mut devices = self.devices_lock();

        if let Some(device) = devices.iter().find(|device| device.address() == address) {
            if device.chip() != chip {
                return Err(DeviceError::AddressConflict {
                    address,
                    existing: device.chip(),
                    requested: chip,
                });
            }
            debug!("{} @ 0x{:02x} reused", chip, address);
            let current = device.decimation_period();
            if decimation_period.max(1) != current {
                warn!(
                    "Conflicting decimation for {} @ 0x{:02x}: {} requested while it was {} [UNCHANGED]",
                    chip, address, decimation_period, current
                );
            }
            return Ok(device.clone());
        }

        let device = Arc::new(Device::with_settings(
            &self.bus,
            chip,
            address,
            decimation_period,
            settings,
        )?);
        info!(
            "New {} @ 0x{:02x} registered (polling at {} x {} ms)",
            chip,
            address,
            device.decimation_period(),
            self.scan_interval.as_millis()
        );
        devices.push(device.clone());
        Ok(device)
    }

    pub fn device(&self, address: u8) -> Option<Arc<Device>> {
        self.devices_lock()
            .iter()
            .find(|device| device.address() == address)
            .cloned()
    }

    /// Registered devices, in registration order
    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.devices_lock().clone()
    }

    /// Run one scheduler tick over every device
    ///
    /// Device failures are absorbed: the failing device is faulted (and logged
    /// once by the device itself) while the others keep being polled.
    pub fn poll_all(&self) -> PollSummary {
        let mut summary = PollSummary::default();
        for device in self.devices() {
            match device.poll() {
                Ok(PollOutcome::Idle) => summary.idle += 1,
                Ok(PollOutcome::Dispatched(callbacks)) => {
                    summary.dispatched += 1;
                    summary.callbacks += callbacks;
                }
                Err(DeviceError::Faulted { .. }) | Err(DeviceError::Communication(_)) => {
                    summary.faulted += 1
                }
                Err(e) => {
                    warn!(
                        "{} @ 0x{:02x}: poll failed: {}",
                        device.chip(),
                        device.address(),
                        e
                    );
                    summary.faulted += 1;
                }
            }
        }
        summary
    }
}
