// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared sensor state
//!
//! Last value of every logical sensor and the status of every configured
//! device, readable from async code. Sensor callbacks run under the device
//! lock on the polling thread, so they never touch this state directly: they
//! push a [`SensorUpdate`] into an unbounded channel and
//! [`run_state_updater`] applies it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use super::chips::Chip;
use super::registry::SensorCallback;
use super::{DeviceState, SensorKind, SensorValue};

/// Value delivered by a sensor callback
#[derive(Debug, Clone, PartialEq)]
pub struct SensorUpdate {
    pub address: u8,
    pub kind: SensorKind,
    pub value: SensorValue,
    pub timestamp: DateTime<Utc>,
}

/// Latest value of one logical sensor
#[derive(Debug, Clone, Serialize)]
pub struct SensorReading {
    pub name: String,
    pub address: u8,
    #[serde(serialize_with = "serialize_kind")]
    pub kind: SensorKind,
    pub value: Option<SensorValue>,
    pub last_update: Option<DateTime<Utc>>,
    pub update_count: u64,
}

fn serialize_kind<S: serde::Serializer>(kind: &SensorKind, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(kind)
}

/// Status of one configured device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub chip: Chip,
    pub address: u8,
    pub state: DeviceState,
    /// Construction or poll error, if any
    pub error: Option<String>,
    pub last_change: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct SensorState {
    readings: HashMap<(u8, SensorKind), SensorReading>,
    devices: HashMap<u8, DeviceStatus>,
}

impl SensorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a logical sensor before its first value arrives
    pub fn register_sensor(&mut self, address: u8, kind: SensorKind, name: &str) {
        self.readings.insert(
            (address, kind),
            SensorReading {
                name: name.to_string(),
                address,
                kind,
                value: None,
                last_update: None,
                update_count: 0,
            },
        );
    }

    /// Store a value; updates for undeclared sensors are ignored
    pub fn apply_update(&mut self, update: SensorUpdate) -> bool {
        match self.readings.get_mut(&(update.address, update.kind)) {
            Some(reading) => {
                reading.value = Some(update.value);
                reading.last_update = Some(update.timestamp);
                reading.update_count += 1;
                true
            }
            None => false,
        }
    }

    pub fn update_device_status(
        &mut self,
        chip: Chip,
        address: u8,
        state: DeviceState,
        error: Option<String>,
    ) {
        self.devices.insert(
            address,
            DeviceStatus {
                chip,
                address,
                state,
                error,
                last_change: Utc::now(),
            },
        );
    }

    pub fn get_reading(&self, address: u8, kind: SensorKind) -> Option<&SensorReading> {
        self.readings.get(&(address, kind))
    }

    /// All readings ordered by address then kind
    pub fn readings(&self) -> Vec<&SensorReading> {
        let mut readings: Vec<_> = self.readings.values().collect();
        readings.sort_by_key(|reading| (reading.address, reading.kind));
        readings
    }

    pub fn device_status(&self, address: u8) -> Option<&DeviceStatus> {
        self.devices.get(&address)
    }

    /// All device statuses ordered by address
    pub fn devices(&self) -> Vec<&DeviceStatus> {
        let mut devices: Vec<_> = self.devices.values().collect();
        devices.sort_by_key(|status| status.address);
        devices
    }
}

/// Type alias for the sensor state wrapped in Arc<RwLock<>>
pub type SharedSensorState = Arc<RwLock<SensorState>>;

pub fn create_shared_sensor_state() -> SharedSensorState {
    Arc::new(RwLock::new(SensorState::new()))
}

/// Build a sensor callback forwarding values to `sender`
///
/// Sending on an unbounded channel never blocks. Values are dropped once the
/// receiving side is gone.
pub fn forwarding_callback(
    sender: mpsc::UnboundedSender<SensorUpdate>,
    address: u8,
    kind: SensorKind,
) -> SensorCallback {
    Box::new(move |value| {
        let _ = sender.send(SensorUpdate {
            address,
            kind,
            value,
            timestamp: Utc::now(),
        });
    })
}

/// Apply forwarded updates to `state` until every sender is dropped
pub async fn run_state_updater(
    mut receiver: mpsc::UnboundedReceiver<SensorUpdate>,
    state: SharedSensorState,
) {
    while let Some(update) = receiver.recv().await {
        state.write().await.apply_update(update);
    }
}
