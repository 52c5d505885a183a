// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor registry
//!
//! Maps each sensor kind of a device to the logical sensor consuming it. A
//! device holds at most one record per kind: registering a kind again
//! replaces the previous record.

use log::error;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use super::{SensorKind, SensorValue};

/// Consumer of converted values
///
/// Invoked synchronously while the device lock is held. Implementations must
/// not block; hand the value off (e.g. through a channel) when it has to reach
/// another execution context.
pub type SensorCallback = Box<dyn FnMut(SensorValue) + Send>;

/// A logical sensor bound to one kind of a device
pub struct SensorRecord {
    pub kind: SensorKind,
    pub name: String,
    callback: SensorCallback,
}

impl SensorRecord {
    pub fn notify(&mut self, value: SensorValue) {
        (self.callback)(value)
    }
}

impl fmt::Debug for SensorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorRecord")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct SensorRegistry {
    records: HashMap<SensorKind, SensorRecord>,
}

impl SensorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the record for `kind`
    ///
    /// Returns the name of the record it replaced, if any.
    pub fn register(
        &mut self,
        kind: SensorKind,
        name: impl Into<String>,
        callback: SensorCallback,
    ) -> Option<String> {
        let record = SensorRecord {
            kind,
            name: name.into(),
            callback,
        };
        self.records.insert(kind, record).map(|previous| previous.name)
    }

    /// Remove the record for `kind`, returning its name
    pub fn unregister(&mut self, kind: SensorKind) -> Option<String> {
        self.records.remove(&kind).map(|record| record.name)
    }

    /// Registered kinds, in dispatch order
    pub fn kinds(&self) -> Vec<SensorKind> {
        self.records.keys().copied().collect()
    }

    pub fn name(&self, kind: SensorKind) -> Option<&str> {
        self.records.get(&kind).map(|record| record.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Deliver one value per kind to the matching records
    ///
    /// A panicking callback is logged and skipped; the remaining records still
    /// receive their values. Returns the number of callbacks that completed.
    pub fn dispatch(&mut self, values: impl IntoIterator<Item = (SensorKind, SensorValue)>) -> usize {
        let mut delivered = 0;
        for (kind, value) in values {
            if let Some(record) = self.records.get_mut(&kind) {
                match panic::catch_unwind(AssertUnwindSafe(|| record.notify(value))) {
                    Ok(()) => delivered += 1,
                    Err(_) => error!("Callback of sensor '{}' ({}) panicked", record.name, kind),
                }
            }
        }
        delivered
    }
}
