// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Management Module
//!
//! Runs the background tasks of the sensor application:
//!
//! - the polling daemon driving every configured device
//! - the state updater storing forwarded sensor values
//! - a periodic report logging the latest readings
//!
//! ## Usage
//!
//! ```no_run
//! use rust_i2c_sensors::{config::Config, daemon::launch_daemon::Daemon};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&config).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{Config, DeviceConfig};
use crate::sensors::daemon::SensorDaemon;
use crate::sensors::shared_state::{
    create_shared_sensor_state, forwarding_callback, run_state_updater, SensorUpdate,
    SharedSensorState,
};
use crate::sensors::{create_bus_driver, BusManager, DeviceState, SharedBus};

/// Period of the readings report
const REPORT_INTERVAL: Duration = Duration::from_secs(10);

/// Time left to the state updater to store queued updates on shutdown
const UPDATER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Coordinates the background tasks of the application
///
/// The `running` flag is shared with the polling daemon. Auxiliary tasks wait
/// on a watch channel so that a shutdown wakes them immediately.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    sensor_state: SharedSensorState,
    manager: Option<Arc<BusManager>>,
    sensor_daemon: Option<SensorDaemon>,
    updater: Option<JoinHandle<()>>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            shutdown_tx,
            sensor_state: create_shared_sensor_state(),
            manager: None,
            sensor_daemon: None,
            updater: None,
        }
    }

    /// Latest readings and device statuses
    pub fn sensor_state(&self) -> SharedSensorState {
        self.sensor_state.clone()
    }

    pub fn manager(&self) -> Option<Arc<BusManager>> {
        self.manager.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Open the configured bus and launch every task
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let driver = create_bus_driver(&config.i2c, &config.devices)?;
        let manager = Arc::new(BusManager::new(
            SharedBus::new(driver),
            Duration::from_millis(config.i2c.scan_interval_ms),
        ));
        self.launch_with_manager(manager, &config.devices).await
    }

    /// Launch every task on an already opened bus
    pub async fn launch_with_manager(
        &mut self,
        manager: Arc<BusManager>,
        devices: &[DeviceConfig],
    ) -> Result<()> {
        if self.manager.is_some() {
            anyhow::bail!("Daemon already launched");
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let registered =
            register_configured_devices(&manager, devices, &sender, &self.sensor_state).await;
        drop(sender);
        info!(
            "{} of {} configured device(s) initialized",
            registered,
            devices.len()
        );

        self.updater = Some(tokio::spawn(run_state_updater(
            receiver,
            self.sensor_state.clone(),
        )));

        let mut sensor_daemon = SensorDaemon::new(manager.clone(), self.running.clone())
            .with_shared_state(self.sensor_state.clone());
        sensor_daemon.start()?;
        self.sensor_daemon = Some(sensor_daemon);
        self.manager = Some(manager);

        self.start_report(REPORT_INTERVAL);
        Ok(())
    }

    /// Start a task logging the latest readings periodically
    fn start_report(&mut self, period: Duration) {
        debug!("Starting readings report every {:?}", period);

        let state = self.sensor_state.clone();
        let mut shutdown = self.shutdown_tx.subscribe();
        let task = tokio::spawn(async move {
            let mut interval = time::interval(period);
            // The first tick completes immediately, nothing has been read yet
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = interval.tick() => {
                        let state = state.read().await;
                        for reading in state.readings() {
                            match &reading.value {
                                Some(value) => info!(
                                    "{} (0x{:02x} {}): {} {}",
                                    reading.name,
                                    reading.address,
                                    reading.kind,
                                    value,
                                    reading.kind.unit().unwrap_or("")
                                ),
                                None => debug!("{}: no value yet", reading.name),
                            }
                        }
                        for status in state.devices() {
                            if status.state != DeviceState::Active {
                                warn!(
                                    "{} @ 0x{:02x} is {:?}{}",
                                    status.chip,
                                    status.address,
                                    status.state,
                                    status
                                        .error
                                        .as_ref()
                                        .map(|e| format!(": {}", e))
                                        .unwrap_or_default()
                                );
                            }
                        }
                    }
                }
            }
            Ok(())
        });

        self.tasks.push(task);
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all tasks to complete
    ///
    /// Stopping the polling daemon and releasing the bus manager drops the
    /// device callbacks and their update senders, so the state updater ends
    /// once the queued updates are stored.
    pub async fn join(mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(mut sensor_daemon) = self.sensor_daemon.take() {
            match sensor_daemon.stop().await {
                Ok(ticks) => debug!("Polling daemon ran {} tick(s)", ticks),
                Err(e) => result = Err(e),
            }
        }
        self.manager = None;

        if let Some(mut updater) = self.updater.take() {
            match time::timeout(UPDATER_DRAIN_TIMEOUT, &mut updater).await {
                Ok(Ok(())) => debug!("State updater drained"),
                Ok(Err(e)) => error!("State updater panicked: {}", e),
                Err(_) => {
                    // Manager handles given out by `manager()` still hold senders
                    warn!("State updater still has live senders, cancelling it");
                    updater.abort();
                    let _ = updater.await;
                }
            }
        }

        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Task panicked: {}", e);
            }
        }
        result
    }
}

/// Register the configured devices and sensors on `manager`
///
/// Each sensor gets a callback forwarding its values through `sender`, and is
/// declared in `state` together with its device status. A device that cannot
/// be initialized is recorded as uninitialized with the error and skipped.
/// Device construction talks to the bus and runs on the blocking pool.
/// Returns the number of devices initialized.
pub async fn register_configured_devices(
    manager: &Arc<BusManager>,
    devices: &[DeviceConfig],
    sender: &mpsc::UnboundedSender<SensorUpdate>,
    state: &SharedSensorState,
) -> usize {
    let mut registered = 0;

    for config in devices {
        let address = config.address();
        let chip = config.chip;
        let decimation = config.decimation;
        let settings = config.chip_settings();
        let builder = manager.clone();
        let created = tokio::task::spawn_blocking(move || {
            builder.register_device_with(chip, address, decimation, &settings)
        })
        .await;

        let created = match created {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(format!("initialization task failed: {}", e)),
        };
        let device = match created {
            Ok(device) => device,
            Err(message) => {
                error!("Failed to initialize {} @ 0x{:02x}: {}", chip, address, message);
                state.write().await.update_device_status(
                    chip,
                    address,
                    DeviceState::Uninitialized,
                    Some(message),
                );
                continue;
            }
        };
        registered += 1;

        let mut state = state.write().await;
        state.update_device_status(chip, address, device.state(), None);
        for sensor in &config.sensors {
            let Some(kind) = sensor.kind() else {
                warn!("Sensor '{}' has no pin, skipped", sensor.name);
                continue;
            };
            let callback = forwarding_callback(sender.clone(), address, kind);
            match device.register_sensor(kind, &sensor.name, callback) {
                Ok(()) => state.register_sensor(address, kind, &sensor.name),
                Err(e) => warn!("Sensor '{}' not registered: {}", sensor.name, e),
            }
        }
    }

    registered
}
