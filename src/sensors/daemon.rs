// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Sensor polling daemon
//!
//! Drives [`BusManager::poll_all`] at the bus scan interval from a tokio task.
//! Each tick runs on the blocking pool since bus transactions are synchronous.

use anyhow::{anyhow, Result};
use log::{debug, error, info};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use super::manager::{BusManager, PollSummary};
use super::shared_state::SharedSensorState;

/// Commands accepted by the polling task
#[derive(Debug, Clone, Copy)]
pub enum SensorDaemonCommand {
    Stop,
}

pub struct SensorDaemon {
    manager: Arc<BusManager>,
    /// Device statuses are mirrored here after every tick, when present
    shared_state: Option<SharedSensorState>,
    /// Running flag shared across the system
    running: Arc<AtomicBool>,
    task_handle: Option<JoinHandle<Result<u64>>>,
    command_sender: Option<mpsc::UnboundedSender<SensorDaemonCommand>>,
}

impl SensorDaemon {
    pub fn new(manager: Arc<BusManager>, running: Arc<AtomicBool>) -> Self {
        Self {
            manager,
            shared_state: None,
            running,
            task_handle: None,
            command_sender: None,
        }
    }

    pub fn with_shared_state(mut self, shared_state: SharedSensorState) -> Self {
        self.shared_state = Some(shared_state);
        self
    }

    pub fn is_running(&self) -> bool {
        self.task_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start the polling loop
    pub fn start(&mut self) -> Result<()> {
        if self.task_handle.is_some() {
            return Err(anyhow!("Sensor daemon already started"));
        }

        let scan_interval = self.manager.scan_interval();
        info!(
            "Starting sensor daemon with scan interval {:?} ({} device(s))",
            scan_interval,
            self.manager.devices().len()
        );

        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<SensorDaemonCommand>();
        self.command_sender = Some(command_tx);
        self.running.store(true, Ordering::Relaxed);

        let manager = self.manager.clone();
        let shared_state = self.shared_state.clone();
        let running = self.running.clone();

        let handle = tokio::spawn(async move {
            let mut interval = time::interval(scan_interval.max(Duration::from_millis(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut ticks = 0u64;
            let mut faulted = 0usize;

            while running.load(Ordering::Relaxed) {
                tokio::select! {
                    command = command_rx.recv() => {
                        match command {
                            Some(SensorDaemonCommand::Stop) | None => {
                                info!("Sensor daemon received stop command");
                                break;
                            }
                        }
                    }

                    _ = interval.tick() => {
                        let poller = manager.clone();
                        let summary: PollSummary =
                            match tokio::task::spawn_blocking(move || poller.poll_all()).await {
                                Ok(summary) => summary,
                                Err(e) => {
                                    error!("Poll tick failed, polling continues: {}", e);
                                    continue;
                                }
                            };
                        ticks += 1;

                        if summary.faulted != faulted {
                            faulted = summary.faulted;
                            if let Some(state) = &shared_state {
                                mirror_device_states(&manager, state).await;
                            }
                        }
                        if summary.dispatched > 0 {
                            debug!(
                                "Tick {}: {} device(s) dispatched {} value(s), {} faulted",
                                ticks, summary.dispatched, summary.callbacks, summary.faulted
                            );
                        }
                    }
                }
            }

            running.store(false, Ordering::Relaxed);
            info!("Sensor daemon stopped after {} tick(s)", ticks);
            Ok(ticks)
        });

        self.task_handle = Some(handle);
        Ok(())
    }

    /// Stop the polling loop and return the number of ticks it ran
    pub async fn stop(&mut self) -> Result<u64> {
        if let Some(sender) = self.command_sender.take() {
            // The task may already be gone, in which case the send fails harmlessly
            let _ = sender.send(SensorDaemonCommand::Stop);
        }

        match self.task_handle.take() {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => {
                    error!("Sensor daemon task failed: {}", e);
                    Err(anyhow!("Sensor daemon task failed: {}", e))
                }
            },
            None => Ok(0),
        }
    }
}

/// Copy the state of every registered device into the shared state
pub async fn mirror_device_states(manager: &BusManager, state: &SharedSensorState) {
    let devices = manager.devices();
    let mut state = state.write().await;
    for device in devices {
        let (device_state, error) = {
            let core = device.lock();
            (core.state(), core.last_error().map(str::to_string))
        };
        state.update_device_status(device.chip(), device.address(), device_state, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::bus::SharedBus;
    use crate::sensors::chips::Chip;
    use crate::sensors::drivers::MockI2CDriver;
    use crate::sensors::shared_state::create_shared_sensor_state;
    use crate::sensors::{DeviceState, SensorKind};
    use std::sync::atomic::AtomicUsize;

    fn manager(driver: MockI2CDriver) -> Arc<BusManager> {
        let bus = SharedBus::new(Box::new(driver));
        Arc::new(BusManager::new(bus, Duration::from_millis(10)))
    }

    #[tokio::test]
    async fn test_daemon_polls_until_stopped() {
        let manager = manager(MockI2CDriver::new().with_chip(0x5C, Chip::Lps22hb));
        let device = manager.register_device(Chip::Lps22hb, 0x5C, 1).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let sink = count.clone();
        device
            .register_sensor(
                SensorKind::Pressure,
                "baro",
                Box::new(move |_| {
                    sink.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        let running = Arc::new(AtomicBool::new(false));
        let mut daemon = SensorDaemon::new(manager, running.clone());
        daemon.start().unwrap();
        assert!(running.load(Ordering::Relaxed));
        assert!(daemon.start().is_err());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let ticks = daemon.stop().await.unwrap();

        assert!(ticks >= 2, "only {} tick(s)", ticks);
        assert_eq!(count.load(Ordering::SeqCst) as u64, ticks);
        assert!(!running.load(Ordering::Relaxed));
        assert!(!daemon.is_running());
    }

    #[tokio::test]
    async fn test_running_flag_stops_the_loop() {
        let manager = manager(MockI2CDriver::new());
        let running = Arc::new(AtomicBool::new(false));
        let mut daemon = SensorDaemon::new(manager, running.clone());
        daemon.start().unwrap();

        running.store(false, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!daemon.is_running());
        assert!(daemon.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_faulted_devices_are_mirrored() {
        let driver = MockI2CDriver::new().with_chip(0x5F, Chip::Hts221);
        let control = driver.clone();
        let manager = manager(driver);
        let device = manager.register_device(Chip::Hts221, 0x5F, 1).unwrap();
        device
            .register_sensor(SensorKind::Humidity, "hum", Box::new(|_| {}))
            .unwrap();

        let state = create_shared_sensor_state();
        control.fail_reads_at(0x5F);
        let mut daemon = SensorDaemon::new(manager, Arc::new(AtomicBool::new(false)))
            .with_shared_state(state.clone());
        daemon.start().unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        daemon.stop().await.unwrap();

        let state = state.read().await;
        let status = state.device_status(0x5F).unwrap();
        assert_eq!(status.state, DeviceState::Faulted);
        let error = status.error.as_deref().unwrap();
        assert!(error.contains("simulated read failure"), "unexpected error {}", error);
    }

    #[tokio::test]
    async fn test_panicking_callback_does_not_stop_polling() {
        let manager = manager(
            MockI2CDriver::new()
                .with_chip(0x5F, Chip::Hts221)
                .with_chip(0x5C, Chip::Lps22hb),
        );
        let hts = manager.register_device(Chip::Hts221, 0x5F, 1).unwrap();
        hts.register_sensor(
            SensorKind::Temperature,
            "broken",
            Box::new(|_| panic!("consumer bug")),
        )
        .unwrap();
        let lps = manager.register_device(Chip::Lps22hb, 0x5C, 1).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let sink = count.clone();
        lps.register_sensor(
            SensorKind::Pressure,
            "baro",
            Box::new(move |_| {
                sink.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        let running = Arc::new(AtomicBool::new(false));
        let mut daemon = SensorDaemon::new(manager, running.clone());
        daemon.start().unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(daemon.is_running());
        assert!(running.load(Ordering::Relaxed));
        assert!(count.load(Ordering::SeqCst) >= 2);
        assert_eq!(hts.state(), DeviceState::Active);

        let ticks = daemon.stop().await.unwrap();
        assert!(ticks >= 2);
        assert!(!running.load(Ordering::Relaxed));
    }
}
