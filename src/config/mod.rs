// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the sensor daemon
//!
//! The configuration is backed by a YAML file and validated against a JSON
//! schema before deserialization, then checked against rules the schema cannot
//! express (chip capabilities, address sharing).
//!
//! ## Configuration Structure
//!
//! - `i2c`: bus driver selection and scheduler tick period
//! - `devices`: chips on the bus, each with its decimation and logical sensors
//!
//! ## Usage
//!
//! ```no_run
//! use rust_i2c_sensors::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Override the tick period and run on the simulated bus
//! config.apply_args(Some(50), true);
//!
//! println!("Scan interval: {} ms", config.i2c.scan_interval_ms);
//! ```

pub mod sensors;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use sensors::{
    DeviceConfig, I2CBusConfig, I2CBusType, I2CConfig, SensorConfig, SensorKindName,
};
pub use utils::{output_config_schema, validate_specific_rules};

use crate::sensors::chips::Chip;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Bus and scheduler settings
    #[serde(default)]
    pub i2c: I2CConfig,

    /// Devices attached to the bus
    ///
    /// Defaults to a Raspberry Pi Sense HAT (HTS221 and LPS22HB).
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            i2c: I2CConfig::default(),
            devices: default_devices(),
        }
    }
}

fn default_devices() -> Vec<DeviceConfig> {
    let mut hts221 = DeviceConfig::new(Chip::Hts221);
    hts221.sensors = vec![
        SensorConfig::new(SensorKindName::Temperature, "Temperature"),
        SensorConfig::new(SensorKindName::Humidity, "Humidity"),
    ];
    let mut lps22hb = DeviceConfig::new(Chip::Lps22hb);
    lps22hb.sensors = vec![SensorConfig::new(SensorKindName::Pressure, "Pressure")];
    vec![hts221, lps22hb]
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Config path: {:?}, sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default configuration. An invalid
    /// file leaves a `<name>.sample.yaml` next to it and returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // YAML to a generic value, then to JSON for schema validation
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;
        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values
    ///
    /// # Parameters
    ///
    /// * `scan_interval_ms` - Optional scheduler tick period
    /// * `mock_bus` - If true, run on the simulated bus instead of hardware
    pub fn apply_args(&mut self, scan_interval_ms: Option<u64>, mock_bus: bool) {
        if let Some(interval) = scan_interval_ms {
            debug!("Overriding scan interval from command line: {} ms", interval);
            self.i2c.scan_interval_ms = interval;
        }

        if mock_bus {
            debug!("Using the simulated I2C bus");
            self.i2c.bus.bus_type = I2CBusType::Mock;
        }
    }
}
