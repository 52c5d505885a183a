// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_i2c_sensors::config::{Config, I2CBusType, SensorKindName};
use rust_i2c_sensors::sensors::chips::{Chip, PinMode};
use rust_i2c_sensors::sensors::SensorKind;
use std::fs;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .init();
    });
}

#[test]
fn test_missing_file_is_created_with_defaults() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let config = Config::from_file(&config_path)?;
    assert!(config_path.exists(), "Default config file was not written");
    assert_eq!(config, Config::default());

    // The written file loads back to the same configuration
    let reloaded = Config::from_file(&config_path)?;
    assert_eq!(reloaded, config);
    Ok(())
}

#[test]
fn test_full_configuration_is_loaded() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        &config_path,
        r#"
i2c:
  bus:
    type: mock
  scan_interval_ms: 50
devices:
  - chip: hts221
    decimation: 20
    sensors:
      - kind: temperature
        name: Indoor temperature
  - chip: veml6075
    address: 16
    sensors:
      - kind: uv_index
        name: UV index
      - kind: uv_intensity
        name: UV intensity
    uv_coefficients:
      integration: 4.0
  - chip: mcp23017
    address: 33
    decimation: 1
    pins:
      - pin: 3
        pull_up: true
        invert_logic: true
      - pin: 8
        mode: output
    sensors:
      - kind: pin_state
        pin: 3
        name: Door
"#,
    )?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.i2c.bus.bus_type, I2CBusType::Mock);
    assert_eq!(config.i2c.bus.device, "/dev/i2c-1");
    assert_eq!(config.i2c.scan_interval_ms, 50);
    assert_eq!(config.devices.len(), 3);

    let hts = &config.devices[0];
    assert_eq!((hts.chip, hts.address(), hts.decimation), (Chip::Hts221, 0x5F, 20));

    let uv = &config.devices[1];
    assert_eq!(uv.decimation, 100);
    assert_eq!(uv.sensors[1].kind, SensorKindName::UvIntensity);
    let coefficients = uv.chip_settings().uv_coefficients;
    assert_eq!(coefficients.integration, 4.0);
    assert_eq!(coefficients.uva_visible, 2.22);

    let gpio = &config.devices[2];
    assert_eq!(gpio.address(), 0x21);
    assert_eq!(gpio.sensors[0].kind(), Some(SensorKind::PinState(3)));
    assert_eq!(gpio.pins[0].mode, PinMode::Input);
    assert!(gpio.pins[0].invert_logic);
    assert_eq!(gpio.pins[1].mode, PinMode::Output);
    Ok(())
}

#[test]
fn test_schema_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(
        &config_path,
        r#"
devices:
  - chip: bme280
    sensors:
      - kind: temperature
        name: t
"#,
    )?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err(), "Unknown chip should be rejected");

    let sample_path = config_path.with_extension("sample.yaml");
    assert!(sample_path.exists(), "Sample config file was not created");
    let sample = Config::from_file(&sample_path)?;
    assert_eq!(sample, Config::default());
    Ok(())
}

#[test]
fn test_out_of_range_values_fail_schema_validation() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;

    for (name, yaml) in [
        ("interval", "i2c:\n  scan_interval_ms: 0\n"),
        ("address", "devices:\n  - chip: hts221\n    address: 128\n"),
        ("decimation", "devices:\n  - chip: hts221\n    decimation: 0\n"),
        ("bus", "i2c:\n  bus:\n    type: spi\n"),
        ("unknown", "mqtt:\n  enabled: true\n"),
    ] {
        let config_path = temp_dir.path().join(format!("{}.yaml", name));
        fs::write(&config_path, yaml)?;
        assert!(
            Config::from_file(&config_path).is_err(),
            "{} should have been rejected",
            name
        );
    }
    Ok(())
}

#[test]
fn test_specific_rule_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Schema-valid, but the LPS22HB has no humidity channel
    fs::write(
        &config_path,
        r#"
devices:
  - chip: lps22hb
    sensors:
      - kind: humidity
        name: Humidity
"#,
    )?;

    let err = Config::from_file(&config_path).unwrap_err();
    assert!(err.to_string().contains("does not provide humidity"));
    assert!(config_path.with_extension("sample.yaml").exists());
    Ok(())
}

#[test]
fn test_save_and_reload() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("saved.yaml");

    let mut config = Config::default();
    config.apply_args(Some(250), true);
    config.devices[1].decimation = 7;
    config.save_to_file(&config_path)?;

    let reloaded = Config::from_file(&config_path)?;
    assert_eq!(reloaded.i2c.scan_interval_ms, 250);
    assert_eq!(reloaded.i2c.bus.bus_type, I2CBusType::Mock);
    assert_eq!(reloaded.devices[1].decimation, 7);
    Ok(())
}

#[test]
fn test_embedded_schema_is_valid_json() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(include_str!("../resources/config.schema.json"))?;
    assert_eq!(
        schema["$schema"],
        "https://json-schema.org/draft/2020-12/schema"
    );
    assert!(rust_i2c_sensors::config::output_config_schema().is_ok());
    Ok(())
}
