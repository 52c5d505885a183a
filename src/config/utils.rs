// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-i2c-sensors project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! Schema output and the validation rules the JSON schema cannot express.

use anyhow::{Context, Result};
use log::debug;
use std::collections::HashMap;

use super::Config;
use crate::sensors::chips::{mcp23017, Chip};

/// Lowest and highest non-reserved 7-bit I2C addresses
const FIRST_ADDRESS: u8 = 0x03;
const LAST_ADDRESS: u8 = 0x77;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_i2c_sensors --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Scheduler**: the scan interval and every decimation period are non-zero
/// - **Addresses**: every device address is a non-reserved 7-bit address, and
///   devices sharing an address use the same chip
/// - **Sensors**: every sensor kind is provided by its chip, and `pin_state`
///   sensors name an expander pin
/// - **Chip options**: pin setups only on MCP23017 with valid pin numbers,
///   UV coefficients only on VEML6075 with a positive integration divisor
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.i2c.scan_interval_ms == 0 {
        anyhow::bail!("Scan interval must be at least 1 ms");
    }

    let mut chips_by_address: HashMap<u8, Chip> = HashMap::new();

    for device in &config.devices {
        let address = device.address();
        if !(FIRST_ADDRESS..=LAST_ADDRESS).contains(&address) {
            anyhow::bail!(
                "Invalid I2C address 0x{:02X} for {}: expected 0x{:02X}..=0x{:02X}",
                address,
                device.chip,
                FIRST_ADDRESS,
                LAST_ADDRESS
            );
        }

        if let Some(existing) = chips_by_address.insert(address, device.chip) {
            if existing != device.chip {
                anyhow::bail!(
                    "Address 0x{:02X} is configured both as {} and {}",
                    address,
                    existing,
                    device.chip
                );
            }
        }

        if device.decimation == 0 {
            anyhow::bail!(
                "Decimation of {} @ 0x{:02X} must be at least 1",
                device.chip,
                address
            );
        }

        for sensor in &device.sensors {
            let kind = sensor.kind().with_context(|| {
                format!("Sensor '{}' reads a pin state without naming a pin", sensor.name)
            })?;
            if !device.chip.supports(kind) {
                anyhow::bail!(
                    "Sensor '{}': {} @ 0x{:02X} does not provide {}",
                    sensor.name,
                    device.chip,
                    address,
                    kind
                );
            }
        }

        if !device.pins.is_empty() && device.chip != Chip::Mcp23017 {
            anyhow::bail!("Pin setups are only valid for mcp23017, not {}", device.chip);
        }
        if let Some(setup) = device
            .pins
            .iter()
            .find(|setup| setup.pin >= mcp23017::PIN_COUNT)
        {
            anyhow::bail!(
                "Invalid pin {} for {} @ 0x{:02X}: expected 0..{}",
                setup.pin,
                device.chip,
                address,
                mcp23017::PIN_COUNT
            );
        }

        if let Some(coefficients) = &device.uv_coefficients {
            if device.chip != Chip::Veml6075 {
                anyhow::bail!("UV coefficients are only valid for veml6075, not {}", device.chip);
            }
            if coefficients.integration <= 0.0 {
                anyhow::bail!("UV integration divisor must be positive");
            }
        }
    }

    Ok(())
}
