// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::{Config, CONFIG_SCHEMA};

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_sinewave --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Sample count**: the initial count must fit below `max_sample_count`
/// - **Tick interval**: must be greater than zero
/// - **Thresholds**: the parameter poll threshold must be below the lifecycle threshold
/// - **Stream**: the broadcast buffer must hold at least one record
/// - **Values**: waveform scalars must be finite numbers
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    let waveform = &config.waveform;
    if waveform.sample_count > waveform.max_sample_count {
        anyhow::bail!(
            "Initial sample count {} exceeds max_sample_count {}",
            waveform.sample_count,
            waveform.max_sample_count
        );
    }

    for (name, value) in [
        ("gain", waveform.gain),
        ("phase", waveform.phase),
        ("bias", waveform.bias),
        ("noise_gain", waveform.noise_gain),
        ("frequency", waveform.frequency),
    ] {
        if !value.is_finite() {
            anyhow::bail!("Waveform {} must be a finite number, got {}", name, value);
        }
    }

    let scheduler = &config.scheduler;
    if scheduler.tick_interval_us == 0 {
        anyhow::bail!("Scheduler tick_interval_us must be greater than zero");
    }

    if scheduler.parameter_poll_ms >= scheduler.lifecycle_threshold_ms {
        anyhow::bail!(
            "parameter_poll_ms ({}) must be lower than lifecycle_threshold_ms ({})",
            scheduler.parameter_poll_ms,
            scheduler.lifecycle_threshold_ms
        );
    }

    if scheduler.stream_buffer_size == 0 {
        anyhow::bail!("Scheduler stream_buffer_size must be greater than zero");
    }

    // A tick slower than the poll threshold still works, changes are then
    // applied on every tick
    if scheduler.tick_interval_us / 1_000 > scheduler.parameter_poll_ms {
        warn!(
            "Tick interval of {} us is longer than the parameter poll threshold of {} ms",
            scheduler.tick_interval_us, scheduler.parameter_poll_ms
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn test_sample_count_over_limit() {
        let mut config = Config::default();
        config.waveform.max_sample_count = 10;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_poll_threshold_must_be_finer() {
        let mut config = Config::default();
        config.scheduler.parameter_poll_ms = config.scheduler.lifecycle_threshold_ms;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_zero_tick_interval() {
        let mut config = Config::default();
        config.scheduler.tick_interval_us = 0;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_non_finite_gain() {
        let mut config = Config::default();
        config.waveform.gain = f64::NAN;
        assert!(validate_specific_rules(&config).is_err());
    }
}
