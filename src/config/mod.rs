// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the sine waveform unit
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema embedded in the binary.
//!
//! ## Configuration Structure
//!
//! - `waveform`: initial parameter values and buffer limits
//! - `scheduler`: tick period, thresholds and stream settings
//!
//! ## Usage
//!
//! ```no_run
//! use rust_sinewave::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(64),    // Sample count
//!     Some(1.0),   // Gain
//!     None,        // Phase
//!     None,        // Bias
//!     Some(0.0),   // Noise gain
//!     None,        // Frequency
//!     Some(500),   // Tick interval (µs)
//! );
//!
//! println!("Points: {}", config.waveform.sample_count);
//! ```

pub mod scheduler;
pub mod utils;
pub mod waveform;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use scheduler::SchedulerConfig;
pub use utils::{output_config_schema, validate_specific_rules};
pub use waveform::WaveformConfig;

use crate::waveform::coordinator::CoordinatorSettings;

/// Embedded JSON schema describing a valid configuration file
pub const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Root configuration structure of the waveform unit.
///
/// # Default Values
///
/// Each section uses default values when not explicitly specified in the
/// configuration file, allowing for a minimal (even empty) file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Initial waveform parameters and buffer limits.
    #[serde(default)]
    pub waveform: WaveformConfig,

    /// Timing of the periodic tick.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        // Create parent directories if they don't exist
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

        let config = match Self::from_yaml_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration error in {}: {:#}", path.display(), err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(err.context(format!(
                    "Invalid configuration file {}",
                    path.display()
                )));
            }
        };

        Ok(config)
    }

    /// Parse and validate a YAML document.
    ///
    /// The document is checked against the embedded schema, deserialized,
    /// then checked against the rules the schema cannot express.
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = if contents.trim().is_empty() {
            serde_yml::Value::Null
        } else {
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?
        };

        // An empty document means "all defaults"
        let json_value = match serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?
        {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            value => value,
        };

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating configuration against schema");
        if let Err(error) = validator.validate(&json_value) {
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = serde_json::from_value(json_value)
            .context("Failed to deserialize configuration")?;

        validate_specific_rules(&config)?;
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

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided override the existing
    /// configuration.
    ///
    /// # Parameters
    ///
    /// * `sample_count` - Number of points of the wave
    /// * `gain` - Amplitude of the sine
    /// * `phase` - Phase offset in radians
    /// * `bias` - Constant offset
    /// * `noise_gain` - Amplitude of the noise
    /// * `frequency` - Frequency of the wave
    /// * `tick_interval_us` - Period of the scheduler tick in microseconds
    pub fn apply_args(
        &mut self,
        sample_count: Option<usize>,
        gain: Option<f64>,
        phase: Option<f64>,
        bias: Option<f64>,
        noise_gain: Option<f64>,
        frequency: Option<f64>,
        tick_interval_us: Option<u64>,
    ) {
        if let Some(count) = sample_count {
            debug!("Overriding sample count from command line: {}", count);
            self.waveform.sample_count = count;
        }
        if let Some(gain) = gain {
            debug!("Overriding gain from command line: {}", gain);
            self.waveform.gain = gain;
        }
        if let Some(phase) = phase {
            debug!("Overriding phase from command line: {}", phase);
            self.waveform.phase = phase;
        }
        if let Some(bias) = bias {
            debug!("Overriding bias from command line: {}", bias);
            self.waveform.bias = bias;
        }
        if let Some(noise_gain) = noise_gain {
            debug!("Overriding noise gain from command line: {}", noise_gain);
            self.waveform.noise_gain = noise_gain;
        }
        if let Some(frequency) = frequency {
            debug!("Overriding frequency from command line: {}", frequency);
            self.waveform.frequency = frequency;
        }
        if let Some(interval) = tick_interval_us {
            debug!("Overriding tick interval from command line: {} us", interval);
            self.scheduler.tick_interval_us = interval;
        }
    }

    /// Settings used to build the tick coordinator
    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            initial: self.waveform.initial_parameters(),
            max_sample_count: self.waveform.max_sample_count,
            lifecycle_threshold_ms: self.scheduler.lifecycle_threshold_ms,
            parameter_poll_ms: self.scheduler.parameter_poll_ms,
            seed: self.waveform.seed,
        }
    }
}
