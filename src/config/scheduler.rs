// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Scheduler configuration
//!
//! This module defines the timing of the periodic tick and of the two
//! thresholds evaluated inside it.

use serde::{Deserialize, Serialize};

use crate::waveform::coordinator::DEFAULT_PARAMETER_POLL_MS;
use crate::waveform::lifecycle::DEFAULT_LIFECYCLE_THRESHOLD_MS;

/// Configuration of the periodic scheduler driving the waveform unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Flag to enable or disable the tick task.
    ///
    /// When disabled the daemon only runs its heartbeat and the unit can be
    /// driven by hand.
    pub enabled: bool,

    /// Period of the tick in microseconds. Must be greater than zero.
    pub tick_interval_us: u64,

    /// Coarse threshold in milliseconds between two running-state steps.
    pub lifecycle_threshold_ms: u64,

    /// Threshold in milliseconds between two polls of the changed parameters.
    ///
    /// Must stay below `lifecycle_threshold_ms`.
    pub parameter_poll_ms: u64,

    /// Interval in seconds between two heartbeat log lines.
    pub heartbeat_interval_secs: u64,

    /// Capacity of the broadcast channel carrying published sample records.
    pub stream_buffer_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tick_interval_us: 1_000,
            lifecycle_threshold_ms: DEFAULT_LIFECYCLE_THRESHOLD_MS,
            parameter_poll_ms: DEFAULT_PARAMETER_POLL_MS,
            heartbeat_interval_secs: 60,
            stream_buffer_size: 64,
        }
    }
}
