// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Waveform configuration
//!
//! This module defines the initial parameter values of the sine waveform unit
//! and the limits applied to its sample buffer.

use serde::{Deserialize, Serialize};

use crate::waveform::buffer::DEFAULT_MAX_SAMPLE_COUNT;
use crate::waveform::parameters::ParameterSnapshot;

/// Initial values of the waveform parameters.
///
/// All values may later be changed at run time through the unit's setters;
/// this section only decides how the unit starts.
///
/// # Example
///
/// ```
/// use rust_sinewave::config::WaveformConfig;
///
/// let waveform = WaveformConfig {
///     sample_count: 64,
///     noise_gain: 0.0,
///     ..Default::default()
/// };
/// assert_eq!(waveform.initial_parameters().sample_count, 64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaveformConfig {
    /// Number of points composing one period of the wave.
    ///
    /// Zero leaves the buffer unallocated; nothing is published until a
    /// non-zero count is set.
    pub sample_count: usize,

    /// Amplitude of the sine.
    pub gain: f64,

    /// Phase offset in radians.
    pub phase: f64,

    /// Constant offset added to every sample.
    pub bias: f64,

    /// Amplitude of the uniform noise added to every sample.
    pub noise_gain: f64,

    /// Frequency of the wave in Hz.
    ///
    /// Kept for compatibility with the hosting framework; the synthesis
    /// formula does not use it.
    pub frequency: f64,

    /// Largest sample count the buffer may be resized to.
    ///
    /// Requests above this limit fail like an allocation failure and leave
    /// the previous buffer in place.
    pub max_sample_count: usize,

    /// Fixed seed for the noise generator; seeded from the clock when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        let initial = ParameterSnapshot::default();
        Self {
            sample_count: initial.sample_count,
            gain: initial.gain,
            phase: initial.phase,
            bias: initial.bias,
            noise_gain: initial.noise_gain,
            frequency: initial.frequency,
            max_sample_count: DEFAULT_MAX_SAMPLE_COUNT,
            seed: None,
        }
    }
}

impl WaveformConfig {
    /// Parameter values the unit starts with
    pub fn initial_parameters(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            sample_count: self.sample_count,
            frequency: self.frequency,
            gain: self.gain,
            phase: self.phase,
            bias: self.bias,
            noise_gain: self.noise_gain,
        }
    }
}
