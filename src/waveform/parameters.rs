// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Waveform parameters shared between setter threads and the scheduler
//!
//! Every scalar is stored in its own atomic so a setter never waits for the
//! scheduler and never contends with a buffer resize. Changes are tracked in a
//! bitmask: setting a parameter raises its bit, draining swaps the whole mask
//! with zero, so each change is handed out exactly once.
//!
//! Each parameter's status word carries a generation counter next to the
//! status. A drained change remembers the word it saw and only completes if
//! no newer set has bumped it since.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::WaveformError;

/// Identifier of a waveform parameter.
///
/// The discriminant follows the declaration order of the unit's input
/// attributes and doubles as the bit position in the change mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterId {
    /// Number of points composing one period of the wave
    SampleCount = 0,
    /// Frequency of the wave, accepted but not used by the formula
    Frequency = 1,
    /// Constant offset added to every sample
    Bias = 2,
    /// Phase offset in radians
    Phase = 3,
    /// Amplitude of the sine
    Gain = 4,
    /// Amplitude of the uniform noise
    NoiseGain = 5,
}

impl ParameterId {
    /// All parameters, in mask order
    pub const ALL: [ParameterId; 6] = [
        ParameterId::SampleCount,
        ParameterId::Frequency,
        ParameterId::Bias,
        ParameterId::Phase,
        ParameterId::Gain,
        ParameterId::NoiseGain,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Attribute name exposed to external callers
    pub fn name(self) -> &'static str {
        match self {
            ParameterId::SampleCount => "points",
            ParameterId::Frequency => "frequency",
            ParameterId::Bias => "bias",
            ParameterId::Phase => "phase",
            ParameterId::Gain => "gain",
            ParameterId::NoiseGain => "gain_noise",
        }
    }
}

impl fmt::Display for ParameterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParameterId {
    type Err = WaveformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "points" | "sample_count" => Ok(ParameterId::SampleCount),
            "frequency" => Ok(ParameterId::Frequency),
            "bias" => Ok(ParameterId::Bias),
            "phase" => Ok(ParameterId::Phase),
            "gain" => Ok(ParameterId::Gain),
            "gain_noise" | "noise_gain" => Ok(ParameterId::NoiseGain),
            other => Err(WaveformError::UnknownParameter {
                name: other.to_string(),
            }),
        }
    }
}

/// Outcome of the last change applied to a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeStatus {
    /// Never changed since creation
    Idle,
    /// Changed, waiting for the next poll
    Pending,
    /// Applied successfully
    Completed,
    /// Application failed, the previous value stays in effect
    CompletedWithError,
}

impl ChangeStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ChangeStatus::Pending,
            2 => ChangeStatus::Completed,
            3 => ChangeStatus::CompletedWithError,
            _ => ChangeStatus::Idle,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            ChangeStatus::Idle => 0,
            ChangeStatus::Pending => 1,
            ChangeStatus::Completed => 2,
            ChangeStatus::CompletedWithError => 3,
        }
    }
}

const STATUS_BITS: u32 = 2;
const STATUS_MASK: u32 = (1 << STATUS_BITS) - 1;

fn status_word(generation: u32, status: ChangeStatus) -> u32 {
    (generation << STATUS_BITS) | status.as_u8() as u32
}

fn word_generation(word: u32) -> u32 {
    word >> STATUS_BITS
}

fn word_status(word: u32) -> ChangeStatus {
    ChangeStatus::from_u8((word & STATUS_MASK) as u8)
}

/// A change taken by [`ParameterSet::drain_changed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingChange {
    pub id: ParameterId,
    word: u32,
}

/// Values of every parameter read at one instant.
///
/// Fields are read one after the other; the snapshot carries no cross-field
/// consistency guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub sample_count: usize,
    pub frequency: f64,
    pub gain: f64,
    pub phase: f64,
    pub bias: f64,
    pub noise_gain: f64,
}

impl Default for ParameterSnapshot {
    fn default() -> Self {
        Self {
            sample_count: 30,
            frequency: 1.0,
            gain: 5.0,
            phase: 0.0,
            bias: 0.0,
            noise_gain: 0.5,
        }
    }
}

/// `f64` stored as raw bits in an `AtomicU64`
#[derive(Debug)]
struct AtomicF64(AtomicU64);

impl AtomicF64 {
    fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Release);
    }
}

/// Current parameter values plus the set of pending changes
#[derive(Debug)]
pub struct ParameterSet {
    sample_count: AtomicUsize,
    frequency: AtomicF64,
    bias: AtomicF64,
    phase: AtomicF64,
    gain: AtomicF64,
    noise_gain: AtomicF64,
    changed: AtomicU8,
    statuses: [AtomicU32; 6],
}

impl ParameterSet {
    pub fn new(initial: ParameterSnapshot) -> Self {
        Self {
            sample_count: AtomicUsize::new(initial.sample_count),
            frequency: AtomicF64::new(initial.frequency),
            bias: AtomicF64::new(initial.bias),
            phase: AtomicF64::new(initial.phase),
            gain: AtomicF64::new(initial.gain),
            noise_gain: AtomicF64::new(initial.noise_gain),
            changed: AtomicU8::new(0),
            statuses: Default::default(),
        }
    }

    fn scalar(&self, id: ParameterId) -> Option<&AtomicF64> {
        match id {
            ParameterId::SampleCount => None,
            ParameterId::Frequency => Some(&self.frequency),
            ParameterId::Bias => Some(&self.bias),
            ParameterId::Phase => Some(&self.phase),
            ParameterId::Gain => Some(&self.gain),
            ParameterId::NoiseGain => Some(&self.noise_gain),
        }
    }

    fn mark_changed(&self, id: ParameterId) {
        self.mark_pending(id);
        self.changed.fetch_or(id.bit(), Ordering::AcqRel);
    }

    // Bumping the generation makes any change drained before this set stale
    fn mark_pending(&self, id: ParameterId) {
        let _ = self.statuses[id.index()].fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |word| {
                Some(status_word(
                    word_generation(word).wrapping_add(1),
                    ChangeStatus::Pending,
                ))
            },
        );
    }

    /// Set a parameter by its external name.
    ///
    /// A value sent to `points` is truncated to an integer count.
    pub fn set_value(&self, name: &str, value: f64) -> Result<(), WaveformError> {
        let id: ParameterId = name.parse()?;
        self.set_scalar(id, value);
        Ok(())
    }

    /// Set a parameter and flag it as changed
    pub fn set_scalar(&self, id: ParameterId, value: f64) {
        match self.scalar(id) {
            Some(slot) => {
                debug!("Setting parameter {} = {}", id, value);
                slot.store(value);
                self.mark_changed(id);
            }
            // Saturating cast, NaN becomes 0
            None => self.set_sample_count(value as i64),
        }
    }

    /// Set the number of samples; negative counts are clamped to zero
    pub fn set_sample_count(&self, count: i64) {
        let clamped = clamp_sample_count(count);
        debug!("Setting parameter {} = {}", ParameterId::SampleCount, clamped);
        self.sample_count.store(clamped, Ordering::Release);
        self.mark_changed(ParameterId::SampleCount);
    }

    /// Overwrite the sample count without flagging a change.
    ///
    /// Used when the buffer has already been resized by the caller.
    pub(crate) fn store_sample_count(&self, count: usize) {
        self.sample_count.store(count, Ordering::Release);
    }

    /// Restore `applied` after a failed resize to `failed`.
    ///
    /// Returns `false` when a setter replaced the value in the meantime; the
    /// newer request then stays pending.
    pub fn revert_sample_count(&self, failed: usize, applied: usize) -> bool {
        self.sample_count
            .compare_exchange(failed, applied, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Take every parameter changed since the previous call.
    ///
    /// Each identifier appears once, in mask order.
    pub fn drain_changed(&self) -> Vec<PendingChange> {
        let mask = self.changed.swap(0, Ordering::AcqRel);
        ParameterId::ALL
            .into_iter()
            .filter(|id| mask & id.bit() != 0)
            .map(|id| PendingChange {
                id,
                word: self.statuses[id.index()].load(Ordering::Acquire),
            })
            .collect()
    }

    /// Whether changes are waiting for the next drain
    pub fn has_pending_changes(&self) -> bool {
        self.changed.load(Ordering::Acquire) != 0
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count.load(Ordering::Acquire)
    }

    /// Current value of a parameter as `f64`
    pub fn value(&self, id: ParameterId) -> f64 {
        match self.scalar(id) {
            Some(slot) => slot.load(),
            None => self.sample_count() as f64,
        }
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            sample_count: self.sample_count(),
            frequency: self.frequency.load(),
            gain: self.gain.load(),
            phase: self.phase.load(),
            bias: self.bias.load(),
            noise_gain: self.noise_gain.load(),
        }
    }

    pub fn status(&self, id: ParameterId) -> ChangeStatus {
        word_status(self.statuses[id.index()].load(Ordering::Acquire))
    }

    pub fn mark_completed(&self, change: PendingChange) -> bool {
        self.complete(change, ChangeStatus::Completed)
    }

    pub fn mark_completed_with_error(&self, change: PendingChange) -> bool {
        self.complete(change, ChangeStatus::CompletedWithError)
    }

    /// Record the outcome of a drained change.
    ///
    /// Returns `false`, leaving the status `Pending`, when the parameter was
    /// set again after the change was drained.
    fn complete(&self, change: PendingChange, status: ChangeStatus) -> bool {
        let done = status_word(word_generation(change.word), status);
        self.statuses[change.id.index()]
            .compare_exchange(change.word, done, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Record an outcome that no drained change stands for, such as the
    /// initial allocation or a re-initialisation.
    pub(crate) fn record_outcome(&self, id: ParameterId, status: ChangeStatus) {
        let _ = self.statuses[id.index()].fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |word| {
                (word_status(word) != ChangeStatus::Pending)
                    .then(|| status_word(word_generation(word), status))
            },
        );
    }
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self::new(ParameterSnapshot::default())
    }
}

/// Clamp a requested count to the unsigned range
pub fn clamp_sample_count(count: i64) -> usize {
    usize::try_from(count.max(0)).unwrap_or(usize::MAX)
}
