// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Per-tick orchestration of the waveform unit
//!
//! [`TickCoordinator::on_tick`] is called by the scheduler once per period.
//! Every other public method may be called from any thread at any time.
//!
//! Once the running state reaches `End` the tick is suspended: no poll, no
//! sequence number, no publication, until [`TickCoordinator::reinitialize`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::WaveformError;
use crate::waveform::buffer::DEFAULT_MAX_SAMPLE_COUNT;
use crate::waveform::lifecycle::{
    LifecycleState, LifecycleStateMachine, Transition, DEFAULT_LIFECYCLE_THRESHOLD_MS,
};
use crate::waveform::parameters::{
    clamp_sample_count, ChangeStatus, ParameterId, ParameterSet, ParameterSnapshot,
};
use crate::waveform::synthesis::{NoiseSource, SynthesisEngine};
use crate::waveform::{Clock, OutputSink};

/// Default interval between two polls of the changed parameters
pub const DEFAULT_PARAMETER_POLL_MS: u64 = 100;

/// Construction settings of a [`TickCoordinator`]
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    /// Parameter values at start
    pub initial: ParameterSnapshot,
    /// Largest sample count the buffer accepts
    pub max_sample_count: usize,
    /// Coarse threshold of the running-state machine
    pub lifecycle_threshold_ms: u64,
    /// Fine threshold between two parameter polls
    pub parameter_poll_ms: u64,
    /// Fixed noise seed; the wall clock is used when absent
    pub seed: Option<u64>,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            initial: ParameterSnapshot::default(),
            max_sample_count: DEFAULT_MAX_SAMPLE_COUNT,
            lifecycle_threshold_ms: DEFAULT_LIFECYCLE_THRESHOLD_MS,
            parameter_poll_ms: DEFAULT_PARAMETER_POLL_MS,
            seed: None,
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Sequence number consumed by this tick
    pub sequence: u64,
    /// Number of samples published, `None` when nothing was published
    pub published_samples: Option<usize>,
    /// Changes applied successfully during this tick
    pub applied: Vec<ParameterId>,
    /// Changes that could not be applied
    pub failed: Vec<ParameterId>,
    /// Running-state change, if any
    pub transition: Option<Transition>,
    /// The unit was in `End`, nothing ran
    pub suspended: bool,
}

impl TickOutcome {
    pub fn published(&self) -> bool {
        self.published_samples.is_some()
    }
}

/// Counters reported by [`TickCoordinator::statistics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickStatistics {
    pub ticks: u64,
    pub published: u64,
    pub empty_ticks: u64,
    pub changes_applied: u64,
    pub resize_failures: u64,
    pub suspended_ticks: u64,
    pub last_sequence: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    published: AtomicU64,
    empty_ticks: AtomicU64,
    changes_applied: AtomicU64,
    resize_failures: AtomicU64,
    suspended_ticks: AtomicU64,
}

#[derive(Debug)]
struct TickState {
    lifecycle: LifecycleStateMachine,
    last_poll: u64,
}

/// The waveform unit: parameters, engine, running state and publication
pub struct TickCoordinator {
    parameters: ParameterSet,
    engine: SynthesisEngine,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn OutputSink>,
    tick_state: Mutex<TickState>,
    parameter_poll_ms: u64,
    quit: AtomicBool,
    sequence: AtomicU64,
    counters: Counters,
}

impl TickCoordinator {
    /// Create the unit and allocate the initial buffer.
    ///
    /// When the initial allocation fails the unit starts unallocated, with
    /// the sample count marked `CompletedWithError`.
    pub fn new(
        settings: CoordinatorSettings,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn OutputSink>,
    ) -> Self {
        let noise = match settings.seed {
            Some(seed) => NoiseSource::from_seed(seed),
            None => NoiseSource::from_system_time(),
        };
        let engine = SynthesisEngine::new(settings.max_sample_count, noise);
        let parameters = ParameterSet::new(settings.initial);
        let counters = Counters::default();

        if let Err(e) = engine.resize(settings.initial.sample_count) {
            warn!("{}", e);
            parameters.store_sample_count(engine.len());
            parameters
                .record_outcome(ParameterId::SampleCount, ChangeStatus::CompletedWithError);
            counters.resize_failures.fetch_add(1, Ordering::Relaxed);
        }

        let now = clock.now_ms();
        info!(
            "Waveform unit initialised with {} points (gain={}, phase={}, bias={}, noise gain={})",
            engine.len(),
            settings.initial.gain,
            settings.initial.phase,
            settings.initial.bias,
            settings.initial.noise_gain
        );

        Self {
            parameters,
            engine,
            clock,
            sink,
            tick_state: Mutex::new(TickState {
                lifecycle: LifecycleStateMachine::new(settings.lifecycle_threshold_ms, now),
                last_poll: now,
            }),
            parameter_poll_ms: settings.parameter_poll_ms,
            quit: AtomicBool::new(false),
            sequence: AtomicU64::new(0),
            counters,
        }
    }

    fn lock_tick_state(&self) -> MutexGuard<'_, TickState> {
        self.tick_state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one scheduling period
    pub fn on_tick(&self) -> TickOutcome {
        let now = self.clock.now_ms();
        let quit = self.quit.load(Ordering::Acquire);

        let mut applied = Vec::new();
        let mut failed = Vec::new();
        let transition = {
            let mut state = self.lock_tick_state();
            if state.lifecycle.state().is_terminal() {
                None
            } else {
                // A tick that moves to End still completes its pass
                let transition = state.lifecycle.tick(now, quit);
                if now.saturating_sub(state.last_poll) > self.parameter_poll_ms {
                    state.last_poll = now;
                    self.apply_changes(&mut applied, &mut failed);
                }
                Some(transition)
            }
        };

        let Some(transition) = transition else {
            self.counters.suspended_ticks.fetch_add(1, Ordering::Relaxed);
            return TickOutcome {
                sequence: self.sequence(),
                published_samples: None,
                applied,
                failed,
                transition: None,
                suspended: true,
            };
        };
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);

        let sequence = self.sequence.fetch_add(1, Ordering::AcqRel) + 1;
        let params = self.parameters.snapshot();
        let published_samples = match self.engine.compute_samples(&params) {
            Some(payload) => {
                self.sink.push(&payload, sequence);
                self.counters.published.fetch_add(1, Ordering::Relaxed);
                Some(payload.len() / std::mem::size_of::<f64>())
            }
            None => {
                self.counters.empty_ticks.fetch_add(1, Ordering::Relaxed);
                None
            }
        };

        TickOutcome {
            sequence,
            published_samples,
            applied,
            failed,
            transition,
            suspended: false,
        }
    }

    fn apply_changes(&self, applied: &mut Vec<ParameterId>, failed: &mut Vec<ParameterId>) {
        let changed = self.parameters.drain_changed();
        if changed.is_empty() {
            return;
        }
        debug!("We have {} changed parameters", changed.len());

        for change in changed {
            if change.id != ParameterId::SampleCount {
                self.parameters.mark_completed(change);
                applied.push(change.id);
                continue;
            }

            match self.apply_sample_count() {
                Ok(_) => {
                    self.parameters.mark_completed(change);
                    applied.push(change.id);
                }
                Err(e) => {
                    warn!("{}", e);
                    self.parameters.mark_completed_with_error(change);
                    self.counters.resize_failures.fetch_add(1, Ordering::Relaxed);
                    failed.push(change.id);
                }
            }
        }

        self.counters
            .changes_applied
            .fetch_add(applied.len() as u64, Ordering::Relaxed);
    }

    // Read, resize and revert all happen under the synthesis lock, so a
    // concurrent `resize_now` cannot leave the stored count behind the buffer.
    fn apply_sample_count(&self) -> Result<usize, WaveformError> {
        self.engine.with_buffer(|buffer| {
            let requested = self.parameters.sample_count();
            match buffer.resize(requested) {
                Ok(()) => {
                    debug!("Waveform buffer resized to {} samples", requested);
                    Ok(requested)
                }
                Err(e) => {
                    self.parameters.revert_sample_count(requested, buffer.len());
                    Err(e)
                }
            }
        })
    }

    /// Set a scalar parameter, applied at the next poll
    pub fn set_scalar_parameter(&self, id: ParameterId, value: f64) {
        self.parameters.set_scalar(id, value);
    }

    /// Set a parameter by its external name
    pub fn set_parameter(&self, name: &str, value: f64) -> Result<(), WaveformError> {
        self.parameters.set_value(name, value)
    }

    /// Request a new sample count, applied at the next poll
    pub fn set_sample_count(&self, count: i64) {
        self.parameters.set_sample_count(count);
    }

    /// Resize the buffer immediately from the calling thread.
    ///
    /// Waits for an in-flight computation to finish. On failure the buffer and
    /// the stored sample count are unchanged.
    pub fn resize_now(&self, count: i64) -> Result<(), WaveformError> {
        let count = clamp_sample_count(count);
        self.engine
            .with_buffer(|buffer| -> Result<(), WaveformError> {
                buffer.resize(count)?;
                self.parameters.store_sample_count(count);
                Ok(())
            })?;
        debug!("Waveform buffer resized to {} samples", count);
        Ok(())
    }

    /// Ask the running state to move to `End` at the next tick
    pub fn request_quit(&self) {
        info!("Quit requested");
        self.quit.store(true, Ordering::Release);
    }

    pub fn is_quit_requested(&self) -> bool {
        self.quit.load(Ordering::Acquire)
    }

    /// Restart the unit: clear quit, running state back to `Exec` and the
    /// current sample count re-applied to the buffer.
    pub fn reinitialize(&self) -> Result<(), WaveformError> {
        let now = self.clock.now_ms();
        self.quit.store(false, Ordering::Release);
        {
            let mut state = self.lock_tick_state();
            state.lifecycle.reset(now);
            state.last_poll = now;
        }

        // The count may have been set before the unit was (re)started, so it is
        // applied whether or not it is flagged as changed.
        match self.apply_sample_count() {
            Ok(count) => {
                info!("Waveform unit re-initialised with {} points", count);
                Ok(())
            }
            Err(e) => {
                warn!("{}", e);
                self.parameters
                    .record_outcome(ParameterId::SampleCount, ChangeStatus::CompletedWithError);
                self.counters.resize_failures.fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Zero the tick counters; the sequence number keeps running
    pub fn reset_statistics(&self) {
        info!("Resetting waveform unit statistics");
        self.counters.ticks.store(0, Ordering::Relaxed);
        self.counters.published.store(0, Ordering::Relaxed);
        self.counters.empty_ticks.store(0, Ordering::Relaxed);
        self.counters.changes_applied.store(0, Ordering::Relaxed);
        self.counters.resize_failures.store(0, Ordering::Relaxed);
        self.counters.suspended_ticks.store(0, Ordering::Relaxed);
    }

    /// Park the calling thread for `micros` microseconds.
    ///
    /// Must not be called from the scheduler thread.
    pub fn test_delay(&self, micros: u64) {
        info!("Test delay: parking thread for {} usec", micros);
        std::thread::sleep(Duration::from_micros(micros));
    }

    pub fn statistics(&self) -> TickStatistics {
        TickStatistics {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            empty_ticks: self.counters.empty_ticks.load(Ordering::Relaxed),
            changes_applied: self.counters.changes_applied.load(Ordering::Relaxed),
            resize_failures: self.counters.resize_failures.load(Ordering::Relaxed),
            suspended_ticks: self.counters.suspended_ticks.load(Ordering::Relaxed),
            last_sequence: self.sequence(),
        }
    }

    /// Last sequence number handed out
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.lock_tick_state().lifecycle.state()
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    pub fn engine(&self) -> &SynthesisEngine {
        &self.engine
    }
}
