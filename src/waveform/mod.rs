// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Waveform Module
//!
//! Core of the sine waveform unit: parameters updated from any thread, a
//! sample buffer resized under the synthesis lock, the running-state machine
//! and the per-tick coordinator tying them together.
//!
//! ## Components
//!
//! * **Parameters**: atomic parameter values and change tracking
//! * **Buffer**: the resizable sample buffer
//! * **Synthesis**: sine plus uniform noise computation
//! * **Lifecycle**: Exec/Stack/Kill/End running state
//! * **Coordinator**: per-tick orchestration and exposed operations
//! * **Stream**: broadcast sink for published sample records
//!
//! The coordinator talks to the outside world through two traits, [`Clock`]
//! and [`OutputSink`].

pub mod buffer;
pub mod coordinator;
pub mod lifecycle;
pub mod parameters;
pub mod stream;
pub mod synthesis;

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use log::debug;

pub use buffer::WaveformBuffer;
pub use coordinator::{TickCoordinator, TickOutcome, TickStatistics};
pub use lifecycle::{LifecycleState, LifecycleStateMachine};
pub use parameters::{
    ChangeStatus, ParameterId, ParameterSet, ParameterSnapshot, PendingChange,
};
pub use stream::{SampleRecord, SharedSampleStream};
pub use synthesis::{NoiseSource, SynthesisEngine};

/// Monotonic time source, in milliseconds
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Receiver of computed sample buffers
pub trait OutputSink: Send + Sync {
    /// Publish a packed little-endian `f64` buffer with its sequence number
    fn push(&self, payload: &[u8], sequence: u64);
}

/// Milliseconds elapsed since the clock was created
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Clock moved by hand, for simulations and tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Sink that only logs what it receives
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl OutputSink for LogSink {
    fn push(&self, payload: &[u8], sequence: u64) {
        debug!(
            "Sample buffer #{}: {} samples",
            sequence,
            payload.len() / std::mem::size_of::<f64>()
        );
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

impl<S: OutputSink + ?Sized> OutputSink for std::sync::Arc<S> {
    fn push(&self, payload: &[u8], sequence: u64) {
        (**self).push(payload, sequence)
    }
}
