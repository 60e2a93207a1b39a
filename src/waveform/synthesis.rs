// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Sine synthesis
//!
//! The [`SynthesisEngine`] owns the [`WaveformBuffer`] and the noise source
//! behind a single mutex. Resizing and computing both take that mutex, so a
//! computation pass always iterates over exactly the length that was
//! allocated.
//!
//! Each sample is computed as
//!
//! ```text
//! sample[i] = gain * sin(phase + i * 2π / n) + bias + noise_gain * k / 100
//! ```
//!
//! where `k` is drawn uniformly from the integers in `[-100, 100]`.
//!
//! ## Examples
//!
//! ```
//! use rust_sinewave::waveform::parameters::ParameterSnapshot;
//! use rust_sinewave::waveform::synthesis::{NoiseSource, SynthesisEngine};
//!
//! let engine = SynthesisEngine::new(1024, NoiseSource::from_seed(7));
//! engine.resize(4).unwrap();
//!
//! let params = ParameterSnapshot {
//!     sample_count: 4,
//!     gain: 1.0,
//!     noise_gain: 0.0,
//!     ..Default::default()
//! };
//! let payload = engine.compute_samples(&params).unwrap();
//! assert_eq!(payload.len(), 4 * 8);
//! ```

use std::f64::consts::PI;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::WaveformError;
use crate::waveform::buffer::WaveformBuffer;
use crate::waveform::parameters::ParameterSnapshot;

/// Lowest integer drawn by the noise source
pub const NOISE_MIN: i32 = -100;
/// Highest integer drawn by the noise source
pub const NOISE_MAX: i32 = 100;
/// Divisor bringing noise integers into `[-1.0, 1.0]`
pub const NOISE_SCALE: f64 = 100.0;

/// Uniform integer noise in `[NOISE_MIN, NOISE_MAX]`
#[derive(Debug, Clone)]
pub struct NoiseSource {
    rng: StdRng,
}

impl NoiseSource {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed from the wall clock, in seconds since the Unix epoch
    pub fn from_system_time() -> Self {
        let seed = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        debug!("Seeding noise source with {}", seed);
        Self::from_seed(seed)
    }

    /// Next integer in `[NOISE_MIN, NOISE_MAX]`
    pub fn next_int(&mut self) -> i32 {
        self.rng.random_range(NOISE_MIN..=NOISE_MAX)
    }

    /// Next noise value in `[-1.0, 1.0]`, in steps of 0.01
    pub fn next_unit(&mut self) -> f64 {
        self.next_int() as f64 / NOISE_SCALE
    }
}

#[derive(Debug)]
struct EngineState {
    buffer: WaveformBuffer,
    noise: NoiseSource,
}

/// Produces one buffer of samples per call
#[derive(Debug)]
pub struct SynthesisEngine {
    state: Mutex<EngineState>,
}

impl SynthesisEngine {
    /// Create an engine with an unallocated buffer
    pub fn new(max_samples: usize, noise: NoiseSource) -> Self {
        Self {
            state: Mutex::new(EngineState {
                buffer: WaveformBuffer::new(max_samples),
                noise,
            }),
        }
    }

    // A panic while holding the lock cannot leave the buffer with a length
    // that disagrees with its contents, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resize the buffer under the synthesis lock
    pub fn resize(&self, count: usize) -> Result<(), WaveformError> {
        let mut state = self.lock();
        state.buffer.resize(count)?;
        debug!("Waveform buffer resized to {} samples", count);
        Ok(())
    }

    /// Run `f` on the buffer under the synthesis lock.
    ///
    /// Lets a caller resize and record the applied count as one step, so no
    /// other resize can land in between.
    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut WaveformBuffer) -> R) -> R {
        let mut state = self.lock();
        f(&mut state.buffer)
    }

    /// Fill the buffer and return a packed little-endian copy of it.
    ///
    /// Returns `None` without touching the noise source when no buffer is
    /// allocated.
    pub fn compute_samples(&self, params: &ParameterSnapshot) -> Option<Vec<u8>> {
        let mut guard = self.lock();
        let EngineState { buffer, noise } = &mut *guard;
        if buffer.is_empty() {
            return None;
        }

        let interval = (2.0 * PI) / buffer.len() as f64;
        for (i, sample) in buffer.as_mut_slice().iter_mut().enumerate() {
            *sample = params.gain * (params.phase + i as f64 * interval).sin()
                + params.bias
                + params.noise_gain * noise.next_unit();
        }

        Some(buffer.to_le_bytes())
    }

    /// Current number of samples
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    pub fn is_allocated(&self) -> bool {
        self.lock().buffer.is_allocated()
    }

    pub fn max_samples(&self) -> usize {
        self.lock().buffer.max_samples()
    }

    /// Copy of the current samples
    pub fn samples(&self) -> Vec<f64> {
        self.lock().buffer.as_slice().to_vec()
    }
}
