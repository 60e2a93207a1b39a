// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Resizable sample buffer
//!
//! The buffer owns no lock of its own: it lives inside the synthesis engine's
//! mutex so a resize can never interleave with a computation pass.

use crate::error::WaveformError;

/// Largest buffer accepted by default (128 MiB of samples)
pub const DEFAULT_MAX_SAMPLE_COUNT: usize = 1 << 24;

/// Sequence of `f64` samples whose length is the applied sample count
#[derive(Debug, Clone)]
pub struct WaveformBuffer {
    samples: Vec<f64>,
    max_samples: usize,
}

impl WaveformBuffer {
    /// Create an unallocated buffer accepting at most `max_samples` samples
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Vec::new(),
            max_samples,
        }
    }

    /// Resize to `count` samples, all set to zero.
    ///
    /// A count of zero releases the allocation. When the new allocation cannot
    /// be obtained the current samples are left untouched.
    pub fn resize(&mut self, count: usize) -> Result<(), WaveformError> {
        if count == 0 {
            self.samples = Vec::new();
            return Ok(());
        }

        if count > self.max_samples {
            return Err(self.resize_error(
                count,
                format!("exceeds the limit of {} samples", self.max_samples),
            ));
        }

        let additional = count.saturating_sub(self.samples.len());
        self.samples
            .try_reserve_exact(additional)
            .map_err(|e| self.resize_error(count, e.to_string()))?;

        self.samples.clear();
        self.samples.resize(count, 0.0);
        self.samples.shrink_to(count);
        Ok(())
    }

    fn resize_error(&self, requested: usize, reason: String) -> WaveformError {
        WaveformError::BufferResizeFailed {
            requested,
            current: self.samples.len(),
            reason,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether heap storage currently backs the buffer
    pub fn is_allocated(&self) -> bool {
        self.samples.capacity() != 0
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    /// Packed little-endian copy of the samples
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.samples.len() * std::mem::size_of::<f64>());
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

impl Default for WaveformBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SAMPLE_COUNT)
    }
}

/// Decode a packed little-endian sample blob
pub fn samples_from_le_bytes(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(std::mem::size_of::<f64>())
        .map(|chunk| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect()
}
