// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error types of the waveform core
//!
//! The core only knows two failure modes. Both are local and recoverable: a
//! failed resize keeps the previous buffer, an unknown parameter name is
//! reported to the caller that supplied it.

use thiserror::Error;

/// Errors raised by the waveform core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WaveformError {
    #[error("Failed to resize waveform buffer from {current} to {requested} samples: {reason}")]
    BufferResizeFailed {
        requested: usize,
        current: usize,
        reason: String,
    },

    #[error("Unknown parameter '{name}'")]
    UnknownParameter { name: String },
}
