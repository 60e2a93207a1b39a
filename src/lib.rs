// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust sine waveform library
//!
//! This library provides a periodic sine waveform generator: live-updatable
//! parameters, a resizable sample buffer, a running-state machine and the
//! scheduler gluing them together.

pub mod config;
pub mod daemon;
pub mod error;
pub mod waveform;

pub use error::WaveformError;
