// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Running-state machine of the unit
//!
//! The state steps once per coarse threshold crossing through
//! `Exec → Stack → Kill → Exec`. A quit request moves it to `End` on the next
//! tick, where it stays until the unit is re-initialised.

use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

/// Default coarse threshold between two state steps
pub const DEFAULT_LIFECYCLE_THRESHOLD_MS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    Exec,
    Stack,
    Kill,
    End,
}

impl LifecycleState {
    /// Next state of the cycle; `End` has none
    pub fn next(self) -> Self {
        match self {
            LifecycleState::Exec => LifecycleState::Stack,
            LifecycleState::Stack => LifecycleState::Kill,
            LifecycleState::Kill => LifecycleState::Exec,
            LifecycleState::End => LifecycleState::End,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == LifecycleState::End
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Exec => "EXEC",
            LifecycleState::Stack => "STACK",
            LifecycleState::Kill => "KILL",
            LifecycleState::End => "END",
        };
        f.write_str(name)
    }
}

/// A state change reported by [`LifecycleStateMachine::tick`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LifecycleState,
    pub to: LifecycleState,
}

#[derive(Debug, Clone)]
pub struct LifecycleStateMachine {
    state: LifecycleState,
    last_step_start: u64,
    threshold_ms: u64,
}

impl LifecycleStateMachine {
    /// Start in `Exec`, counting elapsed time from `now`
    pub fn new(threshold_ms: u64, now: u64) -> Self {
        Self {
            state: LifecycleState::Exec,
            last_step_start: now,
            threshold_ms,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn last_step_start(&self) -> u64 {
        self.last_step_start
    }

    pub fn threshold_ms(&self) -> u64 {
        self.threshold_ms
    }

    /// Evaluate the machine at `now`.
    ///
    /// Returns the transition when the state changed.
    pub fn tick(&mut self, now: u64, quit_requested: bool) -> Option<Transition> {
        let elapsed = now.saturating_sub(self.last_step_start);
        if elapsed <= self.threshold_ms && !quit_requested {
            return None;
        }
        self.last_step_start = now;

        let from = self.state;
        self.state = if quit_requested {
            LifecycleState::End
        } else {
            from.next()
        };

        if from == self.state {
            return None;
        }
        info!("Change to {} running state", self.state);
        Some(Transition {
            from,
            to: self.state,
        })
    }

    /// Back to `Exec`, only on external re-initialisation
    pub fn reset(&mut self, now: u64) {
        if self.state != LifecycleState::Exec {
            info!("Running state reset from {} to {}", self.state, LifecycleState::Exec);
        }
        self.state = LifecycleState::Exec;
        self.last_step_start = now;
    }
}

impl Default for LifecycleStateMachine {
    fn default() -> Self {
        Self::new(DEFAULT_LIFECYCLE_THRESHOLD_MS, 0)
    }
}
