// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-sinewave project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Background tasks of the waveform unit
//!
//! - Periodic tick calling [`TickCoordinator::on_tick`]
//! - System health monitoring (heartbeat)

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::config::Config;
use crate::waveform::stream::SharedSampleStream;
use crate::waveform::{MonotonicClock, TickCoordinator};

/// Represents the set of daemon tasks driving one waveform unit
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<bool>,
    coordinator: Option<Arc<TickCoordinator>>,
    stream: Option<SharedSampleStream>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            shutdown_tx,
            coordinator: None,
            stream: None,
        }
    }

    /// Build the waveform unit and launch the configured tasks
    ///
    /// The unit publishes its buffers on a [`SharedSampleStream`] available
    /// through [`Daemon::stream`] as soon as this returns.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        let stream = SharedSampleStream::new(config.scheduler.stream_buffer_size);
        let coordinator = Arc::new(TickCoordinator::new(
            config.coordinator_settings(),
            Arc::new(MonotonicClock::new()),
            Arc::new(stream.clone()),
        ));

        self.coordinator = Some(coordinator.clone());
        self.stream = Some(stream);

        if config.scheduler.enabled {
            self.start_tick_scheduler(coordinator.clone(), config.scheduler.tick_interval_us)?;
        } else {
            info!("Tick scheduler disabled, the unit only reacts to explicit calls");
        }

        // Start heartbeat task for monitoring
        self.start_heartbeat(coordinator, config.scheduler.heartbeat_interval_secs)?;

        Ok(())
    }

    /// Start the periodic tick task
    ///
    /// Once the unit reaches `End` the task stops calling
    /// [`TickCoordinator::on_tick`] and resumes after a re-initialisation.
    fn start_tick_scheduler(
        &mut self,
        coordinator: Arc<TickCoordinator>,
        tick_interval_us: u64,
    ) -> Result<()> {
        if tick_interval_us == 0 {
            anyhow::bail!("Tick interval must be greater than zero");
        }
        info!("Starting tick scheduler every {} us", tick_interval_us);

        let running = self.running.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let task = tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_micros(tick_interval_us));
            // Late ticks are dropped, never replayed in a burst
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = interval.tick() => {
                        if coordinator.lifecycle_state().is_terminal() {
                            continue;
                        }
                        let outcome = coordinator.on_tick();
                        if let Some(transition) = outcome.transition {
                            debug!(
                                "Tick #{}: running state {} -> {}",
                                outcome.sequence, transition.from, transition.to
                            );
                            if transition.to.is_terminal() {
                                info!(
                                    "Waveform unit reached {}, scheduling suspended",
                                    transition.to
                                );
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("Tick scheduler stopped at sequence {}", coordinator.sequence());
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs the unit statistics periodically
    fn start_heartbeat(
        &mut self,
        coordinator: Arc<TickCoordinator>,
        heartbeat_interval_secs: u64,
    ) -> Result<()> {
        info!("Starting heartbeat monitor");

        let running = self.running.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let period = Duration::from_secs(heartbeat_interval_secs.max(1));
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                tokio::select! {
                    _ = time::sleep(period) => {
                        let stats = coordinator.statistics();
                        info!(
                            "Daemon heartbeat: state={} ticks={} published={} empty={} changes={} resize_failures={} sequence={}",
                            coordinator.lifecycle_state(),
                            stats.ticks,
                            stats.published,
                            stats.empty_ticks,
                            stats.changes_applied,
                            stats.resize_failures,
                            stats.last_sequence
                        );
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// The running waveform unit, once launched
    pub fn coordinator(&self) -> Option<Arc<TickCoordinator>> {
        self.coordinator.clone()
    }

    /// The stream carrying the published buffers, once launched
    pub fn stream(&self) -> Option<SharedSampleStream> {
        self.stream.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop all running tasks
    ///
    /// The unit is asked to quit first so its running state reaches `End`
    /// if one more tick runs before the scheduler notices the flag.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        if let Some(coordinator) = &self.coordinator {
            coordinator.request_quit();
        }
        self.running.store(false, Ordering::SeqCst);
        // Receivers may already be gone when every task has ended
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait for all tasks to complete
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("Task failed: {:#}", e),
                Err(e) => error!("Task panicked: {}", e),
            }
        }
        Ok(())
    }
}
