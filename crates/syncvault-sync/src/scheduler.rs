//! Sync scheduler - turns triggers into engine runs
//!
//! The [`SyncScheduler`] owns the profiles and sits between the
//! [`ChangeMonitor`] and the [`SyncEngine`]. It accepts three kinds of
//! trigger and starts at most one run per profile at a time.
//!
//! ## Flow
//!
//! ```text
//! ChangeMonitor ──→ SyncRequested ──┐
//! SchedulerHandle ──→ sync now ─────┼──→ SyncScheduler ──→ spawned run ──→ RunReport
//! interval tick (auto-sync only) ───┘          ▲                 │
//!                                              └── completion ───┘
//! ```
//!
//! A trigger that arrives while its profile is already running is dropped;
//! the run in flight will pick up the change anyway or the next event will
//! trigger again.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use syncvault_core::domain::{CancellationHandle, SyncProfile, SyncResult};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::SyncEngine;
use crate::watcher::{ChangeMonitor, SyncRequested};

/// What caused a run to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The source tree settled after filesystem activity.
    Change,
    /// Requested through a [`SchedulerHandle`].
    Manual,
    /// Periodic interval elapsed.
    Interval,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Change => write!(f, "change"),
            Trigger::Manual => write!(f, "manual"),
            Trigger::Interval => write!(f, "interval"),
        }
    }
}

/// Outcome of one scheduled run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub profile: String,
    pub trigger: Trigger,
    pub result: SyncResult,
}

/// Cloneable handle for talking to a running [`SyncScheduler`].
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<String>,
    shutdown: CancellationToken,
}

impl SchedulerHandle {
    /// Requests an immediate sync of `profile`.
    ///
    /// Returns false if the scheduler is no longer running.
    pub fn request_sync(&self, profile: &str) -> bool {
        info!(profile, "User-initiated sync requested");
        self.commands.send(profile.to_string()).is_ok()
    }

    /// Stops the scheduler: watches are released and runs in flight cancelled.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Token cancelled when the scheduler is asked to stop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

/// Bookkeeping for a run in flight.
struct InFlight {
    id: u64,
    trigger: Trigger,
    cancel: CancellationHandle,
    task: JoinHandle<()>,
}

/// Message a finished run sends back to the scheduler loop.
struct Completion {
    id: u64,
    profile: SyncProfile,
    result: SyncResult,
}

/// Drives sync runs for a set of profiles.
pub struct SyncScheduler {
    profiles: HashMap<String, SyncProfile>,
    engine: Arc<SyncEngine>,
    monitor: ChangeMonitor,
    requests_rx: mpsc::UnboundedReceiver<SyncRequested>,
    commands_rx: mpsc::UnboundedReceiver<String>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
    reports_tx: Option<mpsc::UnboundedSender<RunReport>>,
    handle: SchedulerHandle,
    interval: Option<Duration>,
    in_flight: HashMap<String, InFlight>,
    next_run_id: u64,
}

impl SyncScheduler {
    /// Creates a scheduler for `profiles`.
    ///
    /// # Arguments
    /// * `profiles` - Every profile the scheduler may run; auto-sync ones are watched
    /// * `engine` - Engine shared by all runs
    /// * `quiet_period` - Debounce window for the change monitor
    /// * `interval` - Optional periodic trigger for auto-sync profiles
    pub fn new(
        profiles: Vec<SyncProfile>,
        engine: Arc<SyncEngine>,
        quiet_period: Duration,
        interval: Option<Duration>,
    ) -> (Self, SchedulerHandle) {
        let (monitor, requests_rx) = ChangeMonitor::new(quiet_period);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let handle = SchedulerHandle {
            commands: commands_tx,
            shutdown: CancellationToken::new(),
        };

        info!(
            profiles = profiles.len(),
            quiet_period_ms = quiet_period.as_millis() as u64,
            interval = ?interval,
            "Creating sync scheduler"
        );

        let scheduler = Self {
            profiles: profiles
                .into_iter()
                .map(|p| (p.name().to_string(), p))
                .collect(),
            engine,
            monitor,
            requests_rx,
            commands_rx,
            completions_tx,
            completions_rx,
            reports_tx: None,
            handle: handle.clone(),
            interval: interval.filter(|d| !d.is_zero()),
            in_flight: HashMap::new(),
            next_run_id: 0,
        };

        (scheduler, handle)
    }

    /// Subscribes to run reports; only the latest subscriber receives them.
    pub fn reports(&mut self) -> mpsc::UnboundedReceiver<RunReport> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.reports_tx = Some(tx);
        rx
    }

    /// The change monitor feeding this scheduler.
    pub fn monitor(&self) -> &ChangeMonitor {
        &self.monitor
    }

    /// Main loop; returns the profiles with their final status labels.
    ///
    /// Runs until [`SchedulerHandle::shutdown`] is called. On the way out all
    /// watches are stopped, runs in flight are cancelled and awaited.
    pub async fn run(mut self) -> Vec<SyncProfile> {
        info!("Sync scheduler starting");
        self.start_watches();

        let mut ticker = self.interval.map(|period| {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker
        });
        let shutdown = self.handle.shutdown_token();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }

                Some(request) = self.requests_rx.recv() => {
                    self.trigger(&request.profile, Trigger::Change);
                }

                Some(profile) = self.commands_rx.recv() => {
                    self.trigger(&profile, Trigger::Manual);
                }

                Some(completion) = self.completions_rx.recv() => {
                    self.complete(completion);
                }

                _ = next_tick(&mut ticker) => {
                    let due: Vec<String> = self
                        .profiles
                        .values()
                        .filter(|p| p.auto_sync())
                        .map(|p| p.name().to_string())
                        .collect();
                    debug!(count = due.len(), "Interval elapsed");
                    for name in due {
                        self.trigger(&name, Trigger::Interval);
                    }
                }
            }
        }

        self.shutdown().await;
        info!("Sync scheduler stopped");

        let mut profiles: Vec<SyncProfile> = self.profiles.into_values().collect();
        profiles.sort_by(|a, b| a.name().cmp(b.name()));
        profiles
    }

    fn start_watches(&self) {
        for profile in self.profiles.values().filter(|p| p.auto_sync()) {
            if let Err(e) = self.monitor.start_watching(profile) {
                warn!(profile = %profile.name(), error = %e, "Cannot watch profile source");
            }
        }
    }

    /// Starts a run for `name` unless one is already in flight.
    fn trigger(&mut self, name: &str, trigger: Trigger) {
        let Some(profile) = self.profiles.get(name) else {
            warn!(profile = %name, %trigger, "Trigger for unknown profile ignored");
            return;
        };

        if let Some(running) = self.in_flight.get(name) {
            if !running.task.is_finished() {
                info!(profile = %name, %trigger, running = %running.trigger, "Sync already running, trigger ignored");
                return;
            }
            // Finished without reporting back, so the task died.
            warn!(profile = %name, "Previous run ended abnormally");
            self.in_flight.remove(name);
        }

        let id = self.next_run_id;
        self.next_run_id += 1;

        let cancel = CancellationHandle::new();
        let engine = self.engine.clone();
        let completions = self.completions_tx.clone();
        let run_cancel = cancel.clone();
        let mut run_profile = profile.clone();

        info!(profile = %name, %trigger, run_id = id, "Starting scheduled sync");
        let task = tokio::spawn(async move {
            let profile_name = run_profile.name().to_string();
            let progress = |message: &str| debug!(profile = %profile_name, "{message}");
            let result = engine
                .execute(&mut run_profile, false, &progress, &run_cancel)
                .await;
            let _ = completions.send(Completion {
                id,
                profile: run_profile,
                result,
            });
        });

        self.in_flight.insert(
            name.to_string(),
            InFlight {
                id,
                trigger,
                cancel,
                task,
            },
        );
    }

    /// Handles a completion message from a run task.
    fn complete(&mut self, completion: Completion) {
        let name = completion.profile.name().to_string();
        let current = self
            .in_flight
            .get(&name)
            .is_some_and(|running| running.id == completion.id);
        if !current {
            debug!(profile = %name, run_id = completion.id, "Stale completion ignored");
            return;
        }
        if let Some(running) = self.in_flight.remove(&name) {
            self.record(running.trigger, completion);
        }
    }

    /// Applies a finished run's status and publishes its report.
    fn record(&mut self, trigger: Trigger, completion: Completion) {
        let Completion {
            profile: finished,
            result,
            ..
        } = completion;
        let name = finished.name().to_string();

        if let Some(profile) = self.profiles.get_mut(&name) {
            profile.set_status(finished.status().clone());
        }

        info!(
            profile = %name,
            %trigger,
            success = result.success,
            processed = result.files_processed,
            cancelled = result.cancelled,
            "Scheduled sync finished"
        );

        if let Some(reports) = &self.reports_tx {
            let _ = reports.send(RunReport {
                profile: name,
                trigger,
                result,
            });
        }
    }

    async fn shutdown(&mut self) {
        self.monitor.stop_all();

        let running: Vec<(String, InFlight)> = self.in_flight.drain().collect();
        if !running.is_empty() {
            info!(count = running.len(), "Cancelling runs in flight");
        }
        for (_, run) in &running {
            run.cancel.cancel();
        }

        let mut pending = HashMap::new();
        for (name, run) in running {
            if let Err(e) = run.task.await {
                warn!(profile = %name, error = %e, "Run task failed during shutdown");
            }
            pending.insert(run.id, run.trigger);
        }

        while let Ok(completion) = self.completions_rx.try_recv() {
            if let Some(trigger) = pending.remove(&completion.id) {
                self.record(trigger, completion);
            }
        }
    }
}

/// Waits for the next tick, or forever when no interval is configured.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
