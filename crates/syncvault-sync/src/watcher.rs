//! Filesystem change monitor with per-profile debouncing
//!
//! The [`ChangeMonitor`] keeps one recursive `notify` watch per profile and
//! turns bursts of filesystem events into a single [`SyncRequested`] once the
//! profile's source tree has been quiet for the configured period.
//!
//! ## Architecture
//!
//! ```text
//! inotify / FSEvents / kqueue
//!       │  (notify thread)
//!       ▼
//!  callback ──→ filter ──→ mpsc::channel ──→ debounce task ──→ SyncRequested
//!                                             (one per profile)
//! ```
//!
//! The registry is a single mutex-guarded map from profile name to
//! [`Registration`]. Dropping a registration releases the OS watch and aborts
//! its debounce task, so a pending timer can never fire after
//! [`stop_watching`](ChangeMonitor::stop_watching) returns.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use syncvault_core::domain::SyncProfile;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::exclude::EventFilter;
use crate::SyncError;

/// Quiet period used when none is configured.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(2000);

/// Capacity of the per-profile event channel.
///
/// A full channel means the debounce timer already has pending work, so
/// dropping further events loses nothing.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Request to run a sync for the named profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequested {
    pub profile: String,
}

/// A filesystem change seen under a watched source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A new file or directory was created at the given path.
    Created(PathBuf),
    /// An existing file was modified (content or metadata changed).
    Modified(PathBuf),
    /// A file or directory was deleted from the given path.
    Deleted(PathBuf),
    /// A file or directory was renamed/moved.
    Renamed {
        /// The original path before the rename.
        old: PathBuf,
        /// The new path after the rename.
        new: PathBuf,
    },
}

impl ChangeEvent {
    /// Returns the primary path associated with this event.
    ///
    /// For rename events, this returns the new (destination) path.
    pub fn path(&self) -> &Path {
        match self {
            ChangeEvent::Created(p) => p,
            ChangeEvent::Modified(p) => p,
            ChangeEvent::Deleted(p) => p,
            ChangeEvent::Renamed { new, .. } => new,
        }
    }
}

/// Active watch for one profile.
struct Registration {
    source: PathBuf,
    _watcher: RecommendedWatcher,
    debouncer: JoinHandle<()>,
    last_event: Arc<Mutex<Option<DateTime<Utc>>>>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.debouncer.abort();
    }
}

/// Registry of per-profile filesystem watches.
///
/// Cloning yields another handle to the same registry. Requests from every
/// registration go to the single receiver returned by [`ChangeMonitor::new`].
/// Must be used from within a tokio runtime.
#[derive(Clone)]
pub struct ChangeMonitor {
    registrations: Arc<Mutex<HashMap<String, Registration>>>,
    quiet_period: Duration,
    requests_tx: mpsc::UnboundedSender<SyncRequested>,
}

impl ChangeMonitor {
    /// Creates an empty monitor and the receiving end of its request stream.
    pub fn new(quiet_period: Duration) -> (Self, mpsc::UnboundedReceiver<SyncRequested>) {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        info!(quiet_period_ms = quiet_period.as_millis() as u64, "Change monitor created");
        (
            Self {
                registrations: Arc::new(Mutex::new(HashMap::new())),
                quiet_period,
                requests_tx,
            },
            requests_rx,
        )
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, HashMap<String, Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Starts a recursive watch on the profile's source tree.
    ///
    /// Any existing registration under the same name is torn down first.
    ///
    /// # Errors
    /// Returns [`SyncError::SourceMissing`] if the source is not a directory
    /// and [`SyncError::Watch`] if the OS watch cannot be created.
    pub fn start_watching(&self, profile: &SyncProfile) -> Result<(), SyncError> {
        let name = profile.name().to_string();
        let source = profile.source().to_path_buf();

        self.stop_watching(&name);

        if !source.is_dir() {
            return Err(SyncError::SourceMissing(source));
        }

        let (events_tx, events_rx) = mpsc::channel::<ChangeEvent>(EVENT_CHANNEL_CAPACITY);
        let last_event = Arc::new(Mutex::new(None));

        let filter = EventFilter::for_profile(profile);
        let callback_name = name.clone();
        let callback_last = last_event.clone();
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let Some(change) = map_notify_event(&event) else {
                        return;
                    };
                    if filter.is_ignored(change.path()) {
                        trace!(path = %change.path().display(), "Ignoring temporary or backup event");
                        return;
                    }
                    if let Ok(mut last) = callback_last.lock() {
                        *last = Some(Utc::now());
                    }
                    match events_tx.try_send(change) {
                        Ok(()) | Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Closed(_)) => {
                            debug!(profile = %callback_name, "Debounce task gone, dropping event");
                        }
                    }
                }
                Err(err) => {
                    warn!(profile = %callback_name, error = %err, "File watcher error");
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(&source, RecursiveMode::Recursive)?;

        let debouncer = tokio::spawn(debounce(
            name.clone(),
            events_rx,
            self.quiet_period,
            self.requests_tx.clone(),
        ));

        info!(profile = %name, source = %source.display(), "Watching source tree");

        let previous = self.registry().insert(
            name,
            Registration {
                source,
                _watcher: watcher,
                debouncer,
                last_event,
            },
        );
        drop(previous);

        Ok(())
    }

    /// Stops watching a profile and cancels its pending timer.
    ///
    /// Returns false if the profile was not being watched.
    pub fn stop_watching(&self, name: &str) -> bool {
        let removed = self.registry().remove(name);
        match removed {
            Some(registration) => {
                info!(profile = %name, source = %registration.source.display(), "Stopped watching");
                drop(registration);
                true
            }
            None => false,
        }
    }

    /// Stops every watch.
    pub fn stop_all(&self) {
        let drained: Vec<(String, Registration)> = self.registry().drain().collect();
        if !drained.is_empty() {
            info!(count = drained.len(), "Stopping all watches");
        }
        drop(drained);
    }

    /// Emits a sync request immediately, without waiting for a quiet period.
    ///
    /// Returns false if nobody is listening for requests any more.
    pub fn request_now(&self, name: &str) -> bool {
        debug!(profile = %name, "Manual sync requested");
        self.requests_tx
            .send(SyncRequested {
                profile: name.to_string(),
            })
            .is_ok()
    }

    pub fn is_watching(&self, name: &str) -> bool {
        self.registry().contains_key(name)
    }

    /// Names of all watched profiles, sorted.
    pub fn watched_profiles(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry().keys().cloned().collect();
        names.sort();
        names
    }

    /// Time of the last relevant event seen for a profile.
    pub fn last_event(&self, name: &str) -> Option<DateTime<Utc>> {
        let registry = self.registry();
        let registration = registry.get(name)?;
        let last = registration
            .last_event
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *last
    }
}

/// Debounce loop for one profile.
///
/// Waits for the first event of a burst, then restarts the quiet-period timer
/// on every further event. When the timer elapses one request is sent and the
/// loop goes back to waiting. Returns when the event channel closes, without
/// firing a pending timer.
pub(crate) async fn debounce(
    profile: String,
    mut events: mpsc::Receiver<ChangeEvent>,
    quiet_period: Duration,
    requests: mpsc::UnboundedSender<SyncRequested>,
) {
    loop {
        let Some(first) = events.recv().await else {
            return;
        };
        debug!(profile = %profile, path = %first.path().display(), "Change detected, quiet period started");

        let timer = tokio::time::sleep(quiet_period);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                () = &mut timer => break,
                next = events.recv() => match next {
                    Some(event) => {
                        trace!(profile = %profile, path = %event.path().display(), "Quiet period restarted");
                        timer.as_mut().reset(tokio::time::Instant::now() + quiet_period);
                    }
                    None => return,
                },
            }
        }

        info!(profile = %profile, "Source quiet, requesting sync");
        let request = SyncRequested {
            profile: profile.clone(),
        };
        if requests.send(request).is_err() {
            debug!(profile = %profile, "Request receiver dropped, stopping debounce");
            return;
        }
    }
}

/// Converts a `notify::Event` into a [`ChangeEvent`].
///
/// - `Create(*)` -> `Created`
/// - `Modify(Name(Both))` with 2 paths -> `Renamed`
/// - `Remove(*)` -> `Deleted`
/// - any other `Modify(*)` -> `Modified`
///
/// Access events and events without paths yield `None`.
fn map_notify_event(event: &notify::Event) -> Option<ChangeEvent> {
    let paths = &event.paths;

    match &event.kind {
        EventKind::Create(_) => Some(ChangeEvent::Created(paths.first()?.clone())),

        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() >= 2 => {
            Some(ChangeEvent::Renamed {
                old: paths[0].clone(),
                new: paths[1].clone(),
            })
        }

        EventKind::Modify(_) => Some(ChangeEvent::Modified(paths.first()?.clone())),

        EventKind::Remove(_) => Some(ChangeEvent::Deleted(paths.first()?.clone())),

        _ => {
            trace!(kind = ?event.kind, "Ignoring event kind");
            None
        }
    }
}
