//! Background polling loop.
//!
//! The poller drives a [`Reconciler`] on a fixed interval. A pass also runs
//! immediately when polling is (re)activated, when the connection settings
//! change, and when tasks are added or removed. Passes never overlap: each
//! one is awaited before the loop waits for the next trigger.
//!
//! While polling is disabled or no endpoint is configured, the loop makes no
//! network calls and holds no timer; it only waits for a settings or toggle
//! change. Dropping the [`PollerHandle`] cancels the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::reconcile::Reconciler;
use crate::settings::{Connection, Settings, SharedSettingsStore};
use crate::task::SharedTaskStore;
use crate::veo::VeoApi;

/// Default time between passes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Why the active loop stopped waiting.
enum Wake {
    Tick,
    TasksChanged,
    Reconfigured,
    Shutdown,
}

/// Polling loop state. Consumed by [`Poller::spawn`].
pub struct Poller {
    reconciler: Reconciler,
    tasks: watch::Receiver<u64>,
    settings: watch::Receiver<Settings>,
    enabled: watch::Receiver<bool>,
    interval: Duration,
    cancel: CancellationToken,
}

impl Poller {
    /// Start the loop on the current runtime.
    pub fn spawn(
        store: SharedTaskStore,
        settings: SharedSettingsStore,
        api: Arc<dyn VeoApi>,
        interval: Duration,
        enabled: bool,
    ) -> PollerHandle {
        let (enabled_tx, enabled_rx) = watch::channel(enabled);
        let cancel = CancellationToken::new();

        let poller = Poller {
            tasks: store.subscribe(),
            reconciler: Reconciler::new(store, api),
            settings: settings.subscribe(),
            enabled: enabled_rx,
            interval,
            cancel: cancel.clone(),
        };

        let join = tokio::spawn(poller.run());
        tracing::info!(interval = ?interval, enabled, "Task poller started");

        PollerHandle {
            enabled: enabled_tx,
            cancel,
            join: Some(join),
        }
    }

    async fn run(mut self) {
        let mut last_settings: Option<Settings> = None;

        loop {
            let enabled = *self.enabled.borrow_and_update();
            let settings = self.settings.borrow_and_update().clone();

            // A new endpoint or key starts over with a full sweep
            if last_settings.as_ref() != Some(&settings) {
                if last_settings.is_some() {
                    tracing::info!("Connection settings changed, next pass checks all tasks");
                }
                self.reconciler.reset();
                last_settings = Some(settings.clone());
            }

            let wake = match (enabled, settings.connection()) {
                (true, Some(conn)) => self.poll(&conn).await,
                (enabled, _) => {
                    tracing::debug!(enabled, "Task poller idle");
                    self.wait_for_reconfigure().await
                }
            };

            if let Wake::Shutdown = wake {
                tracing::info!("Task poller stopped");
                return;
            }
        }
    }

    /// Wait until polling is toggled or settings change.
    async fn wait_for_reconfigure(&mut self) -> Wake {
        tokio::select! {
            _ = self.cancel.cancelled() => Wake::Shutdown,
            changed = self.enabled.changed() => match changed {
                Ok(()) => Wake::Reconfigured,
                Err(_) => Wake::Shutdown,
            },
            changed = self.settings.changed() => match changed {
                Ok(()) => Wake::Reconfigured,
                Err(_) => Wake::Shutdown,
            },
        }
    }

    /// Run passes against `conn` until reconfigured or shut down.
    async fn poll(&mut self, conn: &Connection) -> Wake {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // A change that arrived while idle is already covered by the first tick
        let _ = self.tasks.borrow_and_update();

        loop {
            // The first tick completes immediately
            let wake = tokio::select! {
                _ = self.cancel.cancelled() => Wake::Shutdown,
                changed = self.enabled.changed() => match changed {
                    Ok(()) => Wake::Reconfigured,
                    Err(_) => Wake::Shutdown,
                },
                changed = self.settings.changed() => match changed {
                    Ok(()) => Wake::Reconfigured,
                    Err(_) => Wake::Shutdown,
                },
                changed = self.tasks.changed() => match changed {
                    Ok(()) => Wake::TasksChanged,
                    Err(_) => Wake::Shutdown,
                },
                _ = ticker.tick() => Wake::Tick,
            };

            match wake {
                Wake::Shutdown | Wake::Reconfigured => return wake,
                Wake::TasksChanged => {
                    let _ = self.tasks.borrow_and_update();
                    // Restart the interval from this pass
                    ticker.reset();
                }
                Wake::Tick => {}
            }

            // Lookups still in flight are dropped on shutdown
            let report = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Wake::Shutdown,
                report = self.reconciler.run_pass(conn) => report,
            };

            if report.checked > 0 {
                tracing::debug!(
                    checked = report.checked,
                    updated = report.updated,
                    failed = report.failed,
                    "Poll pass finished"
                );
            }
        }
    }
}

/// Handle to a running poller.
///
/// Dropping the handle cancels the loop.
pub struct PollerHandle {
    enabled: watch::Sender<bool>,
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Turn polling on or off. Turning it on runs a pass right away.
    pub fn set_enabled(&self, enabled: bool) {
        let changed = self.enabled.send_if_modified(|current| {
            if *current == enabled {
                false
            } else {
                *current = enabled;
                true
            }
        });

        if changed {
            tracing::info!(enabled, "Task polling toggled");
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.borrow()
    }

    /// Signal the loop to stop without waiting for it.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Stop the loop and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!("Task poller exited abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
