//! Per-zone scheduler
//!
//! Every zone gets its own timer task ticking at that zone's poll interval.
//! A tick hands the check to a [`TaskTracker`] and goes straight back to
//! waiting, so a slow check never delays the zone's timer or any other zone.
//!
//! A tick that finds the zone's previous check still running is skipped, not
//! queued. On cancellation the timers stop, in-flight checks are allowed to
//! finish, and the history store is flushed.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::checker::ZoneChecker;
use crate::config::ZoneConfig;
use crate::error::{Error, Result};
use crate::model::normalize_hostname;

/// Clears a zone's running flag when its check ends, even by panic
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// One independent timer per zone
pub struct ZoneScheduler {
    checker: Arc<ZoneChecker>,
    zones: Vec<ZoneConfig>,
    running: HashMap<String, Arc<AtomicBool>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl ZoneScheduler {
    /// Create a scheduler for the given zones
    ///
    /// Zone names are normalized; pass zones through
    /// [`crate::MonitorConfig::resolved_zones`] to apply environment intervals.
    pub fn new(checker: Arc<ZoneChecker>, zones: Vec<ZoneConfig>) -> Self {
        let zones: Vec<ZoneConfig> = zones
            .into_iter()
            .map(|mut zone| {
                zone.name = normalize_hostname(&zone.name);
                zone
            })
            .collect();
        let running = zones
            .iter()
            .map(|zone| (zone.name.clone(), Arc::new(AtomicBool::new(false))))
            .collect();

        Self {
            checker,
            zones,
            running,
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop all zone timers when `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// The scheduled zones
    pub fn zones(&self) -> &[ZoneConfig] {
        &self.zones
    }

    /// Run until cancelled
    ///
    /// The first tick of every zone fires immediately, so baselines are taken
    /// at startup.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        info!(zones = self.zones.len(), "Starting zone scheduler");

        for zone in &self.zones {
            let this = Arc::clone(&self);
            let zone = zone.clone();
            self.tracker.spawn(async move { this.zone_loop(zone).await });
        }

        self.shutdown.cancelled().await;
        info!("Scheduler stopping, waiting for in-flight checks");

        self.tracker.close();
        self.tracker.wait().await;

        self.checker.store().flush().await?;
        info!("History flushed, scheduler stopped");
        Ok(())
    }

    /// Run a check for `zone` now, outside its timer
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: A check was started
    /// - `Ok(false)`: A check for this zone is already running
    /// - `Err(Error::NotFound)`: The zone is not scheduled
    pub fn trigger(&self, zone: &str) -> Result<bool> {
        let name = normalize_hostname(zone);
        let zone = self
            .zones
            .iter()
            .find(|candidate| candidate.name == name)
            .ok_or_else(|| Error::not_found(format!("Zone is not scheduled: {}", name)))?;
        Ok(self.spawn_check(zone))
    }

    async fn zone_loop(&self, zone: ZoneConfig) {
        let period = zone.poll_interval();
        debug!(zone = %zone.name, interval_secs = period.as_secs(), "Zone timer started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!(zone = %zone.name, "Zone timer stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.spawn_check(&zone);
                }
            }
        }
    }

    fn spawn_check(&self, zone: &ZoneConfig) -> bool {
        let Some(flag) = self.running.get(&zone.name) else {
            return false;
        };

        if flag.swap(true, Ordering::AcqRel) {
            debug!(zone = %zone.name, "Previous check still running, skipping tick");
            return false;
        }

        let guard = RunningGuard(Arc::clone(flag));
        let checker = Arc::clone(&self.checker);
        let zone = zone.clone();
        self.tracker.spawn(async move {
            let _guard = guard;
            // Failures are logged by the checker; the next tick is the retry
            let _ = checker.check(&zone).await;
        });
        true
    }
}
