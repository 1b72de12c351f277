//! Periodic removal of registrations that were never confirmed.

use crate::directory::{StoreError, UserDirectory};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Deletes unregistered users older than the retention window.
pub struct StaleRegistrationReaper {
    users: Arc<dyn UserDirectory>,
    /// Time between sweeps.
    period: Duration,
    /// Age after which an unregistered user is removed.
    retention: Duration,
}

impl StaleRegistrationReaper {
    pub fn new(users: Arc<dyn UserDirectory>, period: Duration, retention: Duration) -> Self {
        Self {
            users,
            period,
            retention,
        }
    }

    /// Run a single sweep.
    pub async fn reap_once(&self) -> Result<u64, StoreError> {
        let removed = self.users.delete_unregistered(self.retention).await?;
        if removed > 0 {
            info!(removed, "Reaped stale registrations");
        } else {
            debug!("No stale registrations");
        }
        Ok(removed)
    }

    /// Sweep every `period` until `shutdown` is cancelled. The first sweep
    /// happens one period after start.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            period = ?self.period,
            retention = ?self.retention,
            "Starting stale registration reaper"
        );

        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Err(e) = self.reap_once().await {
                error!(error = %e, "Failed to reap stale registrations");
            }
        }

        info!("Stale registration reaper stopped");
    }
}

/// Spawn the reaper on the current runtime.
pub fn spawn_reaper(
    users: Arc<dyn UserDirectory>,
    period: Duration,
    retention: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let reaper = StaleRegistrationReaper::new(users, period, retention);

    tokio::spawn(async move {
        reaper.run(shutdown).await;
    })
}
