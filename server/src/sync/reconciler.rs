//! The periodic reconciliation task.
//!
//! Each tick snapshots the busiest local rows, merges every row into the
//! remote table by addition and settles the local row right after its merge
//! succeeds. Remote failures and timeouts only affect their own row, which
//! stays staged for the next tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_engine::{Count, CounterRecord, MergeFailure, Settlement, SyncPhase, TickReport};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::Instrument;
use uuid::Uuid;

use super::{LocalCounters, RemoteCounters};
use crate::config::Config;
use crate::db::RemoteStoreError;

/// Tuning for the reconciliation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Time between ticks
    pub interval: Duration,
    /// Rows drained per tick
    pub batch_size: usize,
    /// Upper bound for a single remote call
    pub remote_timeout: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            batch_size: tally_engine::DEFAULT_BATCH_SIZE,
            remote_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&Config> for SyncSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.sync_interval,
            batch_size: config.sync_batch_size,
            remote_timeout: config.remote_timeout,
        }
    }
}

/// Observable state of the reconciliation task.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    /// Idle or running
    pub phase: SyncPhase,
    /// Outcome of the last completed tick
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<SyncPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_tick_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<TickReport>,
    /// Completed ticks since startup
    pub ticks: u64,
}

/// Status shared between the task and the health endpoint.
pub type SharedSyncStatus = Arc<RwLock<SyncStatus>>;

/// Drains the local table into the remote table.
pub struct Reconciler<L, R> {
    local: L,
    remote: R,
    settings: SyncSettings,
    status: SharedSyncStatus,
}

impl<L, R> Reconciler<L, R>
where
    L: LocalCounters + 'static,
    R: RemoteCounters + 'static,
{
    /// Create a new reconciler.
    pub fn new(local: L, remote: R, settings: SyncSettings) -> Self {
        Self {
            local,
            remote,
            settings,
            status: SharedSyncStatus::default(),
        }
    }

    /// Handle to the status updated after every tick.
    pub fn status(&self) -> SharedSyncStatus {
        Arc::clone(&self.status)
    }

    /// Run exactly one reconciliation pass.
    pub async fn tick(&self) -> TickReport {
        let tick_id = Uuid::new_v4();
        let span = tracing::info_span!("sync_tick", %tick_id);

        async {
            self.status.write().await.phase = SyncPhase::Running;

            let report = self.reconcile().await;

            match report.phase() {
                _ if report.is_empty() => {}
                SyncPhase::Succeeded => tracing::info!(
                    merged = report.merged.len(),
                    clicks = report.merged_clicks,
                    deleted = report.removal.deleted,
                    retained = report.removal.retained,
                    "Sync tick complete"
                ),
                _ => tracing::warn!(
                    merged = report.merged.len(),
                    failed = report.failed.len(),
                    local_error = report.local_error.as_deref(),
                    "Sync tick left rows for retry"
                ),
            }

            let mut status = self.status.write().await;
            status.phase = SyncPhase::Idle;
            status.last_outcome = Some(report.phase());
            status.last_tick_at = Some(Utc::now());
            status.last_report = Some(report.clone());
            status.ticks += 1;

            report
        }
        .instrument(span)
        .await
    }

    async fn reconcile(&self) -> TickReport {
        let snapshot = match self.local.top_n(self.settings.batch_size).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::error!(error = %e, "Failed to snapshot local counters");
                return TickReport {
                    local_error: Some(e.to_string()),
                    ..TickReport::default()
                };
            }
        };

        if snapshot.is_empty() {
            tracing::info!("Nothing to sync");
            return TickReport::default();
        }

        let mut report = TickReport {
            snapshot: snapshot.len(),
            ..TickReport::default()
        };

        for record in &snapshot {
            match self.merge_row(record).await {
                Ok(total) => {
                    tracing::debug!(
                        user_id = record.user_id,
                        delta = record.count,
                        total,
                        "Merged into remote"
                    );
                    report.merged.push(record.user_id);
                    report.merged_clicks += record.count;
                }
                Err(e) => {
                    tracing::warn!(
                        user_id = record.user_id,
                        error = %e,
                        "Remote merge failed, row stays staged"
                    );
                    report.failed.push(MergeFailure {
                        user_id: record.user_id,
                        reason: e.to_string(),
                        timed_out: e.is_timeout(),
                    });
                    continue;
                }
            }

            // The remote already holds this delta; a failure here means the
            // next tick merges it again.
            match self.local.remove(&[Settlement::from_record(record)]).await {
                Ok(removal) => report.removal.absorb(removal),
                Err(e) => {
                    tracing::error!(
                        user_id = record.user_id,
                        merged = record.count,
                        error = %e,
                        "Failed to settle merged row"
                    );
                    report.local_error = Some(e.to_string());
                    break;
                }
            }
        }

        report
    }

    async fn merge_row(&self, record: &CounterRecord) -> Result<Count, RemoteStoreError> {
        let merge = self.remote.merge_add(
            record.user_id,
            record.display_name.as_deref(),
            record.count,
        );

        match tokio::time::timeout(self.settings.remote_timeout, merge).await {
            Ok(result) => result,
            Err(_) => Err(RemoteStoreError::Timeout(self.settings.remote_timeout)),
        }
    }

    /// Tick on the configured interval until `stop` flips to true, then run
    /// one final tick to drain what was staged since.
    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let period = self.settings.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            interval = ?period,
            batch_size = self.settings.batch_size,
            "Reconciler started"
        );

        while !*stop.borrow() {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Reconciler stopping, draining staged clicks");
        self.tick().await;
    }

    /// Spawn [`Reconciler::run`] onto the runtime.
    pub fn spawn(self) -> SyncHandle {
        let (stop, stop_rx) = watch::channel(false);
        let status = self.status();
        let task = tokio::spawn(self.run(stop_rx));

        SyncHandle { stop, task, status }
    }
}

/// A running reconciliation task.
pub struct SyncHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
    status: SharedSyncStatus,
}

impl SyncHandle {
    pub fn status(&self) -> SharedSyncStatus {
        Arc::clone(&self.status)
    }

    /// Signal the task to stop and wait for its final tick.
    pub async fn shutdown(self) {
        if self.stop.send(true).is_err() {
            tracing::debug!("Reconciler task already exited before stop signal");
        }
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Reconciler task failed");
        }
    }
}
