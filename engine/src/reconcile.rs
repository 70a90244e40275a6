//! Value types for reconciling the local staging table into the remote table.
//!
//! # Algorithm
//!
//! 1. Snapshot up to [`DEFAULT_BATCH_SIZE`] local rows, highest count first
//! 2. Merge each row's count into the remote row by addition
//! 3. Settle each local row right after its merge succeeded
//! 4. Leave failed rows untouched for the next tick
//!
//! Settling is conditional. A row still holding exactly the merged count is
//! deleted; a row that received clicks after the snapshot only loses the
//! merged amount. `remote + local` is therefore the same before and after a
//! tick.

use crate::{Count, CounterRecord, UserId};
use serde::{Deserialize, Serialize};

/// Rows drained per tick when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Lifecycle of the reconciliation task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Waiting for the next tick
    #[default]
    Idle,
    /// A tick is in progress
    Running,
    /// Last tick merged every row it attempted
    Succeeded,
    /// Last tick left rows behind for a retry
    PartialFailure,
}

/// What to do with a local row after its merge succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowAction {
    /// The row is unchanged since the snapshot
    Delete,
    /// Clicks arrived after the snapshot; remove only the merged amount
    Subtract(Count),
    /// The row no longer exists
    Gone,
}

/// A local row whose count was merged into the remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settlement {
    pub user_id: UserId,
    /// The count read at snapshot time and added to the remote row
    pub merged: Count,
}

impl Settlement {
    /// Settlement for a snapshotted record.
    pub fn from_record(record: &CounterRecord) -> Self {
        Self {
            user_id: record.user_id,
            merged: record.count,
        }
    }

    /// Decide how to settle the row given its count now.
    pub fn plan(&self, current: Option<Count>) -> RowAction {
        match current {
            None => RowAction::Gone,
            Some(count) if count == self.merged => RowAction::Delete,
            Some(count) => RowAction::Subtract(self.merged.min(count)),
        }
    }
}

/// A row whose remote merge failed during a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeFailure {
    pub user_id: UserId,
    pub reason: String,
    pub timed_out: bool,
}

/// Counts of how local rows were settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalReport {
    /// Rows deleted because they were unchanged
    pub deleted: usize,
    /// Rows kept because newer clicks arrived
    pub retained: usize,
    /// Rows already gone at settlement time
    pub missing: usize,
}

impl RemovalReport {
    /// Account for one settled row.
    pub fn record(&mut self, action: RowAction) {
        match action {
            RowAction::Delete => self.deleted += 1,
            RowAction::Subtract(_) => self.retained += 1,
            RowAction::Gone => self.missing += 1,
        }
    }

    /// Fold another report into this one.
    pub fn absorb(&mut self, other: RemovalReport) {
        self.deleted += other.deleted;
        self.retained += other.retained;
        self.missing += other.missing;
    }
}

/// Summary of one reconciliation tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// Rows in the snapshot
    pub snapshot: usize,
    /// Rows merged into the remote table
    pub merged: Vec<UserId>,
    /// Clicks moved to the remote table
    pub merged_clicks: Count,
    /// Rows left for the next tick
    pub failed: Vec<MergeFailure>,
    pub removal: RemovalReport,
    /// Local table failure that cut the tick short
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_error: Option<String>,
}

impl TickReport {
    /// True when the snapshot had nothing to sync.
    pub fn is_empty(&self) -> bool {
        self.snapshot == 0 && self.local_error.is_none()
    }

    /// Terminal phase for this tick.
    pub fn phase(&self) -> SyncPhase {
        if self.failed.is_empty() && self.local_error.is_none() {
            SyncPhase::Succeeded
        } else {
            SyncPhase::PartialFailure
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_row_is_deleted() {
        let settlement = Settlement {
            user_id: 42,
            merged: 3,
        };
        assert_eq!(settlement.plan(Some(3)), RowAction::Delete);
    }

    #[test]
    fn row_with_new_clicks_keeps_the_difference() {
        let settlement = Settlement {
            user_id: 42,
            merged: 3,
        };
        assert_eq!(settlement.plan(Some(4)), RowAction::Subtract(3));
    }

    #[test]
    fn missing_row_is_left_alone() {
        let settlement = Settlement {
            user_id: 42,
            merged: 3,
        };
        assert_eq!(settlement.plan(None), RowAction::Gone);
    }

    #[test]
    fn subtraction_never_goes_negative() {
        let settlement = Settlement {
            user_id: 42,
            merged: 5,
        };
        assert_eq!(settlement.plan(Some(2)), RowAction::Subtract(2));
    }

    #[test]
    fn phase_reflects_failures() {
        let mut report = TickReport {
            snapshot: 2,
            merged: vec![1, 2],
            merged_clicks: 7,
            ..TickReport::default()
        };
        assert_eq!(report.phase(), SyncPhase::Succeeded);
        assert!(!report.is_empty());

        report.failed.push(MergeFailure {
            user_id: 3,
            reason: "timed out".into(),
            timed_out: true,
        });
        assert_eq!(report.phase(), SyncPhase::PartialFailure);

        let report = TickReport {
            local_error: Some("disk I/O error".into()),
            ..TickReport::default()
        };
        assert_eq!(report.phase(), SyncPhase::PartialFailure);
        assert!(!report.is_empty());
    }

    #[test]
    fn removal_report_counts_actions() {
        let mut removal = RemovalReport::default();
        removal.record(RowAction::Delete);
        removal.record(RowAction::Subtract(2));
        removal.record(RowAction::Gone);
        removal.record(RowAction::Delete);

        let mut total = RemovalReport {
            deleted: 1,
            ..RemovalReport::default()
        };
        total.absorb(removal);
        assert_eq!(total.deleted, 3);

        assert_eq!(
            removal,
            RemovalReport {
                deleted: 2,
                retained: 1,
                missing: 1
            }
        );
    }
}
