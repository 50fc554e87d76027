use tokio::time::Instant;

use crate::record::{ActionId, CompensationRecord};

/// Outcome of one registered compensation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompensationStatus {
    /// Not attempted yet.
    Pending,
    /// Compensating action succeeded.
    Compensated,
    /// Compensating action returned an error.
    Failed,
    /// Compensating action did not finish within the parallel wait bound.
    TimedOut,
    /// Never attempted because an earlier failure stopped the rollback.
    Skipped,
}

/// Audit entry for one registered compensation.
#[derive(Debug)]
pub struct CompensationEntry {
    /// Identity of the compensating action.
    pub action: ActionId,
    /// Position of the record in registration order.
    pub index: usize,
    pub status: CompensationStatus,
    /// When the invocation started. In parallel mode this is when the record
    /// got a worker, not when its task was submitted.
    pub started_at: Option<Instant>,
    /// When the invocation finished, failed, or was given up on.
    pub completed_at: Option<Instant>,
}

/// Audit log of one `compensate` call, one entry per record in registration order.
#[derive(Debug, Default)]
pub struct CompensationAuditLog {
    entries: Vec<CompensationEntry>,
}

impl CompensationAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn for_records(records: &[CompensationRecord]) -> Self {
        let entries = records
            .iter()
            .enumerate()
            .map(|(index, record)| CompensationEntry {
                action: record.action().clone(),
                index,
                status: CompensationStatus::Pending,
                started_at: None,
                completed_at: None,
            })
            .collect();
        Self { entries }
    }

    pub(crate) fn record_started(&mut self, index: usize) {
        self.record_started_at(index, Instant::now());
    }

    pub(crate) fn record_started_at(&mut self, index: usize, started_at: Instant) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.started_at = Some(started_at);
        }
    }

    pub(crate) fn record_compensated(&mut self, index: usize) {
        self.finish(index, CompensationStatus::Compensated);
    }

    pub(crate) fn record_failed(&mut self, index: usize) {
        self.finish(index, CompensationStatus::Failed);
    }

    pub(crate) fn record_timed_out(&mut self, index: usize) {
        self.finish(index, CompensationStatus::TimedOut);
    }

    /// Mark every still-pending entry as skipped.
    pub(crate) fn skip_pending(&mut self) {
        for entry in &mut self.entries {
            if entry.status == CompensationStatus::Pending {
                entry.status = CompensationStatus::Skipped;
            }
        }
    }

    fn finish(&mut self, index: usize, status: CompensationStatus) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.status = status;
            entry.completed_at = Some(Instant::now());
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[CompensationEntry] {
        &self.entries
    }

    /// Number of entries with the given status.
    #[must_use]
    pub fn count(&self, status: CompensationStatus) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.status == status)
            .count()
    }

    /// One line per record, in registration order.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        for entry in &self.entries {
            let status = match entry.status {
                CompensationStatus::Pending => "·",
                CompensationStatus::Compensated => "↩",
                CompensationStatus::Failed => "✗",
                CompensationStatus::TimedOut => "⏱",
                CompensationStatus::Skipped => "-",
            };
            lines.push(format!("{status} {}", entry.action));
        }
        lines.join("\n")
    }
}
