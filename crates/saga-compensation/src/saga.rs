use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::audit::CompensationAuditLog;
use crate::context::ExecutionContext;
use crate::error::{AggregatedCompensationFailure, CompensationFailure, InvokeError, SagaError};
use crate::invoker::CompensationInvoker;
use crate::policy::SagaPolicy;
use crate::record::CompensationRecord;

/// Accumulates compensations as steps complete and runs the rollback on demand.
///
/// Records are kept in registration order, which is the forward execution
/// order of the original steps. Under a sequential policy they are undone in
/// reverse (LIFO); under a parallel policy they are undone concurrently with
/// no ordering guarantee.
///
/// A saga can be compensated at most once. Later calls to `compensate` or
/// `register_compensation` fail with [`SagaError::AlreadyCompensated`].
#[derive(Debug, Default)]
pub struct Saga {
    policy: SagaPolicy,
    records: Vec<CompensationRecord>,
    compensated: bool,
}

impl Saga {
    #[must_use]
    pub fn new(policy: SagaPolicy) -> Self {
        Self {
            policy,
            records: Vec::new(),
            compensated: false,
        }
    }

    #[must_use]
    pub fn policy(&self) -> &SagaPolicy {
        &self.policy
    }

    /// Registered compensations in registration order.
    #[must_use]
    pub fn records(&self) -> &[CompensationRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn is_compensated(&self) -> bool {
        self.compensated
    }

    /// Record how to undo a step that just completed.
    ///
    /// Nothing is invoked; the record is only appended.
    ///
    /// # Errors
    ///
    /// Returns [`SagaError::InvalidArgument`] if `action` is empty, and
    /// [`SagaError::AlreadyCompensated`] after the saga was compensated. The
    /// record sequence is unchanged on error.
    pub fn register_compensation(
        &mut self,
        action: impl Into<String>,
        input: Value,
        output: Value,
    ) -> Result<(), SagaError> {
        if self.compensated {
            return Err(SagaError::AlreadyCompensated);
        }
        let record = CompensationRecord::new(action, input, output)?;
        debug!(
            action = %record.action(),
            position = self.records.len(),
            "registered compensation"
        );
        self.records.push(record);
        Ok(())
    }

    /// Run every registered compensation according to the policy.
    ///
    /// # Errors
    ///
    /// - [`SagaError::CompensationFailed`] when a sequential compensation fails
    ///   and the policy does not continue on error.
    /// - [`SagaError::Aggregated`] when one or more compensations failed (or
    ///   timed out in parallel mode).
    /// - [`SagaError::AlreadyCompensated`] on a second call.
    ///
    /// # Panics
    ///
    /// Panics if a parallel compensation is run outside a tokio runtime.
    pub async fn compensate(
        &mut self,
        invoker: Arc<dyn CompensationInvoker>,
    ) -> Result<(), SagaError> {
        self.run(invoker).await.0
    }

    /// Like [`compensate`](Self::compensate), also returning the audit log.
    ///
    /// # Errors
    ///
    /// The returned result fails in the same cases as
    /// [`compensate`](Self::compensate). The audit log is returned either way.
    pub async fn compensate_with_audit(
        &mut self,
        invoker: Arc<dyn CompensationInvoker>,
    ) -> (Result<(), SagaError>, CompensationAuditLog) {
        self.run(invoker).await
    }

    /// Compensate using the invoker of a workflow execution, inside a span
    /// carrying its workflow id.
    ///
    /// # Errors
    ///
    /// Same as [`compensate`](Self::compensate).
    pub async fn compensate_in(
        &mut self,
        execution: &dyn ExecutionContext,
    ) -> Result<(), SagaError> {
        let span = info_span!("saga_compensation", workflow_id = %execution.workflow_id());
        self.compensate(execution.invoker()).instrument(span).await
    }

    async fn run(
        &mut self,
        invoker: Arc<dyn CompensationInvoker>,
    ) -> (Result<(), SagaError>, CompensationAuditLog) {
        if self.compensated {
            return (
                Err(SagaError::AlreadyCompensated),
                CompensationAuditLog::new(),
            );
        }
        self.compensated = true;

        let mut audit = CompensationAuditLog::for_records(&self.records);
        // A single record has nothing to parallelize.
        let parallel = self.policy.parallel_compensation() && self.records.len() > 1;
        info!(
            records = self.records.len(),
            parallel,
            continue_on_error = self.policy.continue_on_error(),
            "compensating saga"
        );

        let result = if parallel {
            self.compensate_parallel(invoker, &mut audit).await
        } else {
            self.compensate_sequential(invoker.as_ref(), &mut audit)
                .await
        };

        match &result {
            Ok(()) => info!("saga compensated"),
            Err(error) => warn!(%error, "saga compensation failed"),
        }
        (result, audit)
    }

    async fn compensate_sequential(
        &self,
        invoker: &dyn CompensationInvoker,
        audit: &mut CompensationAuditLog,
    ) -> Result<(), SagaError> {
        let mut failures = Vec::new();

        for (index, record) in self.records.iter().enumerate().rev() {
            audit.record_started(index);
            match invoker
                .invoke(record.action(), record.compensation_input())
                .await
            {
                Ok(()) => {
                    audit.record_compensated(index);
                    debug!(action = %record.action(), index, "compensated");
                }
                Err(cause) => {
                    audit.record_failed(index);
                    let failure = CompensationFailure::new(record.action().clone(), cause);
                    if !self.policy.continue_on_error() {
                        warn!(
                            action = %failure.action,
                            index,
                            cause = %failure.cause,
                            "compensation failed, stopping rollback"
                        );
                        audit.skip_pending();
                        return Err(SagaError::CompensationFailed(failure));
                    }
                    warn!(
                        action = %failure.action,
                        index,
                        cause = %failure.cause,
                        "compensation failed, continuing rollback"
                    );
                    failures.push(failure);
                }
            }
        }

        into_result(failures)
    }

    async fn compensate_parallel(
        &self,
        invoker: Arc<dyn CompensationInvoker>,
        audit: &mut CompensationAuditLog,
    ) -> Result<(), SagaError> {
        let workers = self.records.len().min(self.policy.max_parallelism());
        let timeout = self.policy.parallel_timeout();
        let permits = Arc::new(Semaphore::new(workers));
        let mut tasks = JoinSet::new();
        let mut task_indices = HashMap::with_capacity(self.records.len());
        debug!(workers, ?timeout, "starting parallel compensation");

        for (index, record) in self.records.iter().enumerate() {
            let permits = Arc::clone(&permits);
            let invoker = Arc::clone(&invoker);
            let record = record.clone();
            let handle = tasks.spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return (None, Err(InvokeError::Cancelled));
                };
                let started_at = Instant::now();
                let outcome = invoker
                    .invoke(record.action(), record.compensation_input())
                    .await;
                (Some(started_at), outcome)
            });
            task_indices.insert(handle.id(), index);
        }

        // No deadline when the timeout does not fit the clock.
        let deadline = Instant::now().checked_add(timeout);
        let mut finished = vec![false; self.records.len()];
        let mut failures = Vec::new();

        loop {
            let next = match deadline {
                Some(deadline) => {
                    tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await
                }
                None => Ok(tasks.join_next_with_id().await),
            };
            let joined = match next {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_elapsed) => {
                    tasks.abort_all();
                    break;
                }
            };
            let (id, started_at, outcome) = match joined {
                Ok((id, (started_at, outcome))) => (id, started_at, outcome),
                Err(error) if error.is_panic() => (error.id(), None, Err(InvokeError::Panicked)),
                Err(error) => (error.id(), None, Err(InvokeError::Cancelled)),
            };
            let Some(&index) = task_indices.get(&id) else {
                continue;
            };
            finished[index] = true;
            if let Some(started_at) = started_at {
                audit.record_started_at(index, started_at);
            }
            let action = self.records[index].action();

            match outcome {
                Ok(()) => {
                    audit.record_compensated(index);
                    debug!(%action, index, "compensated");
                }
                Err(cause) => {
                    audit.record_failed(index);
                    warn!(%action, index, %cause, "compensation failed");
                    failures.push(CompensationFailure::new(action.clone(), cause));
                }
            }
        }

        for (index, record) in self.records.iter().enumerate() {
            if finished[index] {
                continue;
            }
            audit.record_timed_out(index);
            warn!(action = %record.action(), index, ?timeout, "compensation timed out");
            failures.push(CompensationFailure::new(
                record.action().clone(),
                InvokeError::TimedOut(timeout),
            ));
        }

        into_result(failures)
    }
}

fn into_result(failures: Vec<CompensationFailure>) -> Result<(), SagaError> {
    match AggregatedCompensationFailure::from_failures(failures) {
        Some(aggregate) => Err(SagaError::Aggregated(aggregate)),
        None => Ok(()),
    }
}
