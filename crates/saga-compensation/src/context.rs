use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::SagaError;
use crate::invoker::CompensationInvoker;
use crate::saga::Saga;

/// The enclosing workflow execution, as seen by the saga.
pub trait ExecutionContext: Send + Sync {
    /// Identifier of the running workflow, used for log correlation.
    fn workflow_id(&self) -> &str;

    /// Invoker used to run compensating actions for this workflow.
    fn invoker(&self) -> Arc<dyn CompensationInvoker>;
}

/// Plain [`ExecutionContext`] holding a workflow id and an injected invoker.
#[derive(Clone)]
pub struct WorkflowExecution {
    workflow_id: String,
    invoker: Arc<dyn CompensationInvoker>,
}

impl WorkflowExecution {
    #[must_use]
    pub fn new(workflow_id: impl Into<String>, invoker: Arc<dyn CompensationInvoker>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            invoker,
        }
    }
}

impl fmt::Debug for WorkflowExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowExecution")
            .field("workflow_id", &self.workflow_id)
            .finish_non_exhaustive()
    }
}

impl ExecutionContext for WorkflowExecution {
    fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    fn invoker(&self) -> Arc<dyn CompensationInvoker> {
        Arc::clone(&self.invoker)
    }
}

/// Binds a [`Saga`] to a workflow execution so workflow code can register
/// and compensate without passing the invoker around.
pub struct SagaContext {
    saga: Saga,
    execution: Arc<dyn ExecutionContext>,
}

impl SagaContext {
    #[must_use]
    pub fn new(saga: Saga, execution: Arc<dyn ExecutionContext>) -> Self {
        Self { saga, execution }
    }

    /// See [`Saga::register_compensation`].
    ///
    /// # Errors
    ///
    /// Same as [`Saga::register_compensation`].
    pub fn register_compensation(
        &mut self,
        action: impl Into<String>,
        input: Value,
        output: Value,
    ) -> Result<(), SagaError> {
        self.saga.register_compensation(action, input, output)
    }

    /// Compensate the bound saga with the execution's invoker.
    ///
    /// # Errors
    ///
    /// Same as [`Saga::compensate`].
    pub async fn compensate(&mut self) -> Result<(), SagaError> {
        self.saga.compensate_in(self.execution.as_ref()).await
    }

    #[must_use]
    pub fn saga(&self) -> &Saga {
        &self.saga
    }

    #[must_use]
    pub fn workflow_id(&self) -> &str {
        self.execution.workflow_id()
    }

    #[must_use]
    pub fn into_saga(self) -> Saga {
        self.saga
    }
}

impl fmt::Debug for SagaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaContext")
            .field("workflow_id", &self.execution.workflow_id())
            .field("saga", &self.saga)
            .finish()
    }
}
