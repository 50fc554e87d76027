//! Saga compensation engine.
//!
//! As a workflow progresses, each completed step registers how to undo it: the
//! identity of a compensating action plus the step's original input and output.
//! When a later step fails, [`Saga::compensate`] runs those compensations,
//! either sequentially in reverse registration order or concurrently bounded
//! by [`SagaPolicy::max_parallelism`], and aggregates every failure.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use saga_compensation::{
//!     ActionRegistry, BoxError, CompensatingAction, CompensationInput, Saga, SagaPolicy,
//! };
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct RefundPayment;
//!
//! #[async_trait]
//! impl CompensatingAction for RefundPayment {
//!     async fn compensate(&self, _input: CompensationInput) -> Result<(), BoxError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ActionRegistry::new();
//! registry.register::<RefundPayment>("refund_payment")?;
//!
//! let mut saga = Saga::new(SagaPolicy::default());
//! saga.register_compensation("refund_payment", json!({"amount": 42}), json!("ch_1"))?;
//!
//! // a later step failed
//! saga.compensate(Arc::new(registry)).await?;
//! # Ok(())
//! # }
//! ```

mod audit;
mod config;
mod context;
mod error;
mod invoker;
mod policy;
mod record;
mod registry;
mod saga;

pub use audit::{CompensationAuditLog, CompensationEntry, CompensationStatus};
pub use context::{ExecutionContext, SagaContext, WorkflowExecution};
pub use error::{
    AggregatedCompensationFailure, BoxError, CompensationFailure, ConfigError, InvokeError,
    SagaError,
};
pub use invoker::{CompensatingAction, CompensationInvoker};
pub use policy::{DEFAULT_MAX_PARALLELISM, DEFAULT_PARALLEL_TIMEOUT, SagaPolicy, SagaPolicyBuilder};
pub use record::{ActionId, CompensationInput, CompensationRecord};
pub use registry::ActionRegistry;
pub use saga::Saga;
