use async_trait::async_trait;

use crate::error::{BoxError, InvokeError};
use crate::record::{ActionId, CompensationInput};

/// Resolves a compensating action by identity and runs it.
///
/// This is the engine's only extension point. How `action` is resolved is up
/// to the implementation; [`ActionRegistry`](crate::ActionRegistry) uses an
/// explicit identity-to-factory map. Invoking the same identity repeatedly
/// must be allowed.
#[async_trait]
pub trait CompensationInvoker: Send + Sync {
    /// Run the compensating action named `action` with the original step's
    /// input and output.
    ///
    /// # Errors
    ///
    /// Returns [`InvokeError::UnknownAction`] if `action` cannot be resolved,
    /// or [`InvokeError::Action`] if the action itself fails.
    async fn invoke(&self, action: &ActionId, input: CompensationInput)
    -> Result<(), InvokeError>;
}

/// A unit of reversal logic, e.g. refunding a payment.
///
/// # Example
///
/// ```
/// use async_trait::async_trait;
/// use saga_compensation::{BoxError, CompensatingAction, CompensationInput};
///
/// #[derive(Default)]
/// struct RefundPayment;
///
/// #[async_trait]
/// impl CompensatingAction for RefundPayment {
///     async fn compensate(&self, input: CompensationInput) -> Result<(), BoxError> {
///         let charge_id: String = input.output_as()?;
///         // issue the refund for `charge_id`
///         let _ = charge_id;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait CompensatingAction: Send + Sync {
    /// Undo the effect of a completed step.
    ///
    /// # Errors
    ///
    /// Returns an error if the effect could not be undone.
    async fn compensate(&self, input: CompensationInput) -> Result<(), BoxError>;
}
