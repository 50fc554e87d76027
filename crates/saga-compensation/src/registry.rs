use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BoxError, InvokeError, SagaError};
use crate::invoker::{CompensatingAction, CompensationInvoker};
use crate::record::{ActionId, CompensationInput};

type ActionFactory = Arc<dyn Fn() -> Box<dyn CompensatingAction> + Send + Sync>;

/// Explicit map from action identity to a factory producing the action.
///
/// Populated at startup by whatever component owns the compensating actions.
/// Each invocation gets a fresh unit from the factory; use
/// [`register_instance`](Self::register_instance) to share one instance.
#[derive(Default, Clone)]
pub struct ActionRegistry {
    factories: HashMap<ActionId, ActionFactory>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut actions: Vec<&str> = self.factories.keys().map(ActionId::as_str).collect();
        actions.sort_unstable();
        f.debug_struct("ActionRegistry")
            .field("actions", &actions)
            .finish()
    }
}

impl ActionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action type constructed with [`Default`] on every invocation.
    ///
    /// # Errors
    ///
    /// Returns [`SagaError::InvalidArgument`] for an empty identity and
    /// [`SagaError::DuplicateAction`] if the identity is already registered.
    pub fn register<A>(&mut self, action: impl Into<String>) -> Result<(), SagaError>
    where
        A: CompensatingAction + Default + 'static,
    {
        self.register_factory(action, || -> Box<dyn CompensatingAction> {
            Box::new(A::default())
        })
    }

    /// Register a factory building the action on every invocation.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_factory<F>(
        &mut self,
        action: impl Into<String>,
        factory: F,
    ) -> Result<(), SagaError>
    where
        F: Fn() -> Box<dyn CompensatingAction> + Send + Sync + 'static,
    {
        self.insert(ActionId::new(action)?, Arc::new(factory))
    }

    /// Register one shared instance used for every invocation.
    ///
    /// # Errors
    ///
    /// Same as [`register`](Self::register).
    pub fn register_instance(
        &mut self,
        action: impl Into<String>,
        instance: Arc<dyn CompensatingAction>,
    ) -> Result<(), SagaError> {
        let id = ActionId::new(action)?;
        self.insert(
            id,
            Arc::new(move || -> Box<dyn CompensatingAction> {
                Box::new(SharedAction(Arc::clone(&instance)))
            }),
        )
    }

    #[must_use]
    pub fn contains(&self, action: &str) -> bool {
        ActionId::new(action).is_ok_and(|id| self.factories.contains_key(&id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    fn insert(&mut self, id: ActionId, factory: ActionFactory) -> Result<(), SagaError> {
        match self.factories.entry(id) {
            Entry::Occupied(entry) => Err(SagaError::DuplicateAction(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(action = %entry.key(), "registered compensating action");
                entry.insert(factory);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl CompensationInvoker for ActionRegistry {
    async fn invoke(
        &self,
        action: &ActionId,
        input: CompensationInput,
    ) -> Result<(), InvokeError> {
        let factory = self
            .factories
            .get(action)
            .ok_or_else(|| InvokeError::UnknownAction(action.clone()))?;
        let unit = factory();
        unit.compensate(input).await.map_err(InvokeError::Action)
    }
}

struct SharedAction(Arc<dyn CompensatingAction>);

#[async_trait]
impl CompensatingAction for SharedAction {
    async fn compensate(&self, input: CompensationInput) -> Result<(), BoxError> {
        self.0.compensate(input).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct ReleaseInventory;

    #[async_trait]
    impl CompensatingAction for ReleaseInventory {
        async fn compensate(&self, input: CompensationInput) -> Result<(), BoxError> {
            let quantity: u32 = input.input_as()?;
            if quantity == 0 {
                return Err("nothing to release".into());
            }
            Ok(())
        }
    }

    struct CountingAction {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CompensatingAction for CountingAction {
        async fn compensate(&self, _input: CompensationInput) -> Result<(), BoxError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn id(action: &str) -> ActionId {
        ActionId::new(action).expect("valid id")
    }

    fn payload(input: serde_json::Value) -> CompensationInput {
        CompensationInput {
            input,
            output: serde_json::Value::Null,
        }
    }

    #[test]
    fn registration_rejects_empty_and_duplicate_identities() {
        let mut registry = ActionRegistry::new();

        assert!(matches!(
            registry.register::<ReleaseInventory>(""),
            Err(SagaError::InvalidArgument(_))
        ));
        registry
            .register::<ReleaseInventory>("release_inventory")
            .expect("first registration");
        assert!(matches!(
            registry.register::<ReleaseInventory>("release_inventory"),
            Err(SagaError::DuplicateAction(_))
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.contains("release_inventory"));
        assert!(!registry.contains(""));
    }

    #[tokio::test]
    async fn invoke_runs_registered_action() {
        let mut registry = ActionRegistry::new();
        registry
            .register::<ReleaseInventory>("release_inventory")
            .expect("registered");

        registry
            .invoke(&id("release_inventory"), payload(json!(3)))
            .await
            .expect("release succeeds");

        let result = registry
            .invoke(&id("release_inventory"), payload(json!(0)))
            .await;
        assert!(matches!(result, Err(InvokeError::Action(_))));
    }

    #[tokio::test]
    async fn invoke_unknown_action_fails() {
        let registry = ActionRegistry::new();

        let result = registry.invoke(&id("missing"), payload(json!(1))).await;

        match result {
            Err(InvokeError::UnknownAction(action)) => assert_eq!(action.as_str(), "missing"),
            other => panic!("expected UnknownAction, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn shared_instance_sees_every_invocation() {
        let counter = Arc::new(CountingAction {
            calls: AtomicUsize::new(0),
        });
        let mut registry = ActionRegistry::new();
        registry
            .register_instance("count", Arc::clone(&counter) as Arc<dyn CompensatingAction>)
            .expect("registered");

        for _ in 0..3 {
            registry
                .invoke(&id("count"), CompensationInput::default())
                .await
                .expect("count succeeds");
        }

        assert_eq!(counter.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn factory_is_called_per_invocation() {
        let built = Arc::new(AtomicUsize::new(0));
        let mut registry = ActionRegistry::new();
        let counter = Arc::clone(&built);
        registry
            .register_factory("release_inventory", move || -> Box<dyn CompensatingAction> {
                counter.fetch_add(1, Ordering::SeqCst);
                Box::new(ReleaseInventory)
            })
            .expect("registered");

        for _ in 0..2 {
            registry
                .invoke(&id("release_inventory"), payload(json!(1)))
                .await
                .expect("release succeeds");
        }

        assert_eq!(built.load(Ordering::SeqCst), 2);
    }
}
