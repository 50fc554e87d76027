//! Shared invoker for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use saga_compensation::{ActionId, CompensationInput, CompensationInvoker, InvokeError};

/// Records every invocation and fails, stalls, or panics on request.
#[derive(Default)]
pub struct RecordingInvoker {
    calls: Mutex<Vec<(String, CompensationInput)>>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delays: HashMap<String, Duration>,
    default_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl RecordingInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, action: &str) -> Self {
        self.failing.insert(action.to_string());
        self
    }

    pub fn panicking_on(mut self, action: &str) -> Self {
        self.panicking.insert(action.to_string());
        self
    }

    pub fn delayed(mut self, action: &str, delay: Duration) -> Self {
        self.delays.insert(action.to_string(), delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = Some(delay);
        self
    }

    /// Action identities in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(action, _)| action.clone())
            .collect()
    }

    pub fn inputs(&self) -> Vec<CompensationInput> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(|(_, input)| input.clone())
            .collect()
    }

    /// Highest number of invocations observed running at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompensationInvoker for RecordingInvoker {
    async fn invoke(&self, action: &ActionId, input: CompensationInput) -> Result<(), InvokeError> {
        self.calls
            .lock()
            .expect("calls lock")
            .push((action.to_string(), input));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);

        let delay = self
            .delays
            .get(action.as_str())
            .copied()
            .or(self.default_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(action.as_str()) {
            panic!("{action} panicked");
        }
        if self.failing.contains(action.as_str()) {
            return Err(InvokeError::action(format!("{action} failed")));
        }
        Ok(())
    }
}
