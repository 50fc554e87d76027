use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SagaError;

/// Identity of a compensating action.
///
/// Names the reversal logic to run for a completed step. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    /// Create an identity, rejecting the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`SagaError::InvalidArgument`] if `id` is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, SagaError> {
        let id = id.into();
        if id.is_empty() {
            return Err(SagaError::invalid("action identity must not be empty"));
        }
        Ok(Self(id))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ActionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for ActionId {
    type Error = SagaError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for ActionId {
    type Error = SagaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for ActionId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

/// How to undo one completed step.
///
/// Holds the original input and output of the step so the compensating
/// action knows both what was done and what effect it had.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationRecord {
    action: ActionId,
    input: Value,
    output: Value,
}

impl CompensationRecord {
    /// # Errors
    ///
    /// Returns [`SagaError::InvalidArgument`] if `action` is empty.
    pub fn new(action: impl Into<String>, input: Value, output: Value) -> Result<Self, SagaError> {
        Ok(Self::from_parts(ActionId::new(action)?, input, output))
    }

    #[must_use]
    pub fn from_parts(action: ActionId, input: Value, output: Value) -> Self {
        Self {
            action,
            input,
            output,
        }
    }

    #[must_use]
    pub fn action(&self) -> &ActionId {
        &self.action
    }

    #[must_use]
    pub fn input(&self) -> &Value {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &Value {
        &self.output
    }

    /// The structured value handed to the compensating action.
    #[must_use]
    pub fn compensation_input(&self) -> CompensationInput {
        CompensationInput {
            input: self.input.clone(),
            output: self.output.clone(),
        }
    }
}

/// Input passed to a compensating action: the original step's input and output.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CompensationInput {
    pub input: Value,
    pub output: Value,
}

impl CompensationInput {
    /// Deserialize the original step input into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value does not match `T`.
    pub fn input_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.input)
    }

    /// Deserialize the original step output into a typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value does not match `T`.
    pub fn output_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.output)
    }
}
