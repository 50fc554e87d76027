use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::record::ActionId;

/// Boxed error returned by compensating actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error from invoking a single compensating action.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InvokeError {
    /// No compensating action is registered under the identity.
    #[error("no compensating action registered for '{0}'")]
    UnknownAction(ActionId),

    /// The compensating action ran and returned an error.
    #[error("compensating action returned an error")]
    Action(#[source] BoxError),

    /// The action did not finish within the parallel wait bound.
    #[error("compensating action did not finish within {0:?}")]
    TimedOut(Duration),

    /// The action panicked while running.
    #[error("compensating action panicked")]
    Panicked,

    /// The action was cancelled before it could finish.
    #[error("compensating action was cancelled")]
    Cancelled,
}

impl InvokeError {
    /// Wrap an error returned by a compensating action.
    pub fn action(error: impl Into<BoxError>) -> Self {
        Self::Action(error.into())
    }
}

/// A single compensating action failed.
#[derive(Debug, Error)]
#[error("compensation '{action}' failed")]
pub struct CompensationFailure {
    /// Identity of the compensating action that failed.
    pub action: ActionId,
    /// Why it failed.
    #[source]
    pub cause: InvokeError,
}

impl CompensationFailure {
    pub(crate) fn new(action: ActionId, cause: InvokeError) -> Self {
        Self { action, cause }
    }
}

/// One or more compensations failed during a single `compensate` call.
///
/// The first observed failure is the primary cause and is reported through
/// [`std::error::Error::source`]. Every later failure is kept in
/// [`suppressed`](Self::suppressed) so none of them is lost.
#[derive(Debug)]
pub struct AggregatedCompensationFailure {
    primary: CompensationFailure,
    suppressed: Vec<CompensationFailure>,
}

impl AggregatedCompensationFailure {
    /// Build an aggregate from failures in observation order.
    ///
    /// Returns `None` when `failures` is empty.
    #[must_use]
    pub fn from_failures(failures: Vec<CompensationFailure>) -> Option<Self> {
        let mut failures = failures.into_iter();
        let primary = failures.next()?;
        Some(Self {
            primary,
            suppressed: failures.collect(),
        })
    }

    /// The first failure observed.
    #[must_use]
    pub fn primary(&self) -> &CompensationFailure {
        &self.primary
    }

    /// Failures observed after the primary one.
    #[must_use]
    pub fn suppressed(&self) -> &[CompensationFailure] {
        &self.suppressed
    }

    /// All failures, primary first.
    pub fn failures(&self) -> impl Iterator<Item = &CompensationFailure> {
        std::iter::once(&self.primary).chain(&self.suppressed)
    }

    /// Total number of failures.
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.suppressed.len()
    }

    /// Always `false`: an aggregate holds at least its primary failure.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Identities of all failed actions, primary first.
    #[must_use]
    pub fn actions(&self) -> Vec<&ActionId> {
        self.failures().map(|failure| &failure.action).collect()
    }
}

impl fmt::Display for AggregatedCompensationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} compensation(s) failed, first was '{}'",
            self.len(),
            self.primary.action
        )
    }
}

impl std::error::Error for AggregatedCompensationFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.primary)
    }
}

/// Error from saga registration or compensation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SagaError {
    /// A malformed argument was supplied.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An action identity was registered twice in an [`ActionRegistry`](crate::ActionRegistry).
    #[error("compensating action '{0}' is already registered")]
    DuplicateAction(ActionId),

    /// The saga was already compensated and cannot be used again.
    #[error("saga has already been compensated")]
    AlreadyCompensated,

    /// A compensation failed and the policy stops at the first failure.
    #[error(transparent)]
    CompensationFailed(CompensationFailure),

    /// One or more compensations failed.
    #[error(transparent)]
    Aggregated(AggregatedCompensationFailure),
}

impl SagaError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Every compensation failure carried by this error, primary first.
    ///
    /// Empty for errors that are not compensation failures.
    #[must_use]
    pub fn compensation_failures(&self) -> Vec<&CompensationFailure> {
        match self {
            Self::CompensationFailed(failure) => vec![failure],
            Self::Aggregated(aggregate) => aggregate.failures().collect(),
            _ => Vec::new(),
        }
    }
}

/// Error from loading a [`SagaPolicy`](crate::SagaPolicy) from TOML.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read saga policy at '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse saga policy")]
    Parse(#[from] toml::de::Error),

    #[error("invalid saga policy")]
    Invalid(#[source] SagaError),
}
