use std::time::Duration;

use crate::error::SagaError;

pub const DEFAULT_MAX_PARALLELISM: usize = 16;
pub const DEFAULT_PARALLEL_TIMEOUT: Duration = Duration::from_secs(60);

/// How a saga runs its compensations.
///
/// Built once through [`SagaPolicy::builder`] and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaPolicy {
    parallel_compensation: bool,
    max_parallelism: usize,
    continue_on_error: bool,
    parallel_timeout: Duration,
}

impl Default for SagaPolicy {
    fn default() -> Self {
        Self {
            parallel_compensation: false,
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            continue_on_error: true,
            parallel_timeout: DEFAULT_PARALLEL_TIMEOUT,
        }
    }
}

impl SagaPolicy {
    #[must_use]
    pub fn builder() -> SagaPolicyBuilder {
        SagaPolicyBuilder::default()
    }

    /// Whether compensations run concurrently instead of in reverse order.
    #[must_use]
    pub fn parallel_compensation(&self) -> bool {
        self.parallel_compensation
    }

    /// Upper bound on concurrently running compensations.
    #[must_use]
    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    /// Whether sequential compensation keeps going after a failure.
    #[must_use]
    pub fn continue_on_error(&self) -> bool {
        self.continue_on_error
    }

    /// Wait bound for a whole parallel batch.
    #[must_use]
    pub fn parallel_timeout(&self) -> Duration {
        self.parallel_timeout
    }
}

/// Builder for [`SagaPolicy`]. Validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct SagaPolicyBuilder {
    policy: SagaPolicy,
}

impl SagaPolicyBuilder {
    #[must_use]
    pub fn parallel_compensation(mut self, enabled: bool) -> Self {
        self.policy.parallel_compensation = enabled;
        self
    }

    /// Must be greater than 1.
    #[must_use]
    pub fn max_parallelism(mut self, max: usize) -> Self {
        self.policy.max_parallelism = max;
        self
    }

    #[must_use]
    pub fn continue_on_error(mut self, enabled: bool) -> Self {
        self.policy.continue_on_error = enabled;
        self
    }

    /// Must be non-zero.
    #[must_use]
    pub fn parallel_timeout(mut self, timeout: Duration) -> Self {
        self.policy.parallel_timeout = timeout;
        self
    }

    /// # Errors
    ///
    /// Returns [`SagaError::InvalidArgument`] if `max_parallelism` is 1 or
    /// less, or if the parallel timeout is zero.
    pub fn build(self) -> Result<SagaPolicy, SagaError> {
        if self.policy.max_parallelism <= 1 {
            return Err(SagaError::invalid(format!(
                "max parallelism must be greater than 1, got {}",
                self.policy.max_parallelism
            )));
        }
        if self.policy.parallel_timeout.is_zero() {
            return Err(SagaError::invalid("parallel timeout must be non-zero"));
        }
        Ok(self.policy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_default_policy() {
        let policy = SagaPolicy::builder().build().expect("defaults are valid");

        assert_eq!(policy, SagaPolicy::default());
        assert!(!policy.parallel_compensation());
        assert_eq!(policy.max_parallelism(), 16);
        assert!(policy.continue_on_error());
        assert_eq!(policy.parallel_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn max_parallelism_of_zero_or_one_is_rejected() {
        for max in [0, 1] {
            let result = SagaPolicy::builder().max_parallelism(max).build();
            assert!(
                matches!(result, Err(SagaError::InvalidArgument(_))),
                "max_parallelism {max} should be rejected"
            );
        }
    }

    #[test]
    fn max_parallelism_of_two_or_more_is_accepted() {
        for max in [2, 3, 64] {
            let policy = SagaPolicy::builder()
                .max_parallelism(max)
                .build()
                .expect("valid parallelism");
            assert_eq!(policy.max_parallelism(), max);
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = SagaPolicy::builder()
            .parallel_timeout(Duration::ZERO)
            .build();
        assert!(matches!(result, Err(SagaError::InvalidArgument(_))));
    }

    #[test]
    fn builder_sets_all_fields() {
        let policy = SagaPolicy::builder()
            .parallel_compensation(true)
            .max_parallelism(4)
            .continue_on_error(false)
            .parallel_timeout(Duration::from_secs(5))
            .build()
            .expect("valid policy");

        assert!(policy.parallel_compensation());
        assert_eq!(policy.max_parallelism(), 4);
        assert!(!policy.continue_on_error());
        assert_eq!(policy.parallel_timeout(), Duration::from_secs(5));
    }
}
