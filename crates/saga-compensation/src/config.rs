use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::policy::SagaPolicy;

#[derive(Debug, Deserialize, Default)]
struct PolicyDocument {
    saga: Option<PolicyMetadata>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct PolicyMetadata {
    #[serde(default, rename = "parallel-compensation")]
    parallel_compensation: Option<bool>,
    #[serde(default, rename = "max-parallelism")]
    max_parallelism: Option<usize>,
    #[serde(default, rename = "continue-on-error")]
    continue_on_error: Option<bool>,
    #[serde(default, rename = "timeout-secs")]
    timeout_secs: Option<u64>,
}

impl SagaPolicy {
    /// Load a policy from the `[saga]` table of a TOML document.
    ///
    /// Missing keys (or a missing table) fall back to the defaults.
    ///
    /// ```toml
    /// [saga]
    /// parallel-compensation = true
    /// max-parallelism = 8
    /// continue-on-error = false
    /// timeout-secs = 30
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys, and
    /// [`ConfigError::Invalid`] if the values fail builder validation.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let document: PolicyDocument = toml::from_str(content)?;
        let metadata = document.saga.unwrap_or_default();

        let mut builder = Self::builder();
        if let Some(parallel) = metadata.parallel_compensation {
            builder = builder.parallel_compensation(parallel);
        }
        if let Some(max) = metadata.max_parallelism {
            builder = builder.max_parallelism(max);
        }
        if let Some(continue_on_error) = metadata.continue_on_error {
            builder = builder.continue_on_error(continue_on_error);
        }
        if let Some(secs) = metadata.timeout_secs {
            builder = builder.parallel_timeout(Duration::from_secs(secs));
        }
        builder.build().map_err(ConfigError::Invalid)
    }

    /// Load a policy from a TOML file. See [`from_toml_str`](Self::from_toml_str).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, otherwise the
    /// errors of [`from_toml_str`](Self::from_toml_str).
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SagaError;

    #[test]
    fn empty_document_yields_default_policy() {
        let policy = SagaPolicy::from_toml_str("").expect("empty is valid");
        assert_eq!(policy, SagaPolicy::default());
    }

    #[test]
    fn unrelated_tables_are_ignored() {
        let policy = SagaPolicy::from_toml_str("[package]\nname = \"orders\"\n")
            .expect("no saga table");
        assert_eq!(policy, SagaPolicy::default());
    }

    #[test]
    fn saga_table_overrides_defaults() {
        let policy = SagaPolicy::from_toml_str(
            r"
[saga]
parallel-compensation = true
max-parallelism = 8
continue-on-error = false
timeout-secs = 30
",
        )
        .expect("valid policy");

        assert!(policy.parallel_compensation());
        assert_eq!(policy.max_parallelism(), 8);
        assert!(!policy.continue_on_error());
        assert_eq!(policy.parallel_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_table_keeps_remaining_defaults() {
        let policy = SagaPolicy::from_toml_str("[saga]\ncontinue-on-error = false\n")
            .expect("valid policy");

        assert!(!policy.continue_on_error());
        assert_eq!(policy.max_parallelism(), 16);
    }

    #[test]
    fn invalid_parallelism_is_reported() {
        let result = SagaPolicy::from_toml_str("[saga]\nmax-parallelism = 1\n");
        assert!(matches!(
            result,
            Err(ConfigError::Invalid(SagaError::InvalidArgument(_)))
        ));
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let result = SagaPolicy::from_toml_str("[saga]\nmax-paralellism = 4\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn negative_parallelism_is_a_parse_error() {
        let result = SagaPolicy::from_toml_str("[saga]\nmax-parallelism = -1\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
