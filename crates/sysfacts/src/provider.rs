//! Fact providers - keyed records with sentinel extraction.
//!
//! A provider models one record returned by an external query (a parsed
//! lscpu table, an os-release file). Lookups can fail or come back
//! absent; the extractors below absorb both and substitute a fixed
//! sentinel, so a single missing field can never abort report assembly.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel for a string fact that could not be obtained.
pub const NOT_AVAILABLE: &str = "n/a";

/// Lookup failure raised by a fact provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider query failed: {0}")]
    Query(String),
}

/// One record of named facts: indexed lookup plus a present/absent signal.
pub trait FactProvider {
    fn get(&self, key: &str) -> Result<Option<String>, ProviderError>;
}

/// Map-backed fact record, the canonical provider implementation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactRecord(HashMap<String, String>);

impl FactRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FactProvider for FactRecord {
    fn get(&self, key: &str) -> Result<Option<String>, ProviderError> {
        Ok(self.0.get(key).cloned())
    }
}

/// Look up `key`, substituting `"n/a"` when the provider fails or the
/// value is absent. Never propagates the lookup error.
pub fn string_value(provider: &impl FactProvider, key: &str) -> String {
    match provider.get(key) {
        Ok(Some(value)) => value,
        _ => NOT_AVAILABLE.to_string(),
    }
}

/// Integer variant of [`string_value`]: `0` when the value is absent,
/// the provider fails, or the value does not parse.
pub fn u64_value(provider: &impl FactProvider, key: &str) -> u64 {
    match provider.get(key) {
        Ok(Some(value)) => value.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    impl FactProvider for FailingProvider {
        fn get(&self, _key: &str) -> Result<Option<String>, ProviderError> {
            Err(ProviderError::Query("instrumentation unavailable".into()))
        }
    }

    #[test]
    fn test_string_value_present() {
        let mut record = FactRecord::new();
        record.insert("Model name", "AMD Ryzen 7 5800X");
        assert_eq!(string_value(&record, "Model name"), "AMD Ryzen 7 5800X");
    }

    #[test]
    fn test_string_value_absent() {
        let record = FactRecord::new();
        assert_eq!(string_value(&record, "Model name"), NOT_AVAILABLE);
    }

    #[test]
    fn test_string_value_failing_provider() {
        assert_eq!(string_value(&FailingProvider, "anything"), NOT_AVAILABLE);
    }

    #[test]
    fn test_u64_value_present() {
        let mut record = FactRecord::new();
        record.insert("CommitLimit", " 16384 ");
        assert_eq!(u64_value(&record, "CommitLimit"), 16384);
    }

    #[test]
    fn test_u64_value_absent() {
        let record = FactRecord::new();
        assert_eq!(u64_value(&record, "CommitLimit"), 0);
    }

    #[test]
    fn test_u64_value_unparsable() {
        let mut record = FactRecord::new();
        record.insert("CommitLimit", "lots");
        assert_eq!(u64_value(&record, "CommitLimit"), 0);
    }

    #[test]
    fn test_u64_value_failing_provider() {
        assert_eq!(u64_value(&FailingProvider, "anything"), 0);
    }
}
