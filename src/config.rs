//! Hierarchical key/value settings store (§6, SPEC_FULL.md §10).
//!
//! Configuration is a TOML document with a `[processor.<name>]` table per processor,
//! matching the `Processor/<name>/<key>` grouping convention. Unknown keys are ignored
//! rather than rejected.

use crate::error::{CassError, CassResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One processor's configuration table: a kind string plus an arbitrary key/value bag. The
/// bag is parsed by each processor's own `load()`/`loadSettings()` as it sees fit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProcessorConfig {
    pub kind: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub hide: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default, flatten)]
    pub values: HashMap<String, toml::Value>,
}

impl ProcessorConfig {
    pub fn get_str(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.values
            .get(key)
            .and_then(|v| v.as_float().or_else(|| v.as_integer().map(|i| i as f64)))
            .unwrap_or(default)
    }

    pub fn get_usize(&self, key: &str, default: usize) -> usize {
        self.values
            .get(key)
            .and_then(|v| v.as_integer())
            .map(|i| i as usize)
            .unwrap_or(default)
    }

    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(|v| v.as_integer())
            .unwrap_or(default)
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.values
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub activate: Vec<String>,
}

fn default_workers() -> usize {
    4
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub processor: HashMap<String, ProcessorConfig>,
}

impl Settings {
    pub fn load(path: impl AsRef<Path>) -> CassResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> CassResult<Self> {
        toml::from_str(text).map_err(|e| CassError::BadConfig {
            processor: "<root>".into(),
            reason: e.to_string(),
        })
    }

    pub fn processor(&self, name: &str) -> CassResult<&ProcessorConfig> {
        self.processor.get(name).ok_or_else(|| CassError::BadConfig {
            processor: name.into(),
            reason: "no [processor.<name>] table found".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_document() {
        let text = r#"
            [general]
            workers = 8
            activate = ["pp1"]

            [processor.pp1]
            kind = "Algebra"
            dependencies = ["pp2", "pp3"]
            operation = "+"
        "#;
        let settings = Settings::parse(text).unwrap();
        assert_eq!(settings.general.workers, 8);
        let pp1 = settings.processor("pp1").unwrap();
        assert_eq!(pp1.kind, "Algebra");
        assert_eq!(pp1.get_str("operation", ""), "+");
    }

    #[test]
    fn unknown_keys_are_ignored_not_rejected() {
        let text = r#"
            [processor.pp1]
            kind = "Constant"
            totally_unrecognized_key = 42
        "#;
        let settings = Settings::parse(text).unwrap();
        assert_eq!(settings.processor("pp1").unwrap().kind, "Constant");
    }
}
