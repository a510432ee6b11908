//! The ordered rule registry.
//!
//! Rules are evaluated in registry order and the first match wins, so more
//! specific signatures must be registered ahead of generic ones. The
//! registry is immutable once built.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use figment::Figment;
use figment::providers::{Format, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalogue::BUILTIN_RULES;
use crate::event_kind::EventKind;
use crate::rule::{EventRule, RuleSpec};

/// Errors raised while building a registry. All of them are fatal
/// configuration errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid pattern for {kind} rule `{pattern}`: {source}")]
    InvalidPattern {
        kind: EventKind,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("rules {first} and {second} share the pattern `{pattern}` and cannot be ordered")]
    DuplicatePattern {
        first: usize,
        second: usize,
        pattern: String,
    },

    #[error("rule catalogue is empty")]
    Empty,

    #[error("failed to read rule catalogue {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rule catalogue: {0}")]
    Parse(#[from] Box<figment::Error>),
}

/// On-disk shape of a rule catalogue (`[[rules]]` tables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleFile {
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

static BUILTIN: LazyLock<RuleRegistry> = LazyLock::new(|| {
    let rules = BUILTIN_RULES
        .iter()
        .map(|&(kind, pattern, endstamp, throwaway)| {
            EventRule::new(kind, pattern, endstamp, throwaway)
        })
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    RuleRegistry::new(rules).unwrap()
});

/// An ordered, validated list of classification rules.
#[derive(Debug, Clone)]
pub struct RuleRegistry {
    rules: Vec<EventRule>,
}

impl RuleRegistry {
    /// Builds a registry, rejecting structurally identical patterns.
    pub fn new(rules: Vec<EventRule>) -> Result<Self, RegistryError> {
        if rules.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut seen: HashMap<&str, usize> = HashMap::with_capacity(rules.len());
        for (index, rule) in rules.iter().enumerate() {
            let pattern = rule.pattern().as_str();
            if let Some(&first) = seen.get(pattern) {
                return Err(RegistryError::DuplicatePattern {
                    first,
                    second: index,
                    pattern: pattern.to_string(),
                });
            }
            seen.insert(pattern, index);
        }

        Ok(Self { rules })
    }

    /// Builds a registry from declarative rule specs.
    pub fn from_specs(specs: &[RuleSpec]) -> Result<Self, RegistryError> {
        let rules = specs
            .iter()
            .map(EventRule::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(rules)
    }

    /// Loads a TOML rule catalogue.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let contents = std::fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let file: RuleFile = Figment::from(Toml::string(&contents))
            .extract()
            .map_err(Box::new)?;
        tracing::debug!(path = ?path, rules = file.rules.len(), "loaded rule catalogue");
        Self::from_specs(&file.rules)
    }

    /// The built-in catalogue of representative HotSpot signatures.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    pub fn rules(&self) -> &[EventRule] {
        &self.rules
    }

    pub fn get(&self, index: usize) -> Option<&EventRule> {
        self.rules.get(index)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
