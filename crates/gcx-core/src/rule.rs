//! Classification rules.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::event_kind::EventKind;
use crate::registry::RegistryError;

/// A rule as written in a rule catalogue file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub kind: EventKind,
    pub pattern: String,
    /// The line's timestamp marks the end of the operation, not its start.
    #[serde(default)]
    pub endstamp: bool,
    /// The line carries no analytical value; it exists only to keep the
    /// line out of the unknown bucket.
    #[serde(default)]
    pub throwaway: bool,
}

/// A compiled, immutable classification rule.
///
/// The pattern is matched against the line body (the text after any
/// decorator). Named capture groups become event fields; the engine gives
/// meaning to `gc_id`, `trigger`, `pause_ms`, `pause_s`, `pause_ns`,
/// `datestamp` and `uptime`.
#[derive(Debug, Clone)]
pub struct EventRule {
    kind: EventKind,
    pattern: Regex,
    endstamp: bool,
    throwaway: bool,
}

impl EventRule {
    /// Compiles a rule.
    pub fn new(
        kind: EventKind,
        pattern: &str,
        endstamp: bool,
        throwaway: bool,
    ) -> Result<Self, RegistryError> {
        let pattern = Regex::new(pattern).map_err(|source| RegistryError::InvalidPattern {
            kind,
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            kind,
            pattern,
            endstamp,
            throwaway,
        })
    }

    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    pub const fn pattern(&self) -> &Regex {
        &self.pattern
    }

    pub const fn endstamp(&self) -> bool {
        self.endstamp
    }

    pub const fn throwaway(&self) -> bool {
        self.throwaway
    }

    /// Converts back to the declarative form.
    pub fn to_spec(&self) -> RuleSpec {
        RuleSpec {
            kind: self.kind,
            pattern: self.pattern.as_str().to_string(),
            endstamp: self.endstamp,
            throwaway: self.throwaway,
        }
    }
}

impl TryFrom<&RuleSpec> for EventRule {
    type Error = RegistryError;

    fn try_from(spec: &RuleSpec) -> Result<Self, Self::Error> {
        Self::new(spec.kind, &spec.pattern, spec.endstamp, spec.throwaway)
    }
}
