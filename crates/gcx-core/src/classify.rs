//! First-match-wins line classification.

use std::collections::BTreeMap;

use crate::decorator::{Decorator, parse_decorator};
use crate::registry::RuleRegistry;

/// A line matched by a rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleMatch {
    /// Position of the matching rule in the registry.
    pub rule_index: usize,
    /// Named capture groups that participated in the match.
    pub fields: BTreeMap<String, String>,
    pub decorator: Decorator,
    /// The line had a bracketed prefix that could not be parsed.
    pub malformed_decorator: bool,
}

/// Outcome of classifying one line.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    Matched(RuleMatch),
    /// No rule matched. This is a normal outcome for banners and unsupported
    /// formats, never an error.
    Unknown {
        line: String,
        malformed_decorator: bool,
    },
}

impl Classification {
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown { .. })
    }
}

/// Classifies a line against `registry`, returning the first matching rule.
///
/// Pure function of the line and the registry.
pub fn classify(registry: &RuleRegistry, line: &str) -> Classification {
    let parsed = parse_decorator(line);

    for (rule_index, rule) in registry.rules().iter().enumerate() {
        let pattern = rule.pattern();
        let Some(caps) = pattern.captures(parsed.body) else {
            continue;
        };

        let fields = pattern
            .capture_names()
            .flatten()
            .filter_map(|name| {
                caps.name(name)
                    .map(|m| (name.to_string(), m.as_str().to_string()))
            })
            .collect();

        return Classification::Matched(RuleMatch {
            rule_index,
            fields,
            decorator: parsed.decorator,
            malformed_decorator: parsed.malformed,
        });
    }

    tracing::trace!(line, "no rule matched");
    Classification::Unknown {
        line: line.to_string(),
        malformed_decorator: parsed.malformed,
    }
}
