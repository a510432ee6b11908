//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use gcx_core::{AnalyzeOptions, DoubleStartPolicy, GroupBy, RegistryError, RuleRegistry};

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Rule catalogue replacing the built-in rules.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,

    pub group_by: GroupBy,

    pub double_start: DoubleStartPolicy,

    /// Count pauses that never ended as zero-length pauses.
    pub include_incomplete: bool,

    /// Worker threads for multi-file analysis; all cores when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // GCX_GROUP_BY, GCX_RULES_PATH, ...
        figment = figment.merge(Env::prefixed("GCX_"));

        figment.extract()
    }

    pub fn analyze_options(&self) -> AnalyzeOptions {
        AnalyzeOptions {
            group_by: self.group_by,
            double_start: self.double_start,
            include_incomplete: self.include_incomplete,
            epoch: None,
        }
    }

    /// The configured rule catalogue, or the built-in one.
    pub fn registry(&self) -> Result<RuleRegistry, RegistryError> {
        match &self.rules_path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading rule catalogue");
                RuleRegistry::load(path)
            }
            None => Ok(RuleRegistry::builtin()),
        }
    }
}

/// Returns the platform-specific config directory for gcx.
///
/// On Linux: `~/.config/gcx`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("gcx"))
}
