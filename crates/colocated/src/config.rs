//! TOML configuration for `colocated`.
//!
//! Every setting has a default, so running without a config file works
//! against a dump of a stock cluster.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Where the agency dump comes from.
    pub agency: AgencySection,
    /// How move jobs are written.
    pub jobs: JobsSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[agency]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgencySection {
    /// Top-level key of the agency tree, `"arango"` on a stock cluster.
    pub prefix: String,
    /// Agency dump to read. `-` or unset reads stdin.
    pub snapshot: Option<PathBuf>,
}

impl Default for AgencySection {
    fn default() -> Self {
        Self {
            prefix: "arango".to_string(),
            snapshot: None,
        }
    }
}

/// `[jobs]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct JobsSection {
    /// Value of the `creator` field of emitted jobs.
    pub creator: String,
    /// ID of the first emitted job; later jobs count up from it.
    pub id_start: u64,
}

impl Default for JobsSection {
    fn default() -> Self {
        Self {
            creator: "colocated".to_string(),
            id_start: 1,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// The configured snapshot path, unless it means stdin.
    pub fn snapshot_path(&self) -> Option<&Path> {
        self.agency
            .snapshot
            .as_deref()
            .filter(|p| p.as_os_str() != "-")
    }
}
