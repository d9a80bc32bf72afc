//! Build configuration: `litbook.toml` merged with command-line overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_WIDTH: usize = 80;
const MIN_WIDTH: usize = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting `{0}`")]
    Missing(&'static str),

    #[error("invalid setting `{key}`: {message}")]
    Invalid { key: &'static str, message: String },
}

/// What to do with the rest of the build once a document fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPolicy {
    /// Cancel documents that have not finished yet.
    FailFast,
    /// Compile everything and report every failure.
    FailSlow,
}

/// Which interpreter backend executes the segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// The built-in Scala-flavoured interpreter.
    #[default]
    Builtin,
    /// An external program fed each session's code on stdin.
    Command {
        command: Vec<String>,
        language: String,
        #[serde(default = "default_comment_prefix")]
        comment_prefix: String,
    },
}

fn default_comment_prefix() -> String {
    "// ".to_string()
}

/// Settings as written in `litbook.toml` or given on the command line.
/// Every field is optional here; `resolve` enforces what is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub fail_fast: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub width: Option<usize>,
    pub incremental: Option<bool>,
    pub report: Option<PathBuf>,
    pub extensions: Option<Vec<String>>,
    pub backend: Option<BackendConfig>,
}

/// Fully resolved build settings.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub jobs: usize,
    pub fail_policy: FailPolicy,
    pub timeout: Duration,
    pub width: usize,
    pub incremental: bool,
    pub report: Option<PathBuf>,
    pub extensions: Vec<String>,
    pub backend: BackendConfig,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: ConfigFile) -> ConfigFile {
        ConfigFile {
            input: overrides.input.or(self.input),
            output: overrides.output.or(self.output),
            jobs: overrides.jobs.or(self.jobs),
            fail_fast: overrides.fail_fast.or(self.fail_fast),
            timeout_ms: overrides.timeout_ms.or(self.timeout_ms),
            width: overrides.width.or(self.width),
            incremental: overrides.incremental.or(self.incremental),
            report: overrides.report.or(self.report),
            extensions: overrides.extensions.or(self.extensions),
            backend: overrides.backend.or(self.backend),
        }
    }

    /// Check required settings and fill in the optional ones.
    ///
    /// Parallelism, the per-segment timeout and the fail policy have no
    /// default: a build must state them.
    pub fn resolve(self) -> Result<BuildConfig, ConfigError> {
        let input = self.input.ok_or(ConfigError::Missing("input"))?;
        let output = self.output.ok_or(ConfigError::Missing("output"))?;
        let jobs = self.jobs.ok_or(ConfigError::Missing("jobs"))?;
        let fail_fast = self.fail_fast.ok_or(ConfigError::Missing("fail_fast"))?;
        let timeout_ms = self.timeout_ms.ok_or(ConfigError::Missing("timeout_ms"))?;
        let width = self.width.unwrap_or(DEFAULT_WIDTH);
        let extensions = self.extensions.unwrap_or_else(|| vec!["md".to_string()]);
        let backend = self.backend.unwrap_or_default();

        if jobs == 0 {
            return Err(invalid("jobs", "must be at least 1"));
        }
        if timeout_ms == 0 {
            return Err(invalid("timeout_ms", "must be at least 1"));
        }
        if width < MIN_WIDTH {
            return Err(invalid("width", format!("must be at least {}", MIN_WIDTH)));
        }
        if extensions.is_empty() {
            return Err(invalid("extensions", "must name at least one extension"));
        }
        if let BackendConfig::Command {
            command, language, ..
        } = &backend
        {
            if command.is_empty() {
                return Err(invalid("backend.command", "must name a program"));
            }
            if language.is_empty() {
                return Err(invalid("backend.language", "must not be empty"));
            }
        }

        Ok(BuildConfig {
            input,
            output,
            jobs,
            fail_policy: if fail_fast {
                FailPolicy::FailFast
            } else {
                FailPolicy::FailSlow
            },
            timeout: Duration::from_millis(timeout_ms),
            width,
            incremental: self.incremental.unwrap_or(false),
            report: self.report,
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_string())
                .collect(),
            backend,
        })
    }
}

fn invalid(key: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        message: message.into(),
    }
}
