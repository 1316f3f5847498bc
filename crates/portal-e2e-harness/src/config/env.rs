// crates/portal-e2e-harness/src/config/env.rs
// ============================================================================
// Module: Portal Test Environment
// Description: Environment-backed configuration for portal suites.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 fails closed. An optional TOML file supplies
//! defaults; any environment value set for the same key wins.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Default base domain of the portal test environment.
pub const DEFAULT_BASE_DOMAIN: &str = "example.com:8080";

/// Environment keys for portal suite configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalTestEnv {
    /// Optional TOML configuration file.
    ConfigPath,
    /// Base domain shared by the portal hosts (`host:port`).
    BaseDomain,
    /// Optional path prefix the portal is served under.
    PathPrefix,
    /// Optional Chrome/Chromium executable path.
    BrowserPath,
    /// Run the browser with a visible window (`true`/`false` or `1`/`0`).
    Headful,
    /// Optional artifact run root override.
    RunRoot,
    /// Optional timeout override in seconds (positive integer).
    TimeoutSeconds,
    /// Optional directory receiving frontend coverage dumps.
    CoverageDir,
    /// Optional JSON-lines event log path.
    EventLog,
    /// Skip browser suites (`true`/`false` or `1`/`0`).
    Short,
}

impl PortalTestEnv {
    /// All keys, in documentation order.
    pub const ALL: [Self; 10] = [
        Self::ConfigPath,
        Self::BaseDomain,
        Self::PathPrefix,
        Self::BrowserPath,
        Self::Headful,
        Self::RunRoot,
        Self::TimeoutSeconds,
        Self::CoverageDir,
        Self::EventLog,
        Self::Short,
    ];

    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigPath => "PORTAL_E2E_CONFIG",
            Self::BaseDomain => "PORTAL_E2E_BASE_DOMAIN",
            Self::PathPrefix => "PORTAL_E2E_PATH_PREFIX",
            Self::BrowserPath => "PORTAL_E2E_BROWSER_PATH",
            Self::Headful => "PORTAL_E2E_HEADFUL",
            Self::RunRoot => "PORTAL_E2E_RUN_ROOT",
            Self::TimeoutSeconds => "PORTAL_E2E_TIMEOUT_SEC",
            Self::CoverageDir => "PORTAL_E2E_COVERAGE_DIR",
            Self::EventLog => "PORTAL_E2E_EVENT_LOG",
            Self::Short => "PORTAL_E2E_SHORT",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Value is not valid UTF-8.
    #[error("{0} must be valid UTF-8")]
    InvalidUtf8(String),
    /// Value is set but empty.
    #[error("{0} must not be empty")]
    Empty(String),
    /// Value failed validation.
    #[error("{name} {reason}")]
    Invalid {
        /// Key name.
        name: String,
        /// Validation failure.
        reason: String,
    },
    /// Configuration file could not be read or parsed.
    #[error("config file {path}: {message}")]
    File {
        /// File path.
        path: String,
        /// Read or parse failure.
        message: String,
    },
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed portal suite configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalTestConfig {
    /// Base domain shared by home, admin and login hosts.
    pub base_domain: String,
    /// Optional path prefix (starts with `/`, no trailing slash).
    pub path_prefix: Option<String>,
    /// Optional browser executable.
    pub browser_path: Option<PathBuf>,
    /// Show the browser window instead of running headless.
    pub headful: bool,
    /// Optional artifact run root.
    pub run_root: Option<PathBuf>,
    /// Optional minimum timeout applied to every budget.
    pub timeout: Option<Duration>,
    /// Optional coverage output directory.
    pub coverage_dir: Option<PathBuf>,
    /// Optional JSON-lines event log.
    pub event_log: Option<PathBuf>,
    /// Skip browser suites.
    pub short: bool,
}

impl Default for PortalTestConfig {
    fn default() -> Self {
        Self {
            base_domain: DEFAULT_BASE_DOMAIN.to_string(),
            path_prefix: None,
            browser_path: None,
            headful: false,
            run_root: None,
            timeout: None,
            coverage_dir: None,
            event_log: None,
            short: false,
        }
    }
}

/// File-backed configuration layer.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PortalTestFile {
    /// Base domain override.
    pub base_domain: Option<String>,
    /// Path prefix override.
    pub path_prefix: Option<String>,
    /// Browser executable override.
    pub browser_path: Option<PathBuf>,
    /// Headful override.
    pub headful: Option<bool>,
    /// Run root override.
    pub run_root: Option<PathBuf>,
    /// Timeout override in seconds.
    pub timeout_sec: Option<u64>,
    /// Coverage directory override.
    pub coverage_dir: Option<PathBuf>,
    /// Event log override.
    pub event_log: Option<PathBuf>,
    /// Short-mode override.
    pub short: Option<bool>,
}

impl PortalTestFile {
    /// Reads and parses a TOML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::File`] when the file cannot be read or parsed.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let file_error = |message: String| ConfigError::File {
            path: path.display().to_string(),
            message,
        };
        let raw = std::fs::read_to_string(path).map_err(|err| file_error(err.to_string()))?;
        toml::from_str(&raw).map_err(|err| file_error(err.to_string()))
    }
}

impl PortalTestConfig {
    /// Loads configuration from the optional file and environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8, is empty,
    /// or fails validation, or when the configuration file is unreadable.
    pub fn load() -> Result<Self, ConfigError> {
        let file = match read_env_nonempty(PortalTestEnv::ConfigPath.as_str())? {
            Some(path) => PortalTestFile::read(Path::new(&path))?,
            None => PortalTestFile::default(),
        };
        Self::from_layers(file)
    }

    /// Resolves configuration with environment values overriding `file`.
    ///
    /// # Errors
    ///
    /// Returns an error when any resulting value fails validation.
    pub fn from_layers(file: PortalTestFile) -> Result<Self, ConfigError> {
        let base_domain = read_env_nonempty(PortalTestEnv::BaseDomain.as_str())?
            .or(file.base_domain)
            .unwrap_or_else(|| DEFAULT_BASE_DOMAIN.to_string());
        validate_base_domain(&base_domain)?;
        let path_prefix = read_env_nonempty(PortalTestEnv::PathPrefix.as_str())?
            .or(file.path_prefix)
            .map(|prefix| normalize_path_prefix(&prefix))
            .transpose()?
            .flatten();
        let browser_path = read_env_nonempty(PortalTestEnv::BrowserPath.as_str())?
            .map(PathBuf::from)
            .or(file.browser_path);
        let headful = parse_bool_env(
            PortalTestEnv::Headful.as_str(),
            read_env_nonempty(PortalTestEnv::Headful.as_str())?,
        )?
        .or(file.headful)
        .unwrap_or(false);
        let run_root = read_env_nonempty(PortalTestEnv::RunRoot.as_str())?
            .map(PathBuf::from)
            .or(file.run_root);
        let timeout = match read_env_nonempty(PortalTestEnv::TimeoutSeconds.as_str())? {
            Some(raw) => Some(parse_timeout_seconds(PortalTestEnv::TimeoutSeconds.as_str(), &raw)?),
            None => file
                .timeout_sec
                .map(|secs| {
                    parse_timeout_seconds(PortalTestEnv::TimeoutSeconds.as_str(), &secs.to_string())
                })
                .transpose()?,
        };
        let coverage_dir = read_env_nonempty(PortalTestEnv::CoverageDir.as_str())?
            .map(PathBuf::from)
            .or(file.coverage_dir);
        let event_log = read_env_nonempty(PortalTestEnv::EventLog.as_str())?
            .map(PathBuf::from)
            .or(file.event_log);
        let short = parse_bool_env(
            PortalTestEnv::Short.as_str(),
            read_env_nonempty(PortalTestEnv::Short.as_str())?,
        )?
        .or(file.short)
        .unwrap_or(false);
        Ok(Self {
            base_domain,
            path_prefix,
            browser_path,
            headful,
            run_root,
            timeout,
            coverage_dir,
            event_log,
            short,
        })
    }

    /// Returns the effective budget for a step.
    ///
    /// The configured override acts as a minimum so explicitly longer budgets
    /// are never shortened.
    #[must_use]
    pub fn effective_timeout(&self, requested: Duration) -> Duration {
        self.timeout.map_or(requested, |minimum| requested.max(minimum))
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, ConfigError> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| ConfigError::InvalidUtf8(name.to_string()))
    })
}

/// Reads an environment variable and rejects empty values.
///
/// # Errors
///
/// Returns an error when the variable is set but empty or whitespace.
fn read_env_nonempty(name: &str) -> Result<Option<String>, ConfigError> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty(name.to_string())),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Builds a validation error for `name`.
fn invalid(name: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

/// Parses a positive timeout value from a string.
///
/// # Errors
///
/// Returns an error when the value is missing, non-numeric, or zero.
fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(invalid(name, "must be a positive integer number of seconds"));
    }
    let secs: u64 = trimmed
        .parse()
        .map_err(|_| invalid(name, "must be a positive integer number of seconds"))?;
    if secs == 0 {
        return Err(invalid(name, "must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Parses an optional boolean environment variable.
///
/// # Errors
///
/// Returns an error when the value is not a recognized boolean literal.
fn parse_bool_env(name: &str, raw: Option<String>) -> Result<Option<bool>, ConfigError> {
    let Some(value) = raw else {
        return Ok(None);
    };
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        return Ok(Some(true));
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        return Ok(Some(false));
    }
    Err(invalid(name, "must be 1, 0, true, or false"))
}

/// Rejects base domains that carry a scheme or path.
fn validate_base_domain(domain: &str) -> Result<(), ConfigError> {
    let name = PortalTestEnv::BaseDomain.as_str();
    if domain.trim().is_empty() {
        return Err(ConfigError::Empty(name.to_string()));
    }
    if domain.contains("://") || domain.contains('/') {
        return Err(invalid(name, "must be a bare host[:port] without scheme or path"));
    }
    Ok(())
}

/// Normalizes a path prefix to `/segment` form; `/` alone means no prefix.
fn normalize_path_prefix(raw: &str) -> Result<Option<String>, ConfigError> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('/') {
        return Err(invalid(PortalTestEnv::PathPrefix.as_str(), "must start with '/'"));
    }
    let without_trailing = trimmed.trim_end_matches('/');
    if without_trailing.is_empty() {
        return Ok(None);
    }
    Ok(Some(without_trailing.to_string()))
}
