// crates/portal-e2e-harness/src/artifacts.rs
// ============================================================================
// Module: Suite Artifacts
// Description: Artifact helpers for browser suites.
// Purpose: Create per-suite run roots, store screenshots and coverage, and
//          write deterministic summaries.
// Dependencies: serde, serde_jcs, uuid
// ============================================================================

//! ## Overview
//! Every suite run writes into its own artifact root:
//!
//! - `screenshots/<label>.png` for steps that missed their deadline
//! - `summary.json` (JCS-canonical) and `summary.md` for the report
//!
//! Frontend coverage goes to a separate directory as
//! `coverage-<uuid>.json`, one file per closed tab.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;

use crate::config::PortalTestConfig;

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    duration_millis(SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default())
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
///
/// Reports stay on `u64`; `serde_jcs` cannot serialize `u128`.
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Default run root when none is configured.
fn default_run_root(suite: &str) -> PathBuf {
    let stamp = now_millis();
    PathBuf::from("target/portal-e2e").join(format!("run_{stamp}")).join(suite)
}

/// Artifact manager for a single suite run.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    /// Root directory for the suite's artifacts.
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates the artifact root for `suite` under the configured run root.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn new(config: &PortalTestConfig, suite: &str) -> io::Result<Self> {
        let root = config
            .run_root
            .as_ref()
            .map_or_else(|| default_run_root(suite), |run_root| run_root.join(suite));
        Self::at(root)
    }

    /// Uses `root` as the artifact directory, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn at(root: PathBuf) -> io::Result<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
        })
    }

    /// Returns the root directory for the suite artifacts.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a JSON artifact using canonical JCS serialization.
    ///
    /// # Errors
    ///
    /// Returns an error when serialization or the write fails.
    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> io::Result<PathBuf> {
        let bytes = serde_jcs::to_vec(value).map_err(|err| io::Error::other(err.to_string()))?;
        self.write_bytes(name, &bytes)
    }

    /// Writes a text artifact with UTF-8 encoding.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub fn write_text(&self, name: &str, value: &str) -> io::Result<PathBuf> {
        self.write_bytes(name, value.as_bytes())
    }

    /// Writes a binary artifact at `name`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Writes a screenshot for `label` under `screenshots/`.
    ///
    /// # Errors
    ///
    /// Returns an error when the write fails.
    pub fn write_screenshot(&self, label: &str, png: &[u8]) -> io::Result<PathBuf> {
        self.write_bytes(&format!("screenshots/{}.png", sanitize(label)), png)
    }
}

/// Writes a frontend coverage dump as `coverage-<uuid>.json` into `dir`.
///
/// # Errors
///
/// Returns an error when the directory or file cannot be written.
pub fn write_coverage(dir: &Path, coverage: &Value) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("coverage-{}.json", uuid::Uuid::new_v4()));
    let bytes = serde_json::to_vec(coverage).map_err(|err| io::Error::other(err.to_string()))?;
    fs::write(&path, bytes)?;
    Ok(path)
}

/// Replaces path-hostile characters in artifact labels.
fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Final status of a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    /// Case passed.
    Pass,
    /// Case failed (assertion, wait, deadline or browser error).
    Fail,
}

impl CaseStatus {
    /// Returns a stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
        }
    }
}

/// Outcome of a single case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseOutcome {
    /// Case name.
    pub name: String,
    /// Final status.
    pub status: CaseStatus,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Failure message when the case failed.
    pub error: Option<String>,
    /// Artifact paths produced by the case, relative to the run root when possible.
    pub artifacts: Vec<String>,
}

/// Summary of a suite run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteReport {
    /// Suite name.
    pub suite: String,
    /// Suite start (milliseconds since epoch).
    pub started_at_ms: u64,
    /// Suite end (milliseconds since epoch).
    pub ended_at_ms: u64,
    /// Failure during suite setup, if any.
    pub setup_error: Option<String>,
    /// Artifact paths produced by suite setup.
    pub setup_artifacts: Vec<String>,
    /// Case outcomes in execution order.
    pub cases: Vec<CaseOutcome>,
}

impl SuiteReport {
    /// Returns the names of failed cases.
    #[must_use]
    pub fn failed_cases(&self) -> Vec<String> {
        self.cases
            .iter()
            .filter(|case| case.status == CaseStatus::Fail)
            .map(|case| case.name.clone())
            .collect()
    }

    /// Returns true when setup succeeded and every case passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.setup_error.is_none() && self.failed_cases().is_empty()
    }

    /// Persists `summary.json` and `summary.md` into `artifacts`.
    ///
    /// # Errors
    ///
    /// Returns an error when either file cannot be written.
    pub fn write(&self, artifacts: &ArtifactStore) -> io::Result<()> {
        artifacts.write_json("summary.json", self)?;
        artifacts.write_text("summary.md", &self.markdown())?;
        Ok(())
    }

    /// Renders a human-readable summary.
    #[must_use]
    pub fn markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Portal Suite Summary\n\n");
        out.push_str("## Status\n\n");
        let _ = writeln!(out, "- Suite: {}", self.suite);
        let _ = writeln!(out, "- Status: {}", if self.passed() { "pass" } else { "fail" });
        let _ = writeln!(
            out,
            "- Duration (ms): {}",
            self.ended_at_ms.saturating_sub(self.started_at_ms)
        );
        if let Some(error) = &self.setup_error {
            let _ = writeln!(out, "- Setup error: {error}");
        }
        for artifact in &self.setup_artifacts {
            let _ = writeln!(out, "  - {artifact}");
        }
        out.push_str("\n## Cases\n\n");
        if self.cases.is_empty() {
            out.push_str("- None\n");
        }
        for case in &self.cases {
            let _ =
                write!(out, "- {} [{}] {} ms", case.name, case.status.as_str(), case.duration_ms);
            if let Some(error) = &case.error {
                let _ = write!(out, ": {error}");
            }
            out.push('\n');
            for artifact in &case.artifacts {
                let _ = writeln!(out, "  - {artifact}");
            }
        }
        out
    }
}
