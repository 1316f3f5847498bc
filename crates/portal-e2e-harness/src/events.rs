// crates/portal-e2e-harness/src/events.rs
// ============================================================================
// Module: Suite Event Log
// Description: Structured JSON-line events for suite execution.
// Purpose: Emit machine-readable progress logs without a logging framework.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The runner reports suite and case lifecycle through an [`EventSink`]. Sinks
//! serialize [`SuiteEvent`] values as single JSON lines so CI can route them
//! to whatever log pipeline it uses. Passwords and TOTP secrets never appear
//! in events.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Serialize;

use crate::artifacts::now_millis;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Lifecycle event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuiteEventKind {
    /// Suite setup is about to run.
    SuiteStarted,
    /// A case is about to run.
    CaseStarted,
    /// A case finished (see `outcome`).
    CaseFinished,
    /// A deadline screenshot was written.
    ScreenshotCaptured,
    /// A coverage dump was written.
    CoverageCollected,
    /// A tab could not be closed or coverage could not be read.
    TeardownWarning,
    /// Suite teardown completed.
    SuiteFinished,
}

/// Suite lifecycle event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteEvent {
    /// Event kind.
    pub event: SuiteEventKind,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u64,
    /// Suite name.
    pub suite: String,
    /// Case name when the event is case-scoped.
    pub case: Option<String>,
    /// Outcome label (`pass`, `fail`) for finished events.
    pub outcome: Option<String>,
    /// Free-form detail (error message or artifact path).
    pub detail: Option<String>,
}

impl SuiteEvent {
    /// Creates a suite-scoped event with a consistent timestamp.
    #[must_use]
    pub fn new(event: SuiteEventKind, suite: &str) -> Self {
        Self {
            event,
            timestamp_ms: now_millis(),
            suite: suite.to_string(),
            case: None,
            outcome: None,
            detail: None,
        }
    }

    /// Scopes the event to a case.
    #[must_use]
    pub fn with_case(mut self, case: &str) -> Self {
        self.case = Some(case.to_string());
        self
    }

    /// Attaches an outcome label.
    #[must_use]
    pub fn with_outcome(mut self, outcome: &str) -> Self {
        self.outcome = Some(outcome.to_string());
        self
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Sink for suite lifecycle events.
pub trait EventSink: Send + Sync {
    /// Record an event.
    fn record(&self, event: &SuiteEvent);
}

/// Event sink that logs JSON lines to stderr.
pub struct StderrEventSink;

impl EventSink for StderrEventSink {
    fn record(&self, event: &SuiteEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Event sink that logs JSON lines to a file.
pub struct FileEventSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileEventSink {
    /// Opens the event log in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl EventSink for FileEventSink {
    fn record(&self, event: &SuiteEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Event sink that keeps events in memory.
#[derive(Default)]
pub struct MemoryEventSink {
    /// Recorded events in order.
    events: Mutex<Vec<SuiteEvent>>,
}

impl MemoryEventSink {
    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SuiteEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: &SuiteEvent) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        clippy::unwrap_used,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use super::*;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let sink = FileEventSink::new(&path).unwrap();
        sink.record(&SuiteEvent::new(SuiteEventKind::SuiteStarted, "otp"));
        sink.record(
            &SuiteEvent::new(SuiteEventKind::CaseFinished, "otp")
                .with_case("should_fail_two_factor")
                .with_outcome("pass"),
        );

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "suite_started");
        assert_eq!(lines[1]["case"], "should_fail_two_factor");
        assert_eq!(lines[1]["outcome"], "pass");
    }

    #[test]
    fn memory_sink_preserves_order() {
        let sink = MemoryEventSink::default();
        sink.record(&SuiteEvent::new(SuiteEventKind::SuiteStarted, "otp"));
        sink.record(&SuiteEvent::new(SuiteEventKind::SuiteFinished, "otp"));
        let kinds: Vec<_> = sink.events().iter().map(|event| event.event).collect();
        assert_eq!(kinds, vec![SuiteEventKind::SuiteStarted, SuiteEventKind::SuiteFinished]);
    }
}
