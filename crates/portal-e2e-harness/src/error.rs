// crates/portal-e2e-harness/src/error.rs
// ============================================================================
// Module: Harness Errors
// Description: Error taxonomy for browser-driven portal suites.
// Purpose: Give assertion, wait, deadline and browser failures stable variants.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every fallible harness operation returns [`HarnessError`]. Failures are
//! terminal for the current case; the runner never retries.

use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised by the harness and the suites built on it.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The browser session could not be started, driven, or stopped.
    #[error("browser failure: {0}")]
    Browser(String),
    /// A page interaction failed (navigation, typing, clicking, scripting).
    #[error("page interaction failed ({action}): {message}")]
    Page {
        /// Interaction label.
        action: &'static str,
        /// Underlying driver message.
        message: String,
    },
    /// An expected element never appeared.
    #[error("element {selector} not found within {waited:?}")]
    ElementTimeout {
        /// CSS selector that was polled.
        selector: String,
        /// Time spent waiting.
        waited: Duration,
    },
    /// An expectation about page state did not hold.
    #[error("assertion failed: {what} (expected {expected}, got {actual})")]
    Assertion {
        /// Description of the checked property.
        what: String,
        /// Expected value.
        expected: String,
        /// Observed value.
        actual: String,
    },
    /// A guarded step exceeded its time budget.
    #[error("{label} exceeded its deadline of {budget:?}")]
    DeadlineExceeded {
        /// Label of the guarded step.
        label: String,
        /// Budget that elapsed.
        budget: Duration,
    },
    /// The one-time password could not be parsed or generated.
    #[error("one-time password failure: {0}")]
    Otp(String),
    /// No registered one-time password exists for the user.
    #[error("no one-time password registered for {0}")]
    MissingCredential(String),
    /// A URL could not be built or parsed.
    #[error("invalid url: {0}")]
    Url(String),
    /// Artifact or event output failed.
    #[error("artifact io failure: {0}")]
    Io(#[from] std::io::Error),
    /// One or more suite cases failed.
    #[error("suite {suite} failed: {}", failed.join(", "))]
    SuiteFailed {
        /// Suite name.
        suite: String,
        /// Names of failed cases.
        failed: Vec<String>,
    },
}

impl HarnessError {
    /// Builds a page interaction error from any displayable driver error.
    pub fn page(action: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Page {
            action,
            message: err.to_string(),
        }
    }

    /// Builds an assertion error.
    pub fn assertion(
        what: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Assertion {
            what: what.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}
