// crates/portal-e2e-harness/src/driver.rs
// ============================================================================
// Module: Browser Driver Interfaces
// Description: Narrow browser and page seams used by the harness.
// Purpose: Decouple suite scripts from the concrete CDP driver.
// Dependencies: async-trait, serde_json
// ============================================================================

//! ## Overview
//! Suites only need a handful of browser primitives: open a tab, navigate,
//! read the URL and element text, type, click, evaluate a script, take a
//! screenshot and close. [`BrowserDriver`] and [`PageDriver`] capture exactly
//! that. The production implementation lives in [`crate::chrome`]; the
//! simulated portal implements the same traits for offline tests.
//!
//! ## Invariants
//! - Selectors are CSS selectors.
//! - `element_texts` returns an empty list when nothing matches; absence is
//!   not an error.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::HarnessError;

/// Page-level browser primitives.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigates to `url` and waits for the load to settle.
    async fn navigate(&self, url: &str) -> Result<(), HarnessError>;

    /// Returns the current page URL.
    async fn current_url(&self) -> Result<String, HarnessError>;

    /// Returns the rendered text of every element matching `selector`.
    async fn element_texts(&self, selector: &str) -> Result<Vec<String>, HarnessError>;

    /// Returns the `value` of the first input matching `selector`.
    async fn element_value(&self, selector: &str) -> Result<Option<String>, HarnessError>;

    /// Focuses the first element matching `selector` and types `text`.
    async fn type_into(&self, selector: &str, text: &str) -> Result<(), HarnessError>;

    /// Clicks the first element matching `selector`.
    async fn click(&self, selector: &str) -> Result<(), HarnessError>;

    /// Evaluates a JavaScript expression and returns its JSON value.
    async fn evaluate_json(&self, expression: &str) -> Result<Value, HarnessError>;

    /// Captures a full-page PNG screenshot.
    async fn screenshot_png(&self) -> Result<Vec<u8>, HarnessError>;

    /// Closes the tab.
    async fn close(&self) -> Result<(), HarnessError>;
}

/// Browser-level primitives.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Opens a new tab on `url`.
    async fn open_tab(&self, url: &str) -> Result<Box<dyn PageDriver>, HarnessError>;

    /// Stops the browser session.
    async fn stop(&self) -> Result<(), HarnessError>;
}
