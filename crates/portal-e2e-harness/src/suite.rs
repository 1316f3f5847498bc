// crates/portal-e2e-harness/src/suite.rs
// ============================================================================
// Module: Suite Runner
// Description: Lifecycle hooks, deadlines and teardown for browser suites.
// Purpose: Run suite cases sequentially against one browser session.
// Dependencies: async-trait, tokio
// ============================================================================

//! ## Overview
//! A [`Suite`] declares its cases as a typed enum and implements per-suite and
//! per-case hooks. [`run_suite`] drives the lifecycle:
//!
//! 1. open a tab on home and run `setup_suite` under its budget
//! 2. for each case: open a tab on home, run `setup_test`, run the case under
//!    its budget, collect coverage, close the tab
//! 3. stop the browser and persist the [`SuiteReport`]
//!
//! Deadline expiry captures a screenshot of the tab before failing the step.
//! Cases run one at a time; they share the browser and the credential store.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::artifacts::ArtifactStore;
use crate::artifacts::CaseOutcome;
use crate::artifacts::CaseStatus;
use crate::artifacts::duration_millis;
use crate::artifacts::SuiteReport;
use crate::artifacts::now_millis;
use crate::artifacts::write_coverage;
use crate::config::PortalTestConfig;
use crate::driver::BrowserDriver;
use crate::error::HarnessError;
use crate::events::EventSink;
use crate::events::FileEventSink;
use crate::events::StderrEventSink;
use crate::events::SuiteEvent;
use crate::events::SuiteEventKind;
use crate::otp::CredentialStore;
use crate::tab::Tab;
use crate::urls::PortalUrls;
use crate::wait::WaitPolicy;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default budget for `setup_suite`.
pub const DEFAULT_SETUP_BUDGET: Duration = Duration::from_secs(30);
/// Upper bound for the deadline screenshot itself.
const SCREENSHOT_TIMEOUT: Duration = Duration::from_secs(10);
/// Script reading the instrumented frontend coverage.
const COVERAGE_EXPRESSION: &str = "window.__coverage__ ?? null";
/// Label used for suite setup in events and artifacts.
const SETUP_LABEL: &str = "setup_suite";

// ============================================================================
// SECTION: Context
// ============================================================================

/// Shared state handed to every suite hook.
pub struct SuiteContext {
    /// Suite name used in events and artifacts.
    suite: String,
    /// Resolved configuration.
    config: PortalTestConfig,
    /// Portal URL layout.
    urls: PortalUrls,
    /// Browser session.
    browser: Arc<dyn BrowserDriver>,
    /// Registered TOTP secrets by username.
    credentials: CredentialStore,
    /// Artifact root of this run.
    artifacts: ArtifactStore,
    /// Lifecycle event sink.
    events: Arc<dyn EventSink>,
    /// Polling policy for tabs.
    wait: WaitPolicy,
    /// Artifacts produced by the step in progress.
    pending_artifacts: Mutex<Vec<String>>,
}

impl SuiteContext {
    /// Builds a context for `suite` with events routed per `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Io`] when the artifact root or event log cannot
    /// be created.
    pub fn new(
        suite: &str,
        config: PortalTestConfig,
        browser: Arc<dyn BrowserDriver>,
    ) -> Result<Self, HarnessError> {
        let artifacts = ArtifactStore::new(&config, suite)?;
        let events = event_sink_from_config(&config)?;
        Ok(Self {
            suite: suite.to_string(),
            urls: PortalUrls::from_config(&config),
            config,
            browser,
            credentials: CredentialStore::new(),
            artifacts,
            events,
            wait: WaitPolicy::default(),
            pending_artifacts: Mutex::new(Vec::new()),
        })
    }

    /// Replaces the event sink.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Replaces the polling policy used by new tabs.
    #[must_use]
    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    /// Returns the suite name.
    #[must_use]
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Returns the resolved configuration.
    #[must_use]
    pub const fn config(&self) -> &PortalTestConfig {
        &self.config
    }

    /// Returns the portal URL layout.
    #[must_use]
    pub const fn urls(&self) -> &PortalUrls {
        &self.urls
    }

    /// Returns the registered TOTP secrets.
    #[must_use]
    pub const fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Returns the artifact store.
    #[must_use]
    pub const fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Records a lifecycle event.
    pub fn emit(&self, event: &SuiteEvent) {
        self.events.record(event);
    }

    /// Opens a tab on `url`.
    ///
    /// # Errors
    ///
    /// Returns the driver error when the tab cannot be opened.
    pub async fn create_tab(&self, url: &str) -> Result<Tab, HarnessError> {
        let page = self.browser.open_tab(url).await?;
        Ok(Tab::new(page, self.urls.clone(), self.wait))
    }

    /// Runs `step` under `budget` (raised by the configured timeout override).
    ///
    /// On expiry the step is dropped, a screenshot of `tab` is saved under
    /// `label`, and [`HarnessError::DeadlineExceeded`] is returned.
    ///
    /// # Errors
    ///
    /// Returns the step's own error or the deadline error.
    pub async fn guarded<T, F>(
        &self,
        tab: &Tab,
        label: &str,
        budget: Duration,
        step: F,
    ) -> Result<T, HarnessError>
    where
        F: Future<Output = Result<T, HarnessError>> + Send,
    {
        let budget = self.config.effective_timeout(budget);
        if let Ok(result) = tokio::time::timeout(budget, step).await {
            return result;
        }
        self.capture_screenshot(tab, label).await;
        Err(HarnessError::DeadlineExceeded {
            label: label.to_string(),
            budget,
        })
    }

    /// Saves a screenshot of `tab`; failures become teardown warnings.
    async fn capture_screenshot(&self, tab: &Tab, label: &str) {
        let png = match tokio::time::timeout(SCREENSHOT_TIMEOUT, tab.page().screenshot_png()).await
        {
            Ok(Ok(png)) => png,
            Ok(Err(err)) => return self.warn(label, format!("screenshot failed: {err}")),
            Err(_) => return self.warn(label, "screenshot timed out"),
        };
        match self.artifacts.write_screenshot(label, &png) {
            Ok(path) => {
                let path = self.relative(&path);
                self.emit(
                    &SuiteEvent::new(SuiteEventKind::ScreenshotCaptured, &self.suite)
                        .with_case(label)
                        .with_detail(path.clone()),
                );
                self.pending_artifacts.lock().unwrap_or_else(PoisonError::into_inner).push(path);
            }
            Err(err) => self.warn(label, format!("screenshot write failed: {err}")),
        }
    }

    /// Writes `window.__coverage__` of `tab` when a coverage directory is set.
    ///
    /// Pages without instrumentation yield nothing.
    ///
    /// # Errors
    ///
    /// Returns an error when the script or the write fails.
    pub async fn collect_coverage(&self, tab: &Tab) -> Result<(), HarnessError> {
        let Some(dir) = &self.config.coverage_dir else {
            return Ok(());
        };
        let coverage = tab.page().evaluate_json(COVERAGE_EXPRESSION).await?;
        if coverage == Value::Null {
            return Ok(());
        }
        let path = write_coverage(dir, &coverage)?;
        self.emit(
            &SuiteEvent::new(SuiteEventKind::CoverageCollected, &self.suite)
                .with_detail(path.display().to_string()),
        );
        Ok(())
    }

    /// Collects coverage and closes `tab`; failures become teardown warnings.
    pub async fn close_tab(&self, tab: Tab, label: &str) {
        if let Err(err) = self.collect_coverage(&tab).await {
            self.warn(label, format!("coverage failed: {err}"));
        }
        if let Err(err) = tab.close().await {
            self.warn(label, format!("tab close failed: {err}"));
        }
    }

    /// Emits a teardown warning for `label`.
    fn warn(&self, label: &str, detail: impl Into<String>) {
        self.emit(
            &SuiteEvent::new(SuiteEventKind::TeardownWarning, &self.suite)
                .with_case(label)
                .with_detail(detail),
        );
    }

    /// Renders `path` relative to the artifact root when possible.
    fn relative(&self, path: &std::path::Path) -> String {
        path.strip_prefix(self.artifacts.root()).unwrap_or(path).display().to_string()
    }

    /// Drains artifacts recorded since the last call.
    fn take_artifacts(&self) -> Vec<String> {
        std::mem::take(&mut *self.pending_artifacts.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// Selects the event sink: the configured event log, or stderr.
///
/// # Errors
///
/// Returns [`HarnessError::Io`] when the event log cannot be opened.
pub fn event_sink_from_config(
    config: &PortalTestConfig,
) -> Result<Arc<dyn EventSink>, HarnessError> {
    Ok(match &config.event_log {
        Some(path) => Arc::new(FileEventSink::new(path)?),
        None => Arc::new(StderrEventSink),
    })
}

// ============================================================================
// SECTION: Suite Trait
// ============================================================================

/// A case of a suite.
pub trait SuiteCase: Copy + Send + Sync + 'static {
    /// Stable case name used in events and reports.
    fn as_str(self) -> &'static str;

    /// Time budget of the case body.
    fn budget(self) -> Duration;
}

/// A browser suite with testify-style hooks.
#[async_trait]
pub trait Suite: Send + Sync {
    /// Case enumeration.
    type Case: SuiteCase;

    /// Suite name.
    fn name(&self) -> &'static str;

    /// Cases in execution order.
    fn cases(&self) -> &'static [Self::Case];

    /// Time budget of `setup_suite`.
    fn setup_budget(&self) -> Duration {
        DEFAULT_SETUP_BUDGET
    }

    /// Runs once on a tab opened on home, before any case.
    async fn setup_suite(&self, _ctx: &SuiteContext, _tab: &Tab) -> Result<(), HarnessError> {
        Ok(())
    }

    /// Runs on each case's fresh tab before the case body.
    async fn setup_test(&self, _ctx: &SuiteContext, tab: &Tab) -> Result<(), HarnessError> {
        tab.verify_is_home().await
    }

    /// Runs the body of `case`.
    async fn run_case(
        &self,
        ctx: &SuiteContext,
        tab: &Tab,
        case: Self::Case,
    ) -> Result<(), HarnessError>;
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Runs `suite` to completion and persists its report.
///
/// Case failures are recorded in the report, not returned; use
/// [`SuiteReport::into_result`] to fail a test on them.
///
/// # Errors
///
/// Returns an error when the browser cannot be stopped or the report cannot
/// be written. The browser is stopped in both cases; a stop failure takes
/// precedence.
pub async fn run_suite<S: Suite>(
    suite: &S,
    ctx: &SuiteContext,
) -> Result<SuiteReport, HarnessError> {
    let started_at_ms = now_millis();
    ctx.emit(&SuiteEvent::new(SuiteEventKind::SuiteStarted, ctx.suite()));

    let (setup, setup_artifacts) = run_setup(suite, ctx).await;
    let setup_error = setup.err().map(|err| err.to_string());
    let mut cases = Vec::new();
    if setup_error.is_none() {
        for case in suite.cases() {
            cases.push(run_case(suite, ctx, *case).await);
        }
    }

    let report = SuiteReport {
        suite: suite.name().to_string(),
        started_at_ms,
        ended_at_ms: now_millis(),
        setup_error,
        setup_artifacts,
        cases,
    };
    let written = report.write(ctx.artifacts());
    let outcome = if report.passed() { CaseStatus::Pass } else { CaseStatus::Fail };
    ctx.emit(
        &SuiteEvent::new(SuiteEventKind::SuiteFinished, ctx.suite()).with_outcome(outcome.as_str()),
    );
    // The browser is stopped even when the report could not be written.
    ctx.browser.stop().await?;
    written?;
    Ok(report)
}

/// Runs `setup_suite` on its own tab and returns the artifacts it produced.
async fn run_setup<S: Suite>(
    suite: &S,
    ctx: &SuiteContext,
) -> (Result<(), HarnessError>, Vec<String>) {
    let tab = match ctx.create_tab(&ctx.urls().home_base_url()).await {
        Ok(tab) => tab,
        Err(err) => return (Err(err), Vec::new()),
    };
    let result =
        ctx.guarded(&tab, SETUP_LABEL, suite.setup_budget(), suite.setup_suite(ctx, &tab)).await;
    ctx.close_tab(tab, SETUP_LABEL).await;
    (result, ctx.take_artifacts())
}

/// Runs one case and converts the result into an outcome.
async fn run_case<S: Suite>(suite: &S, ctx: &SuiteContext, case: S::Case) -> CaseOutcome {
    let name = case.as_str();
    ctx.emit(&SuiteEvent::new(SuiteEventKind::CaseStarted, ctx.suite()).with_case(name));
    let started = Instant::now();

    let result = match ctx.create_tab(&ctx.urls().home_base_url()).await {
        Ok(tab) => {
            let result = match suite.setup_test(ctx, &tab).await {
                Ok(()) => {
                    ctx.guarded(&tab, name, case.budget(), suite.run_case(ctx, &tab, case)).await
                }
                Err(err) => Err(err),
            };
            ctx.close_tab(tab, name).await;
            result
        }
        Err(err) => Err(err),
    };

    let status = if result.is_ok() { CaseStatus::Pass } else { CaseStatus::Fail };
    let outcome = CaseOutcome {
        name: name.to_string(),
        status,
        duration_ms: duration_millis(started.elapsed()),
        error: result.err().map(|err| err.to_string()),
        artifacts: ctx.take_artifacts(),
    };
    let mut event = SuiteEvent::new(SuiteEventKind::CaseFinished, ctx.suite())
        .with_case(name)
        .with_outcome(status.as_str());
    if let Some(error) = &outcome.error {
        event = event.with_detail(error.clone());
    }
    ctx.emit(&event);
    outcome
}

impl SuiteReport {
    /// Converts the report into an error when setup or any case failed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SuiteFailed`] naming the failed cases (or
    /// `setup_suite`).
    pub fn into_result(self) -> Result<Self, HarnessError> {
        if self.passed() {
            return Ok(self);
        }
        let mut failed = self.failed_cases();
        if self.setup_error.is_some() {
            failed.insert(0, SETUP_LABEL.to_string());
        }
        Err(HarnessError::SuiteFailed {
            suite: self.suite,
            failed,
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
