// crates/portal-e2e-harness/src/lib.rs
// ============================================================================
// Module: Portal E2E Harness
// Description: Headless-browser harness for authentication portal suites.
// Purpose: Drive login, TOTP registration and authorization checks over CDP.
// Dependencies: chromiumoxide, tokio, totp-rs, serde, thiserror
// ============================================================================

//! ## Overview
//! This crate launches a browser, opens isolated tabs against the portal, and
//! exposes assert-then-act helpers ([`Tab`]) plus a sequential suite runner
//! ([`run_suite`]) with per-step deadlines, deadline screenshots, coverage
//! collection and JSON-line lifecycle events.
//! Invariants:
//! - Every tab opened by the runner is closed, whatever the case outcome.
//! - Deadlines are never retried; expiry fails the step after a screenshot.
//! - TOTP secrets are never logged or serialized into reports.
//!
//! With the `simulated-portal` feature, [`simulator::SimulatedPortal`] stands
//! in for the browser so suites can run without a deployed portal.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod artifacts;
pub mod chrome;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod otp;
pub mod selectors;
#[cfg(any(test, feature = "simulated-portal"))]
pub mod simulator;
pub mod suite;
pub mod tab;
pub mod urls;
pub mod wait;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use artifacts::ArtifactStore;
pub use artifacts::CaseOutcome;
pub use artifacts::CaseStatus;
pub use artifacts::SuiteReport;
pub use chrome::ChromeSession;
pub use config::PortalTestConfig;
pub use driver::BrowserDriver;
pub use driver::PageDriver;
pub use error::HarnessError;
pub use events::EventSink;
pub use events::SuiteEvent;
pub use events::SuiteEventKind;
pub use otp::CredentialStore;
pub use otp::OtpSecret;
pub use otp::TotpAlgorithm;
pub use otp::TotpOptions;
pub use suite::Suite;
pub use suite::SuiteCase;
pub use suite::SuiteContext;
pub use suite::run_suite;
pub use tab::Tab;
pub use urls::PortalUrls;
pub use wait::WaitPolicy;
