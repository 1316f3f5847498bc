// system-tests/src/lib.rs
// ============================================================================
// Module: Portal System Tests Library
// Description: Suite definitions for browser-driven portal scenarios.
// Purpose: Share suite scripts between the live binary and offline tests.
// Dependencies: portal-e2e-harness
// ============================================================================

//! ## Overview
//! This crate hosts the portal suites run by the system-test binaries in
//! `system-tests/tests`. Suites are plain [`portal_e2e_harness::Suite`]
//! implementations so they can run against Chrome or the simulated portal.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod suites;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use suites::one_time_password::OneTimePasswordCase;
pub use suites::one_time_password::OneTimePasswordSuite;
