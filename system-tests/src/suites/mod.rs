// system-tests/src/suites/mod.rs
// ============================================================================
// Module: Portal Suites
// Description: Scenario suites exercised against the portal.
// ============================================================================

//! Scenario suites exercised against the portal.

pub mod one_time_password;
