// crates/portal-e2e-harness/src/config/mod.rs
// ============================================================================
// Module: Portal Test Configuration
// Description: Centralized configuration for portal suites.
// Purpose: Provide typed access to test environment settings and defaults.
// Dependencies: serde, toml
// ============================================================================

//! ## Overview
//! Suite configuration is read from environment variables, optionally layered
//! over a TOML file, and mapped into a small typed structure shared by the
//! browser session, artifact store and suite runner.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod env;

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod env_tests;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use env::ConfigError;
pub use env::DEFAULT_BASE_DOMAIN;
pub use env::PortalTestConfig;
pub use env::PortalTestEnv;
pub use env::PortalTestFile;
pub use env::read_env_strict;
