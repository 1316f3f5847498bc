// crates/portal-e2e-harness/src/config/env_tests.rs
// ============================================================================
// Module: Portal Test Env Unit Tests
// Description: Unit coverage for strict environment parsing.
// Purpose: Ensure configuration parsing fails closed on invalid inputs.
// Dependencies: std, tempfile
// ============================================================================

//! ## Overview
//! Unit coverage for strict environment parsing.
//! Invariants:
//! - Environment parsing rejects invalid or empty values.
//! - Tests restore environment state after each run.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Test-only assertions favor direct unwrap/expect for clarity."
)]

use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::OnceLock;
use std::time::Duration;

use super::ConfigError;
use super::DEFAULT_BASE_DOMAIN;
use super::PortalTestConfig;
use super::PortalTestEnv;
use super::PortalTestFile;

mod env_mut {
    #![allow(unsafe_code, reason = "Tests mutate process env vars in a controlled scope.")]

    /// Sets an environment variable for the current process.
    pub fn set_var(key: &str, value: &str) {
        // SAFETY: Tests serialize environment mutation via a global lock.
        unsafe {
            std::env::set_var(key, value);
        }
    }

    /// Removes an environment variable from the current process.
    pub fn remove_var(key: &str) {
        // SAFETY: Tests serialize environment mutation via a global lock.
        unsafe {
            std::env::remove_var(key);
        }
    }
}

fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

struct EnvGuard {
    entries: Vec<(&'static str, Option<String>)>,
}

impl EnvGuard {
    /// Snapshots every portal key and clears it for the test body.
    fn clean() -> Self {
        let entries = PortalTestEnv::ALL
            .iter()
            .map(|key| (key.as_str(), std::env::var(key.as_str()).ok()))
            .collect();
        for key in PortalTestEnv::ALL {
            env_mut::remove_var(key.as_str());
        }
        Self {
            entries,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (name, value) in self.entries.drain(..) {
            match value {
                Some(value) => env_mut::set_var(name, &value),
                None => env_mut::remove_var(name),
            }
        }
    }
}

#[test]
fn defaults_apply_without_env() {
    let _lock = env_lock();
    let _guard = EnvGuard::clean();

    let config = PortalTestConfig::load().expect("config should load");
    assert_eq!(config, PortalTestConfig::default());
    assert_eq!(config.base_domain, DEFAULT_BASE_DOMAIN);
    assert!(!config.headful);
    assert!(!config.short);
}

#[test]
fn timeout_rejects_invalid_values() {
    let _lock = env_lock();
    let _guard = EnvGuard::clean();

    env_mut::set_var(PortalTestEnv::TimeoutSeconds.as_str(), "0");
    assert!(PortalTestConfig::load().is_err());

    env_mut::set_var(PortalTestEnv::TimeoutSeconds.as_str(), "not-a-number");
    assert!(PortalTestConfig::load().is_err());

    env_mut::set_var(PortalTestEnv::TimeoutSeconds.as_str(), "   ");
    assert!(PortalTestConfig::load().is_err());
}

#[test]
fn timeout_override_is_a_minimum() {
    let _lock = env_lock();
    let _guard = EnvGuard::clean();

    env_mut::set_var(PortalTestEnv::TimeoutSeconds.as_str(), "45");
    let config = PortalTestConfig::load().expect("config should load");
    assert_eq!(config.timeout, Some(Duration::from_secs(45)));
    assert_eq!(config.effective_timeout(Duration::from_secs(25)), Duration::from_secs(45));
    assert_eq!(config.effective_timeout(Duration::from_secs(60)), Duration::from_secs(60));
}

#[test]
fn bool_flags_parse_and_reject_unknown_literals() {
    let _lock = env_lock();
    let _guard = EnvGuard::clean();

    env_mut::set_var(PortalTestEnv::Short.as_str(), "1");
    env_mut::set_var(PortalTestEnv::Headful.as_str(), "TRUE");
    let config = PortalTestConfig::load().expect("config should load");
    assert!(config.short);
    assert!(config.headful);

    env_mut::set_var(PortalTestEnv::Short.as_str(), "maybe");
    let err = PortalTestConfig::load().expect_err("maybe is not a boolean");
    assert!(matches!(err, ConfigError::Invalid { .. }));
}

#[test]
fn empty_values_fail_closed() {
    let _lock = env_lock();
    let _guard = EnvGuard::clean();

    env_mut::set_var(PortalTestEnv::RunRoot.as_str(), "");
    assert_eq!(
        PortalTestConfig::load(),
        Err(ConfigError::Empty(PortalTestEnv::RunRoot.as_str().to_string()))
    );
}

#[test]
fn base_domain_rejects_scheme() {
    let _lock = env_lock();
    let _guard = EnvGuard::clean();

    env_mut::set_var(PortalTestEnv::BaseDomain.as_str(), "https://example.com");
    assert!(PortalTestConfig::load().is_err());
}

#[test]
fn path_prefix_is_normalized() {
    let _lock = env_lock();
    let _guard = EnvGuard::clean();

    env_mut::set_var(PortalTestEnv::PathPrefix.as_str(), "/auth/");
    let config = PortalTestConfig::load().expect("config should load");
    assert_eq!(config.path_prefix.as_deref(), Some("/auth"));

    env_mut::set_var(PortalTestEnv::PathPrefix.as_str(), "/");
    let config = PortalTestConfig::load().expect("config should load");
    assert_eq!(config.path_prefix, None);

    env_mut::set_var(PortalTestEnv::PathPrefix.as_str(), "auth");
    assert!(PortalTestConfig::load().is_err());
}

#[test]
fn env_overrides_file_values() {
    let _lock = env_lock();
    let _guard = EnvGuard::clean();

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("portal-e2e.toml");
    std::fs::write(
        &path,
        "base_domain = \"corp.test:9091\"\ntimeout_sec = 90\ncoverage_dir = \"/tmp/cov\"\n",
    )
    .expect("write config");
    env_mut::set_var(PortalTestEnv::ConfigPath.as_str(), path.to_str().expect("utf-8 path"));
    env_mut::set_var(PortalTestEnv::TimeoutSeconds.as_str(), "5");

    let config = PortalTestConfig::load().expect("config should load");
    assert_eq!(config.base_domain, "corp.test:9091");
    assert_eq!(config.timeout, Some(Duration::from_secs(5)));
    assert_eq!(config.coverage_dir, Some(PathBuf::from("/tmp/cov")));
}

#[test]
fn file_rejects_unknown_keys() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("portal-e2e.toml");
    std::fs::write(&path, "base_domian = \"typo\"\n").expect("write config");
    let err = PortalTestFile::read(&path).expect_err("unknown key must fail");
    assert!(matches!(err, ConfigError::File { .. }));
}
