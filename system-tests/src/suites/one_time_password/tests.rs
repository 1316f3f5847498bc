// system-tests/src/suites/one_time_password/tests.rs
// ============================================================================
// Module: One-Time Password Suite Tests
// Description: Runs the OTP suite against the simulated portal.
// Purpose: Validate suite scripts without a deployed portal or browser.
// Dependencies: portal-e2e-harness (simulated-portal), tempfile, tokio
// ============================================================================

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::use_debug,
    clippy::missing_docs_in_private_items,
    reason = "Test-only assertions use unwrap/expect for clarity."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use portal_e2e_harness::CaseStatus;
use portal_e2e_harness::HarnessError;
use portal_e2e_harness::PortalTestConfig;
use portal_e2e_harness::PortalUrls;
use portal_e2e_harness::SuiteCase;
use portal_e2e_harness::SuiteContext;
use portal_e2e_harness::WaitPolicy;
use portal_e2e_harness::events::MemoryEventSink;
use portal_e2e_harness::run_suite;
use portal_e2e_harness::simulator::SimulatedPortal;

use super::OneTimePasswordCase;
use super::OneTimePasswordSuite;
use super::SUITE_NAME;
use super::TEST_USERNAME;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn context(portal: &SimulatedPortal, dir: &tempfile::TempDir) -> SuiteContext {
    let config = PortalTestConfig {
        run_root: Some(dir.path().to_path_buf()),
        ..PortalTestConfig::default()
    };
    SuiteContext::new(SUITE_NAME, config, Arc::new(portal.clone()))
        .unwrap()
        .with_events(Arc::new(MemoryEventSink::default()))
        .with_wait(WaitPolicy {
            timeout: Duration::from_secs(2),
            interval: Duration::from_millis(10),
        })
}

fn portal() -> SimulatedPortal {
    SimulatedPortal::new(PortalUrls::new("example.com:8080", None))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn cases_carry_stable_names_and_budgets() {
    let named: Vec<_> =
        OneTimePasswordCase::ALL.iter().map(|case| (case.as_str(), case.budget())).collect();
    assert_eq!(
        named,
        vec![
            ("should_not_authorize_secret_before_two_factor", Duration::from_secs(60)),
            ("should_authorize_secret_after_two_factor", Duration::from_secs(60)),
            ("should_fail_two_factor", Duration::from_secs(25)),
        ]
    );
}

#[tokio::test]
async fn suite_passes_against_simulated_portal() {
    let dir = tempfile::tempdir().unwrap();
    let portal = portal();
    let ctx = context(&portal, &dir);

    let report = run_suite(&OneTimePasswordSuite, &ctx).await.unwrap();

    assert!(report.setup_error.is_none(), "setup failed: {:?}", report.setup_error);
    for case in &report.cases {
        assert_eq!(case.status, CaseStatus::Pass, "{} failed: {:?}", case.name, case.error);
    }
    assert_eq!(report.cases.len(), 3);
    assert!(portal.registration(TEST_USERNAME).is_some());
    assert_eq!(
        ctx.credentials().get(TEST_USERNAME).unwrap(),
        portal.registration(TEST_USERNAME).unwrap()
    );
    assert_eq!(portal.tabs_opened(), 4);
    assert_eq!(portal.tabs_closed(), 4);
    assert!(portal.is_stopped());
    report.into_result().unwrap();
}

#[tokio::test(start_paused = true)]
async fn rejected_first_factor_fails_setup_and_skips_cases() {
    let dir = tempfile::tempdir().unwrap();
    let portal = portal().with_user(TEST_USERNAME, "rotated");
    let ctx = context(&portal, &dir);

    let report = run_suite(&OneTimePasswordSuite, &ctx).await.unwrap();

    assert!(report.cases.is_empty());
    assert!(portal.registration(TEST_USERNAME).is_none());
    match report.into_result() {
        Err(HarnessError::SuiteFailed {
            suite,
            failed,
        }) => {
            assert_eq!(suite, SUITE_NAME);
            assert_eq!(failed, vec!["setup_suite".to_string()]);
        }
        other => panic!("expected setup failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_registration_hits_setup_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let portal = portal().stall_on("settings");
    let ctx = context(&portal, &dir);

    let report = run_suite(&OneTimePasswordSuite, &ctx).await.unwrap();

    assert!(report.cases.is_empty());
    assert!(
        report.setup_error.as_deref().unwrap().contains("setup_suite exceeded its deadline of 30s")
    );
    assert_eq!(report.setup_artifacts, vec!["screenshots/setup_suite.png".to_string()]);
    assert!(ctx.artifacts().root().join("screenshots/setup_suite.png").is_file());
    assert_eq!(portal.screenshots_taken(), 1);
    assert!(portal.registration(TEST_USERNAME).is_none());
    assert!(portal.is_stopped());
}
