// system-tests/tests/suites/two_factor_one_time_password.rs
// ============================================================================
// Module: Two-Factor One-Time Password Scenario
// Description: Live run of the OTP suite.
// Purpose: Fail the test binary when any suite case fails.
// Dependencies: system-tests, helpers
// ============================================================================

#![allow(
    clippy::print_stderr,
    clippy::missing_docs_in_private_items,
    reason = "Live suites print the artifact root for CI logs."
)]

use helpers::session::launch_context;
use helpers::session::load_config_unless_short;
use system_tests::OneTimePasswordSuite;
use system_tests::suites::one_time_password::SUITE_NAME;

use crate::helpers;

#[tokio::test(flavor = "multi_thread")]
async fn two_factor_one_time_password_scenario() -> Result<(), Box<dyn std::error::Error>> {
    let Some(config) = load_config_unless_short()? else {
        eprintln!("skipping {SUITE_NAME}: short mode");
        return Ok(());
    };
    let ctx = launch_context(SUITE_NAME, config).await?;
    let report = portal_e2e_harness::run_suite(&OneTimePasswordSuite, &ctx).await?;
    eprintln!("{SUITE_NAME} artifacts: {}", ctx.artifacts().root().display());
    report.into_result()?;
    Ok(())
}
