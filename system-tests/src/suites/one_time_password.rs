// system-tests/src/suites/one_time_password.rs
// ============================================================================
// Module: Two-Factor One-Time Password Suite
// Description: TOTP registration, enforcement and rejection scenarios.
// Purpose: Verify protected resources require a valid second factor.
// Dependencies: portal-e2e-harness
// ============================================================================

//! ## Overview
//! Suite setup registers a TOTP device for `john` through the settings
//! dialog and keeps its secret in the context's credential store. Each case
//! then starts from a fresh tab on the home page with no session:
//!
//! - a protected resource redirects to the first factor with `rd` set
//! - both factors grant access, and the session survives navigating away
//! - a wrong passcode is rejected with a notification
//!
//! Invariants:
//! - Cases never share cookies; only the server-side registration persists.

use std::time::Duration;

use async_trait::async_trait;
use portal_e2e_harness::HarnessError;
use portal_e2e_harness::Suite;
use portal_e2e_harness::SuiteCase;
use portal_e2e_harness::SuiteContext;
use portal_e2e_harness::Tab;
use portal_e2e_harness::TotpOptions;
use portal_e2e_harness::selectors;
use portal_e2e_harness::urls::secret_url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Test user registered during suite setup.
pub const TEST_USERNAME: &str = "john";
/// Password of [`TEST_USERNAME`].
pub const TEST_PASSWORD: &str = "password";
/// Passcode submitted by the rejection case.
pub const WRONG_PASSCODE: &str = "123456";
/// Suite name used for artifacts and events.
pub const SUITE_NAME: &str = "two_factor_one_time_password";

/// Budget for registering the device.
const SETUP_BUDGET: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Cases
// ============================================================================

/// Cases of [`OneTimePasswordSuite`] in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneTimePasswordCase {
    /// Anonymous access to the secret lands on the first-factor page.
    ShouldNotAuthorizeSecretBeforeTwoFactor,
    /// Both factors unlock the secret and the session persists.
    ShouldAuthorizeSecretAfterTwoFactor,
    /// A wrong passcode is rejected.
    ShouldFailTwoFactor,
}

impl OneTimePasswordCase {
    /// All cases in execution order.
    pub const ALL: &'static [Self] = &[
        Self::ShouldNotAuthorizeSecretBeforeTwoFactor,
        Self::ShouldAuthorizeSecretAfterTwoFactor,
        Self::ShouldFailTwoFactor,
    ];
}

impl SuiteCase for OneTimePasswordCase {
    fn as_str(self) -> &'static str {
        match self {
            Self::ShouldNotAuthorizeSecretBeforeTwoFactor => {
                "should_not_authorize_secret_before_two_factor"
            }
            Self::ShouldAuthorizeSecretAfterTwoFactor => "should_authorize_secret_after_two_factor",
            Self::ShouldFailTwoFactor => "should_fail_two_factor",
        }
    }

    fn budget(self) -> Duration {
        match self {
            Self::ShouldNotAuthorizeSecretBeforeTwoFactor
            | Self::ShouldAuthorizeSecretAfterTwoFactor => Duration::from_secs(60),
            Self::ShouldFailTwoFactor => Duration::from_secs(25),
        }
    }
}

// ============================================================================
// SECTION: Suite
// ============================================================================

/// Two-factor one-time password suite.
#[derive(Debug, Default, Clone, Copy)]
pub struct OneTimePasswordSuite;

#[async_trait]
impl Suite for OneTimePasswordSuite {
    type Case = OneTimePasswordCase;

    fn name(&self) -> &'static str {
        SUITE_NAME
    }

    fn cases(&self) -> &'static [OneTimePasswordCase] {
        OneTimePasswordCase::ALL
    }

    fn setup_budget(&self) -> Duration {
        SETUP_BUDGET
    }

    async fn setup_suite(&self, ctx: &SuiteContext, tab: &Tab) -> Result<(), HarnessError> {
        tab.login_and_register_totp(
            ctx.credentials(),
            TEST_USERNAME,
            TEST_PASSWORD,
            false,
            TotpOptions::default(),
        )
        .await
        .map(|_| ())
    }

    async fn run_case(
        &self,
        ctx: &SuiteContext,
        tab: &Tab,
        case: OneTimePasswordCase,
    ) -> Result<(), HarnessError> {
        match case {
            OneTimePasswordCase::ShouldNotAuthorizeSecretBeforeTwoFactor => {
                should_not_authorize_secret_before_two_factor(ctx, tab).await
            }
            OneTimePasswordCase::ShouldAuthorizeSecretAfterTwoFactor => {
                should_authorize_secret_after_two_factor(ctx, tab).await
            }
            OneTimePasswordCase::ShouldFailTwoFactor => should_fail_two_factor(tab).await,
        }
    }
}

// ============================================================================
// SECTION: Case Bodies
// ============================================================================

/// Anonymous visit to the secret must land on the first factor with `rd` set.
async fn should_not_authorize_secret_before_two_factor(
    ctx: &SuiteContext,
    tab: &Tab,
) -> Result<(), HarnessError> {
    let target = secret_url(&ctx.urls().admin_base_url());
    tab.visit(&target).await?;
    tab.verify_is_first_factor_page().await?;
    tab.verify_url_is_regexp(&ctx.urls().redirect_pattern(&target)?).await
}

/// Both factors unlock the secret; the session survives leaving it.
async fn should_authorize_secret_after_two_factor(
    ctx: &SuiteContext,
    tab: &Tab,
) -> Result<(), HarnessError> {
    let target = secret_url(&ctx.urls().admin_base_url());
    tab.login_second_factor_totp(
        ctx.credentials(),
        TEST_USERNAME,
        TEST_PASSWORD,
        false,
        Some(&target),
    )
    .await?;
    tab.verify_secret_authorized().await?;

    tab.visit(&ctx.urls().home_base_url()).await?;
    tab.verify_is_home().await?;

    // Same tab, same cookies: the session must still grant access.
    tab.visit(&target).await?;
    tab.verify_secret_authorized().await
}

/// A wrong passcode shows the rejection notification.
async fn should_fail_two_factor(tab: &Tab) -> Result<(), HarnessError> {
    tab.login_one_factor(TEST_USERNAME, TEST_PASSWORD, false, None).await?;
    tab.verify_is_second_factor_page().await?;
    tab.enter_otp(WRONG_PASSCODE).await?;
    tab.verify_notification_displayed(selectors::NOTIFY_OTP_WRONG).await
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
