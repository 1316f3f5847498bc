// crates/portal-e2e-harness/src/tab/tests.rs
// ============================================================================
// Module: Portal Tab Tests
// Description: Flow tests for tab verifications and actions.
// Purpose: Validate login, registration and verification helpers offline.
// Dependencies: portal-e2e-harness, tokio
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

use std::time::Duration;

use super::Tab;
use crate::driver::BrowserDriver;
use crate::error::HarnessError;
use crate::otp::CredentialStore;
use crate::otp::TotpAlgorithm;
use crate::otp::TotpOptions;
use crate::selectors;
use crate::simulator::SimulatedPortal;
use crate::urls::PortalUrls;
use crate::urls::secret_url;
use crate::wait::WaitPolicy;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

const USER: &str = "john";
const PASSWORD: &str = "password";

fn urls() -> PortalUrls {
    PortalUrls::new("example.com:8080", None)
}

async fn open(portal: &SimulatedPortal, url: &str) -> Tab {
    let page = portal.open_tab(url).await.unwrap();
    Tab::new(
        page,
        urls(),
        WaitPolicy {
            timeout: Duration::from_secs(2),
            interval: Duration::from_millis(10),
        },
    )
}

async fn home(portal: &SimulatedPortal) -> Tab {
    open(portal, &urls().home_base_url()).await
}

async fn registered(portal: &SimulatedPortal, credentials: &CredentialStore) {
    let tab = home(portal).await;
    tab.login_and_register_totp(credentials, USER, PASSWORD, false, TotpOptions::default())
        .await
        .unwrap();
    tab.close().await.unwrap();
}

// ============================================================================
// SECTION: Verification Tests
// ============================================================================

#[tokio::test]
async fn new_tab_on_home_is_home() {
    let portal = SimulatedPortal::new(urls());
    let tab = home(&portal).await;
    tab.verify_is_home().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn url_mismatch_reports_last_observed_url() {
    let portal = SimulatedPortal::new(urls());
    let tab = home(&portal).await;
    match tab.verify_url_is("https://admin.example.com:8080/").await {
        Err(HarnessError::Assertion {
            actual, ..
        }) => assert_eq!(actual, "https://home.example.com:8080/"),
        other => panic!("expected assertion failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn absent_element_times_out_with_selector() {
    let portal = SimulatedPortal::new(urls());
    let tab = home(&portal).await;
    match tab.verify_secret_authorized().await {
        Err(HarnessError::ElementTimeout {
            selector,
            waited,
        }) => {
            assert_eq!(selector, selectors::SECRET);
            assert_eq!(waited, Duration::from_secs(2));
        }
        other => panic!("expected element timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn anonymous_secret_visit_redirects_to_first_factor() {
    let portal = SimulatedPortal::new(urls());
    let tab = home(&portal).await;
    let target = secret_url(&urls().admin_base_url());
    tab.visit(&target).await.unwrap();
    tab.verify_is_first_factor_page().await.unwrap();
    tab.verify_url_is_regexp(&urls().redirect_pattern(&target).unwrap()).await.unwrap();
}

// ============================================================================
// SECTION: Registration Tests
// ============================================================================

#[tokio::test]
async fn registration_stores_the_secret_the_portal_accepts() {
    let portal = SimulatedPortal::new(urls());
    let credentials = CredentialStore::new();
    registered(&portal, &credentials).await;

    let stored = credentials.get(USER).unwrap();
    assert_eq!(Some(stored.clone()), portal.registration(USER));
    assert_eq!(stored.options(), TotpOptions::default());
}

#[tokio::test]
async fn advanced_registration_applies_requested_options() {
    let portal = SimulatedPortal::new(urls());
    let credentials = CredentialStore::new();
    let options = TotpOptions {
        algorithm: TotpAlgorithm::Sha256,
        digits: 8,
        period: 60,
    };
    let tab = home(&portal).await;
    let secret =
        tab.login_and_register_totp(&credentials, USER, PASSWORD, false, options).await.unwrap();
    assert_eq!(secret.options(), options);
    assert_eq!(portal.registration(USER).unwrap().options(), options);
}

#[tokio::test]
async fn deleting_the_device_clears_both_sides() {
    let portal = SimulatedPortal::new(urls());
    let credentials = CredentialStore::new();
    let tab = home(&portal).await;
    tab.login_and_register_totp(&credentials, USER, PASSWORD, false, TotpOptions::default())
        .await
        .unwrap();
    tab.open_settings_and_delete_totp(&credentials, USER).await.unwrap();

    assert!(portal.registration(USER).is_none());
    assert!(matches!(credentials.get(USER), Err(HarnessError::MissingCredential(_))));
}

// ============================================================================
// SECTION: Login Tests
// ============================================================================

#[tokio::test]
async fn second_factor_login_reaches_target_and_persists() {
    let portal = SimulatedPortal::new(urls());
    let credentials = CredentialStore::new();
    registered(&portal, &credentials).await;

    let tab = home(&portal).await;
    let target = secret_url(&urls().admin_base_url());
    tab.login_second_factor_totp(&credentials, USER, PASSWORD, false, Some(&target))
        .await
        .unwrap();
    tab.verify_secret_authorized().await.unwrap();
    tab.verify_url_is(&target).await.unwrap();

    tab.visit(&urls().home_base_url()).await.unwrap();
    tab.verify_is_home().await.unwrap();
    tab.visit(&target).await.unwrap();
    tab.verify_secret_authorized().await.unwrap();
}

#[tokio::test]
async fn second_factor_without_target_shows_authenticated_stage() {
    let portal = SimulatedPortal::new(urls());
    let credentials = CredentialStore::new();
    registered(&portal, &credentials).await;

    let tab = home(&portal).await;
    tab.login_second_factor_totp(&credentials, USER, PASSWORD, false, None).await.unwrap();
    tab.verify_is_authenticated_page().await.unwrap();
}

#[tokio::test]
async fn tabs_do_not_share_sessions() {
    let portal = SimulatedPortal::new(urls());
    let credentials = CredentialStore::new();
    registered(&portal, &credentials).await;
    let target = secret_url(&urls().admin_base_url());

    let first = home(&portal).await;
    first
        .login_second_factor_totp(&credentials, USER, PASSWORD, true, Some(&target))
        .await
        .unwrap();
    first.verify_secret_authorized().await.unwrap();

    let second = home(&portal).await;
    second.visit(&target).await.unwrap();
    second.verify_is_first_factor_page().await.unwrap();
}

#[tokio::test]
async fn wrong_passcode_is_rejected_with_notification() {
    let portal = SimulatedPortal::new(urls());
    let credentials = CredentialStore::new();
    registered(&portal, &credentials).await;

    let tab = home(&portal).await;
    tab.login_one_factor(USER, PASSWORD, false, None).await.unwrap();
    tab.verify_is_second_factor_page().await.unwrap();
    let valid = credentials.get(USER).unwrap().generate_current().unwrap();
    let wrong = if valid == "123456" { "654321" } else { "123456" };
    tab.enter_otp(wrong).await.unwrap();
    tab.verify_notification_displayed(selectors::NOTIFY_OTP_WRONG).await.unwrap();
}

#[tokio::test]
async fn wrong_password_is_rejected_with_notification() {
    let portal = SimulatedPortal::new(urls());
    let tab = home(&portal).await;
    tab.login_one_factor(USER, "not-the-password", false, None).await.unwrap();
    tab.verify_notification_displayed(selectors::NOTIFY_BAD_CREDENTIALS).await.unwrap();
    tab.verify_is_first_factor_page().await.unwrap();
}

#[tokio::test]
async fn validating_without_registration_is_a_missing_credential() {
    let portal = SimulatedPortal::new(urls());
    let tab = home(&portal).await;
    let err = tab.validate_totp(&CredentialStore::new(), USER).await.unwrap_err();
    assert!(matches!(err, HarnessError::MissingCredential(user) if user == USER));
}

#[tokio::test]
async fn logout_returns_to_first_factor() {
    let portal = SimulatedPortal::new(urls());
    let credentials = CredentialStore::new();
    registered(&portal, &credentials).await;

    let tab = home(&portal).await;
    tab.login_second_factor_totp(&credentials, USER, PASSWORD, false, None).await.unwrap();
    tab.logout().await.unwrap();
    tab.visit(&secret_url(&urls().admin_base_url())).await.unwrap();
    tab.verify_is_first_factor_page().await.unwrap();
}
