// crates/portal-e2e-harness/src/tab.rs
// ============================================================================
// Module: Portal Tab
// Description: Assert-then-act helpers over one browser tab.
// Purpose: Express login, registration and verification steps as calls.
// Dependencies: regex
// ============================================================================

//! ## Overview
//! A [`Tab`] owns one [`PageDriver`] and knows the portal URL layout. Its
//! `verify_*` methods poll until the page reaches the expected state (or fail
//! with the last observation); its action methods fill forms and click
//! through portal flows.
//!
//! ## Invariants
//! - Every verification waits at most the tab's [`WaitPolicy`].
//! - Actions never retry; the first failure is returned.

use regex::Regex;

use crate::driver::PageDriver;
use crate::error::HarnessError;
use crate::otp::CredentialStore;
use crate::otp::OtpSecret;
use crate::otp::TotpOptions;
use crate::selectors;
use crate::urls::PortalUrls;
use crate::wait::WaitPolicy;
use crate::wait::poll_until;

/// One browser tab bound to the portal layout.
pub struct Tab {
    /// Underlying page driver.
    page: Box<dyn PageDriver>,
    /// Portal URL layout.
    urls: PortalUrls,
    /// Polling policy for verifications.
    wait: WaitPolicy,
}

impl Tab {
    /// Wraps an opened page.
    #[must_use]
    pub fn new(page: Box<dyn PageDriver>, urls: PortalUrls, wait: WaitPolicy) -> Self {
        Self {
            page,
            urls,
            wait,
        }
    }

    /// Returns the underlying page driver.
    #[must_use]
    pub fn page(&self) -> &dyn PageDriver {
        self.page.as_ref()
    }

    /// Returns the portal URL layout.
    #[must_use]
    pub const fn urls(&self) -> &PortalUrls {
        &self.urls
    }

    /// Closes the tab.
    ///
    /// # Errors
    ///
    /// Returns the driver error when the tab cannot be closed.
    pub async fn close(self) -> Result<(), HarnessError> {
        self.page.close().await
    }

    // ========================================================================
    // SECTION: Waits
    // ========================================================================

    /// Waits until at least one element matches `selector`; returns the texts.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ElementTimeout`] when nothing appears in time.
    pub async fn wait_for_element(&self, selector: &str) -> Result<Vec<String>, HarnessError> {
        let page = self.page.as_ref();
        let outcome = poll_until(self.wait, move || async move {
            let texts = page.element_texts(selector).await?;
            Ok::<_, HarnessError>(if texts.is_empty() { Err(()) } else { Ok(texts) })
        })
        .await;
        match outcome {
            Ok(texts) => Ok(texts),
            Err(Ok(_)) => Err(HarnessError::ElementTimeout {
                selector: selector.to_string(),
                waited: self.wait.timeout,
            }),
            Err(Err(err)) => Err(err),
        }
    }

    /// Waits until the input matching `selector` holds a non-empty value.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ElementTimeout`] when no value appears in time.
    pub async fn wait_for_value(&self, selector: &str) -> Result<String, HarnessError> {
        let page = self.page.as_ref();
        let outcome = poll_until(self.wait, move || async move {
            let value = page.element_value(selector).await?;
            Ok::<_, HarnessError>(value.filter(|value| !value.is_empty()).ok_or(()))
        })
        .await;
        match outcome {
            Ok(value) => Ok(value),
            Err(Ok(_)) => Err(HarnessError::ElementTimeout {
                selector: selector.to_string(),
                waited: self.wait.timeout,
            }),
            Err(Err(err)) => Err(err),
        }
    }

    /// Waits until the current URL satisfies `matches`.
    async fn wait_for_url<F>(
        &self,
        what: &str,
        expected: &str,
        matches: F,
    ) -> Result<String, HarnessError>
    where
        F: Fn(&str) -> bool + Send + Sync,
    {
        let page = self.page.as_ref();
        let matches = &matches;
        let outcome = poll_until(self.wait, move || async move {
            let url = page.current_url().await?;
            Ok::<_, HarnessError>(if matches(&url) { Ok(url) } else { Err(url) })
        })
        .await;
        match outcome {
            Ok(url) => Ok(url),
            Err(Ok(expired)) => Err(HarnessError::assertion(what, expected, expired.last)),
            Err(Err(err)) => Err(err),
        }
    }

    /// Waits for `selector` and clicks it.
    async fn click_when_ready(&self, selector: &str) -> Result<(), HarnessError> {
        self.wait_for_element(selector).await?;
        self.page.click(selector).await
    }

    // ========================================================================
    // SECTION: Verifications
    // ========================================================================

    /// Verifies the current URL equals `url`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Assertion`] with the last observed URL.
    pub async fn verify_url_is(&self, url: &str) -> Result<(), HarnessError> {
        self.wait_for_url("current url", url, |current| current == url).await.map(|_| ())
    }

    /// Verifies the current URL matches `rx`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Assertion`] with the last observed URL.
    pub async fn verify_url_is_regexp(&self, rx: &Regex) -> Result<(), HarnessError> {
        self.wait_for_url("current url pattern", rx.as_str(), |current| rx.is_match(current))
            .await
            .map(|_| ())
    }

    /// Verifies the tab shows the public home page.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Assertion`] when the URL never matches.
    pub async fn verify_is_home(&self) -> Result<(), HarnessError> {
        self.verify_url_is(&format!("{}/", self.urls.home_base_url())).await
    }

    /// Verifies the first-factor stage is displayed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ElementTimeout`] when the stage never renders.
    pub async fn verify_is_first_factor_page(&self) -> Result<(), HarnessError> {
        self.wait_for_element(selectors::FIRST_FACTOR_STAGE).await.map(|_| ())
    }

    /// Verifies the second-factor stage is displayed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ElementTimeout`] when the stage never renders.
    pub async fn verify_is_second_factor_page(&self) -> Result<(), HarnessError> {
        self.wait_for_element(selectors::SECOND_FACTOR_STAGE).await.map(|_| ())
    }

    /// Verifies the authenticated stage is displayed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ElementTimeout`] when the stage never renders.
    pub async fn verify_is_authenticated_page(&self) -> Result<(), HarnessError> {
        self.wait_for_element(selectors::AUTHENTICATED_STAGE).await.map(|_| ())
    }

    /// Verifies the two-factor settings page is displayed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ElementTimeout`] when the page never renders.
    pub async fn verify_is_settings_page(&self) -> Result<(), HarnessError> {
        self.wait_for_element(selectors::SETTINGS_PAGE).await.map(|_| ())
    }

    /// Verifies the protected resource is displayed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::ElementTimeout`] when the secret never renders.
    pub async fn verify_secret_authorized(&self) -> Result<(), HarnessError> {
        self.wait_for_element(selectors::SECRET).await.map(|_| ())
    }

    /// Verifies a notification containing `message` is displayed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Assertion`] with the notifications observed last.
    pub async fn verify_notification_displayed(&self, message: &str) -> Result<(), HarnessError> {
        let page = self.page.as_ref();
        let outcome = poll_until(self.wait, move || async move {
            let texts = page.element_texts(selectors::NOTIFICATION).await?;
            Ok::<_, HarnessError>(if texts.iter().any(|text| text.contains(message)) {
                Ok(())
            } else {
                Err(texts)
            })
        })
        .await;
        match outcome {
            Ok(()) => Ok(()),
            Err(Ok(expired)) => {
                let actual = if expired.last.is_empty() {
                    "no notification".to_string()
                } else {
                    expired.last.join(" | ")
                };
                Err(HarnessError::assertion("notification", message, actual))
            }
            Err(Err(err)) => Err(err),
        }
    }

    // ========================================================================
    // SECTION: Actions
    // ========================================================================

    /// Navigates to `url`.
    ///
    /// # Errors
    ///
    /// Returns the driver error when navigation fails.
    pub async fn visit(&self, url: &str) -> Result<(), HarnessError> {
        self.page.navigate(url).await
    }

    /// Opens the login page, carrying `target` as the redirect when set.
    ///
    /// # Errors
    ///
    /// Returns an error when the URL cannot be built or navigation fails.
    pub async fn visit_login_page(&self, target: Option<&str>) -> Result<(), HarnessError> {
        self.visit(&self.urls.login_page_url(target)?).await
    }

    /// Fills the first-factor form and submits it.
    ///
    /// # Errors
    ///
    /// Returns an error when the form never renders or an interaction fails.
    pub async fn fill_login_page_and_click(
        &self,
        username: &str,
        password: &str,
        keep_me_logged_in: bool,
    ) -> Result<(), HarnessError> {
        self.verify_is_first_factor_page().await?;
        self.wait_for_element(selectors::USERNAME_INPUT).await?;
        self.page.type_into(selectors::USERNAME_INPUT, username).await?;
        self.page.type_into(selectors::PASSWORD_INPUT, password).await?;
        if keep_me_logged_in {
            self.page.click(selectors::REMEMBER_CHECKBOX).await?;
        }
        self.page.click(selectors::SIGN_IN_BUTTON).await
    }

    /// Completes the first factor, optionally targeting a protected URL.
    ///
    /// # Errors
    ///
    /// Returns an error when the login page or form interaction fails.
    pub async fn login_one_factor(
        &self,
        username: &str,
        password: &str,
        keep_me_logged_in: bool,
        target: Option<&str>,
    ) -> Result<(), HarnessError> {
        self.visit_login_page(target).await?;
        self.fill_login_page_and_click(username, password, keep_me_logged_in).await
    }

    /// Types a passcode into the one-time password input.
    ///
    /// # Errors
    ///
    /// Returns an error when the input never renders or typing fails.
    pub async fn enter_otp(&self, code: &str) -> Result<(), HarnessError> {
        self.wait_for_element(selectors::OTP_INPUT).await?;
        self.page.type_into(selectors::OTP_INPUT, code).await
    }

    /// Enters the current passcode of the secret registered for `username`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingCredential`] when nothing is registered,
    /// or the error of [`Tab::enter_otp`].
    pub async fn validate_totp(
        &self,
        credentials: &CredentialStore,
        username: &str,
    ) -> Result<(), HarnessError> {
        let code = credentials.get(username)?.generate_current()?;
        self.enter_otp(&code).await
    }

    /// Completes both factors, optionally targeting a protected URL.
    ///
    /// # Errors
    ///
    /// Returns an error when either factor fails.
    pub async fn login_second_factor_totp(
        &self,
        credentials: &CredentialStore,
        username: &str,
        password: &str,
        keep_me_logged_in: bool,
        target: Option<&str>,
    ) -> Result<(), HarnessError> {
        self.login_one_factor(username, password, keep_me_logged_in, target).await?;
        self.verify_is_second_factor_page().await?;
        self.validate_totp(credentials, username).await
    }

    /// Registers a TOTP device from the settings page and records its secret.
    ///
    /// # Errors
    ///
    /// Returns an error when the dialog flow fails, the presented secret does
    /// not carry the requested `options`, or the portal rejects the passcode.
    pub async fn open_settings_and_register_totp(
        &self,
        credentials: &CredentialStore,
        username: &str,
        options: TotpOptions,
    ) -> Result<OtpSecret, HarnessError> {
        options.validate()?;
        self.visit(&self.urls.settings_url()).await?;
        self.verify_is_settings_page().await?;
        self.click_when_ready(selectors::TOTP_ADD_BUTTON).await?;
        if !options.is_default() {
            self.click_when_ready(selectors::DIALOG_ADVANCED).await?;
            self.click_when_ready(&selectors::totp_algorithm_option(options.algorithm.as_str()))
                .await?;
            self.click_when_ready(&selectors::totp_length_option(options.digits)).await?;
            self.click_when_ready(&selectors::totp_period_option(options.period)).await?;
        }
        self.click_when_ready(selectors::DIALOG_NEXT).await?;

        let otpauth = self.wait_for_value(selectors::SECRET_URL_FIELD).await?;
        let secret = OtpSecret::from_otpauth_url(&otpauth)?;
        if secret.options() != options {
            return Err(HarnessError::assertion(
                "registered totp options",
                describe(options),
                describe(secret.options()),
            ));
        }

        self.click_when_ready(selectors::DIALOG_NEXT).await?;
        self.enter_otp(&secret.generate_current()?).await?;
        self.verify_notification_displayed(selectors::NOTIFY_TOTP_ADDED).await?;
        credentials.set(username, secret.clone());
        Ok(secret)
    }

    /// Completes the first factor and registers a TOTP device.
    ///
    /// # Errors
    ///
    /// Returns an error when login or registration fails.
    pub async fn login_and_register_totp(
        &self,
        credentials: &CredentialStore,
        username: &str,
        password: &str,
        keep_me_logged_in: bool,
        options: TotpOptions,
    ) -> Result<OtpSecret, HarnessError> {
        self.login_one_factor(username, password, keep_me_logged_in, None).await?;
        self.verify_is_second_factor_page().await?;
        self.open_settings_and_register_totp(credentials, username, options).await
    }

    /// Removes the TOTP device of `username` from the settings page.
    ///
    /// # Errors
    ///
    /// Returns an error when the settings flow fails.
    pub async fn open_settings_and_delete_totp(
        &self,
        credentials: &CredentialStore,
        username: &str,
    ) -> Result<(), HarnessError> {
        self.visit(&self.urls.settings_url()).await?;
        self.verify_is_settings_page().await?;
        self.click_when_ready(selectors::TOTP_DELETE_BUTTON).await?;
        self.click_when_ready(selectors::DIALOG_DELETE).await?;
        self.verify_notification_displayed(selectors::NOTIFY_TOTP_DELETED).await?;
        credentials.remove(username);
        Ok(())
    }

    /// Logs out and verifies the first-factor stage is shown again.
    ///
    /// # Errors
    ///
    /// Returns an error when navigation fails or the login form never renders.
    pub async fn logout(&self) -> Result<(), HarnessError> {
        self.visit(&self.urls.logout_url()).await?;
        self.verify_is_first_factor_page().await
    }
}

/// Renders options as `ALG/digits/periods`.
fn describe(options: TotpOptions) -> String {
    format!("{}/{}/{}s", options.algorithm, options.digits, options.period)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
