// crates/portal-e2e-harness/src/simulator.rs
// ============================================================================
// Module: Simulated Portal
// Description: In-process stand-in for the browser and portal under test.
// Purpose: Exercise tab helpers, the suite runner and suite scripts offline.
// Dependencies: async-trait, url, uuid
// ============================================================================

//! ## Overview
//! [`SimulatedPortal`] implements [`BrowserDriver`] and renders a minimal
//! model of the portal: first-factor and second-factor stages, the TOTP
//! settings dialog, protected resources that redirect with `rd`/`rm`, and
//! notifications. Each tab has its own session, like an incognito context;
//! device registrations are shared, like server-side storage.
//!
//! Only the page contracts in [`crate::selectors`] are modeled. Anything else
//! behaves as an empty page.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::driver::BrowserDriver;
use crate::driver::PageDriver;
use crate::error::HarnessError;
use crate::otp::OtpSecret;
use crate::otp::TotpAlgorithm;
use crate::otp::TotpOptions;
use crate::selectors;
use crate::urls::PortalUrls;
use crate::urls::LOGOUT_PATH;
use crate::urls::METHOD_PARAM;
use crate::urls::REDIRECT_PARAM;
use crate::urls::SECRET_PATH;
use crate::urls::SETTINGS_TOTP_PATH;

/// Issuer shown in simulated otpauth URLs.
const ISSUER: &str = "Authelia";
/// Text of the simulated protected resource.
pub const SECRET_TEXT: &str = "This is a very important secret!";
/// Bytes returned for every simulated screenshot.
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\n";

// ============================================================================
// SECTION: Portal
// ============================================================================

/// Shared portal state (users, registrations, counters, fault switches).
struct PortalState {
    /// URL layout served by the simulator.
    urls: PortalUrls,
    /// Accepted credentials.
    users: HashMap<String, String>,
    /// Registered devices by username.
    registrations: Mutex<HashMap<String, OtpSecret>>,
    /// Frontend coverage returned for `window.__coverage__`.
    coverage: Option<Value>,
    /// Navigations to URLs containing this text never complete.
    stall_on: Option<String>,
    /// Stopping the browser fails.
    failing_stop: bool,
    /// Browser was stopped.
    stopped: AtomicBool,
    /// Tabs opened.
    tabs_opened: AtomicUsize,
    /// Tabs closed.
    tabs_closed: AtomicUsize,
    /// Screenshots taken.
    screenshots: AtomicUsize,
}

/// In-process browser plus portal.
#[derive(Clone)]
pub struct SimulatedPortal {
    /// Shared state.
    state: Arc<PortalState>,
}

impl SimulatedPortal {
    /// Creates a portal serving `urls` with the test user `john`/`password`.
    #[must_use]
    pub fn new(urls: PortalUrls) -> Self {
        let mut users = HashMap::new();
        users.insert("john".to_string(), "password".to_string());
        Self {
            state: Arc::new(PortalState {
                urls,
                users,
                registrations: Mutex::new(HashMap::new()),
                coverage: None,
                stall_on: None,
                failing_stop: false,
                stopped: AtomicBool::new(false),
                tabs_opened: AtomicUsize::new(0),
                tabs_closed: AtomicUsize::new(0),
                screenshots: AtomicUsize::new(0),
            }),
        }
    }

    /// Rebuilds the shared state with `edit` applied; only valid before use.
    fn configure(self, edit: impl FnOnce(&mut PortalState)) -> Self {
        let mut state = Arc::try_unwrap(self.state).unwrap_or_else(|shared| PortalState {
            urls: shared.urls.clone(),
            users: shared.users.clone(),
            registrations: Mutex::new(shared.registrations()),
            coverage: shared.coverage.clone(),
            stall_on: shared.stall_on.clone(),
            failing_stop: shared.failing_stop,
            stopped: AtomicBool::new(false),
            tabs_opened: AtomicUsize::new(0),
            tabs_closed: AtomicUsize::new(0),
            screenshots: AtomicUsize::new(0),
        });
        edit(&mut state);
        Self {
            state: Arc::new(state),
        }
    }

    /// Adds an accepted user.
    #[must_use]
    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.configure(|state| {
            state.users.insert(username.to_string(), password.to_string());
        })
    }

    /// Serves `coverage` as `window.__coverage__`.
    #[must_use]
    pub fn with_coverage(self, coverage: Value) -> Self {
        self.configure(|state| state.coverage = Some(coverage))
    }

    /// Makes navigations to URLs containing `needle` hang forever.
    #[must_use]
    pub fn stall_on(self, needle: &str) -> Self {
        self.configure(|state| state.stall_on = Some(needle.to_string()))
    }

    /// Makes [`BrowserDriver::stop`] fail.
    #[must_use]
    pub fn failing_stop(self) -> Self {
        self.configure(|state| state.failing_stop = true)
    }

    /// Returns the device registered for `username`.
    #[must_use]
    pub fn registration(&self, username: &str) -> Option<OtpSecret> {
        self.state.registrations().get(username).cloned()
    }

    /// Returns the number of tabs opened so far.
    #[must_use]
    pub fn tabs_opened(&self) -> usize {
        self.state.tabs_opened.load(Ordering::SeqCst)
    }

    /// Returns the number of tabs closed so far.
    #[must_use]
    pub fn tabs_closed(&self) -> usize {
        self.state.tabs_closed.load(Ordering::SeqCst)
    }

    /// Returns the number of screenshots taken so far.
    #[must_use]
    pub fn screenshots_taken(&self) -> usize {
        self.state.screenshots.load(Ordering::SeqCst)
    }

    /// Returns true once the browser was stopped.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.state.stopped.load(Ordering::SeqCst)
    }
}

impl PortalState {
    /// Snapshot of registrations.
    fn registrations(&self) -> HashMap<String, OtpSecret> {
        self.registrations.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Registered device of `username`.
    fn registration(&self, username: &str) -> Option<OtpSecret> {
        self.registrations.lock().unwrap_or_else(PoisonError::into_inner).get(username).cloned()
    }
}

#[async_trait]
impl BrowserDriver for SimulatedPortal {
    async fn open_tab(&self, url: &str) -> Result<Box<dyn PageDriver>, HarnessError> {
        if self.is_stopped() {
            return Err(HarnessError::Browser("browser already stopped".to_string()));
        }
        self.state.tabs_opened.fetch_add(1, Ordering::SeqCst);
        let tab = SimulatedTab {
            portal: Arc::clone(&self.state),
            view: Mutex::new(TabState::default()),
        };
        tab.navigate(url).await?;
        Ok(Box::new(tab))
    }

    async fn stop(&self) -> Result<(), HarnessError> {
        if self.state.failing_stop {
            return Err(HarnessError::Browser("browser refused to stop".to_string()));
        }
        self.state.stopped.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// SECTION: Tab State
// ============================================================================

/// Rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum View {
    /// Nothing loaded yet.
    #[default]
    Blank,
    /// Public landing page.
    Home,
    /// Username/password stage.
    FirstFactor,
    /// One-time password stage.
    SecondFactor,
    /// Logged in without a redirect target.
    Authenticated,
    /// Two-factor settings.
    Settings,
    /// Protected resource.
    Secret,
    /// Unknown path.
    NotFound,
}

/// Settings dialog step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Dialog {
    /// No dialog open.
    #[default]
    Closed,
    /// Options step; `advanced` reveals algorithm/length/period choices.
    Options {
        /// Advanced choices visible.
        advanced: bool,
    },
    /// Secret presentation step.
    Secret,
    /// Passcode confirmation step.
    Code,
    /// Removal confirmation.
    ConfirmDelete,
}

/// Per-tab session (an incognito context).
#[derive(Debug, Clone, Default)]
struct Session {
    /// User who passed the first factor.
    user: Option<String>,
    /// Second factor completed.
    second_factor: bool,
}

/// Mutable per-tab state.
#[derive(Debug, Default)]
struct TabState {
    /// Current URL.
    url: String,
    /// Rendered view.
    view: View,
    /// Session cookies of this tab.
    session: Session,
    /// Redirect target of the current login page.
    redirect: Option<String>,
    /// Typed input values by selector.
    fields: HashMap<String, String>,
    /// Keep-me-logged-in checkbox state.
    remember: bool,
    /// Visible notifications.
    notifications: Vec<String>,
    /// Settings dialog step.
    dialog: Dialog,
    /// Options chosen in the registration dialog.
    pending_options: TotpOptions,
    /// Secret presented by the registration dialog.
    pending_secret: Option<OtpSecret>,
    /// Digits typed into the one-time password input.
    otp_buffer: String,
    /// Tab closed.
    closed: bool,
}

/// One simulated tab.
struct SimulatedTab {
    /// Shared portal.
    portal: Arc<PortalState>,
    /// Tab state.
    view: Mutex<TabState>,
}

impl SimulatedTab {
    /// Locks the tab state.
    fn state(&self) -> std::sync::MutexGuard<'_, TabState> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Routes `raw` and renders the resulting view.
    fn route(&self, tab: &mut TabState, raw: &str) -> Result<(), HarnessError> {
        let url = Url::parse(raw).map_err(|err| HarnessError::page("navigate", err))?;
        let full = url.to_string();
        let urls = &self.portal.urls;
        tab.notifications.clear();
        tab.dialog = Dialog::Closed;
        tab.otp_buffer.clear();
        tab.fields.clear();

        if origin_matches(&full, &urls.home_base_url()) {
            if url.path() == SECRET_PATH {
                return self.protected(tab, &full);
            }
            tab.url = full;
            tab.view = View::Home;
            return Ok(());
        }
        if origin_matches(&full, &urls.admin_base_url()) {
            if url.path() == SECRET_PATH {
                return self.protected(tab, &full);
            }
            tab.url = full;
            tab.view = View::NotFound;
            return Ok(());
        }
        let login = urls.login_base_url();
        if let Some(rest) = full.strip_prefix(&login) {
            let path = rest.split(['?', '#']).next().unwrap_or_default().to_string();
            let redirect = url
                .query_pairs()
                .find(|(key, _)| key == REDIRECT_PARAM)
                .map(|(_, value)| value.into_owned());
            return match path.as_str() {
                "" | "/" => self.login_landing(tab, full, redirect),
                LOGOUT_PATH => {
                    tab.session = Session::default();
                    let landing = urls.login_page_url(None)?;
                    self.login_landing(tab, landing, None)
                }
                SETTINGS_TOTP_PATH => {
                    if tab.session.user.is_some() {
                        tab.url = full;
                        tab.view = View::Settings;
                        Ok(())
                    } else {
                        let landing = urls.login_page_url(Some(&full))?;
                        self.login_landing(tab, landing, Some(full))
                    }
                }
                _ => {
                    tab.url = full;
                    tab.view = View::NotFound;
                    Ok(())
                }
            };
        }
        Err(HarnessError::page("navigate", format!("host unreachable: {full}")))
    }

    /// Serves a protected resource or redirects to the login page.
    fn protected(&self, tab: &mut TabState, target: &str) -> Result<(), HarnessError> {
        if tab.session.second_factor {
            tab.url = target.to_string();
            tab.view = View::Secret;
            return Ok(());
        }
        let landing =
            format!("{}&{METHOD_PARAM}=GET", self.portal.urls.login_page_url(Some(target))?);
        self.login_landing(tab, landing, Some(target.to_string()))
    }

    /// Renders the login page for the current session.
    fn login_landing(
        &self,
        tab: &mut TabState,
        url: String,
        redirect: Option<String>,
    ) -> Result<(), HarnessError> {
        if tab.session.second_factor {
            if let Some(target) = redirect {
                return self.route(tab, &target);
            }
            tab.url = url;
            tab.view = View::Authenticated;
            return Ok(());
        }
        tab.url = url;
        tab.redirect = redirect;
        tab.view = if tab.session.user.is_some() { View::SecondFactor } else { View::FirstFactor };
        Ok(())
    }

    /// Returns the texts of elements matching `selector` in the current view.
    fn elements(&self, tab: &TabState, selector: &str) -> Vec<String> {
        if selector == selectors::NOTIFICATION {
            return tab.notifications.clone();
        }
        let registered =
            tab.session.user.as_deref().and_then(|user| self.portal.registration(user)).is_some();
        let present = match (tab.view, selector) {
            (View::Home, "#home-page") => true,
            (View::Secret, selectors::SECRET) => return vec![SECRET_TEXT.to_string()],
            (
                View::FirstFactor,
                selectors::FIRST_FACTOR_STAGE
                | selectors::USERNAME_INPUT
                | selectors::PASSWORD_INPUT
                | selectors::REMEMBER_CHECKBOX
                | selectors::SIGN_IN_BUTTON,
            )
            | (View::Authenticated, selectors::AUTHENTICATED_STAGE)
            | (View::SecondFactor, selectors::SECOND_FACTOR_STAGE)
            | (View::Settings, selectors::SETTINGS_PAGE) => true,
            (View::SecondFactor, selectors::OTP_INPUT) => registered,
            (View::Settings, _) => settings_element(tab.dialog, registered, selector),
            _ => false,
        };
        if present { vec![String::new()] } else { Vec::new() }
    }

    /// Fails when `selector` is absent, like a driver's element lookup.
    fn require(
        &self,
        tab: &TabState,
        action: &'static str,
        selector: &str,
    ) -> Result<(), HarnessError> {
        if tab.closed {
            return Err(HarnessError::page(action, "tab closed"));
        }
        if self.elements(tab, selector).is_empty() {
            return Err(HarnessError::page(action, format!("no element matches {selector}")));
        }
        Ok(())
    }

    /// Handles a submitted first factor.
    fn sign_in(&self, tab: &mut TabState) {
        let username = tab.fields.get(selectors::USERNAME_INPUT).cloned().unwrap_or_default();
        let password = tab.fields.get(selectors::PASSWORD_INPUT).cloned().unwrap_or_default();
        if self.portal.users.get(&username) == Some(&password) {
            tab.session.user = Some(username);
            tab.fields.clear();
            tab.view = View::SecondFactor;
        } else {
            tab.notifications = vec![selectors::NOTIFY_BAD_CREDENTIALS.to_string()];
        }
    }

    /// Handles a complete passcode typed into the OTP input.
    fn submit_otp(&self, tab: &mut TabState, code: &str) -> Result<(), HarnessError> {
        let user = tab.session.user.clone().unwrap_or_default();
        if tab.view == View::Settings && tab.dialog == Dialog::Code {
            let secret = tab
                .pending_secret
                .clone()
                .ok_or_else(|| HarnessError::page("type", "no pending secret"))?;
            if secret.check_current(code)? {
                self.portal
                    .registrations
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(user, secret);
                tab.dialog = Dialog::Closed;
                tab.pending_secret = None;
                tab.notifications = vec![selectors::NOTIFY_TOTP_ADDED.to_string()];
            } else {
                tab.notifications = vec![selectors::NOTIFY_OTP_WRONG.to_string()];
            }
            return Ok(());
        }
        let valid = match self.portal.registration(&user) {
            Some(secret) => secret.check_current(code)?,
            None => false,
        };
        if valid {
            tab.session.second_factor = true;
            match tab.redirect.take() {
                Some(target) => self.route(tab, &target)?,
                None => tab.view = View::Authenticated,
            }
        } else {
            tab.notifications = vec![selectors::NOTIFY_OTP_WRONG.to_string()];
        }
        Ok(())
    }

    /// Number of digits the OTP input expects in the current context.
    fn expected_digits(&self, tab: &TabState) -> usize {
        if tab.dialog == Dialog::Code {
            return tab.pending_secret.as_ref().map_or(6, |secret| secret.options().digits);
        }
        tab.session
            .user
            .as_deref()
            .and_then(|user| self.portal.registration(user))
            .map_or(6, |secret| secret.options().digits)
    }
}

/// True when `url` is served by `base` (same scheme, host and port).
fn origin_matches(url: &str, base: &str) -> bool {
    url.strip_prefix(base).is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']))
}

/// Settings page elements for the dialog step.
fn settings_element(dialog: Dialog, registered: bool, selector: &str) -> bool {
    match dialog {
        Dialog::Closed => {
            (selector == selectors::TOTP_ADD_BUTTON && !registered)
                || (selector == selectors::TOTP_DELETE_BUTTON && registered)
        }
        Dialog::Options {
            advanced,
        } => {
            selector == selectors::DIALOG_NEXT
                || selector == selectors::DIALOG_ADVANCED
                || (advanced && parse_option(selector).is_some())
        }
        Dialog::Secret => {
            selector == selectors::SECRET_URL_FIELD || selector == selectors::DIALOG_NEXT
        }
        Dialog::Code => selector == selectors::OTP_INPUT,
        Dialog::ConfirmDelete => selector == selectors::DIALOG_DELETE,
    }
}

/// An advanced registration choice.
enum OptionChoice {
    /// Algorithm radio.
    Algorithm(TotpAlgorithm),
    /// Length radio.
    Digits(usize),
    /// Period radio.
    Period(u64),
}

/// Parses an advanced option selector.
fn parse_option(selector: &str) -> Option<OptionChoice> {
    if let Some(label) = selector.strip_prefix("#totp-algorithm-") {
        return TotpAlgorithm::parse(label).ok().map(OptionChoice::Algorithm);
    }
    if let Some(digits) = selector.strip_prefix("#totp-length-") {
        return digits.parse().ok().filter(|d| *d == 6 || *d == 8).map(OptionChoice::Digits);
    }
    if let Some(period) = selector.strip_prefix("#totp-period-") {
        return period.parse().ok().filter(|p| *p > 0).map(OptionChoice::Period);
    }
    None
}

/// Fresh 32-byte device secret.
fn random_secret() -> Vec<u8> {
    let mut bytes = uuid::Uuid::new_v4().as_bytes().to_vec();
    bytes.extend_from_slice(uuid::Uuid::new_v4().as_bytes());
    bytes
}

#[async_trait]
impl PageDriver for SimulatedTab {
    async fn navigate(&self, url: &str) -> Result<(), HarnessError> {
        if self.portal.stall_on.as_deref().is_some_and(|needle| url.contains(needle)) {
            std::future::pending::<()>().await;
        }
        let mut tab = self.state();
        if tab.closed {
            return Err(HarnessError::page("navigate", "tab closed"));
        }
        tab.redirect = None;
        self.route(&mut tab, url)
    }

    async fn current_url(&self) -> Result<String, HarnessError> {
        Ok(self.state().url.clone())
    }

    async fn element_texts(&self, selector: &str) -> Result<Vec<String>, HarnessError> {
        let tab = self.state();
        Ok(self.elements(&tab, selector))
    }

    async fn element_value(&self, selector: &str) -> Result<Option<String>, HarnessError> {
        let tab = self.state();
        if selector == selectors::SECRET_URL_FIELD && tab.dialog == Dialog::Secret {
            let account = tab.session.user.clone().unwrap_or_default();
            return Ok(tab
                .pending_secret
                .as_ref()
                .map(|secret| secret.otpauth_url(ISSUER, &account)));
        }
        Ok(tab.fields.get(selector).cloned())
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), HarnessError> {
        let mut tab = self.state();
        self.require(&tab, "type", selector)?;
        if selector != selectors::OTP_INPUT {
            tab.fields.entry(selector.to_string()).or_default().push_str(text);
            return Ok(());
        }
        tab.otp_buffer.push_str(text);
        let digits = self.expected_digits(&tab);
        if tab.otp_buffer.len() >= digits {
            let code = std::mem::take(&mut tab.otp_buffer);
            self.submit_otp(&mut tab, &code)?;
        }
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), HarnessError> {
        let mut tab = self.state();
        self.require(&tab, "click", selector)?;
        let dialog = tab.dialog;
        match selector {
            selectors::SIGN_IN_BUTTON => self.sign_in(&mut tab),
            selectors::REMEMBER_CHECKBOX => tab.remember = !tab.remember,
            selectors::TOTP_ADD_BUTTON => {
                tab.dialog = Dialog::Options {
                    advanced: false,
                };
                tab.pending_options = TotpOptions::default();
            }
            selectors::DIALOG_ADVANCED => {
                tab.dialog = Dialog::Options {
                    advanced: true,
                };
            }
            selectors::DIALOG_NEXT => match dialog {
                Dialog::Options {
                    ..
                } => {
                    tab.pending_secret =
                        Some(OtpSecret::new(random_secret(), tab.pending_options)?);
                    tab.dialog = Dialog::Secret;
                }
                Dialog::Secret => tab.dialog = Dialog::Code,
                _ => {}
            },
            selectors::TOTP_DELETE_BUTTON => tab.dialog = Dialog::ConfirmDelete,
            selectors::DIALOG_DELETE => {
                if let Some(user) = tab.session.user.clone() {
                    self.portal
                        .registrations
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&user);
                }
                tab.dialog = Dialog::Closed;
                tab.notifications = vec![selectors::NOTIFY_TOTP_DELETED.to_string()];
            }
            other => match parse_option(other) {
                Some(OptionChoice::Algorithm(algorithm)) => {
                    tab.pending_options.algorithm = algorithm;
                }
                Some(OptionChoice::Digits(digits)) => tab.pending_options.digits = digits,
                Some(OptionChoice::Period(period)) => tab.pending_options.period = period,
                None => {}
            },
        }
        Ok(())
    }

    async fn evaluate_json(&self, expression: &str) -> Result<Value, HarnessError> {
        if expression.contains("__coverage__") {
            return Ok(self.portal.coverage.clone().unwrap_or(Value::Null));
        }
        Ok(Value::Null)
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, HarnessError> {
        self.portal.screenshots.fetch_add(1, Ordering::SeqCst);
        Ok(FAKE_PNG.to_vec())
    }

    async fn close(&self) -> Result<(), HarnessError> {
        let mut tab = self.state();
        if !tab.closed {
            tab.closed = true;
            self.portal.tabs_closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
