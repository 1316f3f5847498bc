// crates/portal-e2e-harness/src/urls.rs
// ============================================================================
// Module: Portal URL Layout
// Description: Host and path layout of the portal test environment.
// Purpose: Derive home, admin, login and redirect URLs from one base domain.
// Dependencies: regex, url
// ============================================================================

//! ## Overview
//! The test environment serves three hosts under one base domain: `home`
//! (public landing page), `admin` (protected resources) and `login` (the
//! portal, optionally under a path prefix). Unauthenticated requests for a
//! protected resource land on the login page with the original URL in `rd`
//! and, depending on the proxy, the request method in `rm`.

use regex::Regex;
use url::Url;

use crate::config::PortalTestConfig;
use crate::error::HarnessError;

/// Query parameter carrying the post-login redirect target.
pub const REDIRECT_PARAM: &str = "rd";
/// Query parameter carrying the original request method.
pub const METHOD_PARAM: &str = "rm";
/// Settings page path relative to the login base URL.
pub const SETTINGS_TOTP_PATH: &str = "/settings/two-factor-authentication";
/// Logout path relative to the login base URL.
pub const LOGOUT_PATH: &str = "/logout";
/// Path of the protected resource served by the admin and home hosts.
pub const SECRET_PATH: &str = "/secret.html";

/// Portal URL layout derived from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalUrls {
    /// Base domain (`host[:port]`).
    base_domain: String,
    /// Optional login path prefix.
    path_prefix: Option<String>,
}

impl PortalUrls {
    /// Builds a layout for `base_domain` with an optional path prefix.
    #[must_use]
    pub fn new(base_domain: impl Into<String>, path_prefix: Option<String>) -> Self {
        Self {
            base_domain: base_domain.into(),
            path_prefix,
        }
    }

    /// Builds the layout from suite configuration.
    #[must_use]
    pub fn from_config(config: &PortalTestConfig) -> Self {
        Self::new(config.base_domain.clone(), config.path_prefix.clone())
    }

    /// Returns the base domain.
    #[must_use]
    pub fn base_domain(&self) -> &str {
        &self.base_domain
    }

    /// Returns the public home base URL.
    #[must_use]
    pub fn home_base_url(&self) -> String {
        format!("https://home.{}", self.base_domain)
    }

    /// Returns the protected admin base URL.
    #[must_use]
    pub fn admin_base_url(&self) -> String {
        format!("https://admin.{}", self.base_domain)
    }

    /// Returns the login base URL including the configured prefix.
    #[must_use]
    pub fn login_base_url(&self) -> String {
        format!("https://login.{}{}", self.base_domain, self.path_prefix.as_deref().unwrap_or(""))
    }

    /// Returns the login base URL, substituting `fallback` when no prefix is set.
    #[must_use]
    pub fn login_base_url_with_fallback_prefix(&self, fallback: &str) -> String {
        let prefix = self.path_prefix.as_deref().unwrap_or(fallback);
        format!("https://login.{}{}", self.base_domain, prefix)
    }

    /// Returns the login page URL, carrying `target` as the redirect when set.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Url`] when the login URL cannot be parsed.
    pub fn login_page_url(&self, target: Option<&str>) -> Result<String, HarnessError> {
        let mut url = parse(&self.login_base_url_with_fallback_prefix("/"))?;
        if let Some(target) = target.filter(|target| !target.is_empty()) {
            url.query_pairs_mut().append_pair(REDIRECT_PARAM, target);
        }
        Ok(url.to_string())
    }

    /// Returns the TOTP settings page URL.
    #[must_use]
    pub fn settings_url(&self) -> String {
        format!("{}{SETTINGS_TOTP_PATH}", self.login_base_url())
    }

    /// Returns the logout URL.
    #[must_use]
    pub fn logout_url(&self) -> String {
        format!("{}{LOGOUT_PATH}", self.login_base_url())
    }

    /// Returns the expected post-redirect URL pattern for a protected `target`.
    ///
    /// The pattern is anchored and accepts an optional trailing `&rm=GET`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Url`] when the login URL cannot be parsed.
    pub fn redirect_pattern(&self, target: &str) -> Result<Regex, HarnessError> {
        let mut expected = parse(&self.login_base_url_with_fallback_prefix("/"))?;
        let mut pairs: Vec<(String, String)> = expected
            .query_pairs()
            .filter(|(key, _)| key != REDIRECT_PARAM)
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        pairs.push((REDIRECT_PARAM.to_string(), target.to_string()));
        pairs.sort();
        expected.query_pairs_mut().clear().extend_pairs(pairs);
        let pattern = format!("^{}(&{METHOD_PARAM}=GET)?$", regex::escape(expected.as_str()));
        Regex::new(&pattern).map_err(|err| HarnessError::Url(err.to_string()))
    }
}

/// Returns the protected resource URL under `base`.
#[must_use]
pub fn secret_url(base: &str) -> String {
    format!("{base}{SECRET_PATH}")
}

/// Parses an absolute URL.
fn parse(raw: &str) -> Result<Url, HarnessError> {
    Url::parse(raw).map_err(|err| HarnessError::Url(format!("{raw}: {err}")))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions favor direct unwrap for clarity.")]

    use super::*;

    #[test]
    fn hosts_share_the_base_domain() {
        let urls = PortalUrls::new("example.com:8080", None);
        assert_eq!(urls.home_base_url(), "https://home.example.com:8080");
        assert_eq!(urls.admin_base_url(), "https://admin.example.com:8080");
        assert_eq!(urls.login_base_url(), "https://login.example.com:8080");
        assert_eq!(
            secret_url(&urls.admin_base_url()),
            "https://admin.example.com:8080/secret.html"
        );
    }

    #[test]
    fn fallback_prefix_only_applies_without_configured_prefix() {
        let plain = PortalUrls::new("example.com:8080", None);
        assert_eq!(
            plain.login_base_url_with_fallback_prefix("/"),
            "https://login.example.com:8080/"
        );

        let prefixed = PortalUrls::new("example.com:8080", Some("/auth".to_string()));
        assert_eq!(
            prefixed.login_base_url_with_fallback_prefix("/"),
            "https://login.example.com:8080/auth"
        );
        assert_eq!(
            prefixed.settings_url(),
            "https://login.example.com:8080/auth/settings/two-factor-authentication"
        );
    }

    #[test]
    fn redirect_pattern_matches_with_and_without_method() {
        let urls = PortalUrls::new("example.com:8080", None);
        let target = secret_url(&urls.admin_base_url());
        let rx = urls.redirect_pattern(&target).unwrap();

        let base = "https://login.example.com:8080/?rd=https%3A%2F%2Fadmin.example.com%3A8080%2Fsecret.html";
        assert!(rx.is_match(base));
        assert!(rx.is_match(&format!("{base}&rm=GET")));
        assert!(!rx.is_match(&format!("{base}&rm=POST")));
        assert!(!rx.is_match(&format!("{base}#/")));
        assert!(!rx.is_match("https://login.example.com:8080/"));
    }

    #[test]
    fn login_page_url_encodes_target() {
        let urls = PortalUrls::new("example.com:8080", None);
        assert_eq!(urls.login_page_url(None).unwrap(), "https://login.example.com:8080/");
        assert_eq!(urls.login_page_url(Some("")).unwrap(), "https://login.example.com:8080/");
        assert_eq!(
            urls.login_page_url(Some("https://home.example.com:8080/")).unwrap(),
            "https://login.example.com:8080/?rd=https%3A%2F%2Fhome.example.com%3A8080%2F"
        );
    }
}
