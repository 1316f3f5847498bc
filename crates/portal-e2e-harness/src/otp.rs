// crates/portal-e2e-harness/src/otp.rs
// ============================================================================
// Module: One-Time Passwords
// Description: TOTP device options, secrets and the per-suite credential store.
// Purpose: Turn a registered secret into passcodes for second-factor login.
// Dependencies: totp-rs, url
// ============================================================================

//! ## Overview
//! The registration dialog hands out an `otpauth://totp/...` URL. The harness
//! parses it into an [`OtpSecret`], stores it per user in a
//! [`CredentialStore`], and later asks `totp-rs` for the current passcode.
//! Code generation itself is delegated entirely to `totp-rs`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use totp_rs::Algorithm;
use totp_rs::Secret;
use totp_rs::TOTP;
use url::Url;

use crate::error::HarnessError;

// ============================================================================
// SECTION: Options
// ============================================================================

/// Accepted clock skew, in steps, when checking a passcode.
pub const TOTP_SKEW: u8 = 1;

/// HMAC algorithm selectable during registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TotpAlgorithm {
    /// HMAC-SHA1 (portal default).
    Sha1,
    /// HMAC-SHA256.
    Sha256,
    /// HMAC-SHA512.
    Sha512,
}

impl TotpAlgorithm {
    /// Returns the label used by the portal and in otpauth URLs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA1",
            Self::Sha256 => "SHA256",
            Self::Sha512 => "SHA512",
        }
    }

    /// Parses a label such as `SHA256` (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Otp`] for unknown labels.
    pub fn parse(label: &str) -> Result<Self, HarnessError> {
        match label.to_ascii_uppercase().as_str() {
            "SHA1" => Ok(Self::Sha1),
            "SHA256" => Ok(Self::Sha256),
            "SHA512" => Ok(Self::Sha512),
            other => Err(HarnessError::Otp(format!("unsupported algorithm {other}"))),
        }
    }

    /// Maps to the `totp-rs` algorithm.
    const fn to_totp(self) -> Algorithm {
        match self {
            Self::Sha1 => Algorithm::SHA1,
            Self::Sha256 => Algorithm::SHA256,
            Self::Sha512 => Algorithm::SHA512,
        }
    }
}

impl fmt::Display for TotpAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Device options chosen when registering a TOTP secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TotpOptions {
    /// HMAC algorithm.
    pub algorithm: TotpAlgorithm,
    /// Passcode length.
    pub digits: usize,
    /// Step length in seconds.
    pub period: u64,
}

impl Default for TotpOptions {
    fn default() -> Self {
        Self {
            algorithm: TotpAlgorithm::Sha1,
            digits: 6,
            period: 30,
        }
    }
}

impl TotpOptions {
    /// Returns true when these are the portal's default options.
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    /// Validates digit length and period.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Otp`] when the digits are not 6 or 8 or the
    /// period is zero.
    pub fn validate(&self) -> Result<(), HarnessError> {
        if self.digits != 6 && self.digits != 8 {
            return Err(HarnessError::Otp(format!("unsupported digit length {}", self.digits)));
        }
        if self.period == 0 {
            return Err(HarnessError::Otp("period must be greater than zero".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Secret
// ============================================================================

/// A registered TOTP secret and its device options.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpSecret {
    /// Raw shared secret.
    secret: Vec<u8>,
    /// Device options.
    options: TotpOptions,
}

impl fmt::Debug for OtpSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpSecret")
            .field("secret", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl OtpSecret {
    /// Builds a secret from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Otp`] when the options or secret length are
    /// rejected by `totp-rs`.
    pub fn new(secret: Vec<u8>, options: TotpOptions) -> Result<Self, HarnessError> {
        options.validate()?;
        let candidate = Self {
            secret,
            options,
        };
        candidate.totp()?;
        Ok(candidate)
    }

    /// Builds a secret from base32 text (padding optional, case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Otp`] when the text is not valid base32.
    pub fn from_base32(encoded: &str, options: TotpOptions) -> Result<Self, HarnessError> {
        let normalized = encoded.trim().trim_end_matches('=').to_ascii_uppercase();
        let bytes = Secret::Encoded(normalized)
            .to_bytes()
            .map_err(|_| HarnessError::Otp("secret is not valid base32".to_string()))?;
        Self::new(bytes, options)
    }

    /// Parses the `otpauth://totp/<label>?secret=...` URL shown during
    /// registration. Missing parameters fall back to the portal defaults.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Otp`] when the URL is malformed, is not a TOTP
    /// URL, or carries an invalid parameter.
    pub fn from_otpauth_url(raw: &str) -> Result<Self, HarnessError> {
        let url = Url::parse(raw.trim())
            .map_err(|err| HarnessError::Otp(format!("invalid otpauth url: {err}")))?;
        if url.scheme() != "otpauth" || url.host_str() != Some("totp") {
            return Err(HarnessError::Otp(format!("not a totp otpauth url: {}", url.scheme())));
        }
        let mut secret = None;
        let mut options = TotpOptions::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "secret" => secret = Some(value.into_owned()),
                "algorithm" => options.algorithm = TotpAlgorithm::parse(&value)?,
                "digits" => {
                    options.digits = value
                        .parse()
                        .map_err(|_| HarnessError::Otp(format!("invalid digits {value}")))?;
                }
                "period" => {
                    options.period = value
                        .parse()
                        .map_err(|_| HarnessError::Otp(format!("invalid period {value}")))?;
                }
                _ => {}
            }
        }
        let secret =
            secret.ok_or_else(|| HarnessError::Otp("otpauth url has no secret".to_string()))?;
        Self::from_base32(&secret, options)
    }

    /// Returns the device options.
    #[must_use]
    pub const fn options(&self) -> TotpOptions {
        self.options
    }

    /// Returns the secret as unpadded base32.
    #[must_use]
    pub fn base32(&self) -> String {
        match Secret::Raw(self.secret.clone()).to_encoded() {
            Secret::Encoded(encoded) => encoded,
            Secret::Raw(_) => String::new(),
        }
    }

    /// Renders an `otpauth://totp/` URL for `issuer:account`.
    #[must_use]
    pub fn otpauth_url(&self, issuer: &str, account: &str) -> String {
        let mut url = format!("otpauth://totp/{issuer}:{account}");
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("algorithm", self.options.algorithm.as_str())
            .append_pair("digits", &self.options.digits.to_string())
            .append_pair("issuer", issuer)
            .append_pair("period", &self.options.period.to_string())
            .append_pair("secret", &self.base32())
            .finish();
        url.push('?');
        url.push_str(&query);
        url
    }

    /// Generates the passcode for the step containing `unix_seconds`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Otp`] when `totp-rs` rejects the secret.
    pub fn generate_at(&self, unix_seconds: u64) -> Result<String, HarnessError> {
        Ok(self.totp()?.generate(unix_seconds))
    }

    /// Generates the passcode for the current time.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Otp`] when `totp-rs` rejects the secret.
    pub fn generate_current(&self) -> Result<String, HarnessError> {
        self.generate_at(unix_now())
    }

    /// Checks `code` against the current time with [`TOTP_SKEW`] steps of slack.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Otp`] when `totp-rs` rejects the secret.
    pub fn check_current(&self, code: &str) -> Result<bool, HarnessError> {
        Ok(self.totp()?.check(code, unix_now()))
    }

    /// Builds the `totp-rs` generator.
    fn totp(&self) -> Result<TOTP, HarnessError> {
        TOTP::new(
            self.options.algorithm.to_totp(),
            self.options.digits,
            TOTP_SKEW,
            self.options.period,
            self.secret.clone(),
        )
        .map_err(|err| HarnessError::Otp(err.to_string()))
    }
}

/// Seconds since the Unix epoch.
fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

// ============================================================================
// SECTION: Credential Store
// ============================================================================

/// Registered TOTP secrets, keyed by username, shared across a suite.
#[derive(Debug, Default)]
pub struct CredentialStore {
    /// Secrets by username.
    secrets: Mutex<HashMap<String, OtpSecret>>,
}

impl CredentialStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the secret registered for `username`, replacing any previous one.
    pub fn set(&self, username: &str, secret: OtpSecret) {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(username.to_string(), secret);
    }

    /// Returns the secret registered for `username`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::MissingCredential`] when nothing is registered.
    pub fn get(&self, username: &str) -> Result<OtpSecret, HarnessError> {
        self.secrets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(username)
            .cloned()
            .ok_or_else(|| HarnessError::MissingCredential(username.to_string()))
    }

    /// Forgets the secret registered for `username`.
    pub fn remove(&self, username: &str) -> Option<OtpSecret> {
        self.secrets.lock().unwrap_or_else(PoisonError::into_inner).remove(username)
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::use_debug,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use super::*;

    /// RFC 6238 appendix B SHA1 seed.
    const RFC_SHA1_SEED: &[u8] = b"12345678901234567890";

    /// Eight-digit, 30-second options for the RFC vectors.
    fn eight_digits(algorithm: TotpAlgorithm) -> TotpOptions {
        TotpOptions {
            algorithm,
            digits: 8,
            period: 30,
        }
    }

    #[test]
    fn generates_rfc6238_vectors() {
        let sha1 =
            OtpSecret::new(RFC_SHA1_SEED.to_vec(), eight_digits(TotpAlgorithm::Sha1)).unwrap();
        assert_eq!(sha1.generate_at(59).unwrap(), "94287082");
        assert_eq!(sha1.generate_at(1_111_111_109).unwrap(), "07081804");

        let sha256 = OtpSecret::new(
            b"12345678901234567890123456789012".to_vec(),
            eight_digits(TotpAlgorithm::Sha256),
        )
        .unwrap();
        assert_eq!(sha256.generate_at(59).unwrap(), "46119246");
    }

    #[test]
    fn six_digit_codes_are_the_low_order_digits() {
        let secret = OtpSecret::new(RFC_SHA1_SEED.to_vec(), TotpOptions::default()).unwrap();
        assert_eq!(secret.generate_at(59).unwrap(), "287082");
    }

    #[test]
    fn parses_registration_url() {
        let raw = "otpauth://totp/Authelia:john?algorithm=SHA1&digits=6&issuer=Authelia&period=30&secret=GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ";
        let secret = OtpSecret::from_otpauth_url(raw).unwrap();
        assert!(secret.options().is_default());
        assert_eq!(secret.generate_at(59).unwrap(), "287082");
    }

    #[test]
    fn otpauth_url_round_trips_non_default_options() {
        let options = TotpOptions {
            algorithm: TotpAlgorithm::Sha512,
            digits: 8,
            period: 60,
        };
        let secret = OtpSecret::new(RFC_SHA1_SEED.to_vec(), options).unwrap();
        let parsed = OtpSecret::from_otpauth_url(&secret.otpauth_url("Authelia", "john")).unwrap();
        assert_eq!(parsed, secret);
    }

    #[test]
    fn rejects_non_totp_urls_and_bad_options() {
        assert!(OtpSecret::from_otpauth_url("otpauth://hotp/x?secret=GEZDGNBV").is_err());
        assert!(OtpSecret::from_otpauth_url("https://example.com/?secret=GEZDGNBV").is_err());
        assert!(OtpSecret::from_otpauth_url("otpauth://totp/x?digits=6").is_err());
        let bad_digits = TotpOptions {
            digits: 7,
            ..TotpOptions::default()
        };
        assert!(OtpSecret::new(RFC_SHA1_SEED.to_vec(), bad_digits).is_err());
    }

    #[test]
    fn generated_code_checks_against_current_time() {
        let secret = OtpSecret::new(RFC_SHA1_SEED.to_vec(), TotpOptions::default()).unwrap();
        let code = secret.generate_current().unwrap();
        assert!(secret.check_current(&code).unwrap());
    }

    #[test]
    fn credential_store_tracks_registrations() {
        let store = CredentialStore::new();
        assert!(matches!(store.get("john"), Err(HarnessError::MissingCredential(_))));
        let secret = OtpSecret::new(RFC_SHA1_SEED.to_vec(), TotpOptions::default()).unwrap();
        store.set("john", secret.clone());
        assert_eq!(store.get("john").unwrap(), secret);
        assert_eq!(store.remove("john"), Some(secret));
        assert!(store.get("john").is_err());
    }

    #[test]
    fn debug_output_redacts_secret() {
        let secret = OtpSecret::new(RFC_SHA1_SEED.to_vec(), TotpOptions::default()).unwrap();
        let rendered = format!("{secret:?}");
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("GEZDGNBV"));
    }
}
