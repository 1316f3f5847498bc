// crates/portal-e2e-harness/src/selectors.rs
// ============================================================================
// Module: Portal Selectors
// Description: DOM selectors and notification texts of the portal UI.
// Purpose: Keep page contracts in one place for the driver and the simulator.
// ============================================================================

//! ## Overview
//! Element ids and notification texts the suites rely on. Both the Chrome
//! driver and the simulated portal resolve the same constants.

/// First-factor (username/password) stage container.
pub const FIRST_FACTOR_STAGE: &str = "#first-factor-stage";
/// Second-factor stage container.
pub const SECOND_FACTOR_STAGE: &str = "#second-factor-stage";
/// Stage shown once fully authenticated without a redirect target.
pub const AUTHENTICATED_STAGE: &str = "#authenticated-stage";
/// Two-factor settings page container.
pub const SETTINGS_PAGE: &str = "#two-factor-authentication-page";
/// Protected resource body.
pub const SECRET: &str = "#secret";

/// Username input.
pub const USERNAME_INPUT: &str = "#username-textfield";
/// Password input.
pub const PASSWORD_INPUT: &str = "#password-textfield";
/// Keep-me-logged-in checkbox.
pub const REMEMBER_CHECKBOX: &str = "#remember-checkbox";
/// First-factor submit button.
pub const SIGN_IN_BUTTON: &str = "#sign-in-button";
/// First digit box of the one-time password input; typing flows across boxes.
pub const OTP_INPUT: &str = "#otp-input input";

/// Notification toast.
pub const NOTIFICATION: &str = ".notification";

/// Opens the TOTP registration dialog.
pub const TOTP_ADD_BUTTON: &str = "#one-time-password-add";
/// Reveals algorithm, length and period choices in the dialog.
pub const DIALOG_ADVANCED: &str = "#dialog-advanced";
/// Advances the registration dialog.
pub const DIALOG_NEXT: &str = "#dialog-next";
/// Read-only field holding the `otpauth://` URL.
pub const SECRET_URL_FIELD: &str = "#secret-url";
/// Removes the registered TOTP device.
pub const TOTP_DELETE_BUTTON: &str = "#one-time-password-delete";
/// Confirms device removal.
pub const DIALOG_DELETE: &str = "#dialog-delete";

/// Notification after a rejected passcode.
pub const NOTIFY_OTP_WRONG: &str = "The One-Time Password might be wrong";
/// Notification after a rejected first factor.
pub const NOTIFY_BAD_CREDENTIALS: &str = "Incorrect username or password.";
/// Notification after a successful registration.
pub const NOTIFY_TOTP_ADDED: &str = "Successfully added the One-Time Password.";
/// Notification after a device removal.
pub const NOTIFY_TOTP_DELETED: &str = "Successfully deleted the One-Time Password.";

/// Radio button choosing the HMAC algorithm.
#[must_use]
pub fn totp_algorithm_option(label: &str) -> String {
    format!("#totp-algorithm-{label}")
}

/// Radio button choosing the passcode length.
#[must_use]
pub fn totp_length_option(digits: usize) -> String {
    format!("#totp-length-{digits}")
}

/// Radio button choosing the period.
#[must_use]
pub fn totp_period_option(period: u64) -> String {
    format!("#totp-period-{period}")
}
