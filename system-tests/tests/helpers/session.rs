// system-tests/tests/helpers/session.rs
// ============================================================================
// Module: Live Session Helpers
// Description: Configuration loading and browser launch for live suites.
// Purpose: Build a suite context backed by Chrome from the environment.
// Dependencies: portal-e2e-harness
// ============================================================================

use std::sync::Arc;

use portal_e2e_harness::ChromeSession;
use portal_e2e_harness::HarnessError;
use portal_e2e_harness::PortalTestConfig;
use portal_e2e_harness::SuiteContext;

/// Loads configuration, returning `None` when short mode is requested.
///
/// # Errors
///
/// Returns [`HarnessError::Config`] when the environment or config file is
/// invalid.
pub fn load_config_unless_short() -> Result<Option<PortalTestConfig>, HarnessError> {
    let config = PortalTestConfig::load()?;
    if config.short {
        return Ok(None);
    }
    Ok(Some(config))
}

/// Launches Chrome and builds a context for `suite`.
///
/// # Errors
///
/// Returns an error when the browser cannot start or artifacts cannot be
/// created.
pub async fn launch_context(
    suite: &str,
    config: PortalTestConfig,
) -> Result<SuiteContext, HarnessError> {
    let browser = ChromeSession::launch(&config).await?;
    SuiteContext::new(suite, config, Arc::new(browser))
}
