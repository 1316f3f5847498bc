// crates/portal-e2e-harness/src/chrome.rs
// ============================================================================
// Module: Chrome Session
// Description: chromiumoxide-backed implementation of the driver seams.
// Purpose: Launch headless Chrome and drive portal tabs over CDP.
// Dependencies: chromiumoxide, futures, tokio
// ============================================================================

//! ## Overview
//! [`ChromeSession`] launches one browser per suite and spawns the CDP event
//! handler on the tokio runtime. Each [`ChromeTab`] wraps a
//! [`chromiumoxide::Page`] opened in its own browser context, so tabs never
//! share cookies; registrations made through one tab persist server-side.
//! The portal test environment uses self-signed certificates, so certificate
//! errors are ignored.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::browser_protocol::target::CreateBrowserContextParams;
use chromiumoxide::cdp::browser_protocol::target::CreateTargetParams;
use chromiumoxide::cdp::browser_protocol::target::DisposeBrowserContextParams;
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::PortalTestConfig;
use crate::driver::BrowserDriver;
use crate::driver::PageDriver;
use crate::error::HarnessError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Browser window size used for every session.
const WINDOW_SIZE: (u32, u32) = (1280, 1024);
/// Per-request CDP timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// SECTION: Session
// ============================================================================

/// Browser session shared by every tab of a suite.
pub struct ChromeSession {
    /// Browser handle; closing requires exclusive access.
    browser: Arc<Mutex<Browser>>,
    /// CDP event loop task.
    handler: Mutex<Option<JoinHandle<()>>>,
}

impl ChromeSession {
    /// Launches Chrome according to `config`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Browser`] when no browser can be configured or
    /// started.
    pub async fn launch(config: &PortalTestConfig) -> Result<Self, HarnessError> {
        let (browser, mut handler) = Browser::launch(browser_config(config)?)
            .await
            .map_err(|err| HarnessError::Browser(format!("launch failed: {err}")))?;
        let handler = tokio::spawn(async move {
            // Individual CDP decode errors are not fatal; the stream ends when
            // the browser connection closes.
            while handler.next().await.is_some() {}
        });
        Ok(Self {
            browser: Arc::new(Mutex::new(browser)),
            handler: Mutex::new(Some(handler)),
        })
    }
}

/// Builds the chromiumoxide launch configuration.
fn browser_config(config: &PortalTestConfig) -> Result<BrowserConfig, HarnessError> {
    let mut builder = BrowserConfig::builder()
        .window_size(WINDOW_SIZE.0, WINDOW_SIZE.1)
        .request_timeout(REQUEST_TIMEOUT)
        .no_sandbox()
        .arg("--ignore-certificate-errors");
    if config.headful {
        builder = builder.with_head();
    }
    if let Some(path) = &config.browser_path {
        builder = builder.chrome_executable(path);
    }
    builder.build().map_err(HarnessError::Browser)
}

#[async_trait]
impl BrowserDriver for ChromeSession {
    async fn open_tab(&self, url: &str) -> Result<Box<dyn PageDriver>, HarnessError> {
        let browser = self.browser.lock().await;
        let context = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|err| HarnessError::page("open tab", err))?
            .result
            .browser_context_id;
        let opened = open_page(&browser, url, context.clone()).await;
        let page = dispose_on_error(opened, || async {
            let _ = browser.execute(DisposeBrowserContextParams::new(context.clone())).await;
        })
        .await?;
        Ok(Box::new(ChromeTab {
            page,
            browser: Arc::clone(&self.browser),
            context,
        }))
    }

    async fn stop(&self) -> Result<(), HarnessError> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(|err| HarnessError::Browser(format!("close failed: {err}")))?;
        browser.wait().await.map_err(|err| HarnessError::Browser(format!("wait failed: {err}")))?;
        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
            let _ = handler.await;
        }
        Ok(())
    }
}

/// Opens `url` as a new page inside `context`.
async fn open_page(
    browser: &Browser,
    url: &str,
    context: BrowserContextId,
) -> Result<Page, HarnessError> {
    let target = CreateTargetParams::builder()
        .url(url)
        .browser_context_id(context)
        .build()
        .map_err(|err| HarnessError::page("open tab", err))?;
    browser.new_page(target).await.map_err(|err| HarnessError::page("open tab", err))
}

/// Runs `dispose` when `opened` failed, then hands `opened` back unchanged.
async fn dispose_on_error<T, F, Fut>(
    opened: Result<T, HarnessError>,
    dispose: F,
) -> Result<T, HarnessError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = ()>,
{
    if opened.is_err() {
        dispose().await;
    }
    opened
}

// ============================================================================
// SECTION: Tab
// ============================================================================

/// A single Chrome tab in its own browser context.
pub struct ChromeTab {
    /// Underlying CDP page.
    page: Page,
    /// Owning browser, used to dispose the context.
    browser: Arc<Mutex<Browser>>,
    /// Browser context created for this tab.
    context: BrowserContextId,
}

impl ChromeTab {
    /// Evaluates `expression` and returns the raw JSON result (`null` when the
    /// expression yields `undefined`).
    async fn evaluate(
        &self,
        action: &'static str,
        expression: &str,
    ) -> Result<Value, HarnessError> {
        let result =
            self.page.evaluate(expression).await.map_err(|err| HarnessError::page(action, err))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl PageDriver for ChromeTab {
    async fn navigate(&self, url: &str) -> Result<(), HarnessError> {
        self.page.goto(url).await.map_err(|err| HarnessError::page("navigate", err))?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String, HarnessError> {
        let url = self.page.url().await.map_err(|err| HarnessError::page("read url", err))?;
        Ok(url.unwrap_or_default())
    }

    async fn element_texts(&self, selector: &str) -> Result<Vec<String>, HarnessError> {
        let expression = format!(
            "Array.from(document.querySelectorAll({})).map((el) => el.innerText ?? el.textContent ?? '')",
            js_string(selector)?
        );
        let value = self.evaluate("read text", &expression).await?;
        serde_json::from_value(value).map_err(|err| HarnessError::page("read text", err))
    }

    async fn element_value(&self, selector: &str) -> Result<Option<String>, HarnessError> {
        let expression =
            format!("document.querySelector({})?.value ?? null", js_string(selector)?);
        let value = self.evaluate("read value", &expression).await?;
        serde_json::from_value(value).map_err(|err| HarnessError::page("read value", err))
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), HarnessError> {
        let element =
            self.page.find_element(selector).await.map_err(|err| HarnessError::page("type", err))?;
        element.click().await.map_err(|err| HarnessError::page("type", err))?;
        element.type_str(text).await.map_err(|err| HarnessError::page("type", err))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), HarnessError> {
        let element =
            self.page.find_element(selector).await.map_err(|err| HarnessError::page("click", err))?;
        element.click().await.map_err(|err| HarnessError::page("click", err))?;
        Ok(())
    }

    async fn evaluate_json(&self, expression: &str) -> Result<Value, HarnessError> {
        self.evaluate("evaluate", expression).await
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>, HarnessError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        self.page.screenshot(params).await.map_err(|err| HarnessError::page("screenshot", err))
    }

    async fn close(&self) -> Result<(), HarnessError> {
        self.page.clone().close().await.map_err(|err| HarnessError::page("close", err))?;
        self.browser
            .lock()
            .await
            .execute(DisposeBrowserContextParams::new(self.context.clone()))
            .await
            .map_err(|err| HarnessError::page("close", err))?;
        Ok(())
    }
}

/// Renders `value` as a JavaScript string literal.
fn js_string(value: &str) -> Result<String, HarnessError> {
    serde_json::to_string(value).map_err(|err| HarnessError::page("encode selector", err))
}
