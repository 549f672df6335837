//! Browser control for the verification run.
//!
//! [`BrowserConfig`] is always available. With the `browser` feature the
//! [`ChromiumDriver`] implements [`crate::PageDriver`] over the Chrome
//! `DevTools` Protocol via chromiumoxide. Request interception uses the
//! `Fetch` domain: paused requests matching a route are fulfilled from the
//! shared [`crate::NetworkInterception`], with CORS headers for cross-origin
//! callers and preflights answered; the rest continue untouched.

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Viewport width
    pub viewport_width: u32,
    /// Viewport height
    pub viewport_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            chromium_path: None,
            user_agent: None,
            sandbox: true,
        }
    }
}

impl BrowserConfig {
    /// Set viewport dimensions
    #[must_use]
    pub const fn with_viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport_width = width;
        self.viewport_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Disable sandbox (for containers/CI)
    #[must_use]
    pub const fn with_no_sandbox(mut self) -> Self {
        self.sandbox = false;
        self
    }
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(
    clippy::significant_drop_tightening,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation
)]
mod cdp {
    use super::BrowserConfig;
    use crate::driver::{PageDriver, Screenshot};
    use crate::locator::{BoundingBox, Selector};
    use crate::network::{HttpMethod, MockResponse, PausedRequest, SharedInterception};
    use crate::result::{FireshotError, FireshotResult};
    use crate::storage::{storage_origin, StorageEntry};
    use async_trait::async_trait;
    use base64::Engine as _;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::fetch::{
        ContinueRequestParams, EnableParams, EventRequestPaused, FulfillRequestParams,
        HeaderEntry, RequestPattern, RequestStage,
    };
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, CaptureScreenshotParams,
        Viewport,
    };
    use chromiumoxide::handler::viewport::Viewport as EmulatedViewport;
    use chromiumoxide::page::{Page as CdpPage, ScreenshotParams};
    use futures::StreamExt;
    use serde::Deserialize;
    use tokio::task::JoinHandle;
    use tracing::{debug, warn};

    /// Element box as returned by [`Selector::to_bounding_box_query`]
    #[derive(Debug, Deserialize)]
    struct ElementBox {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        viewport_x: f64,
        viewport_y: f64,
    }

    /// One Chromium process with one page
    #[derive(Debug)]
    pub struct ChromiumDriver {
        browser: CdpBrowser,
        page: CdpPage,
        handler: JoinHandle<()>,
        listener: Option<JoinHandle<()>>,
        url: Option<String>,
    }

    impl ChromiumDriver {
        /// Launch Chromium and open a blank page
        ///
        /// # Errors
        ///
        /// Returns error if the browser cannot be launched or the page cannot be created
        pub async fn launch(config: &BrowserConfig) -> FireshotResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.viewport_width, config.viewport_height)
                .viewport(EmulatedViewport {
                    width: config.viewport_width,
                    height: config.viewport_height,
                    ..EmulatedViewport::default()
                });

            if !config.headless {
                builder = builder.with_head();
            }

            if !config.sandbox {
                builder = builder.no_sandbox();
            }

            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }

            if let Some(ref ua) = config.user_agent {
                builder = builder.arg(format!("--user-agent={ua}"));
            }

            let cdp_config = builder
                .build()
                .map_err(|message| FireshotError::BrowserLaunchError { message })?;

            let (browser, mut handler) = CdpBrowser::launch(cdp_config).await.map_err(|e| {
                FireshotError::BrowserLaunchError {
                    message: e.to_string(),
                }
            })?;

            let handler = tokio::spawn(async move {
                while let Some(h) = handler.next().await {
                    if h.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(|e| FireshotError::page(e.to_string()))?;

            Ok(Self {
                browser,
                page,
                handler,
                listener: None,
                url: None,
            })
        }

        async fn eval<T: serde::de::DeserializeOwned>(&self, expr: String) -> FireshotResult<T> {
            self.page
                .evaluate(expr)
                .await
                .map_err(|e| FireshotError::EvaluationError {
                    message: e.to_string(),
                })?
                .into_value()
                .map_err(|e| FireshotError::EvaluationError {
                    message: e.to_string(),
                })
        }

        async fn element_box(&self, selector: &Selector) -> FireshotResult<Option<ElementBox>> {
            self.eval(selector.to_bounding_box_query()).await
        }

        async fn mouse(
            &self,
            kind: DispatchMouseEventType,
            x: f64,
            y: f64,
        ) -> FireshotResult<()> {
            let mut builder = DispatchMouseEventParams::builder().r#type(kind.clone()).x(x).y(y);
            if kind != DispatchMouseEventType::MouseMoved {
                builder = builder.button(MouseButton::Left).click_count(1);
            }
            let params = builder
                .build()
                .map_err(|message| FireshotError::InputError { message })?;
            self.page
                .execute(params)
                .await
                .map_err(|e| FireshotError::InputError {
                    message: e.to_string(),
                })?;
            Ok(())
        }

        fn nav_error(url: &str, e: &impl std::fmt::Display) -> FireshotError {
            FireshotError::NavigationError {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }

    async fn fulfill(
        page: &CdpPage,
        event: &EventRequestPaused,
        response: &MockResponse,
    ) -> Result<(), String> {
        let headers: Vec<HeaderEntry> = response
            .header_pairs()
            .into_iter()
            .map(|(name, value)| HeaderEntry::new(name, value))
            .collect();
        let params = FulfillRequestParams::builder()
            .request_id(event.request_id.clone())
            .response_code(i64::from(response.status))
            .response_headers(headers)
            .body(base64::engine::general_purpose::STANDARD.encode(&response.body))
            .build()?;
        page.execute(params)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    #[async_trait]
    impl PageDriver for ChromiumDriver {
        async fn install_interception(
            &mut self,
            interception: SharedInterception,
        ) -> FireshotResult<()> {
            let patterns: Vec<RequestPattern> = interception
                .lock()
                .map_err(|e| FireshotError::InterceptionError {
                    message: e.to_string(),
                })?
                .cdp_patterns()
                .into_iter()
                .map(|p| {
                    RequestPattern::builder()
                        .url_pattern(p)
                        .request_stage(RequestStage::Request)
                        .build()
                })
                .collect();

            let mut events = self
                .page
                .event_listener::<EventRequestPaused>()
                .await
                .map_err(|e| FireshotError::InterceptionError {
                    message: e.to_string(),
                })?;

            let page = self.page.clone();
            self.listener = Some(tokio::spawn(async move {
                while let Some(event) = events.next().await {
                    let request = PausedRequest::from_json_headers(
                        event.request.url.clone(),
                        HttpMethod::parse(&event.request.method),
                        event.request.headers.inner(),
                    );
                    let response = interception
                        .lock()
                        .ok()
                        .and_then(|mut i| i.answer(&request));
                    let outcome = match response {
                        Some(response) => fulfill(&page, &event, &response).await,
                        None => page
                            .execute(ContinueRequestParams::new(event.request_id.clone()))
                            .await
                            .map(|_| ())
                            .map_err(|e| e.to_string()),
                    };
                    if let Err(message) = outcome {
                        warn!(url = %event.request.url, %message, "paused request not resolved");
                    }
                }
            }));

            self.page
                .execute(EnableParams::builder().patterns(patterns).build())
                .await
                .map_err(|e| FireshotError::InterceptionError {
                    message: e.to_string(),
                })?;
            Ok(())
        }

        async fn goto(&mut self, url: &str) -> FireshotResult<()> {
            self.page
                .goto(url)
                .await
                .map_err(|e| Self::nav_error(url, &e))?;
            self.url = Some(url.to_string());
            Ok(())
        }

        async fn reload(&mut self) -> FireshotResult<()> {
            let url = self.url.clone().unwrap_or_default();
            self.page
                .reload()
                .await
                .map_err(|e| Self::nav_error(&url, &e))?;
            Ok(())
        }

        async fn write_storage(&mut self, entry: &StorageEntry) -> FireshotResult<()> {
            let url = self.url.clone().unwrap_or_else(|| "about:blank".to_string());
            storage_origin(&url)?;
            self.page
                .evaluate(entry.write_script())
                .await
                .map_err(|e| FireshotError::StorageError {
                    key: entry.key.clone(),
                    message: e.to_string(),
                })?;
            Ok(())
        }

        async fn seed_storage(&mut self, entry: &StorageEntry) -> FireshotResult<()> {
            self.page
                .evaluate_on_new_document(AddScriptToEvaluateOnNewDocumentParams::new(
                    entry.seed_script(),
                ))
                .await
                .map_err(|e| FireshotError::StorageError {
                    key: entry.key.clone(),
                    message: e.to_string(),
                })?;
            Ok(())
        }

        async fn count(&self, selector: &Selector) -> FireshotResult<usize> {
            self.eval(selector.to_count_query()).await
        }

        async fn text_content(&self, selector: &Selector) -> FireshotResult<Option<String>> {
            self.eval(selector.to_text_query()).await
        }

        async fn is_visible(&self, selector: &Selector) -> FireshotResult<bool> {
            self.eval(selector.to_visible_query()).await
        }

        async fn is_expanded(&self, selector: &Selector) -> FireshotResult<Option<bool>> {
            self.eval(selector.to_expanded_query()).await
        }

        async fn click(&mut self, selector: &Selector) -> FireshotResult<()> {
            let element = self
                .element_box(selector)
                .await?
                .ok_or_else(|| FireshotError::InputError {
                    message: format!("no element matches {selector}"),
                })?;
            let x = element.viewport_x + element.width / 2.0;
            let y = element.viewport_y + element.height / 2.0;
            debug!(%selector, x, y, "click");
            self.mouse(DispatchMouseEventType::MouseMoved, x, y).await?;
            self.mouse(DispatchMouseEventType::MousePressed, x, y).await?;
            self.mouse(DispatchMouseEventType::MouseReleased, x, y).await
        }

        async fn screenshot_page(&self, full_page: bool) -> FireshotResult<Screenshot> {
            let params = ScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .full_page(full_page)
                .build();
            let data = self
                .page
                .screenshot(params)
                .await
                .map_err(|e| FireshotError::ScreenshotError {
                    message: e.to_string(),
                })?;
            Ok(Screenshot::new(data, None))
        }

        async fn screenshot_element(&self, selector: &Selector) -> FireshotResult<Screenshot> {
            let element = self
                .element_box(selector)
                .await?
                .ok_or_else(|| FireshotError::ScreenshotError {
                    message: format!("no element matches {selector}"),
                })?;
            let clip = BoundingBox::new(element.x, element.y, element.width, element.height);
            if clip.is_empty() {
                return Err(FireshotError::ScreenshotError {
                    message: format!("{selector} has an empty bounding box"),
                });
            }
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .capture_beyond_viewport(true)
                .clip(Viewport {
                    x: clip.x,
                    y: clip.y,
                    width: clip.width,
                    height: clip.height,
                    scale: 1.0,
                })
                .build();
            let resp = self
                .page
                .execute(params)
                .await
                .map_err(|e| FireshotError::ScreenshotError {
                    message: e.to_string(),
                })?;
            let data_b64: &str = resp.data.as_ref();
            let data = base64::engine::general_purpose::STANDARD
                .decode(data_b64.as_bytes())
                .map_err(|e| FireshotError::ScreenshotError {
                    message: format!("base64 decode failed: {e}"),
                })?;
            Ok(Screenshot::new(data, Some(clip)))
        }

        async fn page_content(&self) -> FireshotResult<String> {
            self.page
                .content()
                .await
                .map_err(|e| FireshotError::page(e.to_string()))
        }

        fn current_url(&self) -> Option<String> {
            self.url.clone()
        }

        async fn close(&mut self) -> FireshotResult<()> {
            if let Some(listener) = self.listener.take() {
                listener.abort();
            }
            let closed = self
                .browser
                .close()
                .await
                .map_err(|e| FireshotError::page(format!("browser close failed: {e}")));
            if closed.is_ok() {
                let _ = self.browser.wait().await;
            }
            self.handler.abort();
            closed.map(|_| ())
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_headless_sandboxed() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert!(config.sandbox);
        assert!(config.chromium_path.is_none());
    }

    #[test]
    fn test_builders() {
        let config = BrowserConfig::default()
            .with_viewport(1920, 1080)
            .with_headless(false)
            .with_chromium_path("/usr/bin/chromium")
            .with_user_agent("fireshot")
            .with_no_sandbox();
        assert_eq!((config.viewport_width, config.viewport_height), (1920, 1080));
        assert!(!config.headless);
        assert!(!config.sandbox);
        assert_eq!(config.chromium_path.as_deref(), Some("/usr/bin/chromium"));
        assert_eq!(config.user_agent.as_deref(), Some("fireshot"));
    }
}
