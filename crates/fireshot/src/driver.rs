//! PageDriver - the browser seam
//!
//! Everything the harness does to a page goes through [`PageDriver`]. The
//! Chromium implementation lives in [`crate::browser`]; [`MockDriver`] is a
//! scripted single-page application used by tests: it keeps per-origin
//! storage, routes its data fetch through the installed interception, and
//! renders a view whose elements depend on the session token and the
//! fulfilled payload.

use crate::locator::{BoundingBox, Selector};
use crate::network::{HttpMethod, PausedRequest, SharedInterception};
use crate::result::{FireshotError, FireshotResult};
use crate::storage::{storage_origin, StorageEntry};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use url::Url;

/// PNG signature every screenshot starts with
pub const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Screenshot data with metadata
#[derive(Debug, Clone)]
pub struct Screenshot {
    /// Raw PNG data
    pub data: Vec<u8>,
    /// Region that was captured, `None` for the page
    pub clip: Option<BoundingBox>,
    /// Timestamp when screenshot was taken
    pub timestamp: std::time::SystemTime,
}

impl Screenshot {
    /// Create a new screenshot
    #[must_use]
    pub fn new(data: Vec<u8>, clip: Option<BoundingBox>) -> Self {
        Self {
            data,
            clip,
            timestamp: std::time::SystemTime::now(),
        }
    }

    /// Get the size in bytes
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Check if the data looks like a PNG
    #[must_use]
    pub fn is_png(&self) -> bool {
        self.data.starts_with(&PNG_MAGIC)
    }
}

/// Abstract page driver for one verification run
///
/// # Implementations
///
/// - `ChromiumDriver` - CDP via chromiumoxide (`browser` feature)
/// - [`MockDriver`] - scripted application for tests
#[async_trait]
pub trait PageDriver: Send {
    /// Fulfil matching requests from `interception` for the rest of the session
    async fn install_interception(&mut self, interception: SharedInterception)
        -> FireshotResult<()>;

    /// Navigate and wait for the load event
    async fn goto(&mut self, url: &str) -> FireshotResult<()>;

    /// Reload the current document and wait for the load event
    async fn reload(&mut self) -> FireshotResult<()>;

    /// Write into `localStorage` of the loaded document's origin
    async fn write_storage(&mut self, entry: &StorageEntry) -> FireshotResult<()>;

    /// Write into `localStorage` before page scripts of every new document
    async fn seed_storage(&mut self, entry: &StorageEntry) -> FireshotResult<()>;

    /// Number of elements matching `selector`
    async fn count(&self, selector: &Selector) -> FireshotResult<usize>;

    /// Text of the first match
    async fn text_content(&self, selector: &Selector) -> FireshotResult<Option<String>>;

    /// Whether the first match is rendered
    async fn is_visible(&self, selector: &Selector) -> FireshotResult<bool>;

    /// `open`/`aria-expanded` state of the first match, `None` when not applicable
    async fn is_expanded(&self, selector: &Selector) -> FireshotResult<Option<bool>>;

    /// Click the first match
    async fn click(&mut self, selector: &Selector) -> FireshotResult<()>;

    /// Screenshot of the viewport, or of the whole scrollable page
    async fn screenshot_page(&self, full_page: bool) -> FireshotResult<Screenshot>;

    /// Screenshot clipped to the first match's bounding box
    async fn screenshot_element(&self, selector: &Selector) -> FireshotResult<Screenshot>;

    /// Serialized document
    async fn page_content(&self) -> FireshotResult<String>;

    /// URL of the loaded document
    fn current_url(&self) -> Option<String>;

    /// Release the page and the browser
    async fn close(&mut self) -> FireshotResult<()>;
}

// ============================================================================
// Scripted application
// ============================================================================

/// Where a mock element's text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockText {
    /// Fixed text
    Static(String),
    /// Number at a JSON pointer of the fetched payload, formatted as yen
    PayloadYen(String),
}

/// One element the mock view can render
#[derive(Debug, Clone)]
pub struct MockElement {
    /// CSS selector the element answers to
    pub css: String,
    /// Text source
    pub text: MockText,
    /// `Some(open)` for expandable elements
    pub open: Option<bool>,
    /// Rendered box
    pub bounds: BoundingBox,
}

impl MockElement {
    /// Element with fixed text
    #[must_use]
    pub fn new(css: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            css: css.into(),
            text: MockText::Static(text.into()),
            open: None,
            bounds: BoundingBox::new(0.0, 0.0, 640.0, 120.0),
        }
    }

    /// Element whose text is a yen amount read from the payload
    #[must_use]
    pub fn payload_yen(css: impl Into<String>, pointer: impl Into<String>) -> Self {
        Self {
            text: MockText::PayloadYen(pointer.into()),
            ..Self::new(css, "")
        }
    }

    /// Make the element expandable, initially collapsed
    #[must_use]
    pub fn collapsible(mut self) -> Self {
        self.open = Some(false);
        self
    }
}

/// A route of the scripted application
#[derive(Debug, Clone, Default)]
pub struct MockView {
    /// URL path the view answers to
    pub path: String,
    /// Storage key that must be present when the view initializes
    pub auth_key: Option<String>,
    /// URL fetched during initialization
    pub data_url: Option<String>,
    /// Elements rendered with a session and a payload
    pub ready: Vec<MockElement>,
    /// Elements rendered without a session
    pub signed_out: Vec<MockElement>,
}

/// Scripted single-page application
#[derive(Debug, Clone, Default)]
pub struct MockApp {
    /// Known views
    pub views: Vec<MockView>,
}

/// Data endpoint of the scripted asset application
pub const MOCK_ASSET_API: &str = "https://script.google.com/macros/s/AKfycb-mock/exec";

impl MockApp {
    /// Create an empty application
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a view
    #[must_use]
    pub fn view(mut self, view: MockView) -> Self {
        self.views.push(view);
        self
    }

    /// The asset application served under `/asset/`: the FIRE view at
    /// `/asset/fire` and the cash-flow view at `/asset/cash-flow`
    #[must_use]
    pub fn asset_portfolio() -> Self {
        let auth = Some(crate::storage::SESSION_TOKEN_KEY.to_string());
        let data_url = Some(MOCK_ASSET_API.to_string());
        let signed_out = vec![MockElement::new(".login-card", "Googleでログイン")];
        Self::new()
            .view(MockView {
                path: "/asset/".to_string(),
                auth_key: auth.clone(),
                data_url: data_url.clone(),
                ready: vec![MockElement::payload_yen(".total-assets", "/totals/assetsYen")],
                signed_out: signed_out.clone(),
            })
            .view(MockView {
                path: "/asset/fire".to_string(),
                auth_key: auth.clone(),
                data_url,
                ready: [
                    MockElement::new("body", ""),
                    MockElement::new("h3", "シミュレーション引数"),
                    MockElement::payload_yen(".fire-current-assets", "/totals/assetsYen"),
                    MockElement::new("select.date-select", "住宅ローン完済"),
                    MockElement::new("h2", "FIRE達成に必要な資産"),
                    MockElement::new(".simulation-table-card", "シミュレーション結果"),
                    MockElement::new(".simulation-table", "年 資産 取崩し"),
                    MockElement::new("details", "FIREアルゴリズムの詳細").collapsible(),
                    MockElement::new(".algorithm-details", "90%信頼区間"),
                ]
                .into_iter()
                .chain((0..480).map(|month| {
                    MockElement::new(
                        "select.date-select option",
                        format!("{}-{:02}", 2026 + month / 12, month % 12 + 1),
                    )
                }))
                .collect(),
                signed_out: signed_out.clone(),
            })
            .view(MockView {
                path: "/asset/cash-flow".to_string(),
                auth_key: auth,
                data_url: None,
                ready: vec![MockElement::new(
                    ".cash-flow-table",
                    "クレジットカード レストラン 電気代",
                )],
                signed_out,
            })
    }

    fn find(&self, path: &str) -> Option<&MockView> {
        self.views.iter().find(|v| v.path == path)
    }
}

#[derive(Debug, Clone)]
struct Rendered {
    element: MockElement,
    text: String,
}

/// Mock driver for unit testing
#[derive(Debug, Default)]
pub struct MockDriver {
    app: MockApp,
    current_url: Option<String>,
    storage: HashMap<String, BTreeMap<String, String>>,
    seeds: Vec<StorageEntry>,
    interception: Option<SharedInterception>,
    dom: Vec<Rendered>,
    failures: HashMap<String, String>,
    calls: Mutex<Vec<String>>,
    closed: bool,
}

impl MockDriver {
    /// Create a driver serving `app`
    #[must_use]
    pub fn new(app: MockApp) -> Self {
        Self {
            app,
            ..Self::default()
        }
    }

    /// Make the named operation fail with `message` (e.g. `"goto"`, `"install_interception"`)
    #[must_use]
    pub fn failing(mut self, operation: &str, message: &str) -> Self {
        self.failures
            .insert(operation.to_string(), message.to_string());
        self
    }

    /// Recorded calls, in order, as `operation[:argument]`
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Position of the first recorded call starting with `prefix`
    #[must_use]
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.history().iter().position(|c| c.starts_with(prefix))
    }

    /// Storage of an origin
    #[must_use]
    pub fn storage_of(&self, origin: &str) -> Option<&BTreeMap<String, String>> {
        self.storage.get(origin)
    }

    /// Whether [`PageDriver::close`] ran
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn record(&self, call: impl Into<String>) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call.into());
        }
    }

    fn check(&self, operation: &str) -> FireshotResult<()> {
        match self.failures.get(operation) {
            Some(message) => Err(FireshotError::page(format!("{operation}: {message}"))),
            None => Ok(()),
        }
    }

    fn matches(&self, selector: &Selector) -> Vec<&Rendered> {
        let css = selector.css_part();
        self.dom
            .iter()
            .filter(|r| r.element.css == css)
            .filter(|r| selector.text_filter().map_or(true, |t| r.text.contains(t)))
            .collect()
    }

    /// `GET` from the page at `page_origin`; a cross-origin response the
    /// page may not read is dropped the way a browser drops it
    fn fetch(&self, page_origin: Option<&str>, url: &str) -> Option<serde_json::Value> {
        let interception = self.interception.as_ref()?;
        let cross_origin = page_origin.filter(|o| storage_origin(url).ok().as_deref() != Some(*o));
        let mut request = PausedRequest::new(url, HttpMethod::Get);
        if let Some(origin) = cross_origin {
            request = request.with_header("Origin", origin);
        }
        let response = interception.lock().ok()?.answer(&request)?;
        if response.status != 200 {
            return None;
        }
        if let Some(origin) = cross_origin {
            let allowed = response.header("Access-Control-Allow-Origin");
            if allowed != Some(origin) && allowed != Some("*") {
                return None;
            }
        }
        serde_json::from_slice(&response.body).ok()
    }

    /// Initialize the application for the current URL
    fn render(&mut self) -> FireshotResult<()> {
        self.dom.clear();
        let Some(url) = self.current_url.clone() else {
            return Ok(());
        };
        let parsed = Url::parse(&url).map_err(|e| FireshotError::NavigationError {
            url: url.clone(),
            message: e.to_string(),
        })?;
        let origin = storage_origin(&url).ok();
        if let Some(ref origin) = origin {
            let store = self.storage.entry(origin.clone()).or_default();
            for seed in &self.seeds {
                store.insert(seed.key.clone(), seed.value.clone());
            }
        }
        let Some(view) = self.app.find(parsed.path()).cloned() else {
            return Ok(());
        };

        let signed_in = match (&view.auth_key, &origin) {
            (None, _) => true,
            (Some(key), Some(origin)) => self
                .storage
                .get(origin)
                .is_some_and(|s| s.contains_key(key)),
            (Some(_), None) => false,
        };
        if !signed_in {
            self.dom = view
                .signed_out
                .iter()
                .map(|e| Rendered {
                    text: static_text(e),
                    element: e.clone(),
                })
                .collect();
            return Ok(());
        }

        let payload = match view.data_url {
            Some(ref data_url) => match self.fetch(origin.as_deref(), data_url) {
                Some(payload) => payload,
                None => return Ok(()),
            },
            None => serde_json::Value::Null,
        };
        self.dom = view
            .ready
            .iter()
            .filter_map(|e| {
                let text = match e.text {
                    MockText::Static(ref s) => s.clone(),
                    MockText::PayloadYen(ref pointer) => {
                        crate::fixture::format_yen(payload.pointer(pointer)?.as_i64()?)
                    }
                };
                Some(Rendered {
                    element: e.clone(),
                    text,
                })
            })
            .collect();
        Ok(())
    }

    fn snapshot_bytes(&self, label: &str) -> Vec<u8> {
        let mut data = PNG_MAGIC.to_vec();
        data.extend_from_slice(label.as_bytes());
        data
    }
}

fn static_text(element: &MockElement) -> String {
    match element.text {
        MockText::Static(ref s) => s.clone(),
        MockText::PayloadYen(_) => String::new(),
    }
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn install_interception(
        &mut self,
        interception: SharedInterception,
    ) -> FireshotResult<()> {
        self.record("install_interception");
        self.check("install_interception")?;
        self.interception = Some(interception);
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> FireshotResult<()> {
        self.record(format!("goto:{url}"));
        if let Some(message) = self.failures.get("goto") {
            return Err(FireshotError::NavigationError {
                url: url.to_string(),
                message: message.clone(),
            });
        }
        self.current_url = Some(url.to_string());
        self.render()
    }

    async fn reload(&mut self) -> FireshotResult<()> {
        self.record("reload");
        self.check("reload")?;
        self.render()
    }

    async fn write_storage(&mut self, entry: &StorageEntry) -> FireshotResult<()> {
        self.record(format!("write_storage:{}", entry.key));
        let url = self
            .current_url
            .clone()
            .unwrap_or_else(|| "about:blank".to_string());
        let origin = storage_origin(&url)?;
        if let Some(message) = self.failures.get("write_storage") {
            return Err(FireshotError::StorageError {
                key: entry.key.clone(),
                message: message.clone(),
            });
        }
        self.storage
            .entry(origin)
            .or_default()
            .insert(entry.key.clone(), entry.value.clone());
        Ok(())
    }

    async fn seed_storage(&mut self, entry: &StorageEntry) -> FireshotResult<()> {
        self.record(format!("seed_storage:{}", entry.key));
        self.check("seed_storage")?;
        self.seeds.push(entry.clone());
        Ok(())
    }

    async fn count(&self, selector: &Selector) -> FireshotResult<usize> {
        self.record(format!("count:{selector}"));
        Ok(self.matches(selector).len())
    }

    async fn text_content(&self, selector: &Selector) -> FireshotResult<Option<String>> {
        self.record(format!("text:{selector}"));
        Ok(self.matches(selector).first().map(|r| r.text.clone()))
    }

    async fn is_visible(&self, selector: &Selector) -> FireshotResult<bool> {
        self.record(format!("visible:{selector}"));
        Ok(self
            .matches(selector)
            .first()
            .is_some_and(|r| !r.element.bounds.is_empty()))
    }

    async fn is_expanded(&self, selector: &Selector) -> FireshotResult<Option<bool>> {
        self.record(format!("expanded:{selector}"));
        Ok(self.matches(selector).first().and_then(|r| r.element.open))
    }

    async fn click(&mut self, selector: &Selector) -> FireshotResult<()> {
        self.record(format!("click:{selector}"));
        self.check("click")?;
        let css = selector.css_part();
        let target = self.dom.iter_mut().find(|r| {
            r.element.css == css && selector.text_filter().map_or(true, |t| r.text.contains(t))
        });
        match target {
            Some(rendered) => {
                if let Some(open) = rendered.element.open {
                    rendered.element.open = Some(!open);
                }
                Ok(())
            }
            None => Err(FireshotError::InputError {
                message: format!("no element matches {selector}"),
            }),
        }
    }

    async fn screenshot_page(&self, full_page: bool) -> FireshotResult<Screenshot> {
        self.record(format!("screenshot_page:{full_page}"));
        self.check("screenshot")?;
        let url = self.current_url.clone().unwrap_or_default();
        let texts: Vec<&str> = self.dom.iter().map(|r| r.text.as_str()).collect();
        Ok(Screenshot::new(
            self.snapshot_bytes(&format!("{url}|{}", texts.join("|"))),
            None,
        ))
    }

    async fn screenshot_element(&self, selector: &Selector) -> FireshotResult<Screenshot> {
        self.record(format!("screenshot_element:{selector}"));
        self.check("screenshot")?;
        let rendered = self
            .matches(selector)
            .first()
            .map(|r| (*r).clone())
            .ok_or_else(|| FireshotError::ScreenshotError {
                message: format!("no element matches {selector}"),
            })?;
        let label = format!(
            "{}|{}|open={:?}",
            rendered.element.css, rendered.text, rendered.element.open
        );
        Ok(Screenshot::new(
            self.snapshot_bytes(&label),
            Some(rendered.element.bounds),
        ))
    }

    async fn page_content(&self) -> FireshotResult<String> {
        self.record("content");
        let body: Vec<String> = self
            .dom
            .iter()
            .map(|r| format!("<div class=\"{}\">{}</div>", r.element.css, r.text))
            .collect();
        Ok(format!("<html><body>{}</body></html>", body.join("")))
    }

    fn current_url(&self) -> Option<String> {
        self.current_url.clone()
    }

    async fn close(&mut self) -> FireshotResult<()> {
        self.record("close");
        self.closed = true;
        self.check("close")
    }
}
