//! Element selectors and the DOM queries they compile to.
//!
//! A [`Selector`] names a capture target or readiness check. Drivers that talk
//! to a real page evaluate the generated expressions; the scripted
//! [`crate::MockDriver`] matches selectors structurally.

use crate::storage::js_string;
use serde::{Deserialize, Serialize};

/// Selector type for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g., ".simulation-table")
    Css(String),
    /// Test ID selector (data-testid attribute)
    TestId(String),
    /// CSS selector filtered to elements whose text contains `text`
    CssWithText {
        /// Base CSS selector
        css: String,
        /// Text content to match
        text: String,
    },
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a test ID selector
    #[must_use]
    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    /// Narrow a CSS selector to elements containing `text`
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        let text = text.into();
        match self {
            Self::Css(css) => Self::CssWithText { css, text },
            Self::TestId(id) => Self::CssWithText {
                css: format!("[data-testid={id:?}]"),
                text,
            },
            Self::CssWithText { css, .. } => Self::CssWithText { css, text },
        }
    }

    /// The plain CSS part of the selector
    #[must_use]
    pub fn css_part(&self) -> String {
        match self {
            Self::Css(s) => s.clone(),
            Self::TestId(id) => format!("[data-testid={}]", js_string(id)),
            Self::CssWithText { css, .. } => css.clone(),
        }
    }

    /// Text filter, if any
    #[must_use]
    pub fn text_filter(&self) -> Option<&str> {
        match self {
            Self::CssWithText { text, .. } => Some(text),
            _ => None,
        }
    }

    /// JavaScript expression yielding the array of matching elements
    #[must_use]
    pub fn to_all_query(&self) -> String {
        let all = format!(
            "Array.from(document.querySelectorAll({}))",
            js_string(&self.css_part())
        );
        match self.text_filter() {
            None => all,
            Some(text) => format!(
                "{all}.filter(el => (el.textContent || '').includes({}))",
                js_string(text)
            ),
        }
    }

    /// JavaScript expression yielding the first matching element or `undefined`
    #[must_use]
    pub fn to_query(&self) -> String {
        format!("{}[0]", self.to_all_query())
    }

    /// JavaScript expression yielding the number of matches
    #[must_use]
    pub fn to_count_query(&self) -> String {
        format!("{}.length", self.to_all_query())
    }

    /// Scroll the first match into view and return its page-relative box, or `null`
    #[must_use]
    pub fn to_bounding_box_query(&self) -> String {
        format!(
            "(() => {{ const el = {q}; if (!el) return null; \
             el.scrollIntoView({{ block: 'center', inline: 'center' }}); \
             const r = el.getBoundingClientRect(); \
             return {{ x: r.left + window.scrollX, y: r.top + window.scrollY, \
             width: r.width, height: r.height, \
             viewport_x: r.left, viewport_y: r.top }}; }})()",
            q = self.to_query()
        )
    }

    /// Text content of the first match, or `null`
    #[must_use]
    pub fn to_text_query(&self) -> String {
        format!(
            "(() => {{ const el = {q}; return el ? (el.innerText ?? el.textContent) : null; }})()",
            q = self.to_query()
        )
    }

    /// Expanded state of the first match (`open` or `aria-expanded`), or `null`
    #[must_use]
    pub fn to_expanded_query(&self) -> String {
        format!(
            "(() => {{ const el = {q}; if (!el) return null; \
             if ('open' in el) return Boolean(el.open); \
             const a = el.getAttribute('aria-expanded'); \
             return a === null ? null : a === 'true'; }})()",
            q = self.to_query()
        )
    }

    /// Whether the first match is rendered with a non-empty box
    #[must_use]
    pub fn to_visible_query(&self) -> String {
        format!(
            "(() => {{ const el = {q}; if (!el) return false; \
             const r = el.getBoundingClientRect(); \
             const s = window.getComputedStyle(el); \
             return r.width > 0 && r.height > 0 && s.visibility !== 'hidden' && s.display !== 'none'; }})()",
            q = self.to_query()
        )
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Css(s) => write!(f, "{s}"),
            Self::TestId(id) => write!(f, "[data-testid={id:?}]"),
            Self::CssWithText { css, text } => write!(f, "{css}:has-text({text:?})"),
        }
    }
}

/// An element's box in CSS pixels, page-relative
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A box with no area cannot be captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_css_count_query() {
        let selector = Selector::css(".simulation-table");
        assert_eq!(
            selector.to_count_query(),
            r#"Array.from(document.querySelectorAll(".simulation-table")).length"#
        );
    }

    #[test]
    fn test_text_filter_query_escapes_text() {
        let selector = Selector::css("details").with_text("FIREアルゴリズムの詳細");
        let query = selector.to_count_query();
        assert!(query.contains(r#"querySelectorAll("details")"#));
        assert!(query.contains(r#".includes("FIREアルゴリズムの詳細")"#));
        assert!(query.ends_with(".length"));
    }

    #[test]
    fn test_quotes_cannot_break_out() {
        let selector = Selector::css(r#"a[title="x"]"#);
        assert!(selector
            .to_query()
            .contains(r#"querySelectorAll("a[title=\"x\"]")"#));
    }

    #[test]
    fn test_control_characters_are_json_escaped() {
        let query = Selector::css("td").with_text("\u{0}1\u{1b}").to_count_query();
        assert!(query.contains(r#".includes("\u00001\u001b")"#));
        assert!(!query.contains("\\u{"));
    }

    #[test]
    fn test_test_id() {
        let selector = Selector::test_id("total");
        assert_eq!(selector.css_part(), r#"[data-testid="total"]"#);
        assert!(selector.text_filter().is_none());
    }

    #[test]
    fn test_with_text_replaces_previous_filter() {
        let selector = Selector::css("details").with_text("a").with_text("b");
        assert_eq!(selector.text_filter(), Some("b"));
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Selector::css("details").with_text("x").to_string(),
            r#"details:has-text("x")"#
        );
    }

    #[test]
    fn test_yaml_forms() {
        let css: Selector = crate::plan::parse_yaml("css: .simulation-table").unwrap();
        assert_eq!(css, Selector::css(".simulation-table"));

        let filtered: Selector =
            crate::plan::parse_yaml("css_with_text: { css: details, text: FIRE }").unwrap();
        assert_eq!(filtered, Selector::css("details").with_text("FIRE"));
    }

    #[test]
    fn test_empty_box() {
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 10.0).is_empty());
        assert!(!BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_empty());
    }
}
