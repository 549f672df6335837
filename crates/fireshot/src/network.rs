//! Network Request Interception
//!
//! Substitutes canned responses for outbound requests matching a URL pattern.
//! Matched requests never reach the network; everything else passes through
//! untouched. The same rule table backs the Chromium driver (via the CDP
//! `Fetch` domain) and the scripted [`crate::MockDriver`].

use crate::result::FireshotResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// HTTP methods for request matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request
    Get,
    /// POST request
    Post,
    /// PUT request
    Put,
    /// DELETE request
    Delete,
    /// PATCH request
    Patch,
    /// HEAD request
    Head,
    /// OPTIONS request
    Options,
    /// Any method
    #[default]
    #[serde(rename = "*")]
    Any,
}

impl HttpMethod {
    /// Parse from string
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "DELETE" => Self::Delete,
            "PATCH" => Self::Patch,
            "HEAD" => Self::Head,
            "OPTIONS" => Self::Options,
            _ => Self::Any,
        }
    }

    /// Convert to string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "*",
        }
    }

    /// Check if this method matches another
    #[must_use]
    pub fn matches(&self, other: &Self) -> bool {
        *self == Self::Any || *other == Self::Any || *self == *other
    }
}

/// A canned HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockResponse {
    /// HTTP status code
    pub status: u16,
    /// Extra response headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Vec<u8>,
    /// Content type
    pub content_type: String,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: Vec::new(),
            content_type: "application/json".to_string(),
        }
    }
}

impl MockResponse {
    /// Create a new empty 200 JSON response
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a JSON response
    pub fn json<T: Serialize>(data: &T) -> FireshotResult<Self> {
        let body = serde_json::to_vec(data)?;
        Ok(Self {
            body,
            ..Self::default()
        })
    }

    /// Create a text response
    #[must_use]
    pub fn text(content: &str) -> Self {
        Self {
            body: content.as_bytes().to_vec(),
            content_type: "text/plain".to_string(),
            ..Self::default()
        }
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set body
    #[must_use]
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Set content type
    #[must_use]
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    /// All headers to send, `Content-Type` first
    #[must_use]
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("Content-Type".to_string(), self.content_type.clone())];
        let mut extra: Vec<_> = self
            .headers
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case("content-type"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        extra.sort();
        pairs.extend(extra);
        pairs
    }

    /// Value of an extra header, matched case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn with_default_header(self, key: &str, value: &str) -> Self {
        if self.header(key).is_some() {
            self
        } else {
            self.with_header(key, value)
        }
    }

    /// Let a page on `origin` read this response cross-origin.
    ///
    /// Headers the route already sets are left alone.
    #[must_use]
    pub fn with_cors(self, origin: &str) -> Self {
        self.with_default_header("Access-Control-Allow-Origin", origin)
            .with_default_header("Access-Control-Allow-Credentials", "true")
            .with_default_header("Vary", "Origin")
    }

    /// `204` answer to a CORS preflight from `origin`
    #[must_use]
    pub fn preflight(origin: &str, requested_headers: Option<&str>) -> Self {
        Self {
            status: 204,
            content_type: "text/plain".to_string(),
            ..Self::default()
        }
        .with_header("Access-Control-Allow-Methods", CORS_ALLOW_METHODS)
        .with_header("Access-Control-Allow-Headers", requested_headers.unwrap_or("*"))
        .with_header("Access-Control-Max-Age", "600")
        .with_cors(origin)
    }

    /// Get body as string
    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// Methods a preflight answer allows
pub const CORS_ALLOW_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";

/// A request paused by the browser, as the interception table sees it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PausedRequest {
    /// Request URL
    pub url: String,
    /// Request method
    pub method: HttpMethod,
    /// Request headers in arrival order
    pub headers: Vec<(String, String)>,
}

impl PausedRequest {
    /// Request without headers
    #[must_use]
    pub fn new(url: impl Into<String>, method: HttpMethod) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
        }
    }

    /// Add a request header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Request whose headers come as a CDP `Network.Headers` object
    #[must_use]
    pub fn from_json_headers(
        url: impl Into<String>,
        method: HttpMethod,
        headers: &serde_json::Value,
    ) -> Self {
        let headers = headers
            .as_object()
            .map(|map| {
                map.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            url: url.into(),
            method,
            headers,
        }
    }

    /// Header value, matched case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `OPTIONS` carrying `Access-Control-Request-Method`
    #[must_use]
    pub fn is_preflight(&self) -> bool {
        self.method == HttpMethod::Options
            && self.header("Access-Control-Request-Method").is_some()
    }
}

/// Pattern for matching request URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlPattern {
    /// Exact URL match
    Exact(String),
    /// Prefix match
    Prefix(String),
    /// Contains substring
    Contains(String),
    /// Regex match
    Regex(String),
    /// Glob pattern: `**` spans path segments, `*` stays within one, `?` is one character
    Glob(String),
    /// Match any URL
    Any,
}

impl UrlPattern {
    /// Check if a URL matches this pattern
    #[must_use]
    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Exact(pattern) => url == pattern,
            Self::Prefix(pattern) => url.starts_with(pattern),
            Self::Contains(pattern) => url.contains(pattern),
            Self::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(url))
                .unwrap_or(false),
            Self::Glob(pattern) => regex::Regex::new(&glob_to_regex(pattern))
                .map(|re| re.is_match(url))
                .unwrap_or(false),
            Self::Any => true,
        }
    }

    /// Wildcard pattern for the CDP `Fetch.enable` request filter.
    ///
    /// CDP only understands `*` and `?`, so this is a superset of the
    /// pattern; requests it lets through are re-checked with [`Self::matches`].
    #[must_use]
    pub fn cdp_wildcard(&self) -> String {
        match self {
            Self::Exact(p) => p.clone(),
            Self::Prefix(p) => format!("{p}*"),
            Self::Contains(p) => format!("*{p}*"),
            Self::Glob(p) => {
                let mut out = String::with_capacity(p.len());
                for c in p.chars() {
                    if c == '*' && out.ends_with('*') {
                        continue;
                    }
                    out.push(c);
                }
                out
            }
            Self::Regex(_) | Self::Any => "*".to_string(),
        }
    }
}

impl std::fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact(s)
            | Self::Prefix(s)
            | Self::Contains(s)
            | Self::Regex(s)
            | Self::Glob(s) => write!(f, "{s}"),
            Self::Any => write!(f, "*"),
        }
    }
}

fn glob_to_regex(pattern: &str) -> String {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    re.push_str(".*");
                } else {
                    re.push_str("[^/]*");
                }
            }
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    re
}

/// A request that was fulfilled from a route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedRequest {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Milliseconds since the interception was created
    pub timestamp_ms: u64,
}

/// A route definition for interception
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// URL pattern to match
    pub pattern: UrlPattern,
    /// HTTP method to match
    #[serde(default)]
    pub method: HttpMethod,
    /// Response to return
    pub response: MockResponse,
    /// Number of times this route has been matched
    #[serde(skip)]
    pub match_count: usize,
}

impl Route {
    /// Create a new route
    #[must_use]
    pub fn new(pattern: UrlPattern, method: HttpMethod, response: MockResponse) -> Self {
        Self {
            pattern,
            method,
            response,
            match_count: 0,
        }
    }

    /// Check if this route matches a request
    #[must_use]
    pub fn matches(&self, url: &str, method: &HttpMethod) -> bool {
        self.pattern.matches(url) && self.method.matches(method)
    }
}

/// Interception rule table plus a log of fulfilled requests
#[derive(Debug)]
pub struct NetworkInterception {
    routes: Vec<Route>,
    captured: Vec<CapturedRequest>,
    start_time: Instant,
}

/// Interception table shared between the harness and a driver's listener task
pub type SharedInterception = Arc<Mutex<NetworkInterception>>;

impl Default for NetworkInterception {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkInterception {
    /// Create an empty interception table
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            captured: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Add a route
    pub fn route(&mut self, route: Route) {
        self.routes.push(route);
    }

    /// Fulfil every request matching `pattern` with `response`, any method
    pub fn fulfill(&mut self, pattern: UrlPattern, response: MockResponse) {
        self.routes.push(Route::new(pattern, HttpMethod::Any, response));
    }

    /// Resolve a request: `Some` means fulfil with the response, `None` means continue
    pub fn handle_request(&mut self, url: &str, method: HttpMethod) -> Option<MockResponse> {
        let timestamp_ms = self.start_time.elapsed().as_millis() as u64;
        let route = self.routes.iter_mut().find(|r| r.matches(url, &method))?;
        route.match_count += 1;
        self.captured.push(CapturedRequest {
            url: url.to_string(),
            method,
            timestamp_ms,
        });
        Some(route.response.clone())
    }

    /// Resolve a paused browser request.
    ///
    /// Preflights for routed URLs are answered without counting as a
    /// fulfilled request. Routed responses to a request carrying `Origin`
    /// get CORS headers for that origin. `None` means continue.
    pub fn answer(&mut self, request: &PausedRequest) -> Option<MockResponse> {
        let origin = request.header("Origin");
        if request.is_preflight() {
            if !self.routes.iter().any(|r| r.pattern.matches(&request.url)) {
                return None;
            }
            let requested = request.header("Access-Control-Request-Headers");
            return origin.map(|origin| MockResponse::preflight(origin, requested));
        }
        let response = self.handle_request(&request.url, request.method)?;
        Some(match origin {
            Some(origin) => response.with_cors(origin),
            None => response,
        })
    }

    /// Requests fulfilled so far
    #[must_use]
    pub fn captured_requests(&self) -> &[CapturedRequest] {
        &self.captured
    }

    /// Registered routes
    #[must_use]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Get route count
    #[must_use]
    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    /// CDP wildcard filters, one per route, deduplicated
    #[must_use]
    pub fn cdp_patterns(&self) -> Vec<String> {
        let mut patterns: Vec<String> = Vec::new();
        for route in &self.routes {
            let wildcard = route.pattern.cdp_wildcard();
            if !patterns.contains(&wildcard) {
                patterns.push(wildcard);
            }
        }
        patterns
    }

    /// Wrap for sharing with a driver
    #[must_use]
    pub fn into_shared(self) -> SharedInterception {
        Arc::new(Mutex::new(self))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    mod http_method_tests {
        use super::*;

        #[test]
        fn test_parse() {
            assert_eq!(HttpMethod::parse("GET"), HttpMethod::Get);
            assert_eq!(HttpMethod::parse("post"), HttpMethod::Post);
            assert_eq!(HttpMethod::parse("unknown"), HttpMethod::Any);
        }

        #[test]
        fn test_matches() {
            assert!(HttpMethod::Get.matches(&HttpMethod::Get));
            assert!(HttpMethod::Any.matches(&HttpMethod::Get));
            assert!(HttpMethod::Get.matches(&HttpMethod::Any));
            assert!(!HttpMethod::Get.matches(&HttpMethod::Post));
        }
    }

    mod mock_response_tests {
        use super::*;

        #[test]
        fn test_default_is_json_200() {
            let response = MockResponse::default();
            assert_eq!(response.status, 200);
            assert_eq!(response.content_type, "application/json");
        }

        #[test]
        fn test_json_body() {
            let response = MockResponse::json(&serde_json::json!({"cashFlow": []})).unwrap();
            assert_eq!(response.body_string(), r#"{"cashFlow":[]}"#);
        }

        #[test]
        fn test_header_pairs_puts_content_type_first() {
            let response = MockResponse::text("hi")
                .with_header("X-B", "2")
                .with_header("X-A", "1")
                .with_header("content-type", "ignored");
            let pairs = response.header_pairs();
            assert_eq!(pairs[0], ("Content-Type".to_string(), "text/plain".to_string()));
            assert_eq!(pairs[1].0, "X-A");
            assert_eq!(pairs[2].0, "X-B");
            assert_eq!(pairs.len(), 3);
        }
    }

    mod url_pattern_tests {
        use super::*;

        const API: &str = "https://script.google.com/macros/s/AKfy/exec";

        #[test]
        fn test_glob_double_star_spans_segments() {
            let pattern = UrlPattern::Glob("https://script.google.com/**".to_string());
            assert!(pattern.matches(API));
            assert!(!pattern.matches("https://example.com/macros"));
        }

        #[test]
        fn test_glob_single_star_stays_in_segment() {
            let pattern = UrlPattern::Glob("https://script.google.com/*".to_string());
            assert!(pattern.matches("https://script.google.com/exec"));
            assert!(!pattern.matches(API));
        }

        #[test]
        fn test_glob_escapes_regex_metacharacters() {
            let pattern = UrlPattern::Glob("https://a.com/x?y".to_string());
            assert!(pattern.matches("https://a.com/x1y"));
            assert!(!pattern.matches("https://aXcom/x1y"));
        }

        #[test]
        fn test_prefix_exact_contains() {
            assert!(UrlPattern::Prefix("https://script.google.com/".into()).matches(API));
            assert!(UrlPattern::Exact(API.into()).matches(API));
            assert!(UrlPattern::Contains("/macros/".into()).matches(API));
            assert!(!UrlPattern::Contains("/graphql".into()).matches(API));
        }

        #[test]
        fn test_invalid_regex_never_matches() {
            assert!(!UrlPattern::Regex("(".into()).matches(API));
            assert!(UrlPattern::Regex(r"google\.com/macros".into()).matches(API));
        }

        #[test]
        fn test_cdp_wildcard() {
            assert_eq!(
                UrlPattern::Glob("https://script.google.com/**".into()).cdp_wildcard(),
                "https://script.google.com/*"
            );
            assert_eq!(UrlPattern::Prefix("https://a/".into()).cdp_wildcard(), "https://a/*");
            assert_eq!(UrlPattern::Contains("api".into()).cdp_wildcard(), "*api*");
            assert_eq!(UrlPattern::Regex("x+".into()).cdp_wildcard(), "*");
        }

        #[test]
        fn test_yaml_form() {
            let pattern: UrlPattern =
                crate::plan::parse_yaml("glob: https://script.google.com/**").unwrap();
            assert_eq!(
                pattern,
                UrlPattern::Glob("https://script.google.com/**".to_string())
            );
        }
    }

    mod interception_tests {
        use super::*;

        const API: &str = "https://script.google.com/macros/s/AKfy/exec";

        #[test]
        fn test_matching_request_is_fulfilled_and_logged() {
            let mut interception = NetworkInterception::new();
            interception.fulfill(
                UrlPattern::Glob("https://script.google.com/**".into()),
                MockResponse::text("ok"),
            );

            let response = interception
                .handle_request("https://script.google.com/macros/s/x/exec", HttpMethod::Get)
                .expect("should fulfil");
            assert_eq!(response.body_string(), "ok");
            assert_eq!(interception.captured_requests().len(), 1);
            assert_eq!(interception.routes()[0].match_count, 1);
        }

        #[test]
        fn test_unmatched_request_passes_through() {
            let mut interception = NetworkInterception::new();
            interception.fulfill(UrlPattern::Prefix("https://api/".into()), MockResponse::new());

            assert!(interception
                .handle_request("http://localhost:5174/asset/fire", HttpMethod::Get)
                .is_none());
            assert!(interception.captured_requests().is_empty());
        }

        #[test]
        fn test_cross_origin_request_gets_cors_headers() {
            let mut interception = NetworkInterception::new();
            interception.fulfill(
                UrlPattern::Glob("https://script.google.com/**".into()),
                MockResponse::json(&serde_json::json!({})).unwrap(),
            );
            let request = PausedRequest::new(API, HttpMethod::Get)
                .with_header("origin", "http://localhost:5174");

            let response = interception.answer(&request).unwrap();
            let pairs = response.header_pairs();
            let has = |name: &str, value: &str| {
                pairs.iter().any(|(k, v)| k == name && v == value)
            };
            assert!(has("Access-Control-Allow-Origin", "http://localhost:5174"));
            assert!(has("Access-Control-Allow-Credentials", "true"));
            assert!(has("Vary", "Origin"));
            assert_eq!(interception.captured_requests().len(), 1);
        }

        #[test]
        fn test_route_cors_headers_are_kept() {
            let mut interception = NetworkInterception::new();
            interception.fulfill(
                UrlPattern::Any,
                MockResponse::new().with_header("access-control-allow-origin", "*"),
            );
            let request =
                PausedRequest::new(API, HttpMethod::Get).with_header("Origin", "http://a.test");

            let response = interception.answer(&request).unwrap();
            assert_eq!(response.header("Access-Control-Allow-Origin"), Some("*"));
            assert_eq!(
                response
                    .header_pairs()
                    .iter()
                    .filter(|(k, _)| k.eq_ignore_ascii_case("access-control-allow-origin"))
                    .count(),
                1
            );
        }

        #[test]
        fn test_same_origin_request_has_no_cors_headers() {
            let mut interception = NetworkInterception::new();
            interception.fulfill(UrlPattern::Any, MockResponse::new());
            let response = interception
                .answer(&PausedRequest::new(API, HttpMethod::Get))
                .unwrap();
            assert_eq!(response.header_pairs().len(), 1);
        }

        #[test]
        fn test_preflight_for_routed_url() {
            let mut interception = NetworkInterception::new();
            interception.fulfill(
                UrlPattern::Glob("https://script.google.com/**".into()),
                MockResponse::new(),
            );
            let preflight = PausedRequest::new(API, HttpMethod::Options)
                .with_header("Origin", "http://localhost:5174")
                .with_header("Access-Control-Request-Method", "POST")
                .with_header("Access-Control-Request-Headers", "content-type");

            let response = interception.answer(&preflight).unwrap();
            assert_eq!(response.status, 204);
            assert!(response.body.is_empty());
            assert_eq!(
                response.header("Access-Control-Allow-Methods"),
                Some(CORS_ALLOW_METHODS)
            );
            assert_eq!(
                response.header("Access-Control-Allow-Headers"),
                Some("content-type")
            );
            assert_eq!(
                response.header("Access-Control-Allow-Origin"),
                Some("http://localhost:5174")
            );
            assert!(interception.captured_requests().is_empty());
        }

        #[test]
        fn test_preflight_for_unrouted_url_continues() {
            let mut interception = NetworkInterception::new();
            interception.fulfill(UrlPattern::Prefix("https://api/".into()), MockResponse::new());
            let preflight = PausedRequest::new("https://other/x", HttpMethod::Options)
                .with_header("Origin", "http://localhost:5174")
                .with_header("Access-Control-Request-Method", "GET");
            assert!(interception.answer(&preflight).is_none());
        }

        #[test]
        fn test_headers_from_cdp_object() {
            let request = PausedRequest::from_json_headers(
                API,
                HttpMethod::Get,
                &serde_json::json!({ "Origin": "http://localhost:5174", "X-Count": 3 }),
            );
            assert_eq!(request.header("origin"), Some("http://localhost:5174"));
            assert_eq!(request.headers.len(), 1);
            assert!(!request.is_preflight());
        }

        #[test]
        fn test_first_matching_route_wins() {
            let mut interception = NetworkInterception::new();
            interception.fulfill(UrlPattern::Any, MockResponse::text("first"));
            interception.fulfill(UrlPattern::Any, MockResponse::text("second"));

            let response = interception.handle_request("https://x", HttpMethod::Get).unwrap();
            assert_eq!(response.body_string(), "first");
        }

        #[test]
        fn test_method_specific_route() {
            let mut interception = NetworkInterception::new();
            interception.route(Route::new(
                UrlPattern::Any,
                HttpMethod::Post,
                MockResponse::new(),
            ));
            assert!(interception.handle_request("https://x", HttpMethod::Get).is_none());
            assert!(interception.handle_request("https://x", HttpMethod::Post).is_some());
        }

        #[test]
        fn test_cdp_patterns_deduplicated() {
            let mut interception = NetworkInterception::new();
            interception.fulfill(UrlPattern::Glob("https://a/**".into()), MockResponse::new());
            interception.fulfill(UrlPattern::Prefix("https://a/".into()), MockResponse::new());
            assert_eq!(interception.cdp_patterns(), vec!["https://a/*".to_string()]);
        }
    }
}
