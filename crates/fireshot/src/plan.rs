//! Declarative verification plans.
//!
//! A [`VerificationPlan`] describes one run: mocked routes, navigation,
//! settling, the baseline screenshot, conditional captures and DOM checks.
//! Built-in presets cover the asset application's FIRE views; any plan can be
//! written as YAML and loaded with [`VerificationPlan::from_yaml_str`].

use crate::capture::{Baseline, CaptureTarget, Interaction};
use crate::expectation::Expectation;
use crate::fixture::PortfolioPayload;
use crate::locator::Selector;
use crate::navigation::NavigationPlan;
use crate::network::{HttpMethod, MockResponse, NetworkInterception, Route, UrlPattern};
use crate::result::{FireshotError, FireshotResult};
use crate::storage::StorageEntry;
use crate::wait::SettlePolicy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml_ng::with::singleton_map_recursive;
use std::collections::HashSet;
use std::path::{Component, Path};
use url::Url;

/// Backend endpoint pattern of the asset application
pub const BACKEND_PATTERN: &str = "https://script.google.com/**";

/// Default application root for the `fire` plan
pub const DEFAULT_BASE_URL: &str = "http://localhost:5174/asset/";

/// Application root the dev server used by the other presets listens on
pub const DEV_SERVER_BASE_URL: &str = "http://localhost:5173/asset/";

/// Read YAML where every enum is a single-key map (`goto: <url>`,
/// `css: .table`) and unit variants are plain strings (`reload`)
pub(crate) fn parse_yaml<T: DeserializeOwned>(yaml: &str) -> FireshotResult<T> {
    Ok(singleton_map_recursive::deserialize(
        serde_yaml_ng::Deserializer::from_str(yaml),
    )?)
}

/// Write YAML in the form [`parse_yaml`] reads
pub(crate) fn dump_yaml<T: Serialize>(value: &T) -> FireshotResult<String> {
    let mut buf = Vec::new();
    {
        let mut serializer = serde_yaml_ng::Serializer::new(&mut buf);
        singleton_map_recursive::serialize(value, &mut serializer)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Body of a mocked response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteBody {
    /// Built-in payload by name (see [`PortfolioPayload::named`])
    Fixture(String),
    /// Literal JSON
    Json(serde_json::Value),
    /// Literal text
    Text(String),
}

/// A mocked route in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Requests to fulfil
    pub pattern: UrlPattern,
    /// Restrict to one method
    #[serde(default)]
    pub method: HttpMethod,
    /// Response status
    #[serde(default = "default_status")]
    pub status: u16,
    /// Response body
    pub body: RouteBody,
}

const fn default_status() -> u16 {
    200
}

impl RouteSpec {
    /// Fulfil `pattern` with a built-in payload
    #[must_use]
    pub fn fixture(pattern: UrlPattern, name: impl Into<String>) -> Self {
        Self {
            pattern,
            method: HttpMethod::Any,
            status: 200,
            body: RouteBody::Fixture(name.into()),
        }
    }

    /// Build the interception route
    ///
    /// # Errors
    ///
    /// Returns error for an unknown fixture name or unserializable body
    pub fn to_route(&self) -> FireshotResult<Route> {
        let response = match &self.body {
            RouteBody::Fixture(name) => {
                let payload = PortfolioPayload::named(name).ok_or_else(|| {
                    FireshotError::invalid_plan(format!(
                        "unknown fixture {name:?} (known: {})",
                        PortfolioPayload::NAMES.join(", ")
                    ))
                })?;
                MockResponse::json(&payload)?
            }
            RouteBody::Json(value) => MockResponse::json(value)?,
            RouteBody::Text(text) => MockResponse::text(text),
        }
        .with_status(self.status);
        Ok(Route::new(self.pattern.clone(), self.method, response))
    }
}

/// Everything one verification run does
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationPlan {
    /// Plan name
    pub name: String,
    /// What the plan verifies
    #[serde(default)]
    pub description: String,
    /// Mocked backend routes
    #[serde(default)]
    pub routes: Vec<RouteSpec>,
    /// Navigation steps
    pub navigation: NavigationPlan,
    /// Settling after navigation
    #[serde(default)]
    pub settle: SettlePolicy,
    /// Unconditional page screenshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseline: Option<Baseline>,
    /// Conditional captures, in order
    #[serde(default)]
    pub captures: Vec<CaptureTarget>,
    /// DOM checks after the captures
    #[serde(default)]
    pub expectations: Vec<Expectation>,
}

/// Built-in plan names
pub const PRESETS: [&str; 3] = ["fire", "fire-ui-v2", "cash-flow"];

fn normalize_base(base: &str) -> FireshotResult<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| FireshotError::invalid_plan(format!("base URL {base:?}: {e}")))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn view_url(base: &Url, view: &str) -> FireshotResult<String> {
    base.join(view)
        .map(String::from)
        .map_err(|e| FireshotError::invalid_plan(format!("view {view:?}: {e}")))
}

fn algorithm_details() -> Selector {
    Selector::css("details").with_text("FIREアルゴリズムの詳細")
}

impl VerificationPlan {
    /// Look up a built-in plan, rooted at `base_url` or the preset's default
    ///
    /// # Errors
    ///
    /// Returns error for an unknown name or an unparsable base URL
    pub fn preset(name: &str, base_url: Option<&str>) -> FireshotResult<Self> {
        match name {
            "fire" => Self::fire(base_url.unwrap_or(DEFAULT_BASE_URL)),
            "fire-ui-v2" => Self::fire_ui_v2(base_url.unwrap_or(DEV_SERVER_BASE_URL)),
            "cash-flow" => Self::cash_flow(base_url.unwrap_or(DEV_SERVER_BASE_URL)),
            other => Err(FireshotError::invalid_plan(format!(
                "unknown plan {other:?} (known: {})",
                PRESETS.join(", ")
            ))),
        }
    }

    /// FIRE simulator view against the canonical dataset
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` is not a URL
    pub fn fire(base_url: &str) -> FireshotResult<Self> {
        let base = normalize_base(base_url)?;
        Ok(Self {
            name: "fire".to_string(),
            description: "FIRE simulator view rendered from the canonical portfolio".to_string(),
            routes: vec![RouteSpec::fixture(
                UrlPattern::Glob(BACKEND_PATTERN.to_string()),
                "fire",
            )],
            navigation: NavigationPlan::authenticated(
                base.as_str(),
                view_url(&base, "fire")?,
                StorageEntry::session_token(),
            ),
            settle: SettlePolicy::default(),
            baseline: Some(Baseline::full_page("debug_fire_3.png")),
            captures: vec![
                CaptureTarget::new(
                    "simulation table",
                    Selector::css(".simulation-table"),
                    "fire_simulation_table.png",
                )
                .with_region(Selector::css(".simulation-table-card")),
                CaptureTarget::new(
                    "algorithm details",
                    algorithm_details(),
                    "fire_algorithm_details.png",
                )
                .with_interaction(Interaction::click()),
            ],
            expectations: Vec::new(),
        })
    }

    /// Simulator controls with a token seeded before the first load
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` is not a URL
    pub fn fire_ui_v2(base_url: &str) -> FireshotResult<Self> {
        let base = normalize_base(base_url)?;
        Ok(Self {
            name: "fire-ui-v2".to_string(),
            description: "Simulator controls, required-assets card and algorithm details"
                .to_string(),
            routes: vec![RouteSpec::fixture(
                UrlPattern::Glob(BACKEND_PATTERN.to_string()),
                "fire-ui",
            )],
            navigation: NavigationPlan::new()
                .seed_storage(StorageEntry::session_token())
                .goto(view_url(&base, "fire")?),
            settle: SettlePolicy::poll(Selector::css("h3").with_text("シミュレーション引数"), 10_000),
            baseline: None,
            captures: vec![
                CaptureTarget::new(
                    "algorithm details",
                    algorithm_details(),
                    "fire_ui_v2_details.png",
                )
                .with_interaction(Interaction::click()),
                CaptureTarget::new("page", Selector::css("body"), "fire_ui_v2.png"),
            ],
            expectations: vec![
                Expectation::Visible {
                    selector: Selector::css("h3").with_text("シミュレーション引数"),
                },
                Expectation::Visible {
                    selector: Selector::css("select.date-select"),
                },
                Expectation::MinCount {
                    selector: Selector::css("select.date-select option"),
                    min: 400,
                },
                Expectation::Visible {
                    selector: Selector::css("h2").with_text("FIRE達成に必要な資産"),
                },
                Expectation::Visible {
                    selector: Selector::css(".algorithm-details").with_text("90%信頼区間"),
                },
            ],
        })
    }

    /// Cash-flow page against the application's built-in data
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` is not a URL
    pub fn cash_flow(base_url: &str) -> FireshotResult<Self> {
        let base = normalize_base(base_url)?;
        let page = view_url(&base, "cash-flow")?;
        Ok(Self {
            name: "cash-flow".to_string(),
            description: "Cash-flow table shows generic category names".to_string(),
            routes: Vec::new(),
            navigation: NavigationPlan::new()
                .goto(page)
                .write_storage(StorageEntry::session_token())
                .reload(),
            settle: SettlePolicy::poll(Selector::css(".cash-flow-table"), 30_000),
            baseline: Some(Baseline::full_page("cash_flow_page_generic.png")),
            captures: Vec::new(),
            expectations: ["クレジットカード", "レストラン", "電気代"]
                .into_iter()
                .map(|text| Expectation::PageContains {
                    text: text.to_string(),
                })
                .collect(),
        })
    }

    /// Parse a plan from YAML
    ///
    /// # Errors
    ///
    /// Returns error for malformed YAML or a plan that fails validation
    pub fn from_yaml_str(yaml: &str) -> FireshotResult<Self> {
        let plan: Self = parse_yaml(yaml)?;
        plan.validate()?;
        Ok(plan)
    }

    /// Load a plan from a YAML file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_yaml_file(path: &Path) -> FireshotResult<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    /// Serialize to YAML
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails
    pub fn to_yaml(&self) -> FireshotResult<String> {
        dump_yaml(self)
    }

    /// Check the plan before any browser work
    ///
    /// # Errors
    ///
    /// Returns [`FireshotError::InvalidPlan`] for bad navigation, unknown
    /// fixtures, empty or duplicate artifact names
    pub fn validate(&self) -> FireshotResult<()> {
        self.navigation.validate()?;
        for route in &self.routes {
            route.to_route()?;
        }
        let mut names = HashSet::new();
        let files = self
            .baseline
            .iter()
            .map(|b| b.file_name.as_str())
            .chain(self.captures.iter().map(|c| c.file_name.as_str()));
        for file in files {
            if file.trim().is_empty() {
                return Err(FireshotError::invalid_plan("artifact file name is empty"));
            }
            let mut components = Path::new(file).components();
            let plain = matches!(
                (components.next(), components.next()),
                (Some(Component::Normal(_)), None)
            );
            if !plain {
                return Err(FireshotError::invalid_plan(format!(
                    "artifact {file:?} must be a plain file name"
                )));
            }
            if !names.insert(file) {
                return Err(FireshotError::invalid_plan(format!(
                    "artifact {file:?} is written twice"
                )));
            }
        }
        Ok(())
    }

    /// Interception table for the plan's routes
    ///
    /// # Errors
    ///
    /// Returns error if a route body cannot be built
    pub fn interception(&self) -> FireshotResult<NetworkInterception> {
        let mut interception = NetworkInterception::new();
        for spec in &self.routes {
            interception.route(spec.to_route()?);
        }
        Ok(interception)
    }

    /// Every artifact file name the plan may write
    #[must_use]
    pub fn artifact_names(&self) -> Vec<&str> {
        self.baseline
            .iter()
            .map(|b| b.file_name.as_str())
            .chain(self.captures.iter().map(|c| c.file_name.as_str()))
            .collect()
    }
}
