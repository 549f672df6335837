//! Mock portfolio payloads served in place of the live backend.
//!
//! The shape follows what the asset application deserializes: totals, a
//! per-class summary, per-category holdings and a cash-flow list. Holding rows
//! keep the application's own Japanese column labels as free-form fields.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label of the cash-like asset class
pub const CASH_CLASS: &str = "預金・現金";
/// Label of the listed-stock asset class
pub const STOCK_CLASS: &str = "株式（現物）";
/// Balance column of cash-like rows
pub const BALANCE_FIELD: &str = "残高";
/// Valuation column of stock rows
pub const VALUATION_FIELD: &str = "評価額";

/// Top-level response body of the portfolio endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPayload {
    /// Aggregate totals
    pub totals: Totals,
    /// Per-class breakdown
    pub summary: Summary,
    /// Per-category holding rows
    #[serde(default, skip_serializing_if = "Holdings::is_empty")]
    pub holdings: Holdings,
    /// Cash-flow entries
    #[serde(default)]
    pub cash_flow: Vec<CashFlowEntry>,
}

/// Aggregate totals in yen
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    /// Total assets
    pub assets_yen: i64,
    /// Net worth, when the backend reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_worth_yen: Option<i64>,
}

/// Per-class breakdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    /// Asset classes with their totals
    pub assets_by_class: Vec<AssetClass>,
}

/// One asset class total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetClass {
    /// Class label
    pub name: String,
    /// Amount in yen
    pub amount_yen: i64,
}

/// Holding rows by category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holdings {
    /// Deposits and cash
    #[serde(default)]
    pub cash_like: Vec<HoldingRow>,
    /// Listed stocks
    #[serde(default)]
    pub stocks: Vec<HoldingRow>,
}

impl Holdings {
    /// No rows in any category
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cash_like.is_empty() && self.stocks.is_empty()
    }
}

/// A holding row: a category plus display columns keyed by their labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingRow {
    /// Asset class this row belongs to
    pub category: String,
    /// Display columns (name, balance, valuation, ...)
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

impl HoldingRow {
    /// Create a row with one category and label/value columns
    #[must_use]
    pub fn new<'a>(
        category: impl Into<String>,
        fields: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        Self {
            category: category.into(),
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Parse a column as a yen amount
    #[must_use]
    pub fn amount(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(|v| parse_yen(v))
    }
}

/// One cash-flow entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashFlowEntry {
    /// ISO date
    pub date: String,
    /// Signed amount in yen
    pub amount: i64,
    /// Category path (e.g. `収入/給与`)
    pub category: String,
    /// Transfers are excluded from income/expense totals
    pub is_transfer: bool,
}

impl PortfolioPayload {
    /// The fixed dataset used to verify the FIRE simulator view
    #[must_use]
    pub fn fire_fixture() -> Self {
        Self {
            totals: Totals {
                assets_yen: 63_715_211,
                net_worth_yen: None,
            },
            summary: Summary {
                assets_by_class: vec![
                    AssetClass {
                        name: CASH_CLASS.to_string(),
                        amount_yen: 6_869_123,
                    },
                    AssetClass {
                        name: STOCK_CLASS.to_string(),
                        amount_yen: 56_846_088,
                    },
                ],
            },
            holdings: Holdings {
                cash_like: vec![HoldingRow::new(
                    CASH_CLASS,
                    [("名称・説明", "銀行"), (BALANCE_FIELD, "6869123")],
                )],
                stocks: vec![HoldingRow::new(
                    STOCK_CLASS,
                    [("銘柄名", "株"), (VALUATION_FIELD, "56846088")],
                )],
            },
            cash_flow: Vec::new(),
        }
    }

    /// Dataset for the simulator-controls walkthrough: one class, a few cash-flow rows
    #[must_use]
    pub fn fire_ui_fixture() -> Self {
        Self {
            totals: Totals {
                assets_yen: 15_000_000,
                net_worth_yen: Some(10_000_000),
            },
            summary: Summary {
                assets_by_class: vec![AssetClass {
                    name: STOCK_CLASS.to_string(),
                    amount_yen: 5_000_000,
                }],
            },
            holdings: Holdings::default(),
            cash_flow: vec![
                CashFlowEntry {
                    date: "2024-01-01".to_string(),
                    amount: -100_000,
                    category: "Food".to_string(),
                    is_transfer: false,
                },
                CashFlowEntry {
                    date: "2024-01-01".to_string(),
                    amount: 300_000,
                    category: "収入/給与".to_string(),
                    is_transfer: false,
                },
                CashFlowEntry {
                    date: "2024-01-01".to_string(),
                    amount: 500_000,
                    category: "収入/賞与".to_string(),
                    is_transfer: false,
                },
            ],
        }
    }

    /// Look up a fixture by name
    #[must_use]
    pub fn named(name: &str) -> Option<Self> {
        match name {
            "fire" => Some(Self::fire_fixture()),
            "fire-ui" => Some(Self::fire_ui_fixture()),
            _ => None,
        }
    }

    /// Names accepted by [`Self::named`]
    pub const NAMES: [&'static str; 2] = ["fire", "fire-ui"];

    /// Summary amount for a class label
    #[must_use]
    pub fn class_amount(&self, name: &str) -> Option<i64> {
        self.summary
            .assets_by_class
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.amount_yen)
    }

    /// Rows of `rows` whose `field` parses to exactly `amount`
    #[must_use]
    pub fn rows_with_amount<'a>(
        rows: &'a [HoldingRow],
        field: &str,
        amount: i64,
    ) -> Vec<&'a HoldingRow> {
        rows.iter()
            .filter(|r| r.amount(field) == Some(amount))
            .collect()
    }

    /// Mismatches between the class summary and the holding rows.
    ///
    /// For each of cash-like (`残高`) and stocks (`評価額`) the rows of a
    /// class must add up to that class's summary amount.
    #[must_use]
    pub fn consistency_issues(&self) -> Vec<String> {
        let mut issues = Vec::new();
        for (rows, field) in [
            (&self.holdings.cash_like, BALANCE_FIELD),
            (&self.holdings.stocks, VALUATION_FIELD),
        ] {
            let mut by_class: BTreeMap<&str, i64> = BTreeMap::new();
            for row in rows {
                *by_class.entry(row.category.as_str()).or_default() +=
                    row.amount(field).unwrap_or(0);
            }
            for (class, sum) in by_class {
                match self.class_amount(class) {
                    Some(expected) if expected == sum => {}
                    Some(expected) => issues.push(format!(
                        "{class}: holdings sum to {sum}, summary says {expected}"
                    )),
                    None => issues.push(format!("{class}: no summary entry")),
                }
            }
        }
        let class_total: i64 = self.summary.assets_by_class.iter().map(|c| c.amount_yen).sum();
        if !self.holdings.is_empty() && class_total != self.totals.assets_yen {
            issues.push(format!(
                "classes sum to {class_total}, totals.assetsYen is {}",
                self.totals.assets_yen
            ));
        }
        issues
    }

    /// Total assets as the application renders it (`¥63,715,211`)
    #[must_use]
    pub fn formatted_total(&self) -> String {
        format_yen(self.totals.assets_yen)
    }
}

/// Parse a display amount the way the application does: strips `¥`, `￥`,
/// `,`, whitespace and `円`.
#[must_use]
pub fn parse_yen(value: &str) -> Option<i64> {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '¥' | '￥' | ',' | '円') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Format yen with ja-JP digit grouping
#[must_use]
pub fn format_yen(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-¥{grouped}")
    } else {
        format!("¥{grouped}")
    }
}
