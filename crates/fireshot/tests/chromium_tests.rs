//! Live browser checks. Need a Chromium binary and a dev server of the
//! application on the preset's base URL:
//!
//! ```sh
//! cargo test -p fireshot --features browser -- --ignored
//! ```

#![cfg(feature = "browser")]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use fireshot::prelude::*;
use fireshot::ChromiumDriver;
use tempfile::TempDir;

fn browser() -> BrowserConfig {
    let config = BrowserConfig::default().with_no_sandbox();
    match std::env::var("CHROMIUM_PATH") {
        Ok(path) => config.with_chromium_path(path),
        Err(_) => config,
    }
}

#[tokio::test]
#[ignore = "requires chromium"]
async fn test_storage_write_on_opaque_origin_rejected() {
    let mut driver = ChromiumDriver::launch(&browser()).await.unwrap();
    driver.goto("data:text/html,<p>blank</p>").await.unwrap();
    let err = driver
        .write_storage(&StorageEntry::session_token())
        .await
        .unwrap_err();
    assert!(matches!(err, FireshotError::InvalidState { .. }));
    driver.close().await.unwrap();
}

#[tokio::test]
#[ignore = "requires chromium and the application dev server"]
async fn test_fire_preset_against_dev_server() {
    let dir = TempDir::new().unwrap();
    let mut plan = VerificationPlan::preset("fire", None).unwrap();
    let total = PortfolioPayload::fire_fixture().totals.assets_yen;
    plan.expectations.push(Expectation::YenAmount {
        selector: Selector::css(".fire-current-assets"),
        amount: total,
    });
    plan.expectations.push(Expectation::PageContains {
        text: fireshot::format_yen(total),
    });
    let report = Harness::new(plan, dir.path())
        .with_browser(browser())
        .run_with_chromium()
        .await;

    // The mocked total only renders if the app could read the
    // cross-origin response.
    assert_eq!(report.outcome(), RunOutcome::Success, "{}", report.render_text());
    assert!(report.intercepted > 0);
    assert!(dir.path().join("debug_fire_3.png").exists());
}
