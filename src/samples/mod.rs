//! Built-in demonstration suites
//!
//! Stand-ins for suites a discovery step would produce. They touch every
//! hook kind, data sets on suites and tests, dependencies, disabled tests
//! and the three ways a test can fail.

use anyhow::{bail, ensure, Context};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use tracing::debug;

use crate::models::{DataSet, HookDescriptor, Invocation, SuiteDescriptor, SuiteMethodType, TestDescriptor};

/// Every demonstration suite in declaration order
pub fn suites() -> Vec<SuiteDescriptor> {
    vec![cart(), login(), checkout(), reports()]
}

fn cart() -> SuiteDescriptor {
    let items = Arc::new(AtomicU32::new(0));
    let (reset, add, count) = (items.clone(), items.clone(), items);

    SuiteDescriptor::new("Cart")
        .assembly("shop")
        .tag("smoke")
        .metadata("owner", "storefront")
        .before_test("empty_cart", move |_| {
            reset.store(0, Ordering::SeqCst);
            Ok(())
        })
        .test(
            TestDescriptor::new("add_item", move |_| {
                add.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .title("Add an item to the cart")
            .category("Fast"),
        )
        .test(
            TestDescriptor::new("starts_empty", move |_| {
                let items = count.load(Ordering::SeqCst);
                ensure!(items == 0, "cart holds {items} item(s)");
                Ok(())
            })
            .category("Fast"),
        )
        .test(
            TestDescriptor::new("wishlist", |_| Ok(()))
                .disabled("wishlist moved to its own service"),
        )
}

fn login() -> SuiteDescriptor {
    SuiteDescriptor::new("Login")
        .assembly("shop")
        .tag("smoke")
        .data_set(DataSet::new("staging", vec![json!("https://staging.example.com")]))
        .data_set(DataSet::new("production", vec![json!("https://example.com")]))
        .before_suite("open_session", |inv| {
            let url = base_url(inv)?;
            debug!("Opening session against {}", url);
            Ok(())
        })
        .test(
            TestDescriptor::new("sign_in", |inv| {
                let user = inv.arg(0).and_then(|v| v.as_str()).context("missing user")?;
                let active = inv.arg(1).and_then(|v| v.as_bool()).unwrap_or(false);
                ensure!(active, "user '{user}' is locked on {}", base_url(inv)?);
                Ok(())
            })
            .title("Sign in as {0}")
            .author("qa-team")
            .data_set(DataSet::new("admin", vec![json!("admin"), json!(true)]))
            .data_set(DataSet::new("guest", vec![json!("guest"), json!(true)])),
        )
        .after_suite("close_session", |_| Ok(()))
}

fn checkout() -> SuiteDescriptor {
    SuiteDescriptor::new("Checkout")
        .assembly("payments")
        .tag("regression")
        .before_suite("connect_gateway", |_| Ok(()))
        .hook(HookDescriptor::new(SuiteMethodType::AfterTest, "release_card", |_| Ok(())).run_always())
        .after_test("collect_logs", |_| Ok(()))
        .test(
            TestDescriptor::new("pay_by_card", |_| {
                sleep(Duration::from_millis(20));
                Ok(())
            })
            .category("Payments"),
        )
        .test(
            TestDescriptor::new("refund", |_| bail!("refund service returned 503"))
                .category("Payments")
                .bug("PAY-118"),
        )
        .test(
            TestDescriptor::new("refund_receipt", |_| Ok(()))
                .depends_on("refund")
                .category("Payments"),
        )
        .test(
            TestDescriptor::new("currency_rounding", |inv| {
                let amounts: Vec<f64> = inv.args.iter().filter_map(|v| v.as_f64()).collect();
                let total: f64 = amounts.iter().sum();
                if total.to_string() != "0.3" {
                    panic!("rounding drift: {total}");
                }
                Ok(())
            })
            .data_set(DataSet::new("thirds", vec![json!(0.1), json!(0.2)])),
        )
        .after_suite("disconnect_gateway", |_| Ok(()))
}

fn reports() -> SuiteDescriptor {
    SuiteDescriptor::new("Reports")
        .assembly("backoffice")
        .tag("nightly")
        .hook(
            HookDescriptor::new(SuiteMethodType::AfterTest, "verify_storage", |_| {
                bail!("report storage is full")
            })
            .skip_tests_on_fail(),
        )
        .test(TestDescriptor::new("daily_sales", |_| Ok(())))
        .test(TestDescriptor::new("monthly_sales", |_| Ok(())))
}

fn base_url(inv: &Invocation) -> anyhow::Result<&str> {
    inv.suite_arg(0)
        .and_then(|v| v.as_str())
        .context("suite data set has no base url")
}
