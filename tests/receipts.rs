//! End-to-end tests: load the default fixture set, reconcile it and render receipts

use jiff::Timestamp;
use rusty_money::{Money, iso::GBP};
use testresult::TestResult;

use rebate::{fixtures::Fixture, receipt::Receipt};

#[test]
fn default_set_renders_every_receipt() -> TestResult {
    let mut scenario = Fixture::from_set("default")?.into_scenario();

    scenario.reconcile("2026-06-01T00:00:00Z".parse::<Timestamp>()?)?;

    let mut out = Vec::new();

    for (name, checkout) in &scenario.checkouts {
        Receipt::from_checkout(name.clone(), checkout, &scenario.catalogue)?.write_to(&mut out)?;
    }

    for (name, order) in &scenario.orders {
        Receipt::from_order(name.clone(), order, &scenario.catalogue)?.write_to(&mut out)?;
    }

    let output = String::from_utf8(out)?;

    for name in [
        "basket-promo",
        "welcome-voucher",
        "staff-only",
        "us-boots",
        "phone-order",
        "big-order",
    ] {
        assert!(output.contains(name), "receipt for {name} missing");
    }

    assert!(output.contains("Walking Boots (EU 42)"));
    assert!(output.contains("Big Basket: £5 over £50"));

    Ok(())
}

#[test]
fn checkout_total_takes_off_the_voucher() -> TestResult {
    let mut scenario = Fixture::from_set("default")?.into_scenario();

    scenario.reconcile("2026-06-01T00:00:00Z".parse::<Timestamp>()?)?;

    let checkout = scenario.checkout("welcome-voucher").ok_or("missing checkout")?;
    let receipt = Receipt::from_checkout("welcome-voucher", checkout, &scenario.catalogue)?;

    // 2 x 15.00 hats, 3.00 off each, 4.99 shipping, 5.00 voucher
    assert_eq!(receipt.subtotal(), Money::from_minor(3000, GBP));
    assert_eq!(receipt.shipping(), Money::from_minor(499, GBP));
    assert_eq!(receipt.total(), Money::from_minor(2399, GBP));
    assert_eq!(receipt.savings()?, Money::from_minor(1100, GBP));

    Ok(())
}

#[test]
fn order_total_takes_off_every_record() -> TestResult {
    let mut scenario = Fixture::from_set("default")?.into_scenario();

    scenario.reconcile("2026-06-01T00:00:00Z".parse::<Timestamp>()?)?;

    let order = scenario.order("phone-order").ok_or("missing order")?;
    let receipt = Receipt::from_order("phone-order", order, &scenario.catalogue)?;

    let labels: Vec<&str> = receipt
        .discounts()
        .iter()
        .map(|discount| discount.label.as_str())
        .collect();

    assert_eq!(labels, vec!["Voucher FREESHIP", "Manual discount"]);

    // 72.00 after catalogue promotions plus 9.99 express, less 9.99 and 10.00
    assert_eq!(receipt.total(), Money::from_minor(6200, GBP));

    Ok(())
}
