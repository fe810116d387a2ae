//! Pricing a stored cart for different delivery countries.
//!
//! Loads the fixture store configuration and cart, then checks the quote and the payment
//! methods offered as the shopper moves between Saudi Arabia, the Emirates and the UK.

use std::path::PathBuf;

use rust_decimal::Decimal;
use testresult::TestResult;
use till::{
    cart::Cart,
    checkout::CheckoutContext,
    config::StoreConfig,
    payments::{PaymentMethod, PaymentMethodConfig},
    quote::Quote,
};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load() -> TestResult<(StoreConfig, Cart, CheckoutContext)> {
    let config = StoreConfig::from_path(fixture("store.yml"))?;
    let cart = Cart::from_json(&std::fs::read_to_string(fixture("cart.json"))?);
    let context = CheckoutContext {
        rates: config.currency.rate_table()?,
        methods: PaymentMethodConfig::from_enabled(PaymentMethod::ALL),
    };

    Ok((config, cart, context))
}

#[test]
fn fixture_cart_prices_in_each_delivery_currency() -> TestResult {
    let (config, cart, context) = load()?;

    let expected = [
        ("SA", "SAR", Decimal::from(110)),
        ("AE", "AED", Decimal::new(10780, 2)),
        ("GB", "GBP", Decimal::new(2310, 2)),
    ];

    for (country, currency, total) in expected {
        let resolved = config.currency_for(country).ok_or("country not configured")?;

        assert_eq!(resolved, currency);

        let quote = Quote::build(&cart, &resolved, &context.rates, None);

        assert_eq!(quote.total(), total, "total for {country}");
        assert_eq!(quote.lines().len(), 2);
    }

    Ok(())
}

#[test]
fn fixture_cart_respects_stock_ceiling() -> TestResult {
    let (_config, cart, _context) = load()?;

    let abaya = cart.get("abaya-black").ok_or("missing abaya")?;

    assert_eq!(abaya.max_stock, Some(4));
    assert_eq!(cart.total_items(), 3);

    Ok(())
}

#[test]
fn moving_to_the_uk_drops_cash_on_delivery() -> TestResult {
    let (config, _cart, context) = load()?;

    let (saudi, selected) = context.available_methods("SA", Some(PaymentMethod::Cod), &config);

    assert_eq!(selected, Some(PaymentMethod::Cod));
    assert!(saudi.contains(&PaymentMethod::Mada));
    assert!(!saudi.contains(&PaymentMethod::ApplePay));

    let (uk, selected) = context.available_methods("GB", selected, &config);

    assert_eq!(selected, Some(PaymentMethod::Stripe));
    assert!(!uk.contains(&PaymentMethod::Cod));
    assert!(!uk.contains(&PaymentMethod::Mada));
    assert!(uk.contains(&PaymentMethod::ApplePay));

    let (emirates, selected) = context.available_methods("AE", selected, &config);

    assert_eq!(selected, Some(PaymentMethod::Stripe));
    assert!(emirates.contains(&PaymentMethod::Cod));

    Ok(())
}

#[test]
fn unknown_country_has_no_currency() -> TestResult {
    let (config, _cart, _context) = load()?;

    assert!(config.currency_for("FR").is_none());
    assert_eq!(config.currency_for("ae").as_deref(), Some("AED"));

    Ok(())
}
