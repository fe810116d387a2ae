//! Quote
//!
//! A priced summary of a cart in the shopper's currency: every line converted and rounded to the
//! currency's minor unit, followed by subtotal, coupon discount and total. Quotes are display
//! only; the backend prices the order again when it is placed.

use std::io;

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use smallvec::SmallVec;
use tabled::{
    builder::Builder,
    settings::{
        Alignment, Color, Style,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    cart::Cart,
    coupons::{AppliedCoupon, discounted_total},
    currency::{RateTable, format_amount, normalize_code, round_to_minor},
};

/// Errors that can occur when rendering a quote.
#[derive(Debug, Error)]
pub enum QuoteError {
    /// IO error
    #[error("IO error")]
    IO,
}

/// One cart line priced in the quote currency.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteLine {
    /// External product reference
    pub product_id: String,

    /// Product name
    pub name: String,

    /// Number of units
    pub quantity: u32,

    /// Unit price converted into the quote currency, rounded
    pub unit_price: Decimal,

    /// Converted unit price times quantity, rounded
    pub line_total: Decimal,
}

/// Priced summary of a cart.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    currency: String,
    lines: SmallVec<[QuoteLine; 8]>,
    subtotal: Decimal,
    discount: Decimal,
    coupon_code: Option<String>,
    total: Decimal,
}

impl Quote {
    /// Price `cart` in `currency`, less the applied coupon's discount.
    #[must_use]
    pub fn build(
        cart: &Cart,
        currency: &str,
        rates: &RateTable,
        coupon: Option<&AppliedCoupon>,
    ) -> Self {
        let currency = normalize_code(currency);

        let lines = cart
            .iter()
            .map(|item| {
                let unit_price = rates.convert(item.unit_price, &item.currency, &currency);

                QuoteLine {
                    product_id: item.product_id.clone(),
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: round_to_minor(unit_price, &currency),
                    line_total: round_to_minor(
                        unit_price * Decimal::from(item.quantity),
                        &currency,
                    ),
                }
            })
            .collect();

        let subtotal = cart.subtotal(&currency, rates);
        let discount = coupon.map_or(Decimal::ZERO, |applied| {
            applied.discount_on(subtotal, &currency, rates)
        });
        let total = discounted_total(subtotal, discount);

        Self {
            lines,
            subtotal: round_to_minor(subtotal, &currency),
            discount: round_to_minor(discount, &currency),
            coupon_code: coupon.map(|applied| applied.coupon.code.clone()),
            total: round_to_minor(total, &currency),
            currency,
        }
    }

    /// Quote currency.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Priced lines, in cart order.
    #[must_use]
    pub fn lines(&self) -> &[QuoteLine] {
        &self.lines
    }

    /// Sum of converted lines before discount.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    /// Coupon discount, never more than the subtotal.
    #[must_use]
    pub fn discount(&self) -> Decimal {
        self.discount
    }

    /// Applied coupon code, if any.
    #[must_use]
    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    /// Amount to pay.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.total
    }

    /// Discount as a fraction of the subtotal.
    #[must_use]
    pub fn savings_percent(&self) -> Percentage {
        if self.subtotal.is_zero() {
            return Percentage::from(Decimal::ZERO);
        }

        Percentage::from(self.discount / self.subtotal)
    }

    /// Render the quote as a table followed by the totals.
    ///
    /// # Errors
    ///
    /// Returns an error if the quote cannot be written.
    pub fn write_to(&self, mut out: impl io::Write) -> Result<(), QuoteError> {
        let mut builder = Builder::default();

        builder.push_record(["", "Item", "Qty", "Unit Price", "Line Total"]);

        for (idx, line) in self.lines.iter().enumerate() {
            builder.push_record([
                format!("#{:<3}", idx + 1),
                line.name.clone(),
                line.quantity.to_string(),
                format_amount(line.unit_price, &self.currency),
                format_amount(line.line_total, &self.currency),
            ]);
        }

        let mut table = builder.build();

        table.with(Style::modern_rounded());
        table.modify(Rows::first(), Color::BOLD);
        table.modify(Columns::new(2..5), Alignment::right());

        writeln!(out, "\n{table}").map_err(|_err| QuoteError::IO)?;

        self.write_summary(&mut out)
    }

    fn write_summary(&self, out: &mut impl io::Write) -> Result<(), QuoteError> {
        let mut rows: SmallVec<[(String, String); 3]> = SmallVec::new();

        rows.push((
            "Subtotal:".to_string(),
            format_amount(self.subtotal, &self.currency),
        ));

        if let Some(code) = &self.coupon_code {
            let percent_points = (self.savings_percent() * Decimal::ONE_HUNDRED).round_dp(2);

            rows.push((
                format!("Coupon {code}:"),
                format!(
                    "({percent_points:.2}%) -{}",
                    format_amount(self.discount, &self.currency)
                ),
            ));
        }

        rows.push((
            "Total:".to_string(),
            format_amount(self.total, &self.currency),
        ));

        let label_width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        let value_width = rows.iter().map(|(_, value)| value.len()).max().unwrap_or(0);

        for (label, value) in &rows {
            writeln!(out, " {label:<label_width$}  {value:>value_width$}")
                .map_err(|_err| QuoteError::IO)?;
        }

        writeln!(out).map_err(|_err| QuoteError::IO)
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{
        cart::CartItem,
        coupons::{Coupon, DiscountType},
    };

    use super::*;

    fn rates() -> Result<RateTable, crate::currency::RateTableError> {
        RateTable::try_from_rates("SAR", [("AED", Decimal::new(98, 2))])
    }

    fn save20(subtotal: i64, currency: &str) -> AppliedCoupon {
        let coupon = Coupon {
            code: "SAVE20".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: Decimal::from(20),
        };

        AppliedCoupon {
            discount_amount: coupon.discount_for(Decimal::from(subtotal)),
            validated_subtotal: Decimal::from(subtotal),
            currency: currency.to_string(),
            coupon,
            message: String::new(),
        }
    }

    #[test]
    fn prices_cart_in_one_currency() -> TestResult {
        let cart = Cart::with_items([
            CartItem::new("a", "Abaya", Decimal::from(50), "SAR", 1),
            CartItem::new("b", "Bisht", Decimal::from(30), "SAR", 2),
        ]);

        let quote = Quote::build(&cart, "sar", &rates()?, None);

        assert_eq!(quote.currency(), "SAR");
        assert_eq!(quote.subtotal(), Decimal::from(110));
        assert_eq!(quote.total(), Decimal::from(110));
        assert_eq!(quote.discount(), Decimal::ZERO);
        assert_eq!(quote.lines().len(), 2);
        assert_eq!(
            quote.lines().get(1).map(|line| line.line_total),
            Some(Decimal::from(60))
        );

        Ok(())
    }

    #[test]
    fn applies_coupon_discount() -> TestResult {
        let cart = Cart::with_items([CartItem::new("a", "Oud", Decimal::from(200), "AED", 1)]);

        let quote = Quote::build(&cart, "AED", &rates()?, Some(&save20(200, "AED")));

        assert_eq!(quote.subtotal(), Decimal::from(200));
        assert_eq!(quote.discount(), Decimal::from(40));
        assert_eq!(quote.total(), Decimal::from(160));
        assert_eq!(quote.coupon_code(), Some("SAVE20"));

        Ok(())
    }

    #[test]
    fn discount_never_exceeds_subtotal() -> TestResult {
        let cart = Cart::with_items([CartItem::new("a", "Oud", Decimal::from(20), "SAR", 1)]);
        let mut applied = save20(20, "SAR");
        applied.discount_amount = Decimal::from(90);

        let quote = Quote::build(&cart, "SAR", &rates()?, Some(&applied));

        assert_eq!(quote.discount(), Decimal::from(20));
        assert_eq!(quote.total(), Decimal::ZERO);

        Ok(())
    }

    #[test]
    fn discount_is_recomputed_for_the_quote_currency() -> TestResult {
        let cart = Cart::with_items([CartItem::new("a", "Oud", Decimal::from(100), "SAR", 1)]);

        let quote = Quote::build(&cart, "AED", &rates()?, Some(&save20(500, "SAR")));

        assert_eq!(quote.subtotal(), Decimal::from(98));
        assert_eq!(quote.discount(), Decimal::new(1960, 2));
        assert_eq!(quote.total(), Decimal::new(7840, 2));

        Ok(())
    }

    #[test]
    fn converted_lines_round_to_minor_units() -> TestResult {
        let cart = Cart::with_items([CartItem::new("a", "Oud", Decimal::from(10), "AED", 3)]);

        let quote = Quote::build(&cart, "SAR", &rates()?, None);
        let line = quote.lines().first().ok_or("missing line")?;

        assert_eq!(line.unit_price, Decimal::new(1020, 2));
        assert_eq!(line.line_total, Decimal::new(3061, 2));
        assert_eq!(quote.total(), Decimal::new(3061, 2));

        Ok(())
    }

    #[test]
    fn write_to_renders_lines_and_totals() -> TestResult {
        let cart = Cart::with_items([CartItem::new("a", "Oud", Decimal::from(200), "AED", 1)]);
        let quote = Quote::build(&cart, "AED", &rates()?, Some(&save20(200, "AED")));

        let mut out = Vec::new();
        quote.write_to(&mut out)?;

        let output = String::from_utf8(out)?;

        assert!(output.contains("Oud"));
        assert!(output.contains("Subtotal:"));
        assert!(output.contains("Coupon SAVE20:"));
        assert!(output.contains("(20.00%)"));
        assert!(output.contains("Total:"));

        Ok(())
    }
}
