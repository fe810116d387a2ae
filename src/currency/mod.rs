//! Currency
//!
//! Store prices are quoted in whatever currency the merchant configured for each product, while
//! the shopper sees everything in the currency of their delivery country. Conversion goes through
//! a single pivot currency so the store only has to maintain one rate per currency.

use rust_decimal::{Decimal, RoundingStrategy};
use rustc_hash::FxHashMap;
use rusty_money::{Money, iso};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Minor-unit exponent used for currencies missing from the ISO table.
const DEFAULT_EXPONENT: u32 = 2;

/// Errors raised while building a rate table.
#[derive(Debug, Error, PartialEq)]
pub enum RateTableError {
    /// A currency code was blank.
    #[error("currency code must not be empty")]
    EmptyCode,

    /// A rate was zero or negative (currency, rate).
    #[error("rate for {0} must be positive, got {1}")]
    NonPositiveRate(String, Decimal),
}

/// Currency rates expressed relative to one pivot currency.
///
/// `rate(c)` is the number of units of `c` worth one unit of the pivot, so the pivot itself
/// always has a rate of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RateDocument")]
pub struct RateTable {
    base: String,
    rates: FxHashMap<String, Decimal>,
}

/// Rate table as the backend sends it, before codes are normalized.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RateDocument {
    #[serde(alias = "baseCurrency")]
    base: String,

    #[serde(default)]
    rates: FxHashMap<String, Decimal>,
}

impl From<RateDocument> for RateTable {
    fn from(document: RateDocument) -> Self {
        let mut table = Self::new(&document.base);

        for (code, rate) in document.rates {
            let code = normalize_code(&code);

            if code.is_empty() || rate <= Decimal::ZERO {
                warn!(currency = %code, %rate, "ignoring unusable rate");
                continue;
            }

            table.rates.insert(code, rate);
        }

        table
    }
}

impl RateTable {
    /// Create a table containing only the pivot currency.
    #[must_use]
    pub fn new(base: &str) -> Self {
        let base = normalize_code(base);
        let mut rates = FxHashMap::default();

        rates.insert(base.clone(), Decimal::ONE);

        Self { base, rates }
    }

    /// Build a table from `(code, rate)` pairs.
    ///
    /// Codes are upper-cased. The pivot is added with a rate of one when the pairs omit it.
    ///
    /// # Errors
    ///
    /// - [`RateTableError::EmptyCode`]: a code was blank.
    /// - [`RateTableError::NonPositiveRate`]: a rate was zero or negative.
    pub fn try_from_rates<I, S>(base: &str, rates: I) -> Result<Self, RateTableError>
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: AsRef<str>,
    {
        let mut table = Self::new(base);

        if table.base.is_empty() {
            return Err(RateTableError::EmptyCode);
        }

        for (code, rate) in rates {
            let code = normalize_code(code.as_ref());

            if code.is_empty() {
                return Err(RateTableError::EmptyCode);
            }

            if rate <= Decimal::ZERO {
                return Err(RateTableError::NonPositiveRate(code, rate));
            }

            table.rates.insert(code, rate);
        }

        Ok(table)
    }

    /// The pivot currency code.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Look up the rate for a currency. Non-positive entries are treated as missing.
    #[must_use]
    pub fn rate(&self, code: &str) -> Option<Decimal> {
        self.rates
            .get(&normalize_code(code))
            .copied()
            .filter(|rate| *rate > Decimal::ZERO)
    }

    /// Whether the table knows the given currency.
    #[must_use]
    pub fn contains(&self, code: &str) -> bool {
        self.rate(code).is_some()
    }

    /// Number of currencies in the table, pivot included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Whether the table has no currencies at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Convert `amount` from one currency to another.
    ///
    /// Identical codes return `amount` untouched. A currency missing from the table is priced
    /// at a rate of one so that an unknown code degrades the displayed price instead of
    /// blocking checkout; every such fallback is logged.
    #[must_use]
    pub fn convert(&self, amount: Decimal, from: &str, to: &str) -> Decimal {
        if from.trim().eq_ignore_ascii_case(to.trim()) {
            return amount;
        }

        let from_rate = self.rate_or_one(from);
        let to_rate = self.rate_or_one(to);

        match amount
            .checked_mul(to_rate)
            .and_then(|scaled| scaled.checked_div(from_rate))
        {
            Some(converted) => converted,
            None => {
                warn!(%amount, from, to, "currency conversion overflowed; amount left unconverted");
                amount
            }
        }
    }

    fn rate_or_one(&self, code: &str) -> Decimal {
        self.rate(code).unwrap_or_else(|| {
            warn!(
                currency = code,
                base = %self.base,
                "no rate configured for currency; treating it as 1:1 with the pivot"
            );
            Decimal::ONE
        })
    }
}

/// Convert `amount` between currencies using `table`.
///
/// See [`RateTable::convert`].
#[must_use]
pub fn convert(amount: Decimal, from: &str, to: &str, table: &RateTable) -> Decimal {
    table.convert(amount, from, to)
}

/// Number of decimal places used by a currency's minor unit.
#[must_use]
pub fn minor_unit_exponent(code: &str) -> u32 {
    iso::find(&normalize_code(code)).map_or(DEFAULT_EXPONENT, |currency| currency.exponent)
}

/// Round an amount to the minor unit of its currency, half away from zero.
#[must_use]
pub fn round_to_minor(amount: Decimal, code: &str) -> Decimal {
    amount.round_dp_with_strategy(
        minor_unit_exponent(code),
        RoundingStrategy::MidpointAwayFromZero,
    )
}

/// Render an amount for display in the given currency.
#[must_use]
pub fn format_amount(amount: Decimal, code: &str) -> String {
    let code = normalize_code(code);
    let mut rounded = round_to_minor(amount, &code);

    rounded.rescale(minor_unit_exponent(&code));

    match iso::find(&code) {
        Some(currency) => Money::from_decimal(rounded, currency).to_string(),
        None => format!("{rounded} {code}"),
    }
}

/// Upper-case and trim a currency code.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
