//! Store configuration
//!
//! Everything the storefront needs to know before talking to the backend: where the backend
//! lives, how checkout behaves, which countries are delivered to and in which currency, the
//! country restrictions on payment methods, and a built-in rate table used when the live one
//! cannot be fetched. Every section has defaults, so an empty document is a valid config.

use std::{fs, path::Path};

use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    currency::{RateTable, RateTableError, normalize_code},
    payments::PaymentRules,
};

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading the config file
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// The fallback rate table is invalid
    #[error("Invalid currency rates: {0}")]
    Rates(#[from] RateTableError),

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Backend connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Storefront backend origin
    pub base_url: String,

    /// Upper bound on any single HTTP request
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Checkout behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Whether anonymous shoppers are sent to log in before checking out
    pub require_login: bool,

    /// Upper bound on each payment step
    pub payment_timeout_secs: u64,

    /// Login route for the login gate
    pub login_path: String,

    /// Where the login route returns to
    pub return_path: String,

    /// Order confirmation route
    pub confirmation_path: String,

    /// Regional gateway checkout route
    pub gateway_checkout_path: String,

    /// City value meaning "use the free-text city field"
    pub other_city: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            require_login: true,
            payment_timeout_secs: 30,
            login_path: "/login".to_string(),
            return_path: "/cart".to_string(),
            confirmation_path: "/order-success".to_string(),
            gateway_checkout_path: "/checkout/moyasar".to_string(),
            other_city: "other".to_string(),
        }
    }
}

/// A country the store delivers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryConfig {
    /// Currency prices are shown and charged in
    pub currency: String,

    /// Cities offered in the delivery form
    #[serde(default)]
    pub cities: Vec<String>,
}

impl CountryConfig {
    fn new(currency: &str, cities: &[&str]) -> Self {
        Self {
            currency: currency.to_string(),
            cities: cities.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Built-in rate table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Pivot currency
    pub base: String,

    /// Units of each currency per pivot unit
    pub rates: FxHashMap<String, Decimal>,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        let rates = [
            ("SAR", Decimal::ONE),
            ("AED", Decimal::new(98, 2)),
            ("KWD", Decimal::new(82, 3)),
            ("QAR", Decimal::new(97, 2)),
            ("BHD", Decimal::new(100, 3)),
            ("OMR", Decimal::new(103, 3)),
            ("EGP", Decimal::new(1_300, 2)),
            ("GBP", Decimal::new(21, 2)),
            ("USD", Decimal::new(2_667, 4)),
        ];

        Self {
            base: "SAR".to_string(),
            rates: rates
                .into_iter()
                .map(|(code, rate)| (code.to_string(), rate))
                .collect(),
        }
    }
}

impl CurrencyConfig {
    /// Build the fallback rate table.
    ///
    /// # Errors
    ///
    /// Returns a [`RateTableError`] if a code is blank or a rate is not positive.
    pub fn rate_table(&self) -> Result<RateTable, RateTableError> {
        RateTable::try_from_rates(
            &self.base,
            self.rates.iter().map(|(code, rate)| (code.as_str(), *rate)),
        )
    }
}

fn default_countries() -> FxHashMap<String, CountryConfig> {
    [
        ("SA", CountryConfig::new("SAR", &["Riyadh", "Jeddah", "Dammam", "Mecca", "Medina"])),
        ("AE", CountryConfig::new("AED", &["Dubai", "Abu Dhabi", "Sharjah"])),
        ("KW", CountryConfig::new("KWD", &["Kuwait City", "Hawalli"])),
        ("QA", CountryConfig::new("QAR", &["Doha", "Al Rayyan"])),
        ("BH", CountryConfig::new("BHD", &["Manama", "Muharraq"])),
        ("OM", CountryConfig::new("OMR", &["Muscat", "Salalah"])),
        ("EG", CountryConfig::new("EGP", &["Cairo", "Alexandria", "Giza"])),
        ("GB", CountryConfig::new("GBP", &["London", "Manchester", "Birmingham"])),
        ("US", CountryConfig::new("USD", &["New York", "Los Angeles", "Chicago"])),
    ]
    .into_iter()
    .map(|(code, country)| (code.to_string(), country))
    .collect()
}

/// Store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend connection
    pub api: ApiConfig,

    /// Checkout behaviour
    pub checkout: CheckoutConfig,

    /// Delivery countries keyed by ISO alpha-2 code
    pub countries: FxHashMap<String, CountryConfig>,

    /// Country restrictions on payment methods
    pub payments: PaymentRules,

    /// Built-in rate table
    pub currency: CurrencyConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            checkout: CheckoutConfig::default(),
            countries: default_countries(),
            payments: PaymentRules::default(),
            currency: CurrencyConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Parse and validate a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document is not valid YAML for this shape or a value is
    /// out of range.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: StoreConfig = serde_norway::from_str(yaml)?;

        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read or [`StoreConfig::from_yaml_str`]
    /// rejects it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml_str(&contents)
    }

    /// Check values serde cannot.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "api.request_timeout_secs must be positive".to_string(),
            ));
        }

        if self.checkout.payment_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "checkout.payment_timeout_secs must be positive".to_string(),
            ));
        }

        for (code, country) in &self.countries {
            if country.currency.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "countries.{code}.currency must not be empty"
                )));
            }
        }

        self.currency.rate_table()?;

        Ok(())
    }

    /// Delivery country by ISO alpha-2 code, ignoring case.
    #[must_use]
    pub fn country(&self, code: &str) -> Option<&CountryConfig> {
        let code = normalize_code(code);

        self.countries.get(&code).or_else(|| {
            self.countries
                .iter()
                .find(|(candidate, _)| candidate.eq_ignore_ascii_case(&code))
                .map(|(_, country)| country)
        })
    }

    /// Currency for delivery to `code`, if the country is supported.
    #[must_use]
    pub fn currency_for(&self, code: &str) -> Option<String> {
        self.country(code)
            .map(|country| normalize_code(&country.currency))
    }
}
