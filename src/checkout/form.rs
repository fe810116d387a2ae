//! Delivery form.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{checkout::GeoLocation, config::StoreConfig};

/// Required delivery form fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// Recipient name
    Name,

    /// Contact phone
    Phone,

    /// City, or the free-text city when "other" is chosen
    City,

    /// Street address
    Address,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Name => "name",
            Field::Phone => "phone number",
            Field::City => "city",
            Field::Address => "address",
        })
    }
}

/// Local checks that stop a checkout before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// There is nothing to order.
    #[error("Your cart is empty")]
    EmptyCart,

    /// A required field is blank.
    #[error("Please enter your {0}")]
    MissingField(Field),

    /// The store does not deliver to the country.
    #[error("We do not deliver to {0}")]
    UnsupportedCountry(String),
}

/// What the shopper entered in the delivery form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliveryForm {
    /// Recipient name
    pub name: String,

    /// Contact phone
    pub phone: String,

    /// Second contact phone
    pub alt_phone: Option<String>,

    /// ISO alpha-2 country code
    pub country: String,

    /// One of the country's cities, or the "other" sentinel
    pub city: String,

    /// Free-text city used with the "other" sentinel
    pub city_other: Option<String>,

    /// District or neighbourhood
    pub area: String,

    /// Street address
    pub address: String,

    /// Delivery notes
    pub details: String,

    /// Map pin, when the shopper dropped one
    pub location: Option<GeoLocation>,
}

/// A delivery form that passed validation, trimmed, with the city and currency resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryDetails {
    /// Recipient name
    pub name: String,

    /// Contact phone
    pub phone: String,

    /// Second contact phone, when given
    pub alt_phone: Option<String>,

    /// Upper-cased ISO alpha-2 country code
    pub country: String,

    /// The city to deliver to, free-text when "other" was chosen
    pub city: String,

    /// District or neighbourhood
    pub area: String,

    /// Street address
    pub address: String,

    /// Delivery notes
    pub details: String,

    /// Map pin
    pub location: Option<GeoLocation>,

    /// Currency the order is charged in
    pub currency: String,
}

fn required(value: &str, field: Field) -> Result<String, ValidationError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::MissingField(field));
    }

    Ok(value.to_string())
}

fn optional(value: Option<&String>) -> Option<String> {
    value
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
}

impl DeliveryForm {
    /// Check required fields in order, then the country.
    ///
    /// # Errors
    ///
    /// Returns the first failing [`ValidationError`].
    pub fn validate(&self, config: &StoreConfig) -> Result<DeliveryDetails, ValidationError> {
        let name = required(&self.name, Field::Name)?;
        let phone = required(&self.phone, Field::Phone)?;

        let city = required(&self.city, Field::City)?;
        let city = if city.eq_ignore_ascii_case(&config.checkout.other_city) {
            optional(self.city_other.as_ref()).ok_or(ValidationError::MissingField(Field::City))?
        } else {
            city
        };

        let address = required(&self.address, Field::Address)?;

        let country = self.country.trim().to_ascii_uppercase();
        let currency = config
            .currency_for(&country)
            .ok_or_else(|| ValidationError::UnsupportedCountry(country.clone()))?;

        Ok(DeliveryDetails {
            name,
            phone,
            alt_phone: optional(self.alt_phone.as_ref()),
            country,
            city,
            area: self.area.trim().to_string(),
            address,
            details: self.details.trim().to_string(),
            location: self.location,
            currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn form() -> DeliveryForm {
        DeliveryForm {
            name: " Sara ".to_string(),
            phone: "0500000000".to_string(),
            country: "sa".to_string(),
            city: "Riyadh".to_string(),
            address: "King Fahd Rd".to_string(),
            ..DeliveryForm::default()
        }
    }

    #[test]
    fn valid_form_resolves_currency() -> TestResult {
        let details = form().validate(&StoreConfig::default())?;

        assert_eq!(details.name, "Sara");
        assert_eq!(details.country, "SA");
        assert_eq!(details.currency, "SAR");
        assert_eq!(details.alt_phone, None);

        Ok(())
    }

    #[test]
    fn first_missing_field_is_reported() {
        let form = DeliveryForm {
            phone: String::new(),
            address: String::new(),
            ..form()
        };

        assert_eq!(
            form.validate(&StoreConfig::default()),
            Err(ValidationError::MissingField(Field::Phone))
        );
    }

    #[test]
    fn other_city_requires_free_text() -> TestResult {
        let config = StoreConfig::default();
        let mut form = DeliveryForm {
            city: "other".to_string(),
            city_other: Some("  ".to_string()),
            ..form()
        };

        assert_eq!(
            form.validate(&config),
            Err(ValidationError::MissingField(Field::City))
        );

        form.city_other = Some("Abha".to_string());

        assert_eq!(form.validate(&config)?.city, "Abha");

        Ok(())
    }

    #[test]
    fn unsupported_country_is_rejected_after_fields() {
        let form = DeliveryForm {
            country: "ZZ".to_string(),
            ..form()
        };

        assert_eq!(
            form.validate(&StoreConfig::default()),
            Err(ValidationError::UnsupportedCountry("ZZ".to_string()))
        );
    }

    #[test]
    fn messages_name_the_field() {
        assert_eq!(
            ValidationError::MissingField(Field::Phone).to_string(),
            "Please enter your phone number"
        );
    }
}
