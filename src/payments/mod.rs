//! Payments
//!
//! Which payment methods a shopper may choose, and how each one is driven. Availability is a
//! filter over the merged [`PaymentMethodConfig`] and the store's per-country [`PaymentRules`];
//! keeping a valid selection across country changes is [`resolve_and_reconcile`].

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::debug;

pub mod card;
pub mod config;

pub use card::{CardTokenizer, MockCardTokenizer, PaymentMethodToken, TokenizeError};
pub use config::{
    GatewayConfig, MethodToggles, PaymentMethodConfig, PaymentMethodToggles, PaymentsConfig,
    ProviderSettings,
};

/// Available payment methods, in canonical order.
pub type PaymentMethods = SmallVec<[PaymentMethod; 8]>;

/// Errors raised while parsing payment method ids.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentMethodError {
    /// The id does not name a known payment method.
    #[error("unknown payment method: {0}")]
    Unknown(String),
}

/// A payment method the storefront can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash on delivery
    #[serde(rename = "cod")]
    Cod,

    /// Card payment through the card processor
    #[serde(rename = "stripe")]
    Stripe,

    /// Off-site approval through the redirect provider
    #[serde(rename = "paypal")]
    PayPal,

    /// Apple Pay wallet through the card processor
    #[serde(rename = "applepay")]
    ApplePay,

    /// Google Pay wallet through the card processor
    #[serde(rename = "googlepay")]
    GooglePay,

    /// Mada debit cards through the regional gateway
    #[serde(rename = "mada")]
    Mada,

    /// STC Pay through the regional gateway
    #[serde(rename = "stcpay")]
    StcPay,

    /// Apple Pay through the regional gateway
    #[serde(rename = "moyasar_applepay")]
    GatewayApplePay,
}

impl PaymentMethod {
    /// Every method, in canonical order.
    pub const ALL: [PaymentMethod; 8] = [
        Self::Cod,
        Self::Stripe,
        Self::PayPal,
        Self::ApplePay,
        Self::GooglePay,
        Self::Mada,
        Self::StcPay,
        Self::GatewayApplePay,
    ];

    /// Wire id of the method.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::Stripe => "stripe",
            Self::PayPal => "paypal",
            Self::ApplePay => "applepay",
            Self::GooglePay => "googlepay",
            Self::Mada => "mada",
            Self::StcPay => "stcpay",
            Self::GatewayApplePay => "moyasar_applepay",
        }
    }

    /// How a checkout with this method is driven.
    #[must_use]
    pub const fn flow(self) -> PaymentFlow {
        match self {
            Self::Cod => PaymentFlow::Direct,
            Self::Stripe | Self::ApplePay | Self::GooglePay => PaymentFlow::CardToken,
            Self::PayPal => PaymentFlow::Redirect,
            Self::Mada => PaymentFlow::GatewayHandoff(GatewayKind::Mada),
            Self::StcPay => PaymentFlow::GatewayHandoff(GatewayKind::StcPay),
            Self::GatewayApplePay => PaymentFlow::GatewayHandoff(GatewayKind::ApplePay),
        }
    }

    /// Whether the method is collected by the regional gateway.
    #[must_use]
    pub const fn is_gateway(self) -> bool {
        matches!(self.flow(), PaymentFlow::GatewayHandoff(_))
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = PaymentMethodError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        Self::ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(value))
            .ok_or_else(|| PaymentMethodError::Unknown(value.to_string()))
    }
}

/// Payment kinds collected by the regional gateway's own checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayKind {
    /// Mada debit cards
    Mada,

    /// STC Pay
    StcPay,

    /// Apple Pay
    ApplePay,
}

impl GatewayKind {
    /// The payment method this kind is offered as.
    #[must_use]
    pub const fn method(self) -> PaymentMethod {
        match self {
            Self::Mada => PaymentMethod::Mada,
            Self::StcPay => PaymentMethod::StcPay,
            Self::ApplePay => PaymentMethod::GatewayApplePay,
        }
    }
}

/// How a checkout is driven once the delivery form is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentFlow {
    /// Place the order straight away; payment is collected later.
    Direct,

    /// Tokenize a card with the processor, charge it, then place the order.
    CardToken,

    /// Send the shopper off-site to approve, capture on return, then place the order.
    Redirect,

    /// Hand the shopper over to the gateway's own checkout route.
    GatewayHandoff(GatewayKind),
}

/// Select the flow for `method`.
#[must_use]
pub const fn resolve_payment_flow(method: PaymentMethod) -> PaymentFlow {
    method.flow()
}

/// Country restrictions applied on top of the merged method configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentRules {
    /// Countries where cash on delivery is not offered
    pub cod_denied_countries: Vec<String>,

    /// The only countries where card-processor wallets are offered
    pub wallet_countries: Vec<String>,

    /// The only country where gateway methods are offered
    pub gateway_country: String,
}

impl Default for PaymentRules {
    fn default() -> Self {
        Self {
            cod_denied_countries: vec!["GB".to_string()],
            wallet_countries: vec!["AE".to_string(), "GB".to_string(), "US".to_string()],
            gateway_country: "SA".to_string(),
        }
    }
}

impl PaymentRules {
    /// Whether the rules allow `method` in `country`, ignoring whether it is enabled.
    #[must_use]
    pub fn allows(&self, method: PaymentMethod, country: &str) -> bool {
        let country = country.trim();

        match method {
            PaymentMethod::Cod => !contains_country(&self.cod_denied_countries, country),
            PaymentMethod::ApplePay | PaymentMethod::GooglePay => {
                contains_country(&self.wallet_countries, country)
            }
            PaymentMethod::Mada | PaymentMethod::StcPay | PaymentMethod::GatewayApplePay => {
                self.gateway_country.trim().eq_ignore_ascii_case(country)
            }
            PaymentMethod::Stripe | PaymentMethod::PayPal => true,
        }
    }
}

fn contains_country(countries: &[String], country: &str) -> bool {
    countries
        .iter()
        .any(|candidate| candidate.trim().eq_ignore_ascii_case(country))
}

/// Methods the shopper may choose for delivery to `country`, in canonical order.
#[must_use]
pub fn resolve_available_methods(
    country: &str,
    config: &PaymentMethodConfig,
    rules: &PaymentRules,
) -> PaymentMethods {
    PaymentMethod::ALL
        .into_iter()
        .filter(|method| config.is_enabled(*method) && rules.allows(*method, country))
        .collect()
}

/// Resolve the available methods for `country` and keep a valid selection.
///
/// The previous selection is kept while it is still available. An incumbent cash-on-delivery
/// selection that is no longer allowed falls back to card payment; anything else falls back to
/// the first available method. The selection is `None` only when nothing is available.
#[must_use]
pub fn resolve_and_reconcile(
    previous: Option<PaymentMethod>,
    country: &str,
    config: &PaymentMethodConfig,
    rules: &PaymentRules,
) -> (PaymentMethods, Option<PaymentMethod>) {
    let methods = resolve_available_methods(country, config, rules);

    let selected = match previous {
        Some(method) if methods.contains(&method) => Some(method),
        Some(PaymentMethod::Cod) if methods.contains(&PaymentMethod::Stripe) => {
            Some(PaymentMethod::Stripe)
        }
        _ => methods.first().copied(),
    };

    if selected != previous {
        debug!(
            country,
            previous = ?previous,
            selected = ?selected,
            "payment method reconciled"
        );
    }

    (methods, selected)
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn all_enabled() -> PaymentMethodConfig {
        PaymentMethodConfig::from_enabled(PaymentMethod::ALL)
    }

    #[test]
    fn wire_ids_round_trip_through_from_str() -> TestResult {
        for method in PaymentMethod::ALL {
            assert_eq!(method.as_str().parse::<PaymentMethod>()?, method);
            assert_eq!(
                serde_json::to_value(method)?,
                serde_json::json!(method.as_str())
            );
        }

        Ok(())
    }

    #[test]
    fn unknown_method_is_rejected() {
        assert_eq!(
            "bitcoin".parse::<PaymentMethod>(),
            Err(PaymentMethodError::Unknown("bitcoin".to_string()))
        );
    }

    #[test]
    fn flows_per_method() {
        assert_eq!(resolve_payment_flow(PaymentMethod::Cod), PaymentFlow::Direct);
        assert_eq!(
            resolve_payment_flow(PaymentMethod::GooglePay),
            PaymentFlow::CardToken
        );
        assert_eq!(
            resolve_payment_flow(PaymentMethod::PayPal),
            PaymentFlow::Redirect
        );
        assert_eq!(
            resolve_payment_flow(PaymentMethod::StcPay),
            PaymentFlow::GatewayHandoff(GatewayKind::StcPay)
        );
        assert!(PaymentMethod::GatewayApplePay.is_gateway());
        assert!(!PaymentMethod::ApplePay.is_gateway());
    }

    #[test]
    fn gateway_methods_only_in_gateway_country() {
        let rules = PaymentRules::default();
        let config = all_enabled();

        let saudi = resolve_available_methods("sa", &config, &rules);
        let emirates = resolve_available_methods("AE", &config, &rules);

        assert!(saudi.contains(&PaymentMethod::Mada));
        assert!(!saudi.contains(&PaymentMethod::ApplePay));
        assert!(!emirates.contains(&PaymentMethod::Mada));
        assert!(emirates.contains(&PaymentMethod::ApplePay));
    }

    #[test]
    fn disabled_methods_are_never_offered() {
        let config = PaymentMethodConfig::from_enabled([PaymentMethod::PayPal]);

        let methods = resolve_available_methods("US", &config, &PaymentRules::default());

        assert_eq!(methods.as_slice(), &[PaymentMethod::PayPal]);
    }

    #[test]
    fn cod_falls_back_to_stripe_when_denied() {
        let (methods, selected) = resolve_and_reconcile(
            Some(PaymentMethod::Cod),
            "GB",
            &all_enabled(),
            &PaymentRules::default(),
        );

        assert!(!methods.is_empty());
        assert!(!methods.contains(&PaymentMethod::Cod));
        assert_eq!(selected, Some(PaymentMethod::Stripe));
    }

    #[test]
    fn cod_falls_back_to_first_available_without_stripe() {
        let config = PaymentMethodConfig::from_enabled([PaymentMethod::Cod, PaymentMethod::PayPal]);

        let (_, selected) =
            resolve_and_reconcile(Some(PaymentMethod::Cod), "GB", &config, &PaymentRules::default());

        assert_eq!(selected, Some(PaymentMethod::PayPal));
    }

    #[test]
    fn available_selection_is_kept() {
        let (_, selected) = resolve_and_reconcile(
            Some(PaymentMethod::PayPal),
            "SA",
            &all_enabled(),
            &PaymentRules::default(),
        );

        assert_eq!(selected, Some(PaymentMethod::PayPal));
    }

    #[test]
    fn no_selection_picks_first_available() {
        let (_, selected) =
            resolve_and_reconcile(None, "SA", &all_enabled(), &PaymentRules::default());

        assert_eq!(selected, Some(PaymentMethod::Cod));
    }

    #[test]
    fn nothing_available_selects_nothing() {
        let config = PaymentMethodConfig::from_enabled([PaymentMethod::Cod]);

        let (methods, selected) =
            resolve_and_reconcile(Some(PaymentMethod::Cod), "GB", &config, &PaymentRules::default());

        assert!(methods.is_empty());
        assert_eq!(selected, None);
    }
}
