//! Payment method configuration.
//!
//! The storefront learns which methods are switched on from three places: the provider
//! configuration, the store admin's toggles, and the regional gateway's credentials.
//! [`PaymentMethodConfig::merge`] folds them into one enabled/disabled answer per method.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::payments::PaymentMethod;

/// One provider's entry in `GET /api/ecommerce/payments/config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    /// Whether the provider is switched on
    #[serde(default)]
    pub enabled: bool,

    /// Client-side key, when the provider has one
    #[serde(default)]
    pub publishable_key: Option<String>,
}

/// `GET /api/ecommerce/payments/config` response. Missing providers are disabled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    /// Cash on delivery
    pub cod: Option<ProviderSettings>,

    /// Card processor
    pub stripe: Option<ProviderSettings>,

    /// Redirect provider
    pub paypal: Option<ProviderSettings>,

    /// Card processor Apple Pay wallet
    pub applepay: Option<ProviderSettings>,

    /// Card processor Google Pay wallet
    pub googlepay: Option<ProviderSettings>,
}

impl PaymentsConfig {
    fn provider(&self, method: PaymentMethod) -> Option<&ProviderSettings> {
        match method {
            PaymentMethod::Cod => self.cod.as_ref(),
            PaymentMethod::Stripe => self.stripe.as_ref(),
            PaymentMethod::PayPal => self.paypal.as_ref(),
            PaymentMethod::ApplePay => self.applepay.as_ref(),
            PaymentMethod::GooglePay => self.googlepay.as_ref(),
            PaymentMethod::Mada | PaymentMethod::StcPay | PaymentMethod::GatewayApplePay => None,
        }
    }
}

/// Admin switches for the toggle-able methods. `None` leaves the provider default alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MethodToggles {
    /// Cash on delivery
    pub cod: Option<bool>,

    /// Card processor
    pub stripe: Option<bool>,

    /// Redirect provider
    pub paypal: Option<bool>,

    /// Card processor Apple Pay wallet
    pub applepay: Option<bool>,

    /// Card processor Google Pay wallet
    pub googlepay: Option<bool>,
}

impl MethodToggles {
    fn toggle(&self, method: PaymentMethod) -> Option<bool> {
        match method {
            PaymentMethod::Cod => self.cod,
            PaymentMethod::Stripe => self.stripe,
            PaymentMethod::PayPal => self.paypal,
            PaymentMethod::ApplePay => self.applepay,
            PaymentMethod::GooglePay => self.googlepay,
            PaymentMethod::Mada | PaymentMethod::StcPay | PaymentMethod::GatewayApplePay => None,
        }
    }
}

/// `GET /api/settings/payment-methods` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodToggles {
    /// Per-method switches
    #[serde(default)]
    pub methods: MethodToggles,
}

/// `GET /api/moyasar/config` response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Gateway client-side key; gateway methods are unavailable without one
    #[serde(default)]
    pub publishable_key: Option<String>,
}

impl GatewayConfig {
    /// Whether a usable publishable key is present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.publishable_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

/// Merged enabled/disabled state per payment method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentMethodConfig {
    enabled: FxHashMap<PaymentMethod, bool>,
}

impl PaymentMethodConfig {
    /// Merge provider defaults, admin toggles and gateway credentials.
    ///
    /// Admin toggles win over provider defaults. Gateway methods are enabled exactly when the
    /// gateway has a non-blank publishable key.
    #[must_use]
    pub fn merge(
        provider: &PaymentsConfig,
        toggles: &PaymentMethodToggles,
        gateway: &GatewayConfig,
    ) -> Self {
        let gateway_ready = gateway.has_credentials();

        let enabled = PaymentMethod::ALL
            .into_iter()
            .map(|method| {
                let enabled = if method.is_gateway() {
                    gateway_ready
                } else {
                    toggles.methods.toggle(method).unwrap_or_else(|| {
                        provider
                            .provider(method)
                            .is_some_and(|settings| settings.enabled)
                    })
                };

                (method, enabled)
            })
            .collect();

        Self { enabled }
    }

    /// Configuration used when the merchant settings cannot be fetched: cash on delivery only.
    #[must_use]
    pub fn offline_default() -> Self {
        Self::from_enabled([PaymentMethod::Cod])
    }

    /// Configuration with exactly `methods` enabled.
    #[must_use]
    pub fn from_enabled(methods: impl IntoIterator<Item = PaymentMethod>) -> Self {
        Self {
            enabled: methods.into_iter().map(|method| (method, true)).collect(),
        }
    }

    /// Whether `method` is enabled.
    #[must_use]
    pub fn is_enabled(&self, method: PaymentMethod) -> bool {
        self.enabled.get(&method).copied().unwrap_or(false)
    }

    /// Enabled methods, in canonical order.
    pub fn enabled(&self) -> impl Iterator<Item = PaymentMethod> + '_ {
        PaymentMethod::ALL
            .into_iter()
            .filter(|method| self.is_enabled(*method))
    }
}
