//! Checkout context.

use tracing::warn;

use crate::{
    api::StorefrontApi,
    config::StoreConfig,
    currency::RateTable,
    payments::{
        GatewayConfig, PaymentMethod, PaymentMethodConfig, PaymentMethodToggles, PaymentMethods,
        resolve_and_reconcile,
    },
};

/// Merchant settings fetched when the checkout opens.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutContext {
    /// Rates used to price the cart
    pub rates: RateTable,

    /// Merged payment method configuration
    pub methods: PaymentMethodConfig,
}

impl CheckoutContext {
    /// Fetch rates and payment settings concurrently.
    ///
    /// Never fails: unreachable settings fall back to the configured rate table and to cash on
    /// delivery only, so checkout stays usable.
    #[tracing::instrument(name = "checkout.context.load", skip_all)]
    pub async fn load(api: &dyn StorefrontApi, config: &StoreConfig) -> Self {
        let (rates, provider, toggles, gateway) = tokio::join!(
            api.currency_settings(),
            api.payments_config(),
            api.payment_method_toggles(),
            api.gateway_config(),
        );

        let rates = rates.unwrap_or_else(|error| {
            warn!(%error, "currency settings unavailable; using built-in rates");
            Self::fallback_rates(config)
        });

        let methods = match provider {
            Ok(provider) => {
                let toggles = toggles.unwrap_or_else(|error| {
                    warn!(%error, "payment method toggles unavailable; using provider defaults");
                    PaymentMethodToggles::default()
                });

                let gateway = gateway.unwrap_or_else(|error| {
                    warn!(%error, "gateway config unavailable; gateway methods disabled");
                    GatewayConfig::default()
                });

                PaymentMethodConfig::merge(&provider, &toggles, &gateway)
            }
            Err(error) => {
                warn!(%error, "payment config unavailable; offering cash on delivery only");
                PaymentMethodConfig::offline_default()
            }
        };

        Self { rates, methods }
    }

    /// Context used without a backend: built-in rates and cash on delivery only.
    #[must_use]
    pub fn offline(config: &StoreConfig) -> Self {
        Self {
            rates: Self::fallback_rates(config),
            methods: PaymentMethodConfig::offline_default(),
        }
    }

    fn fallback_rates(config: &StoreConfig) -> RateTable {
        config.currency.rate_table().unwrap_or_else(|error| {
            warn!(%error, "built-in rates invalid; pricing everything at the pivot");
            RateTable::new(&config.currency.base)
        })
    }

    /// Methods available for `country`, keeping `previous` selected when it still is.
    #[must_use]
    pub fn available_methods(
        &self,
        country: &str,
        previous: Option<PaymentMethod>,
        config: &StoreConfig,
    ) -> (PaymentMethods, Option<PaymentMethod>) {
        resolve_and_reconcile(previous, country, &self.methods, &config.payments)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::{
        api::{ApiError, MockStorefrontApi},
        payments::{PaymentsConfig, ProviderSettings},
    };

    use super::*;

    fn unavailable() -> ApiError {
        ApiError::UnexpectedResponse {
            status: 503,
            body: String::new(),
        }
    }

    #[tokio::test]
    async fn falls_back_when_backend_is_down() {
        let mut api = MockStorefrontApi::new();
        api.expect_currency_settings().returning(|| Err(unavailable()));
        api.expect_payments_config().returning(|| Err(unavailable()));
        api.expect_payment_method_toggles()
            .returning(|| Err(unavailable()));
        api.expect_gateway_config().returning(|| Err(unavailable()));

        let config = StoreConfig::default();
        let context = CheckoutContext::load(&api, &config).await;

        assert_eq!(context, CheckoutContext::offline(&config));
        assert_eq!(context.rates.rate("AED"), Some(Decimal::new(98, 2)));
    }

    #[tokio::test]
    async fn merges_live_settings() {
        let mut api = MockStorefrontApi::new();
        api.expect_currency_settings()
            .returning(|| Ok(RateTable::new("AED")));
        api.expect_payments_config().returning(|| {
            Ok(PaymentsConfig {
                stripe: Some(ProviderSettings {
                    enabled: true,
                    publishable_key: Some("pk".to_string()),
                }),
                ..PaymentsConfig::default()
            })
        });
        api.expect_payment_method_toggles()
            .returning(|| Err(unavailable()));
        api.expect_gateway_config().returning(|| {
            Ok(GatewayConfig {
                publishable_key: Some("pk_gw".to_string()),
            })
        });

        let config = StoreConfig::default();
        let context = CheckoutContext::load(&api, &config).await;

        let (methods, selected) = context.available_methods("SA", None, &config);

        assert_eq!(context.rates.base(), "AED");
        assert_eq!(
            methods.as_slice(),
            &[
                PaymentMethod::Stripe,
                PaymentMethod::Mada,
                PaymentMethod::StcPay,
                PaymentMethod::GatewayApplePay
            ]
        );
        assert_eq!(selected, Some(PaymentMethod::Stripe));
    }
}
