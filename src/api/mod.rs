//! Storefront API
//!
//! The backend endpoints the checkout consumes. Everything authoritative (coupon validity,
//! payment capture, order persistence, final prices) lives behind this trait; the rest of the
//! crate only shapes requests and interprets responses.

use std::fmt;

use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    checkout::OrderPayload,
    coupons::Coupon,
    currency::RateTable,
    payments::{GatewayConfig, PaymentMethodToggles, PaymentsConfig},
};

pub mod http;

pub use http::HttpStorefrontApi;

/// Stands in for credentials in `Debug` output.
pub const REDACTED: &str = "<redacted>";

/// Errors raised while talking to the storefront backend.
#[derive(Debug, Error)]
pub enum ApiError {
    /// An HTTP transport or serialization error occurred.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    #[error("unexpected response ({status}): {body}")]
    UnexpectedResponse {
        /// HTTP status code
        status: u16,

        /// Response body, as text
        body: String,
    },

    /// The configured base URL could not be joined with an endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// `POST /api/coupons/validate` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    /// Normalized coupon code
    pub code: String,

    /// Order subtotal the coupon is checked against
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub order_total: Decimal,
}

/// `POST /api/coupons/validate` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    /// Whether the coupon may be used
    #[serde(default)]
    pub valid: bool,

    /// The coupon definition
    #[serde(default)]
    pub coupon: Option<Coupon>,

    /// Discount computed by the backend for the submitted total
    #[serde(default)]
    pub discount: Option<Decimal>,

    /// Human readable outcome
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /api/ecommerce/payments/stripe/process-payment` request.
///
/// Only the opaque payment-method reference produced by the processor's tokenization step is
/// ever sent; card numbers and security codes never reach this API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPaymentRequest {
    /// Amount to charge
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,

    /// Currency of `amount`
    pub currency: String,

    /// Tokenized payment method
    pub payment_method_id: String,
}

/// `POST /api/ecommerce/payments/stripe/process-payment` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPaymentResponse {
    /// Whether the processor accepted the payment
    #[serde(default)]
    pub success: bool,

    /// Processor payment reference
    #[serde(default)]
    pub payment_intent_id: Option<String>,

    /// Whether the shopper must complete an additional authentication step
    #[serde(default)]
    pub requires_action: bool,

    /// Secret used by the client SDK to run the authentication step
    #[serde(default)]
    pub client_secret: Option<String>,

    /// Processor message, surfaced verbatim on failure
    #[serde(default)]
    pub message: Option<String>,
}

/// Confirmation or capture outcome.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentConfirmation {
    /// Whether the payment is now captured
    #[serde(default)]
    pub success: bool,

    /// Processor message
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /api/ecommerce/payments/paypal/create-order` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectOrderRequest {
    /// Amount to authorize
    #[serde(serialize_with = "rust_decimal::serde::float::serialize")]
    pub amount: Decimal,

    /// Currency of `amount`
    pub currency: String,
}

/// `POST /api/ecommerce/payments/paypal/create-order` response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedirectOrder {
    /// Where the shopper approves the payment
    pub approval_url: String,

    /// Provider order reference, needed to capture on return
    pub order_id: String,
}

/// Order record returned by the order endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedOrder {
    /// Backend order identifier
    #[serde(alias = "_id")]
    pub id: String,

    /// Shopper-facing order number
    #[serde(default)]
    pub order_number: Option<String>,
}

/// Which order-creation endpoint receives an order.
#[derive(Clone, PartialEq, Eq)]
pub enum OrderEndpoint {
    /// `POST /api/ecommerce/orders`
    Guest,

    /// `POST /api/ecommerce/customer/orders`, linked to the customer's account
    Customer {
        /// Customer bearer token
        token: String,
    },
}

impl fmt::Debug for OrderEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderEndpoint::Guest => f.write_str("Guest"),
            OrderEndpoint::Customer { .. } => f
                .debug_struct("Customer")
                .field("token", &REDACTED)
                .finish(),
        }
    }
}

impl OrderEndpoint {
    /// Endpoint path.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            OrderEndpoint::Guest => "/api/ecommerce/orders",
            OrderEndpoint::Customer { .. } => "/api/ecommerce/customer/orders",
        }
    }
}

/// Storefront backend operations used by the checkout.
#[automock]
#[async_trait]
pub trait StorefrontApi: Send + Sync {
    /// Check a coupon against an order total.
    async fn validate_coupon(
        &self,
        request: &ValidateCouponRequest,
    ) -> Result<ValidateCouponResponse, ApiError>;

    /// Record that a coupon was used by a placed order.
    async fn record_coupon_usage(&self, code: &str) -> Result<(), ApiError>;

    /// Fetch the store's currency rate table.
    async fn currency_settings(&self) -> Result<RateTable, ApiError>;

    /// Fetch provider payment configuration.
    async fn payments_config(&self) -> Result<PaymentsConfig, ApiError>;

    /// Fetch the store admin's payment-method toggles.
    async fn payment_method_toggles(&self) -> Result<PaymentMethodToggles, ApiError>;

    /// Fetch the regional payment gateway configuration.
    async fn gateway_config(&self) -> Result<GatewayConfig, ApiError>;

    /// Charge a tokenized card.
    async fn process_card_payment(
        &self,
        request: &CardPaymentRequest,
    ) -> Result<CardPaymentResponse, ApiError>;

    /// Confirm a card payment after additional authentication.
    async fn confirm_card_payment(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentConfirmation, ApiError>;

    /// Create a provider order the shopper approves off-site.
    async fn create_redirect_order(
        &self,
        request: &RedirectOrderRequest,
    ) -> Result<RedirectOrder, ApiError>;

    /// Capture a provider order the shopper approved.
    async fn capture_redirect_order(&self, order_id: &str)
    -> Result<PaymentConfirmation, ApiError>;

    /// Create the order.
    async fn place_order(
        &self,
        endpoint: &OrderEndpoint,
        payload: &OrderPayload,
        idempotency_key: Uuid,
    ) -> Result<PlacedOrder, ApiError>;
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn card_payment_request_sends_amount_as_number() -> TestResult {
        let request = CardPaymentRequest {
            amount: Decimal::new(11_050, 2),
            currency: "SAR".to_string(),
            payment_method_id: "pm_123".to_string(),
        };

        assert_eq!(
            serde_json::to_value(&request)?,
            serde_json::json!({
                "amount": 110.5,
                "currency": "SAR",
                "paymentMethodId": "pm_123",
            })
        );

        Ok(())
    }

    #[test]
    fn placed_order_accepts_document_ids() -> TestResult {
        let order: PlacedOrder = serde_json::from_str(r#"{"_id":"64f0","orderNumber":"ORD-7"}"#)?;

        assert_eq!(order.id, "64f0");
        assert_eq!(order.order_number.as_deref(), Some("ORD-7"));

        Ok(())
    }

    #[test]
    fn order_endpoint_paths() {
        assert_eq!(OrderEndpoint::Guest.path(), "/api/ecommerce/orders");
        assert_eq!(
            OrderEndpoint::Customer {
                token: "t".to_string()
            }
            .path(),
            "/api/ecommerce/customer/orders"
        );
    }

    #[test]
    fn customer_endpoint_debug_hides_token() {
        let endpoint = OrderEndpoint::Customer {
            token: "bearer-abc".to_string(),
        };

        assert_eq!(format!("{endpoint:?}"), "Customer { token: \"<redacted>\" }");
    }
}
