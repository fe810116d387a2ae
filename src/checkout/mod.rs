//! Checkout
//!
//! A checkout attempt validates the cart, session and delivery form, builds the canonical
//! [`OrderPayload`], drives the payment flow of the chosen method and, once the order exists,
//! clears the cart and coupon. Any failure leaves the cart untouched so the shopper can retry.

use thiserror::Error;

use crate::{
    api::{ApiError, PlacedOrder},
    coupons::CouponError,
    payments::{PaymentMethod, TokenizeError},
    storage::StorageError,
};

pub mod context;
pub mod form;
pub mod orchestrator;
pub mod payload;
pub mod redirect;
pub mod state;

pub use context::CheckoutContext;
pub use form::{DeliveryDetails, DeliveryForm, Field, ValidationError};
pub use orchestrator::{CheckoutOrchestrator, CheckoutRequest};
pub use payload::{GeoLocation, OrderPayload, PaymentStatus};
pub use redirect::{PendingRedirect, RedirectQuery, resume_from_redirect};
pub use state::{CheckoutAttempt, CheckoutState, IllegalTransition};

/// Shown for failures the shopper can do nothing about except try again.
const GENERIC_RETRY_MESSAGE: &str = "Something went wrong, please try again";

/// Why a checkout attempt stopped.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// A local check failed; nothing was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The chosen payment method is not available for the delivery country.
    #[error("{0} is not available for this country")]
    MethodUnavailable(PaymentMethod),

    /// The backend refused the coupon.
    #[error("{0}")]
    CouponRejected(String),

    /// The processor refused the payment; the message is the processor's own.
    #[error("{0}")]
    PaymentDeclined(String),

    /// A payment step did not finish in time.
    #[error("payment step timed out")]
    PaymentTimeout,

    /// The backend could not be reached or answered unexpectedly.
    #[error(transparent)]
    Network(#[from] ApiError),

    /// The shopper returned from off-site approval without a matching pending order.
    #[error("payment session expired")]
    RedirectSessionExpired,

    /// The shopper backed out of off-site approval.
    #[error("payment was cancelled")]
    RedirectCancelled,

    /// Another checkout attempt is already running.
    #[error("checkout already in progress")]
    InFlight,

    /// Client storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A pending order snapshot could not be serialized.
    #[error("failed to serialize pending order: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The attempt tried to skip a step.
    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

impl CheckoutError {
    /// The single message shown to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            CheckoutError::Validation(error) => error.to_string(),
            CheckoutError::MethodUnavailable(_) => {
                "Please choose another payment method".to_string()
            }
            CheckoutError::CouponRejected(message) | CheckoutError::PaymentDeclined(message) => {
                message.clone()
            }
            CheckoutError::PaymentTimeout => {
                "The payment is taking too long, please try again".to_string()
            }
            CheckoutError::RedirectSessionExpired => {
                "Payment session expired, please try again".to_string()
            }
            CheckoutError::RedirectCancelled => "Payment was cancelled".to_string(),
            CheckoutError::InFlight => "Your order is already being processed".to_string(),
            CheckoutError::Network(_)
            | CheckoutError::Storage(_)
            | CheckoutError::Serialization(_)
            | CheckoutError::IllegalTransition(_) => GENERIC_RETRY_MESSAGE.to_string(),
        }
    }

    /// Whether repeating the same attempt may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::Network(_)
                | CheckoutError::PaymentTimeout
                | CheckoutError::RedirectSessionExpired
        )
    }
}

impl From<TokenizeError> for CheckoutError {
    fn from(error: TokenizeError) -> Self {
        CheckoutError::PaymentDeclined(error.to_string())
    }
}

impl From<CouponError> for CheckoutError {
    fn from(error: CouponError) -> Self {
        match error {
            CouponError::Network(error) => CheckoutError::Network(error),
            CouponError::EmptyCode | CouponError::Rejected(_) => {
                CheckoutError::CouponRejected(error.to_string())
            }
        }
    }
}

/// How a checkout attempt ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutOutcome {
    /// The order exists; the cart and coupon were cleared.
    OrderPlaced {
        /// The created order
        order: PlacedOrder,

        /// Confirmation route to show next
        confirmation_path: String,
    },

    /// The shopper must approve the payment off-site.
    Redirect {
        /// Provider approval page
        approval_url: String,
    },

    /// The gateway's own checkout takes over.
    GatewayHandoff {
        /// Gateway checkout route, carrying the chosen method
        route: String,
    },

    /// The shopper must log in first; the cart is kept.
    LoginRequired {
        /// Login route
        login_path: String,

        /// Route to come back to after logging in
        return_to: String,
    },
}
