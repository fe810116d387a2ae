//! Card tokenization seam.
//!
//! Card details are entered into the processor's own client SDK and never pass through this
//! crate. The SDK hands back an opaque [`PaymentMethodToken`], and that token is all the
//! first-party backend ever sees.

use std::fmt;

use async_trait::async_trait;
use mockall::automock;
use thiserror::Error;

/// Errors raised by the card processor's client SDK.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenizeError {
    /// The card form has not finished loading.
    #[error("card form is not ready")]
    NotReady,

    /// The processor rejected the card details.
    #[error("{0}")]
    Declined(String),

    /// The additional authentication step failed or was abandoned.
    #[error("{0}")]
    AuthenticationFailed(String),
}

/// Opaque processor reference to a tokenized card.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PaymentMethodToken(String);

impl PaymentMethodToken {
    /// Wrap a processor reference.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The reference, as sent to the backend.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PaymentMethodToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Card processor client SDK.
#[automock]
#[async_trait]
pub trait CardTokenizer: Send + Sync {
    /// Tokenize the card currently entered by the shopper.
    async fn create_payment_method(&self) -> Result<PaymentMethodToken, TokenizeError>;

    /// Run the processor's additional authentication step for a payment that requires it.
    async fn handle_card_action(&self, client_secret: &str) -> Result<(), TokenizeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_displays_as_reference() {
        let token = PaymentMethodToken::new("pm_1");

        assert_eq!(token.as_str(), "pm_1");
        assert_eq!(token.to_string(), "pm_1");
    }

    #[test]
    fn processor_messages_are_surfaced_verbatim() {
        let error = TokenizeError::Declined("Your card was declined.".to_string());

        assert_eq!(error.to_string(), "Your card was declined.");
    }
}
