//! Checkout attempt state machine.

use std::fmt;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Where a single checkout attempt is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckoutState {
    /// Nothing submitted yet
    Idle,

    /// Checking cart, session and delivery form
    Validating,

    /// A local check failed; nothing was sent
    Rejected,

    /// Form is valid; the payment step runs next
    AwaitingPayment,

    /// The processor captured the payment
    PaymentCaptured,

    /// The payment step failed
    PaymentFailed,

    /// The shopper was sent off-site to approve the payment
    RedirectPending,

    /// The shopper came back from off-site approval
    RedirectReturn,

    /// The shopper was handed to the gateway's checkout route
    HandedOff,

    /// The order could not be created
    SubmissionFailed,

    /// The order was created
    OrderPlaced,
}

impl CheckoutState {
    /// Stable name, for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::AwaitingPayment => "awaiting_payment",
            Self::PaymentCaptured => "payment_captured",
            Self::PaymentFailed => "payment_failed",
            Self::RedirectPending => "redirect_pending",
            Self::RedirectReturn => "redirect_return",
            Self::HandedOff => "handed_off",
            Self::SubmissionFailed => "submission_failed",
            Self::OrderPlaced => "order_placed",
        }
    }

    /// Whether the attempt is over. A new attempt starts from [`CheckoutState::Idle`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected
                | Self::PaymentFailed
                | Self::RedirectPending
                | Self::HandedOff
                | Self::SubmissionFailed
                | Self::OrderPlaced
        )
    }

    /// Whether `self -> to` is a legal step.
    #[must_use]
    pub const fn can_transition_to(self, to: CheckoutState) -> bool {
        use CheckoutState::{
            AwaitingPayment, HandedOff, Idle, OrderPlaced, PaymentCaptured, PaymentFailed,
            RedirectPending, RedirectReturn, Rejected, SubmissionFailed, Validating,
        };

        matches!(
            (self, to),
            (Idle, Validating | RedirectReturn)
                // The login gate aborts the attempt without rejecting it.
                | (Validating, Rejected | AwaitingPayment | Idle)
                | (
                    AwaitingPayment,
                    PaymentCaptured
                        | PaymentFailed
                        | RedirectPending
                        | HandedOff
                        | OrderPlaced
                        | SubmissionFailed
                )
                | (RedirectReturn, PaymentCaptured | PaymentFailed)
                | (PaymentCaptured, OrderPlaced | SubmissionFailed)
        )
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition the state machine does not allow.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("illegal checkout transition from {from} to {to}")]
pub struct IllegalTransition {
    /// State before the attempted step
    pub from: CheckoutState,

    /// Requested state
    pub to: CheckoutState,
}

/// One checkout attempt: its idempotency key and the states it went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutAttempt {
    idempotency_key: Uuid,
    history: Vec<CheckoutState>,
}

impl Default for CheckoutAttempt {
    fn default() -> Self {
        Self::new()
    }
}

impl CheckoutAttempt {
    /// Start a new attempt with a fresh idempotency key.
    #[must_use]
    pub fn new() -> Self {
        Self::with_key(Uuid::now_v7())
    }

    /// Continue an attempt whose key was persisted across a redirect.
    #[must_use]
    pub fn with_key(idempotency_key: Uuid) -> Self {
        Self {
            idempotency_key,
            history: vec![CheckoutState::Idle],
        }
    }

    /// Key sent with the order so retries of this attempt create at most one order.
    #[must_use]
    pub fn idempotency_key(&self) -> Uuid {
        self.idempotency_key
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CheckoutState {
        self.history
            .last()
            .copied()
            .unwrap_or(CheckoutState::Idle)
    }

    /// Every state visited, oldest first.
    #[must_use]
    pub fn history(&self) -> &[CheckoutState] {
        &self.history
    }

    /// Move to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`IllegalTransition`] if the step is not allowed from the current state; the
    /// attempt is left unchanged.
    pub fn transition(&mut self, to: CheckoutState) -> Result<(), IllegalTransition> {
        let from = self.state();

        if !from.can_transition_to(to) {
            return Err(IllegalTransition { from, to });
        }

        debug!(
            attempt = %self.idempotency_key,
            from = from.as_str(),
            to = to.as_str(),
            "checkout state changed"
        );

        self.history.push(to);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn cod_path_is_legal() -> TestResult {
        let mut attempt = CheckoutAttempt::new();

        attempt.transition(CheckoutState::Validating)?;
        attempt.transition(CheckoutState::AwaitingPayment)?;
        attempt.transition(CheckoutState::OrderPlaced)?;

        assert_eq!(
            attempt.history(),
            &[
                CheckoutState::Idle,
                CheckoutState::Validating,
                CheckoutState::AwaitingPayment,
                CheckoutState::OrderPlaced,
            ]
        );
        assert!(attempt.state().is_terminal());

        Ok(())
    }

    #[test]
    fn payment_cannot_be_skipped() {
        let mut attempt = CheckoutAttempt::new();

        let result = attempt.transition(CheckoutState::OrderPlaced);

        assert_eq!(
            result,
            Err(IllegalTransition {
                from: CheckoutState::Idle,
                to: CheckoutState::OrderPlaced,
            })
        );
        assert_eq!(attempt.state(), CheckoutState::Idle);
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let terminal = [
            CheckoutState::Rejected,
            CheckoutState::PaymentFailed,
            CheckoutState::RedirectPending,
            CheckoutState::HandedOff,
            CheckoutState::SubmissionFailed,
            CheckoutState::OrderPlaced,
        ];

        for from in terminal {
            assert!(!from.can_transition_to(CheckoutState::Idle), "{from} -> idle");
            assert!(
                !from.can_transition_to(CheckoutState::Validating),
                "{from} -> validating"
            );
        }
    }

    #[test]
    fn resumed_attempt_keeps_its_key() -> TestResult {
        let original = CheckoutAttempt::new();
        let mut resumed = CheckoutAttempt::with_key(original.idempotency_key());

        resumed.transition(CheckoutState::RedirectReturn)?;
        resumed.transition(CheckoutState::PaymentCaptured)?;

        assert_eq!(resumed.idempotency_key(), original.idempotency_key());

        Ok(())
    }

    #[test]
    fn attempts_get_distinct_keys() {
        assert_ne!(
            CheckoutAttempt::new().idempotency_key(),
            CheckoutAttempt::new().idempotency_key()
        );
    }
}
