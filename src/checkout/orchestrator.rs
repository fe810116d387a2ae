//! Checkout orchestrator.

use std::{
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use rust_decimal::Decimal;
use tracing::{info, warn};
use url::form_urlencoded;

use crate::{
    api::{CardPaymentRequest, RedirectOrderRequest, StorefrontApi},
    cart::CartService,
    checkout::{
        CheckoutAttempt, CheckoutContext, CheckoutError, CheckoutOutcome, CheckoutState,
        DeliveryForm, OrderPayload, PendingRedirect, RedirectQuery, ValidationError,
        resume_from_redirect,
    },
    config::StoreConfig,
    coupons::{CouponSlot, discounted_total},
    currency::round_to_minor,
    payments::{
        CardTokenizer, GatewayKind, PaymentFlow, PaymentMethod, resolve_available_methods,
    },
    session::Session,
    storage::ClientStorage,
};

/// Shown when the processor declines without saying why.
const DEFAULT_DECLINE_MESSAGE: &str = "Payment failed";

/// What the shopper submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    /// Delivery form as entered
    pub form: DeliveryForm,

    /// Selected payment method
    pub method: PaymentMethod,

    /// Current session
    pub session: Session,
}

/// Clears the in-flight flag when the attempt ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives checkout attempts against the storefront backend.
pub struct CheckoutOrchestrator {
    api: Arc<dyn StorefrontApi>,
    tokenizer: Arc<dyn CardTokenizer>,
    storage: Arc<dyn ClientStorage>,
    config: StoreConfig,
    context: CheckoutContext,
    in_flight: AtomicBool,
}

impl fmt::Debug for CheckoutOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckoutOrchestrator")
            .field("storage", &self.storage)
            .field("context", &self.context)
            .field("in_flight", &self.in_flight)
            .finish_non_exhaustive()
    }
}

impl CheckoutOrchestrator {
    /// Create an orchestrator over already-loaded merchant settings.
    #[must_use]
    pub fn new(
        api: Arc<dyn StorefrontApi>,
        tokenizer: Arc<dyn CardTokenizer>,
        storage: Arc<dyn ClientStorage>,
        config: StoreConfig,
        context: CheckoutContext,
    ) -> Self {
        Self {
            api,
            tokenizer,
            storage,
            config,
            context,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Load merchant settings with [`CheckoutContext::load`] and create an orchestrator.
    pub async fn load(
        api: Arc<dyn StorefrontApi>,
        tokenizer: Arc<dyn CardTokenizer>,
        storage: Arc<dyn ClientStorage>,
        config: StoreConfig,
    ) -> Self {
        let context = CheckoutContext::load(api.as_ref(), &config).await;

        Self::new(api, tokenizer, storage, config, context)
    }

    /// Merchant settings in use.
    #[must_use]
    pub fn context(&self) -> &CheckoutContext {
        &self.context
    }

    /// Store configuration in use.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Whether an attempt is running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<InFlightGuard<'_>, CheckoutError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return Err(CheckoutError::InFlight);
        }

        Ok(InFlightGuard(&self.in_flight))
    }

    /// Run a checkout attempt.
    ///
    /// Checks run in order: empty cart, login gate, delivery form, then whether the method is
    /// available for the country. The chosen method's flow then decides whether the order is
    /// placed here, the shopper is sent off-site, or the gateway takes over.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] describing the first failure. The cart and coupon are only
    /// cleared once an order is placed.
    #[tracing::instrument(
        name = "checkout.submit",
        skip_all,
        fields(method = %request.method, country = %request.form.country),
        err
    )]
    pub async fn submit(
        &self,
        request: &CheckoutRequest,
        cart: &mut CartService,
        coupon: &mut CouponSlot,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let _guard = self.begin()?;
        let mut attempt = CheckoutAttempt::new();

        attempt.transition(CheckoutState::Validating)?;

        if cart.cart().is_empty() {
            return reject(&mut attempt, ValidationError::EmptyCart.into());
        }

        if self.config.checkout.require_login && !request.session.is_authenticated() {
            attempt.transition(CheckoutState::Idle)?;

            info!("login required before checkout");

            return Ok(CheckoutOutcome::LoginRequired {
                login_path: self.config.checkout.login_path.clone(),
                return_to: self.config.checkout.return_path.clone(),
            });
        }

        let delivery = match request.form.validate(&self.config) {
            Ok(delivery) => delivery,
            Err(error) => return reject(&mut attempt, error.into()),
        };

        let available = resolve_available_methods(
            &delivery.country,
            &self.context.methods,
            &self.config.payments,
        );

        if !available.contains(&request.method) {
            return reject(&mut attempt, CheckoutError::MethodUnavailable(request.method));
        }

        attempt.transition(CheckoutState::AwaitingPayment)?;

        let subtotal = cart.cart().subtotal(&delivery.currency, &self.context.rates);
        let discount = round_to_minor(
            coupon.discount(subtotal, &delivery.currency, &self.context.rates),
            &delivery.currency,
        );
        let total = round_to_minor(discounted_total(subtotal, discount), &delivery.currency);

        let payload = OrderPayload::build(&delivery, cart.cart(), request.method);
        let payload = match coupon.code() {
            Some(code) => payload.with_coupon(code, discount),
            None => payload,
        };

        match request.method.flow() {
            PaymentFlow::Direct => {
                self.place(&mut attempt, &request.session, &payload, cart, coupon)
                    .await
            }
            PaymentFlow::CardToken => {
                let payment_id = match self.capture_card(total, &delivery.currency).await {
                    Ok(payment_id) => payment_id,
                    Err(error) => return fail(&mut attempt, CheckoutState::PaymentFailed, error),
                };

                attempt.transition(CheckoutState::PaymentCaptured)?;

                let payload = payload.paid(payment_id);

                self.place(&mut attempt, &request.session, &payload, cart, coupon)
                    .await
            }
            PaymentFlow::Redirect => {
                self.start_redirect(&mut attempt, payload, total, &delivery.currency)
                    .await
            }
            PaymentFlow::GatewayHandoff(kind) => {
                attempt.transition(CheckoutState::HandedOff)?;

                Ok(CheckoutOutcome::GatewayHandoff {
                    route: self.gateway_route(kind),
                })
            }
        }
    }

    /// Continue an attempt after the shopper returns from off-site approval.
    ///
    /// # Errors
    ///
    /// - [`CheckoutError::RedirectSessionExpired`]: no matching pending order exists.
    /// - [`CheckoutError::RedirectCancelled`]: the shopper backed out; the pending order is
    ///   discarded.
    /// - [`CheckoutError::PaymentDeclined`], [`CheckoutError::PaymentTimeout`] or
    ///   [`CheckoutError::Network`]: capture failed; the pending order is kept for a retry.
    /// - [`CheckoutError::Network`] after a successful capture: the order was not placed. The
    ///   snapshot is kept marked as captured, so a retry only places the order.
    #[tracing::instrument(name = "checkout.resume_redirect", skip_all, err)]
    pub async fn resume_redirect(
        &self,
        query: &RedirectQuery,
        session: &Session,
        cart: &mut CartService,
        coupon: &mut CouponSlot,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let _guard = self.begin()?;
        let stored = PendingRedirect::load(self.storage.as_ref())?;

        let pending = match resume_from_redirect(query, stored) {
            Ok(pending) => pending,
            Err(error) => {
                if matches!(error, CheckoutError::RedirectCancelled) {
                    self.discard_snapshot();
                }

                warn!(%error, "redirect could not be resumed");

                return Err(error);
            }
        };

        let mut attempt = CheckoutAttempt::with_key(pending.idempotency_key);

        attempt.transition(CheckoutState::RedirectReturn)?;

        let pending = if pending.captured {
            info!(provider_order = %pending.provider_order_id, "payment already captured");

            pending
        } else {
            self.capture_redirect(&mut attempt, pending).await?
        };

        attempt.transition(CheckoutState::PaymentCaptured)?;

        let outcome = self
            .place(&mut attempt, session, &pending.payload, cart, coupon)
            .await?;

        self.discard_snapshot();

        Ok(outcome)
    }

    /// Capture the provider order and persist the snapshot as paid before anything else runs.
    async fn capture_redirect(
        &self,
        attempt: &mut CheckoutAttempt,
        pending: PendingRedirect,
    ) -> Result<PendingRedirect, CheckoutError> {
        let captured = match self
            .bounded(self.api.capture_redirect_order(&pending.provider_order_id))
            .await
        {
            Ok(Ok(captured)) => captured,
            Ok(Err(error)) => return fail(attempt, CheckoutState::PaymentFailed, error.into()),
            Err(error) => return fail(attempt, CheckoutState::PaymentFailed, error),
        };

        if !captured.success {
            let message = captured
                .message
                .unwrap_or_else(|| DEFAULT_DECLINE_MESSAGE.to_string());

            return fail(
                attempt,
                CheckoutState::PaymentFailed,
                CheckoutError::PaymentDeclined(message),
            );
        }

        let pending = pending.into_captured();

        if let Err(error) = pending.save(self.storage.as_ref()) {
            warn!(%error, "failed to mark pending order snapshot as captured");
        }

        Ok(pending)
    }

    /// The snapshot is stale once the attempt has concluded; failing to remove it never changes
    /// the outcome.
    fn discard_snapshot(&self) {
        if let Err(error) = PendingRedirect::clear(self.storage.as_ref()) {
            warn!(%error, "failed to discard pending order snapshot");
        }
    }

    async fn bounded<F: Future>(&self, future: F) -> Result<F::Output, CheckoutError> {
        let limit = Duration::from_secs(self.config.checkout.payment_timeout_secs);

        tokio::time::timeout(limit, future)
            .await
            .map_err(|_elapsed| CheckoutError::PaymentTimeout)
    }

    /// Tokenize, charge, and authenticate when asked; returns the processor reference.
    async fn capture_card(&self, amount: Decimal, currency: &str) -> Result<String, CheckoutError> {
        let token = self
            .bounded(self.tokenizer.create_payment_method())
            .await??;

        let request = CardPaymentRequest {
            amount,
            currency: currency.to_string(),
            payment_method_id: token.as_str().to_string(),
        };

        let response = self
            .bounded(self.api.process_card_payment(&request))
            .await??;

        let declined = |message: Option<String>| {
            CheckoutError::PaymentDeclined(
                message.unwrap_or_else(|| DEFAULT_DECLINE_MESSAGE.to_string()),
            )
        };

        let Some(payment_intent_id) = response.payment_intent_id else {
            return Err(declined(response.message));
        };

        if response.requires_action {
            let Some(client_secret) = response.client_secret else {
                return Err(declined(response.message));
            };

            self.bounded(self.tokenizer.handle_card_action(&client_secret))
                .await??;

            let confirmation = self
                .bounded(self.api.confirm_card_payment(&payment_intent_id))
                .await??;

            if !confirmation.success {
                return Err(declined(confirmation.message));
            }
        } else if !response.success {
            return Err(declined(response.message));
        }

        Ok(payment_intent_id)
    }

    async fn start_redirect(
        &self,
        attempt: &mut CheckoutAttempt,
        payload: OrderPayload,
        amount: Decimal,
        currency: &str,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let request = RedirectOrderRequest {
            amount,
            currency: currency.to_string(),
        };

        let order = match self
            .bounded(self.api.create_redirect_order(&request))
            .await
        {
            Ok(Ok(order)) => order,
            Ok(Err(error)) => return fail(attempt, CheckoutState::PaymentFailed, error.into()),
            Err(error) => return fail(attempt, CheckoutState::PaymentFailed, error),
        };

        let pending = PendingRedirect {
            payload,
            provider_order_id: order.order_id,
            idempotency_key: attempt.idempotency_key(),
            captured: false,
        };

        if let Err(error) = pending.save(self.storage.as_ref()) {
            return fail(attempt, CheckoutState::PaymentFailed, error);
        }

        attempt.transition(CheckoutState::RedirectPending)?;

        info!(provider_order = %pending.provider_order_id, "awaiting off-site approval");

        Ok(CheckoutOutcome::Redirect {
            approval_url: order.approval_url,
        })
    }

    async fn place(
        &self,
        attempt: &mut CheckoutAttempt,
        session: &Session,
        payload: &OrderPayload,
        cart: &mut CartService,
        coupon: &mut CouponSlot,
    ) -> Result<CheckoutOutcome, CheckoutError> {
        let endpoint = session.order_endpoint();

        let order = match self
            .api
            .place_order(&endpoint, payload, attempt.idempotency_key())
            .await
        {
            Ok(order) => order,
            Err(error) => return fail(attempt, CheckoutState::SubmissionFailed, error.into()),
        };

        attempt.transition(CheckoutState::OrderPlaced)?;

        cart.clear();
        coupon.remove();

        if let Some(code) = &payload.coupon_code {
            self.record_coupon_usage(code).await;
        }

        info!(
            order = %order.id,
            method = %payload.payment_method,
            endpoint = endpoint.path(),
            "order placed"
        );

        Ok(CheckoutOutcome::OrderPlaced {
            order,
            confirmation_path: self.config.checkout.confirmation_path.clone(),
        })
    }

    /// Usage recording never blocks completion; the order already exists.
    async fn record_coupon_usage(&self, code: &str) {
        if let Err(error) = self.api.record_coupon_usage(code).await {
            warn!(%error, code, "failed to record coupon usage");
        }
    }

    fn gateway_route(&self, kind: GatewayKind) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("method", kind.method().as_str())
            .finish();

        format!("{}?{query}", self.config.checkout.gateway_checkout_path)
    }
}

fn reject<T>(attempt: &mut CheckoutAttempt, error: CheckoutError) -> Result<T, CheckoutError> {
    fail(attempt, CheckoutState::Rejected, error)
}

fn fail<T>(
    attempt: &mut CheckoutAttempt,
    state: CheckoutState,
    error: CheckoutError,
) -> Result<T, CheckoutError> {
    attempt.transition(state)?;

    warn!(state = state.as_str(), %error, "checkout attempt failed");

    Err(error)
}
