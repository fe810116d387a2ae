//! HTTP client for the storefront backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use url::Url;
use uuid::Uuid;

use crate::{
    api::{
        ApiError, CardPaymentRequest, CardPaymentResponse, OrderEndpoint, PaymentConfirmation,
        PlacedOrder, RedirectOrder, RedirectOrderRequest, StorefrontApi, ValidateCouponRequest,
        ValidateCouponResponse,
    },
    checkout::OrderPayload,
    config::ApiConfig,
    currency::RateTable,
    payments::{GatewayConfig, PaymentMethodToggles, PaymentsConfig},
};

/// Header carrying the per-attempt idempotency key on order creation.
const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// [`StorefrontApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStorefrontApi {
    base_url: Url,
    http: Client,
}

impl HttpStorefrontApi {
    /// Create a client from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            base_url: Url::parse(&config.base_url)?,
            http,
        })
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.http.get(self.url(path)?).send().await?;

        Ok(ensure_success(response).await?.json().await?)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        self.send_json(self.http.post(self.url(path)?).json(body))
            .await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.send().await?;

        Ok(ensure_success(response).await?.json().await?)
    }
}

async fn ensure_success(response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    Err(ApiError::UnexpectedResponse { status, body })
}

#[async_trait]
impl StorefrontApi for HttpStorefrontApi {
    #[tracing::instrument(name = "api.validate_coupon", skip_all, fields(code = %request.code), err)]
    async fn validate_coupon(
        &self,
        request: &ValidateCouponRequest,
    ) -> Result<ValidateCouponResponse, ApiError> {
        let response = self
            .http
            .post(self.url("/api/coupons/validate")?)
            .json(request)
            .send()
            .await?;

        // Rejections come back as client errors with the usual body.
        if response.status().is_client_error() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            return serde_json::from_str(&body)
                .map_err(|_err| ApiError::UnexpectedResponse { status, body });
        }

        Ok(ensure_success(response).await?.json().await?)
    }

    #[tracing::instrument(name = "api.record_coupon_usage", skip(self), err)]
    async fn record_coupon_usage(&self, code: &str) -> Result<(), ApiError> {
        let response = self
            .http
            .post(self.url("/api/coupons/apply")?)
            .json(&serde_json::json!({ "code": code }))
            .send()
            .await?;

        ensure_success(response).await?;

        Ok(())
    }

    #[tracing::instrument(name = "api.currency_settings", skip(self), err)]
    async fn currency_settings(&self) -> Result<RateTable, ApiError> {
        self.get_json("/api/settings/currency").await
    }

    #[tracing::instrument(name = "api.payments_config", skip(self), err)]
    async fn payments_config(&self) -> Result<PaymentsConfig, ApiError> {
        self.get_json("/api/ecommerce/payments/config").await
    }

    #[tracing::instrument(name = "api.payment_method_toggles", skip(self), err)]
    async fn payment_method_toggles(&self) -> Result<PaymentMethodToggles, ApiError> {
        self.get_json("/api/settings/payment-methods").await
    }

    #[tracing::instrument(name = "api.gateway_config", skip(self), err)]
    async fn gateway_config(&self) -> Result<GatewayConfig, ApiError> {
        self.get_json("/api/moyasar/config").await
    }

    #[tracing::instrument(
        name = "api.process_card_payment",
        skip_all,
        fields(amount = %request.amount, currency = %request.currency),
        err
    )]
    async fn process_card_payment(
        &self,
        request: &CardPaymentRequest,
    ) -> Result<CardPaymentResponse, ApiError> {
        self.post_json("/api/ecommerce/payments/stripe/process-payment", request)
            .await
    }

    #[tracing::instrument(name = "api.confirm_card_payment", skip(self), err)]
    async fn confirm_card_payment(
        &self,
        payment_intent_id: &str,
    ) -> Result<PaymentConfirmation, ApiError> {
        self.post_json(
            "/api/ecommerce/payments/stripe/confirm",
            &serde_json::json!({ "paymentIntentId": payment_intent_id }),
        )
        .await
    }

    #[tracing::instrument(
        name = "api.create_redirect_order",
        skip_all,
        fields(amount = %request.amount, currency = %request.currency),
        err
    )]
    async fn create_redirect_order(
        &self,
        request: &RedirectOrderRequest,
    ) -> Result<RedirectOrder, ApiError> {
        self.post_json("/api/ecommerce/payments/paypal/create-order", request)
            .await
    }

    #[tracing::instrument(name = "api.capture_redirect_order", skip(self), err)]
    async fn capture_redirect_order(
        &self,
        order_id: &str,
    ) -> Result<PaymentConfirmation, ApiError> {
        self.post_json(
            "/api/ecommerce/payments/paypal/capture-order",
            &serde_json::json!({ "orderId": order_id }),
        )
        .await
    }

    #[tracing::instrument(
        name = "api.place_order",
        skip(self, endpoint, payload),
        fields(path = endpoint.path()),
        err
    )]
    async fn place_order(
        &self,
        endpoint: &OrderEndpoint,
        payload: &OrderPayload,
        idempotency_key: Uuid,
    ) -> Result<PlacedOrder, ApiError> {
        let mut request = self
            .http
            .post(self.url(endpoint.path())?)
            .header(IDEMPOTENCY_HEADER, idempotency_key.to_string())
            .json(payload);

        if let OrderEndpoint::Customer { token } = endpoint {
            request = request.bearer_auth(token);
        }

        self.send_json(request).await
    }
}
