//! Coupons
//!
//! The backend decides whether a coupon is valid; this module owns the client side of that
//! contract: normalizing codes, holding at most one applied coupon, and keeping the discounted
//! total from ever going negative.

use decimal_percentage::Percentage;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    api::{ApiError, StorefrontApi, ValidateCouponRequest},
    currency::{RateTable, normalize_code as normalize_currency},
};

/// Shown when the backend accepts a coupon without a message of its own.
const DEFAULT_APPLIED_MESSAGE: &str = "Coupon applied";

/// Shown when the backend rejects a coupon without a message of its own.
const DEFAULT_REJECTED_MESSAGE: &str = "Invalid coupon code";

/// Errors raised while applying a coupon.
#[derive(Debug, Error)]
pub enum CouponError {
    /// No code was entered.
    #[error("Please enter a coupon code")]
    EmptyCode,

    /// The backend rejected the coupon (invalid, expired, exhausted, below minimum, ...).
    #[error("{0}")]
    Rejected(String),

    /// The backend could not be reached.
    #[error("Could not validate coupon, please try again")]
    Network(#[from] ApiError),
}

/// How a coupon's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// `discount_value` is in percent points of the subtotal
    Percentage,

    /// `discount_value` is an absolute amount
    Fixed,
}

/// A coupon definition as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    /// Upper-cased code
    pub code: String,

    /// How `discount_value` is interpreted
    pub discount_type: DiscountType,

    /// Percent points or absolute amount
    pub discount_value: Decimal,
}

impl Coupon {
    /// Discount this coupon gives on `subtotal`, never more than the subtotal itself.
    #[must_use]
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percentage => {
                Percentage::from(self.discount_value / Decimal::ONE_HUNDRED) * subtotal
            }
            DiscountType::Fixed => self.discount_value,
        };

        clamp_discount(raw, subtotal)
    }
}

/// A coupon accepted by the backend, with the discount it gave on the subtotal it was checked
/// against.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCoupon {
    /// The coupon
    pub coupon: Coupon,

    /// Discount on `validated_subtotal`
    pub discount_amount: Decimal,

    /// Subtotal the backend validated the coupon against
    pub validated_subtotal: Decimal,

    /// Currency of `validated_subtotal` and `discount_amount`
    pub currency: String,

    /// Message to show the shopper
    pub message: String,
}

impl AppliedCoupon {
    /// Discount this coupon gives on `subtotal`, priced in `currency`.
    ///
    /// The validated discount stands while the subtotal and currency are the ones the backend
    /// saw. Once either changes, a percentage coupon is recomputed on the new subtotal and a
    /// fixed coupon's value is converted into `currency`. The result never exceeds `subtotal`.
    #[must_use]
    pub fn discount_on(&self, subtotal: Decimal, currency: &str, rates: &RateTable) -> Decimal {
        let same_currency = self.currency.eq_ignore_ascii_case(currency.trim());

        if same_currency && subtotal == self.validated_subtotal {
            return clamp_discount(self.discount_amount, subtotal);
        }

        match self.coupon.discount_type {
            DiscountType::Percentage => self.coupon.discount_for(subtotal),
            DiscountType::Fixed => clamp_discount(
                rates.convert(self.coupon.discount_value, &self.currency, currency),
                subtotal,
            ),
        }
    }
}

/// Trim and upper-case a coupon code.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Subtotal after discount, floored at zero.
#[must_use]
pub fn discounted_total(subtotal: Decimal, discount: Decimal) -> Decimal {
    (subtotal - discount).max(Decimal::ZERO)
}

fn clamp_discount(discount: Decimal, subtotal: Decimal) -> Decimal {
    discount.max(Decimal::ZERO).min(subtotal.max(Decimal::ZERO))
}

/// Holds the single coupon applied to a checkout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouponSlot {
    applied: Option<AppliedCoupon>,
}

impl CouponSlot {
    /// Create a slot with no coupon applied.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `code` against `subtotal` (priced in `currency`) and apply it, replacing any
    /// applied coupon.
    ///
    /// Any failure leaves no coupon applied, so the total reverts to full price.
    ///
    /// # Errors
    ///
    /// - [`CouponError::EmptyCode`]: the code is blank; no request is made.
    /// - [`CouponError::Rejected`]: the backend refused the coupon.
    /// - [`CouponError::Network`]: the backend could not be reached.
    #[tracing::instrument(name = "coupons.apply", skip(self, api, code), fields(code = tracing::field::Empty))]
    pub async fn apply(
        &mut self,
        api: &dyn StorefrontApi,
        code: &str,
        subtotal: Decimal,
        currency: &str,
    ) -> Result<&AppliedCoupon, CouponError> {
        let code = normalize_code(code);

        if code.is_empty() {
            self.applied = None;
            return Err(CouponError::EmptyCode);
        }

        tracing::Span::current().record("code", code.as_str());

        let request = ValidateCouponRequest {
            code: code.clone(),
            order_total: subtotal,
        };

        let response = match api.validate_coupon(&request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(%error, "coupon validation failed");
                self.applied = None;
                return Err(error.into());
            }
        };

        if !response.valid {
            self.applied = None;

            return Err(CouponError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| DEFAULT_REJECTED_MESSAGE.to_string()),
            ));
        }

        let coupon = response.coupon.unwrap_or_else(|| Coupon {
            code: code.clone(),
            discount_type: DiscountType::Fixed,
            discount_value: response.discount.unwrap_or(Decimal::ZERO),
        });

        let discount_amount = response.discount.map_or_else(
            || coupon.discount_for(subtotal),
            |discount| clamp_discount(discount, subtotal),
        );

        info!(%discount_amount, "coupon applied");

        let applied = self.applied.insert(AppliedCoupon {
            coupon,
            discount_amount,
            validated_subtotal: subtotal,
            currency: normalize_currency(currency),
            message: response
                .message
                .unwrap_or_else(|| DEFAULT_APPLIED_MESSAGE.to_string()),
        });

        Ok(applied)
    }

    /// Remove the applied coupon, returning it.
    pub fn remove(&mut self) -> Option<AppliedCoupon> {
        self.applied.take()
    }

    /// The applied coupon, if any.
    #[must_use]
    pub fn applied(&self) -> Option<&AppliedCoupon> {
        self.applied.as_ref()
    }

    /// Code of the applied coupon, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.applied.as_ref().map(|applied| applied.coupon.code.as_str())
    }

    /// Discount of the applied coupon on `subtotal`, zero when none is applied.
    ///
    /// See [`AppliedCoupon::discount_on`].
    #[must_use]
    pub fn discount(&self, subtotal: Decimal, currency: &str, rates: &RateTable) -> Decimal {
        self.applied.as_ref().map_or(Decimal::ZERO, |applied| {
            applied.discount_on(subtotal, currency, rates)
        })
    }

    /// `subtotal` less the applied discount, floored at zero.
    #[must_use]
    pub fn total(&self, subtotal: Decimal, currency: &str, rates: &RateTable) -> Decimal {
        discounted_total(subtotal, self.discount(subtotal, currency, rates))
    }
}
