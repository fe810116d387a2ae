//! Order payload.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::{Cart, LineItem},
    checkout::DeliveryDetails,
    payments::PaymentMethod,
};

/// Delivery coordinates picked on a map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Latitude
    pub lat: f64,

    /// Longitude
    pub lng: f64,
}

/// Whether the order has been paid when it is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Payment is collected later (cash on delivery)
    Pending,

    /// Payment was captured before the order was created
    Paid,
}

/// Order submission sent to the order endpoints.
///
/// Lines carry product references and quantities only. Prices are always computed by the
/// backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPayload {
    /// Recipient name
    pub customer_name: String,

    /// Contact phone
    pub customer_phone: String,

    /// Second contact phone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_alt_phone: Option<String>,

    /// ISO alpha-2 delivery country
    pub country: String,

    /// Delivery city
    pub city: String,

    /// District or neighbourhood
    pub area: String,

    /// Street address
    pub address: String,

    /// Delivery notes
    pub details: String,

    /// Map pin
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoLocation>,

    /// Product references and quantities
    pub items: Vec<LineItem>,

    /// Currency the order is charged in
    pub currency: String,

    /// Chosen payment method
    pub payment_method: PaymentMethod,

    /// Whether payment was captured before the order was created
    pub payment_status: PaymentStatus,

    /// Processor reference for paid orders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,

    /// Applied coupon code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,

    /// Discount shown to the shopper, for the backend to re-check
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "rust_decimal::serde::float_option::serialize"
    )]
    pub discount: Option<Decimal>,
}

impl OrderPayload {
    /// Build a pending payload from a validated delivery, the cart and the chosen method.
    #[must_use]
    pub fn build(delivery: &DeliveryDetails, cart: &Cart, method: PaymentMethod) -> Self {
        Self {
            customer_name: delivery.name.clone(),
            customer_phone: delivery.phone.clone(),
            customer_alt_phone: delivery.alt_phone.clone(),
            country: delivery.country.clone(),
            city: delivery.city.clone(),
            area: delivery.area.clone(),
            address: delivery.address.clone(),
            details: delivery.details.clone(),
            location: delivery.location,
            items: cart.line_items(),
            currency: delivery.currency.clone(),
            payment_method: method,
            payment_status: PaymentStatus::Pending,
            payment_id: None,
            coupon_code: None,
            discount: None,
        }
    }

    /// Attach the applied coupon and the discount it gives on this order.
    #[must_use]
    pub fn with_coupon(mut self, code: impl Into<String>, discount: Decimal) -> Self {
        self.coupon_code = Some(code.into());
        self.discount = Some(discount);
        self
    }

    /// Mark the payload as paid by the given processor reference.
    #[must_use]
    pub fn paid(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_status = PaymentStatus::Paid;
        self.payment_id = Some(payment_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use crate::cart::CartItem;

    use super::*;

    fn delivery() -> DeliveryDetails {
        DeliveryDetails {
            name: "Sara".to_string(),
            phone: "0500000000".to_string(),
            alt_phone: None,
            country: "SA".to_string(),
            city: "Riyadh".to_string(),
            area: String::new(),
            address: "King Fahd Rd".to_string(),
            details: String::new(),
            location: Some(GeoLocation {
                lat: 24.7,
                lng: 46.7,
            }),
            currency: "SAR".to_string(),
        }
    }

    fn cart() -> Cart {
        Cart::with_items([
            CartItem::new("a", "A", Decimal::from(50), "SAR", 1),
            CartItem::new("b", "B", Decimal::from(30), "SAR", 2),
        ])
    }

    #[test]
    fn lines_never_carry_prices() -> TestResult {
        let payload = OrderPayload::build(&delivery(), &cart(), PaymentMethod::Cod);
        let json = serde_json::to_value(&payload)?;

        assert_eq!(
            json.get("items"),
            Some(&json!([
                { "productId": "a", "quantity": 1 },
                { "productId": "b", "quantity": 2 },
            ]))
        );
        assert_eq!(json.get("paymentMethod"), Some(&json!("cod")));
        assert_eq!(json.get("paymentStatus"), Some(&json!("pending")));
        assert!(json.get("paymentId").is_none());
        assert!(json.get("couponCode").is_none());
        assert_eq!(
            json.get("location"),
            Some(&json!({ "lat": 24.7, "lng": 46.7 }))
        );

        Ok(())
    }

    #[test]
    fn paid_payload_carries_reference_and_coupon() -> TestResult {
        let payload = OrderPayload::build(&delivery(), &cart(), PaymentMethod::Stripe)
            .with_coupon("SAVE20", Decimal::from(22))
            .paid("pi_1");
        let json = serde_json::to_value(&payload)?;

        assert_eq!(json.get("paymentStatus"), Some(&json!("paid")));
        assert_eq!(json.get("paymentId"), Some(&json!("pi_1")));
        assert_eq!(json.get("couponCode"), Some(&json!("SAVE20")));
        assert_eq!(json.get("discount"), Some(&json!(22.0)));

        Ok(())
    }
}
