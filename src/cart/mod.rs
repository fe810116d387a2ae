//! Cart
//!
//! The cart is an ordered list of line items, unique by product. Mutations never fail: asking for
//! more than the stock ceiling clamps, and asking for zero of something removes it.

use rust_decimal::Decimal;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::currency::RateTable;

pub mod service;
pub mod store;

pub use service::{CartChanged, CartService};
pub use store::{CartStore, CartStoreError, StorageCartStore};

/// A product in the cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// External product reference
    #[serde(alias = "_id", alias = "id")]
    pub product_id: String,

    /// Product name, for display only
    #[serde(default)]
    pub name: String,

    /// Unit price in `currency`
    #[serde(alias = "price")]
    pub unit_price: Decimal,

    /// Currency the unit price is quoted in
    pub currency: String,

    /// Number of units, always at least one while the item is in a cart
    pub quantity: u32,

    /// Maximum number of units that may be ordered
    #[serde(default, alias = "stock")]
    pub max_stock: Option<u32>,
}

impl CartItem {
    /// Create a cart item without a stock ceiling.
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Decimal,
        currency: impl Into<String>,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            unit_price,
            currency: currency.into(),
            quantity,
            max_stock: None,
        }
    }

    /// Set the stock ceiling.
    #[must_use]
    pub fn with_max_stock(mut self, max_stock: u32) -> Self {
        self.max_stock = Some(max_stock);
        self
    }

    /// Clamp a requested quantity to the stock ceiling.
    fn clamp(&self, quantity: u32) -> u32 {
        self.max_stock
            .map_or(quantity, |ceiling| quantity.min(ceiling))
    }
}

/// Product reference and quantity, the only line data sent when placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// External product reference
    pub product_id: String,

    /// Number of units ordered
    pub quantity: u32,
}

/// Cart aggregate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cart from previously stored items.
    ///
    /// Items with a zero quantity are dropped, quantities are clamped to their stock ceiling and
    /// repeated products are merged into their first occurrence.
    #[must_use]
    pub fn with_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::new();

        for item in items {
            cart.add_or_update(item);
        }

        cart
    }

    /// Restore a cart from its serialized form.
    ///
    /// Corrupt input yields an empty cart rather than an error, so a damaged client store never
    /// blocks the storefront.
    #[must_use]
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str::<Vec<CartItem>>(json) {
            Ok(items) => Self::with_items(items),
            Err(error) => {
                warn!(%error, "stored cart could not be parsed; starting with an empty cart");
                Self::new()
            }
        }
    }

    /// Serialize the items for storage.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.items)
    }

    /// Add an item, or add its quantity to the existing line for the same product.
    ///
    /// Returns whether the cart changed.
    pub fn add_or_update(&mut self, item: CartItem) -> bool {
        if let Some(existing) = self.get_mut(&item.product_id) {
            if item.max_stock.is_some() {
                existing.max_stock = item.max_stock;
            }

            let requested = existing.quantity.saturating_add(item.quantity);
            let quantity = existing.clamp(requested);

            if quantity == 0 {
                return self.remove(&item.product_id);
            }

            let changed = quantity != existing.quantity;
            existing.quantity = quantity;

            return changed;
        }

        let quantity = item.clamp(item.quantity);

        if quantity == 0 {
            return false;
        }

        self.items.push(CartItem { quantity, ..item });

        true
    }

    /// Set the quantity of a product.
    ///
    /// A quantity of zero removes the product. Quantities above the stock ceiling are clamped
    /// to it. Unknown products are ignored. Returns whether the cart changed.
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product_id);
        }

        let Some(existing) = self.get_mut(product_id) else {
            return false;
        };

        let quantity = existing.clamp(quantity);

        if quantity == 0 {
            return self.remove(product_id);
        }

        let changed = quantity != existing.quantity;
        existing.quantity = quantity;

        changed
    }

    /// Add one unit of a product already in the cart.
    pub fn increment(&mut self, product_id: &str) -> bool {
        match self.get(product_id) {
            Some(item) => self.set_quantity(product_id, item.quantity.saturating_add(1)),
            None => false,
        }
    }

    /// Remove one unit of a product, removing the line when it reaches zero.
    pub fn decrement(&mut self, product_id: &str) -> bool {
        match self.get(product_id) {
            Some(item) => self.set_quantity(product_id, item.quantity.saturating_sub(1)),
            None => false,
        }
    }

    /// Remove a product. Removing an absent product is a no-op.
    pub fn remove(&mut self, product_id: &str) -> bool {
        let before = self.items.len();

        self.items.retain(|item| item.product_id != product_id);

        self.items.len() != before
    }

    /// Remove every item.
    pub fn clear(&mut self) -> bool {
        let changed = !self.items.is_empty();

        self.items.clear();

        changed
    }

    /// Sum of converted unit prices times quantities, in `display_currency`.
    #[must_use]
    pub fn subtotal(&self, display_currency: &str, rates: &RateTable) -> Decimal {
        self.items
            .iter()
            .map(|item| {
                rates.convert(item.unit_price, &item.currency, display_currency)
                    * Decimal::from(item.quantity)
            })
            .sum()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// The product references and quantities to submit with an order.
    #[must_use]
    pub fn line_items(&self) -> Vec<LineItem> {
        self.items
            .iter()
            .map(|item| LineItem {
                product_id: item.product_id.clone(),
                quantity: item.quantity,
            })
            .collect()
    }

    /// Currencies used by the items, in first-seen order.
    #[must_use]
    pub fn currencies(&self) -> Vec<&str> {
        let mut seen = FxHashSet::default();

        self.items
            .iter()
            .map(|item| item.currency.as_str())
            .filter(|currency| seen.insert(*currency))
            .collect()
    }

    /// Look up an item by product.
    #[must_use]
    pub fn get(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    fn get_mut(&mut self, product_id: &str) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| item.product_id == product_id)
    }

    /// The items in display order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Iterate over the items in display order.
    pub fn iter(&self) -> impl Iterator<Item = &CartItem> {
        self.items.iter()
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the cart has no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn item(id: &str, price: i64, quantity: u32) -> CartItem {
        CartItem::new(id, id.to_uppercase(), Decimal::from(price), "SAR", quantity)
    }

    fn two_items() -> Cart {
        Cart::with_items([item("a", 50, 1), item("b", 30, 2)])
    }

    #[test]
    fn add_appends_new_products_in_order() {
        let cart = two_items();

        let ids: Vec<&str> = cart.iter().map(|i| i.product_id.as_str()).collect();

        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn add_existing_product_increases_quantity() {
        let mut cart = two_items();

        assert!(cart.add_or_update(item("a", 50, 2)));
        assert_eq!(cart.get("a").map(|i| i.quantity), Some(3));
        assert_eq!(cart.len(), 2);
    }

    #[test]
    fn add_with_zero_quantity_is_ignored() {
        let mut cart = Cart::new();

        assert!(!cart.add_or_update(item("a", 50, 0)));
        assert!(cart.is_empty());
    }

    #[test]
    fn set_quantity_zero_matches_remove() {
        let mut by_quantity = two_items();
        let mut by_remove = two_items();

        by_quantity.set_quantity("a", 0);
        by_remove.remove("a");

        assert_eq!(by_quantity, by_remove);
    }

    #[test]
    fn decrement_from_one_removes_item() {
        let mut cart = two_items();

        assert!(cart.decrement("a"));
        assert!(cart.get("a").is_none());
    }

    #[test]
    fn increments_stop_at_stock_ceiling() {
        let mut cart = Cart::with_items([item("a", 10, 1).with_max_stock(3)]);

        for _ in 0..5 {
            cart.increment("a");
        }

        assert_eq!(cart.get("a").map(|i| i.quantity), Some(3));
        assert!(!cart.increment("a"));
    }

    #[test]
    fn set_quantity_clamps_to_stock_ceiling() {
        let mut cart = Cart::with_items([item("a", 10, 1).with_max_stock(4)]);

        assert!(cart.set_quantity("a", 10));
        assert_eq!(cart.get("a").map(|i| i.quantity), Some(4));
    }

    #[test]
    fn add_or_update_clamps_to_stock_ceiling() {
        let mut cart = Cart::with_items([item("a", 10, 2).with_max_stock(3)]);

        cart.add_or_update(item("a", 10, 5));

        assert_eq!(cart.get("a").map(|i| i.quantity), Some(3));
    }

    #[test]
    fn remove_absent_product_is_noop() {
        let mut cart = two_items();

        assert!(!cart.remove("missing"));
        assert_eq!(cart, two_items());
    }

    #[test]
    fn set_quantity_on_unknown_product_is_noop() {
        let mut cart = two_items();

        assert!(!cart.set_quantity("missing", 4));
        assert_eq!(cart, two_items());
    }

    #[test]
    fn subtotal_and_total_items() {
        let cart = two_items();
        let rates = RateTable::new("SAR");

        assert_eq!(cart.subtotal("SAR", &rates), Decimal::from(110));
        assert_eq!(cart.total_items(), 3);
    }

    #[test]
    fn subtotal_converts_each_line() -> TestResult {
        let rates = RateTable::try_from_rates("SAR", [("AED", Decimal::new(98, 2))])?;
        let cart = Cart::with_items([
            item("a", 100, 1),
            CartItem::new("b", "B", Decimal::from(49), "AED", 2),
        ]);

        assert_eq!(cart.subtotal("AED", &rates), Decimal::from(196));

        Ok(())
    }

    #[test]
    fn line_items_carry_no_prices() -> TestResult {
        let cart = two_items();

        let json = serde_json::to_value(cart.line_items())?;

        assert_eq!(
            json,
            serde_json::json!([
                { "productId": "a", "quantity": 1 },
                { "productId": "b", "quantity": 2 },
            ])
        );

        Ok(())
    }

    #[test]
    fn json_round_trip_preserves_items() -> TestResult {
        let cart = two_items();

        assert_eq!(Cart::from_json(&cart.to_json()?), cart);

        Ok(())
    }

    #[test]
    fn corrupt_json_restores_empty_cart() {
        assert!(Cart::from_json("{not json").is_empty());
        assert!(Cart::from_json(r#"{"items": 3}"#).is_empty());
    }

    #[test]
    fn restores_storefront_field_names() {
        let cart = Cart::from_json(
            r#"[{"_id":"p1","name":"Oud","price":120.5,"currency":"SAR","quantity":2,"stock":5}]"#,
        );

        let restored = cart.get("p1");

        assert_eq!(restored.map(|i| i.unit_price), Some(Decimal::new(1205, 1)));
        assert_eq!(restored.and_then(|i| i.max_stock), Some(5));
    }

    #[test]
    fn restore_merges_duplicates_and_drops_empty_lines() {
        let cart = Cart::with_items([item("a", 10, 1), item("b", 10, 0), item("a", 10, 2)]);

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.get("a").map(|i| i.quantity), Some(3));
    }

    #[test]
    fn currencies_are_unique_in_first_seen_order() {
        let cart = Cart::with_items([
            item("a", 10, 1),
            CartItem::new("b", "B", Decimal::ONE, "AED", 1),
            item("c", 10, 1),
        ]);

        assert_eq!(cart.currencies(), vec!["SAR", "AED"]);
    }
}
