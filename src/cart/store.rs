//! Cart persistence.

use std::{fmt, sync::Arc};

use mockall::automock;
use thiserror::Error;
use tracing::warn;

use crate::{
    cart::{Cart, CartItem},
    storage::{CART_KEY, ClientStorage, StorageError},
};

/// Errors raised while persisting the cart.
#[derive(Debug, Error)]
pub enum CartStoreError {
    /// The cart could not be serialized.
    #[error("failed to serialize cart: {0}")]
    Json(#[from] serde_json::Error),

    /// The storage backend rejected the write.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Loads and saves the shopper's cart.
#[automock]
pub trait CartStore: Send + Sync {
    /// Load the stored cart. Missing or unreadable state yields an empty cart.
    fn load(&self) -> Cart;

    /// Replace the stored cart with `items`.
    ///
    /// # Errors
    ///
    /// Returns a [`CartStoreError`] if the items cannot be written.
    fn save(&self, items: &[CartItem]) -> Result<(), CartStoreError>;
}

/// [`CartStore`] that keeps the cart as JSON in client storage.
#[derive(Clone)]
pub struct StorageCartStore {
    storage: Arc<dyn ClientStorage>,
}

impl StorageCartStore {
    /// Persist the cart in `storage`.
    #[must_use]
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self { storage }
    }
}

impl fmt::Debug for StorageCartStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCartStore")
            .field("storage", &self.storage)
            .finish()
    }
}

impl CartStore for StorageCartStore {
    fn load(&self) -> Cart {
        match self.storage.get(CART_KEY) {
            Ok(Some(json)) => Cart::from_json(&json),
            Ok(None) => Cart::new(),
            Err(error) => {
                warn!(%error, "cart storage unreadable; starting with an empty cart");
                Cart::new()
            }
        }
    }

    fn save(&self, items: &[CartItem]) -> Result<(), CartStoreError> {
        let json = serde_json::to_string(items)?;

        self.storage.set(CART_KEY, &json)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use testresult::TestResult;

    use crate::storage::MemoryStorage;

    use super::*;

    #[test]
    fn save_then_load_restores_cart() -> TestResult {
        let store = StorageCartStore::new(Arc::new(MemoryStorage::new()));
        let items = vec![CartItem::new("a", "A", Decimal::from(5), "SAR", 2)];

        store.save(&items)?;

        assert_eq!(store.load(), Cart::with_items(items));

        Ok(())
    }

    #[test]
    fn missing_cart_loads_empty() {
        let store = StorageCartStore::new(Arc::new(MemoryStorage::new()));

        assert!(store.load().is_empty());
    }

    #[test]
    fn corrupt_cart_loads_empty() -> TestResult {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(CART_KEY, "[{\"productId\":")?;

        let store = StorageCartStore::new(storage);

        assert!(store.load().is_empty());

        Ok(())
    }
}
