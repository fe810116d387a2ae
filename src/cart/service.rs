//! Cart service.
//!
//! Wraps the [`Cart`] aggregate so that every effective mutation is written to the
//! [`CartStore`] and broadcast to every other view showing the cart. Persistence is
//! last-write-wins: the full item list is written each time, and listeners re-read the list
//! from the event instead of patching their own copy.

use std::{fmt, sync::Arc};

use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cart::{Cart, CartItem, CartStore};

/// Number of unread change events kept for slow listeners.
const EVENT_CAPACITY: usize = 16;

/// Broadcast after every change to the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct CartChanged {
    /// The full item list after the change
    pub items: Vec<CartItem>,

    /// Total number of units after the change
    pub total_items: u64,
}

/// Cart with persistence and change notification.
pub struct CartService {
    cart: Cart,
    store: Arc<dyn CartStore>,
    events: broadcast::Sender<CartChanged>,
}

impl fmt::Debug for CartService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CartService")
            .field("cart", &self.cart)
            .field("listeners", &self.events.receiver_count())
            .finish_non_exhaustive()
    }
}

impl CartService {
    /// Restore the cart from `store`.
    #[must_use]
    pub fn new(store: Arc<dyn CartStore>) -> Self {
        let cart = store.load();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            cart,
            store,
            events,
        }
    }

    /// Listen for cart changes.
    pub fn subscribe(&self) -> broadcast::Receiver<CartChanged> {
        self.events.subscribe()
    }

    /// The current cart.
    #[must_use]
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// See [`Cart::add_or_update`].
    pub fn add_or_update(&mut self, item: CartItem) -> bool {
        let changed = self.cart.add_or_update(item);

        self.sync_if(changed)
    }

    /// See [`Cart::set_quantity`].
    pub fn set_quantity(&mut self, product_id: &str, quantity: u32) -> bool {
        let changed = self.cart.set_quantity(product_id, quantity);

        self.sync_if(changed)
    }

    /// See [`Cart::increment`].
    pub fn increment(&mut self, product_id: &str) -> bool {
        let changed = self.cart.increment(product_id);

        self.sync_if(changed)
    }

    /// See [`Cart::decrement`].
    pub fn decrement(&mut self, product_id: &str) -> bool {
        let changed = self.cart.decrement(product_id);

        self.sync_if(changed)
    }

    /// See [`Cart::remove`].
    pub fn remove(&mut self, product_id: &str) -> bool {
        let changed = self.cart.remove(product_id);

        self.sync_if(changed)
    }

    /// Empty the cart.
    pub fn clear(&mut self) -> bool {
        let changed = self.cart.clear();

        self.sync_if(changed)
    }

    /// Re-read the cart from the store, picking up writes made by another view.
    ///
    /// Returns whether the reloaded cart differs from the one held before.
    pub fn reload(&mut self) -> bool {
        let stored = self.store.load();
        let changed = stored != self.cart;

        self.cart = stored;

        if changed {
            self.notify();
        }

        changed
    }

    fn sync_if(&self, changed: bool) -> bool {
        if changed {
            if let Err(error) = self.store.save(self.cart.items()) {
                warn!(%error, "failed to persist cart; continuing with in-memory state");
            }

            self.notify();
        }

        changed
    }

    fn notify(&self) {
        let event = CartChanged {
            items: self.cart.items().to_vec(),
            total_items: self.cart.total_items(),
        };

        if self.events.send(event).is_err() {
            debug!("cart changed with no listeners");
        }
    }
}
