//! Off-site payment approval.
//!
//! Sending the shopper to the provider loses everything held in memory, so the order is
//! snapshotted to client storage first. Coming back is a pure decision over the callback query
//! and that snapshot: [`resume_from_redirect`] either yields the snapshot to capture against or
//! says why the attempt cannot continue.

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::form_urlencoded;
use uuid::Uuid;

use crate::{
    checkout::{CheckoutError, OrderPayload},
    storage::{ClientStorage, PENDING_ORDER_KEY, StorageError},
};

/// Order state persisted before leaving for off-site approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRedirect {
    /// The order to place once the payment is captured
    pub payload: OrderPayload,

    /// Provider order to capture
    pub provider_order_id: String,

    /// Key of the attempt that started the redirect
    pub idempotency_key: Uuid,

    /// The provider order was captured; only placing the order remains
    #[serde(default)]
    pub captured: bool,
}

impl PendingRedirect {
    /// The snapshot after a successful capture: the payload is paid by the provider order.
    #[must_use]
    pub fn into_captured(self) -> Self {
        Self {
            payload: self.payload.paid(self.provider_order_id.clone()),
            captured: true,
            ..self
        }
    }

    /// Write the snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] if the snapshot cannot be serialized or stored.
    pub fn save(&self, storage: &dyn ClientStorage) -> Result<(), CheckoutError> {
        let json = serde_json::to_string(self)?;

        storage.set(PENDING_ORDER_KEY, &json)?;

        Ok(())
    }

    /// Read the snapshot. A corrupt snapshot is treated as missing.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if storage cannot be read.
    pub fn load(storage: &dyn ClientStorage) -> Result<Option<Self>, StorageError> {
        let Some(json) = storage.get(PENDING_ORDER_KEY)? else {
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(pending) => Ok(Some(pending)),
            Err(error) => {
                warn!(%error, "pending order snapshot is unreadable; discarding it");
                Ok(None)
            }
        }
    }

    /// Remove the snapshot.
    ///
    /// # Errors
    ///
    /// Returns a [`StorageError`] if storage cannot be written.
    pub fn clear(storage: &dyn ClientStorage) -> Result<(), StorageError> {
        storage.remove(PENDING_ORDER_KEY)
    }
}

/// Parameters the provider appends to the return URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectQuery {
    /// Provider order the shopper approved
    pub token: Option<String>,

    /// Provider payer reference
    pub payer_id: Option<String>,

    /// The shopper backed out of the approval
    pub cancelled: bool,
}

impl RedirectQuery {
    /// Parse a query string, with or without the leading `?`.
    ///
    /// The shopper cancelled when `paypal=cancel` or `cancelled=true` is present.
    #[must_use]
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut parsed = Self::default();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "token" if !value.is_empty() => parsed.token = Some(value.into_owned()),
                "PayerID" if !value.is_empty() => parsed.payer_id = Some(value.into_owned()),
                "paypal" => parsed.cancelled |= value.eq_ignore_ascii_case("cancel"),
                "cancelled" => {
                    parsed.cancelled |= value.eq_ignore_ascii_case("true") || value == "1";
                }
                _ => {}
            }
        }

        parsed
    }
}

/// Decide whether a returning shopper's payment can be captured.
///
/// # Errors
///
/// - [`CheckoutError::RedirectSessionExpired`]: no snapshot exists, or the callback names a
///   different provider order than the snapshot.
/// - [`CheckoutError::RedirectCancelled`]: the shopper backed out at the provider. A snapshot
///   that was already captured cannot be cancelled; the shopper has paid.
pub fn resume_from_redirect(
    query: &RedirectQuery,
    pending: Option<PendingRedirect>,
) -> Result<PendingRedirect, CheckoutError> {
    let pending = pending.ok_or(CheckoutError::RedirectSessionExpired)?;

    if query.cancelled && !pending.captured {
        return Err(CheckoutError::RedirectCancelled);
    }

    let returned = query.token.as_deref();

    if returned.is_some_and(|token| token != pending.provider_order_id) {
        warn!(
            expected = %pending.provider_order_id,
            returned = ?returned,
            "redirect returned for a different provider order"
        );
        return Err(CheckoutError::RedirectSessionExpired);
    }

    Ok(pending)
}
