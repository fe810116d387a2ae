//! Shopper session.

use std::fmt;

use crate::api::{OrderEndpoint, REDACTED};

/// Who is checking out.
///
/// `Debug` output never includes bearer tokens.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum Session {
    /// Nobody is logged in.
    #[default]
    Anonymous,

    /// A staff or platform account without a customer profile.
    User {
        /// Bearer token
        token: String,
    },

    /// A storefront customer; orders are linked to their account.
    Customer {
        /// Customer bearer token
        token: String,

        /// Customer account id
        customer_id: String,
    },
}

impl Session {
    /// Whether anyone is logged in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Session::Anonymous)
    }

    /// Where orders placed in this session are sent.
    ///
    /// Only customer sessions use the account-linked endpoint; every other session places
    /// guest orders.
    #[must_use]
    pub fn order_endpoint(&self) -> OrderEndpoint {
        match self {
            Session::Customer { token, .. } => OrderEndpoint::Customer {
                token: token.clone(),
            },
            Session::Anonymous | Session::User { .. } => OrderEndpoint::Guest,
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Anonymous => f.write_str("Anonymous"),
            Session::User { .. } => f.debug_struct("User").field("token", &REDACTED).finish(),
            Session::Customer { customer_id, .. } => f
                .debug_struct("Customer")
                .field("token", &REDACTED)
                .field("customer_id", customer_id)
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn customers_use_account_endpoint() {
        let session = Session::Customer {
            token: "tok".to_string(),
            customer_id: "c1".to_string(),
        };

        assert!(session.is_authenticated());
        assert_eq!(
            session.order_endpoint(),
            OrderEndpoint::Customer {
                token: "tok".to_string()
            }
        );
    }

    #[test]
    fn everyone_else_places_guest_orders() {
        let user = Session::User {
            token: "tok".to_string(),
        };

        assert!(user.is_authenticated());
        assert!(!Session::Anonymous.is_authenticated());
        assert_eq!(user.order_endpoint(), OrderEndpoint::Guest);
        assert_eq!(Session::default().order_endpoint(), OrderEndpoint::Guest);
    }

    #[test]
    fn debug_output_hides_tokens() {
        let customer = Session::Customer {
            token: "secret-customer-token".to_string(),
            customer_id: "c1".to_string(),
        };
        let user = Session::User {
            token: "secret-user-token".to_string(),
        };

        let rendered = format!("{customer:?} {user:?}");

        assert!(!rendered.contains("secret"), "token leaked: {rendered}");
        assert!(rendered.contains("c1"));
        assert_eq!(format!("{:?}", Session::Anonymous), "Anonymous");
    }
}
