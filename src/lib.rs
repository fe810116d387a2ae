//! Till
//!
//! Till is the pricing and checkout core of a multi-currency storefront: it prices a cart across
//! currencies, applies coupons, decides which payment methods a delivery country may use, and
//! drives a checkout attempt through validation, payment and order placement.

pub mod api;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod coupons;
pub mod currency;
pub mod payments;
pub mod quote;
pub mod session;
pub mod storage;
