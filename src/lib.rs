//! Rebate
//!
//! Rebate is a discount engine for checkouts and orders: catalogue and order
//! promotions, vouchers with usage limits, and reconciliation of the persisted
//! discount records that explain every price reduction.

pub mod catalogue;
pub mod channels;
pub mod checkout;
pub mod config;
pub mod discounts;
pub mod fixtures;
pub mod lines;
pub mod order;
pub mod prelude;
pub mod pricing;
pub mod promotions;
pub mod receipt;
pub mod reconcile;
pub mod scenario;
pub mod vouchers;
