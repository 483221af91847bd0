//! Domain layer for payment reconciliation.

pub mod gateway;
pub mod join;
pub mod ledger;
