//! Application layer for payment reconciliation.

pub mod callback;
pub mod http_gateway;
pub mod reconciler;
