//! Quiz Arena — Payment reconciliation.
//!
//! Tracks each participant's paid join against gateway confirmations and
//! keeps a per-tournament ledger pot that moves only on status transitions,
//! so duplicate webhooks and gateway retries are harmless.

pub mod application;
pub mod domain;
