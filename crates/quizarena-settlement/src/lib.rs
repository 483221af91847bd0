//! Quiz Arena — Settlement bounded context.
//!
//! Turns a finished tournament into a locked pot, a deterministic ranking,
//! prize payouts, and a merkle commitment over the ranking, then hands the
//! payouts to a custodial transfer executor.

pub mod application;
pub mod domain;
