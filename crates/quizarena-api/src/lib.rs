//! Quiz Arena — HTTP and SSE boundary.
//!
//! Maps domain errors to HTTP responses, wires the tournament scheduler,
//! question rooms, settlement worker and payment reconciler into shared
//! state, and drives the scheduler tick.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod ticker;
