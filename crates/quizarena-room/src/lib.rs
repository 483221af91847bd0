//! Quiz Arena — Question room.
//!
//! Holds the active question of a live tournament, admits responses inside
//! the submission window, keeps an append-only fraud log, and fans room
//! events out to subscribers with per-subscriber isolation.

pub mod application;
pub mod domain;
