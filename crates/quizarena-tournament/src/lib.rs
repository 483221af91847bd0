//! Quiz Arena — Tournament bounded context.
//!
//! Owns the tournament lifecycle (`scheduled → open → locked → in_progress →
//! finished → settled`), join and answer admission, and the scheduler tick
//! that drives phases forward and hands finished tournaments to settlement.

pub mod application;
pub mod domain;
