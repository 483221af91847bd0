//! Pure settlement rules. Nothing here performs I/O.

pub mod allocation;
pub mod merkle;
pub mod pot;
pub mod ranking;
