//! Application layer for the question room.

pub mod broadcast;
pub mod registry;
