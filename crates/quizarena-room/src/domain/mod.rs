//! Domain layer for the question room.

pub mod fraud;
pub mod response;
pub mod room;
