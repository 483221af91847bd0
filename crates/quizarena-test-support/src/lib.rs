//! Shared test mocks and utilities for the Quiz Arena tournament engine.

mod clock;
mod repository;
mod transfer;

pub use clock::{FixedClock, ManualClock, fixed_now};
pub use repository::FailingSettlementRepository;
pub use transfer::{FailingTransferExecutor, RecordingTransferExecutor};
