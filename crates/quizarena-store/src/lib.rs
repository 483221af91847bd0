//! Quiz Arena — settlement persistence.
//!
//! `PgSettlementRepository` is the durable store; `InMemorySettlementRepository`
//! backs single-process deployments and tests.

pub mod memory;
pub mod pg_settlement_repository;
pub mod schema;

pub use memory::InMemorySettlementRepository;
pub use pg_settlement_repository::PgSettlementRepository;
