//! Settlement services that talk to the repository and transfer executor.

pub mod transfers;
pub mod worker;
