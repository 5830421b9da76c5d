//! Shared types and pure ledger logic for the stock ledger
//!
//! This crate holds everything that does not need a database: domain
//! models, the stock planners, document numbering and input validation.
//! It is used by the backend and by the WASM preview module.

pub mod error;
pub mod ledger;
pub mod models;
pub mod sequence;
pub mod types;
pub mod validation;

pub use error::*;
pub use ledger::*;
pub use models::*;
pub use sequence::*;
pub use types::*;
pub use validation::*;
